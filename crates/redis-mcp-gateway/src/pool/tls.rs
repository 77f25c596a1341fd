//! TLS material loading
//!
//! Builds the `redis` crate's [`TlsCertificates`] from descriptor paths:
//! - `ssl_ca_certs` (PEM bundle) plus every `.pem`/`.crt` under `ssl_ca_path`
//!   form the root store
//! - `ssl_certfile` + `ssl_keyfile` form the client identity

use std::fs;
use std::path::Path;

use redis::{ClientTlsConfig, TlsCertificates};
use redis_mcp_core::{ConfigurationError, TlsOptions};
use tracing::{debug, warn};

/// Load custom TLS material, `None` when the platform defaults suffice
pub fn load_certificates(tls: &TlsOptions) -> Result<Option<TlsCertificates>, ConfigurationError> {
    if !tls.enabled || (!tls.has_custom_roots() && !tls.has_client_identity()) {
        return Ok(None);
    }

    let mut roots = Vec::new();
    if let Some(bundle) = &tls.ca_certs {
        roots.extend(read_file(bundle)?);
        roots.push(b'\n');
    }
    if let Some(ca_path) = &tls.ca_path {
        roots.extend(read_ca_path(ca_path)?);
    }

    let client_tls = match (&tls.certfile, &tls.keyfile) {
        (Some(cert), Some(key)) => Some(ClientTlsConfig {
            client_cert: read_file(cert)?,
            client_key: read_file(key)?,
        }),
        (Some(_), None) | (None, Some(_)) => {
            warn!("[TLS] Both ssl_certfile and ssl_keyfile are required for client authentication, ignoring");
            None
        }
        (None, None) => None,
    };

    debug!(
        root_bytes = roots.len(),
        client_identity = client_tls.is_some(),
        "[TLS] Loaded certificate material"
    );

    Ok(Some(TlsCertificates {
        client_tls,
        root_cert: if roots.is_empty() { None } else { Some(roots) },
    }))
}

/// A CA path may be a single file or a directory of certificates
fn read_ca_path(path: &str) -> Result<Vec<u8>, ConfigurationError> {
    let p = Path::new(path);
    if !p.is_dir() {
        let mut bytes = read_file(path)?;
        bytes.push(b'\n');
        return Ok(bytes);
    }

    let entries = fs::read_dir(p).map_err(|e| tls_error(path, e))?;
    let mut files: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|file| {
            matches!(
                file.extension().and_then(|ext| ext.to_str()),
                Some("pem") | Some("crt")
            )
        })
        .collect();
    files.sort();

    let mut bundle = Vec::new();
    for file in files {
        let bytes = fs::read(&file).map_err(|e| tls_error(&file.display().to_string(), e))?;
        bundle.extend(bytes);
        bundle.push(b'\n');
    }
    Ok(bundle)
}

fn read_file(path: &str) -> Result<Vec<u8>, ConfigurationError> {
    fs::read(path).map_err(|e| tls_error(path, e))
}

fn tls_error(path: &str, e: std::io::Error) -> ConfigurationError {
    ConfigurationError::TlsMaterial {
        path: path.to_string(),
        reason: e.to_string(),
    }
}
