//! Connection Pool - registry of named Redis connections
//!
//! ConnectionPool is the single owner of every live connection. Each host
//! identifier maps to one entry holding a decoding and a raw handle.
//!
//! Key responsibilities:
//! - Resolving cluster topology and credentials before connecting
//! - Opening and liveness-checking both handles (no partial entries)
//! - Tracking the default host
//! - Listing/describing entries with live server info
//! - Releasing handles best-effort on replace and remove
//!
//! The registry lock is only held to mutate or snapshot the map; all network
//! I/O happens outside it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use redis_mcp_core::{ClusterMode, ConnectionDescriptor, EntraIdConfig};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::connector::{ConnectRequest, Connector};
use super::credential::{
    AccessToken, CredentialError, CredentialProvider, CredentialProviderFactory,
};
use super::error::{FailureCategory, PoolError};
use super::handle::{RedisHandle, Reply, ReplyMode};
use super::refresh::RefreshTask;
use super::topology::TopologyDetector;

/// Shown instead of a database index for cluster entries
pub const CLUSTER_DB_PLACEHOLDER: &str = "N/A (cluster)";

/// Database column of a connection row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DbSlot {
    Index(i64),
    NotApplicable(&'static str),
}

/// One row of `list()` / `describe()`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionDetails {
    pub host_id: String,
    pub status: String,
    pub redis_version: String,
    pub host: String,
    pub port: u16,
    pub db: DbSlot,
    pub cluster_mode: bool,
    pub ssl: bool,
    pub is_default: bool,
    pub connection_types: Vec<ReplyMode>,
}

/// `describe()` result: a row or an error payload, never a thrown error
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConnectionDescription {
    Found(ConnectionDetails),
    Missing { error: String },
}

/// Pool-owned record for one host identifier
pub struct ConnectionEntry {
    host_id: String,
    descriptor: ConnectionDescriptor,
    handles: BTreeMap<ReplyMode, Arc<RedisHandle>>,
    refresh: Mutex<Option<RefreshTask>>,
    connected_at: DateTime<Utc>,
}

impl ConnectionEntry {
    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn handle(&self, mode: ReplyMode) -> Option<&Arc<RedisHandle>> {
        self.handles.get(&mode)
    }

    /// Stop token refresh and close every handle, swallowing failures
    async fn release(&self) {
        self.refresh.lock().take();
        for handle in self.handles.values() {
            release_best_effort(&self.host_id, handle).await;
        }
    }
}

/// Close a handle, logging and ignoring failure
pub async fn release_best_effort(host_id: &str, handle: &RedisHandle) {
    if let Err(e) = handle.close().await {
        warn!(
            host_id = %host_id,
            mode = ?handle.mode(),
            error = %e,
            "[ConnectionPool] Ignoring error while closing handle"
        );
    }
}

#[derive(Default)]
struct Registry {
    entries: BTreeMap<String, Arc<ConnectionEntry>>,
    default_host: Option<String>,
}

impl Registry {
    fn host_ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

struct CredentialSettings {
    config: EntraIdConfig,
    factory: Arc<dyn CredentialProviderFactory>,
    /// Created on first use and shared by every entry
    provider: Mutex<Option<Arc<dyn CredentialProvider>>>,
}

impl CredentialSettings {
    fn provider(&self) -> Result<Arc<dyn CredentialProvider>, CredentialError> {
        let mut slot = self.provider.lock();
        if let Some(provider) = slot.as_ref() {
            return Ok(provider.clone());
        }
        let provider = self.factory.create(&self.config)?;
        *slot = Some(provider.clone());
        Ok(provider)
    }
}

/// Registry of named Redis connections
pub struct ConnectionPool {
    registry: RwLock<Registry>,
    connector: Arc<dyn Connector>,
    detector: TopologyDetector,
    credentials: Option<CredentialSettings>,
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            detector: TopologyDetector::new(connector.clone()),
            connector,
            credentials: None,
        }
    }

    /// Authenticate every new connection with Entra ID tokens
    pub fn with_credentials(
        mut self,
        config: EntraIdConfig,
        factory: Arc<dyn CredentialProviderFactory>,
    ) -> Self {
        if config.is_enabled() {
            self.credentials = Some(CredentialSettings {
                config,
                factory,
                provider: Mutex::new(None),
            });
        }
        self
    }

    pub fn uses_credential_provider(&self) -> bool {
        self.credentials.is_some()
    }

    // ========================================================================
    // add
    // ========================================================================

    /// Connect `host_id` and register it, replacing any existing entry.
    ///
    /// On failure nothing is registered and every handle opened so far is
    /// released.
    pub async fn add(
        &self,
        host_id: &str,
        descriptor: ConnectionDescriptor,
    ) -> Result<String, PoolError> {
        info!(host_id = %host_id, address = %descriptor.address(), "[ConnectionPool] Adding connection");

        let (provider, token) = self.acquire_credentials(host_id).await?;

        let cluster_mode = if descriptor.cluster_mode.is_resolved() {
            descriptor.cluster_mode
        } else if self.detector.detect(&descriptor, token.as_ref()).await {
            ClusterMode::Clustered
        } else {
            ClusterMode::Standalone
        };
        let descriptor = descriptor.with_cluster_mode(cluster_mode);
        let request = ConnectRequest::new(descriptor.clone(), cluster_mode.is_clustered())
            .with_token(token.clone());

        let mut handles: BTreeMap<ReplyMode, Arc<RedisHandle>> = BTreeMap::new();
        for mode in ReplyMode::ALL {
            match self.open_handle(host_id, mode, &request).await {
                Ok(handle) => {
                    handles.insert(mode, handle);
                }
                Err(e) => {
                    release_all(host_id, &handles).await;
                    return Err(e);
                }
            }
        }

        let refresh = match (provider, token) {
            (Some(provider), Some(token)) => Some(RefreshTask::spawn(
                host_id.to_string(),
                provider,
                token,
                handles.values().map(|h| h.channel().clone()).collect(),
            )),
            _ => None,
        };

        let entry = Arc::new(ConnectionEntry {
            host_id: host_id.to_string(),
            descriptor: descriptor.clone(),
            handles,
            refresh: Mutex::new(refresh),
            connected_at: Utc::now(),
        });

        let displaced = {
            let mut registry = self.registry.write();
            let displaced = registry.entries.insert(host_id.to_string(), entry);
            if registry.default_host.is_none() {
                registry.default_host = Some(host_id.to_string());
            }
            displaced
        };

        if let Some(old) = displaced {
            debug!(host_id = %host_id, "[ConnectionPool] Releasing replaced entry");
            old.release().await;
        }

        info!(
            host_id = %host_id,
            cluster_mode = cluster_mode.is_clustered(),
            "[ConnectionPool] Connection added"
        );

        Ok(format!(
            "Successfully connected to Redis at {}{}",
            descriptor.address(),
            if cluster_mode.is_clustered() {
                " (cluster mode)"
            } else {
                ""
            }
        ))
    }

    async fn acquire_credentials(
        &self,
        host_id: &str,
    ) -> Result<(Option<Arc<dyn CredentialProvider>>, Option<AccessToken>), PoolError> {
        let Some(settings) = &self.credentials else {
            return Ok((None, None));
        };

        let provider = settings
            .provider()
            .map_err(|e| PoolError::credential(host_id, e))?;
        let token = provider
            .acquire_token()
            .await
            .map_err(|e| PoolError::credential(host_id, e))?;

        debug!(host_id = %host_id, expires_at = %token.expires_at(), "[ConnectionPool] Using Entra ID token");
        Ok((Some(provider), Some(token)))
    }

    /// Open one channel, wrap it and check liveness
    async fn open_handle(
        &self,
        host_id: &str,
        mode: ReplyMode,
        request: &ConnectRequest,
    ) -> Result<Arc<RedisHandle>, PoolError> {
        let channel = self
            .connector
            .open(request)
            .await
            .map_err(|e| PoolError::connectivity(host_id, e))?;
        let handle = Arc::new(RedisHandle::new(host_id, mode, channel));

        if let Err(e) = handle.ping().await {
            warn!(host_id = %host_id, mode = ?mode, error = %e, "[ConnectionPool] Liveness check failed");
            release_best_effort(host_id, &handle).await;
            return Err(PoolError::Connectivity {
                host_id: host_id.to_string(),
                category: FailureCategory::of(&e),
                message: e.to_string(),
            });
        }
        Ok(handle)
    }

    // ========================================================================
    // get / list / describe
    // ========================================================================

    /// Handle for `host_id` (or the default host) in the requested mode
    pub fn get(&self, host_id: Option<&str>, mode: ReplyMode) -> Result<Arc<RedisHandle>, PoolError> {
        let registry = self.registry.read();
        let id = match host_id {
            Some(id) => id,
            None => registry
                .default_host
                .as_deref()
                .ok_or(PoolError::NoConnections)?,
        };

        let entry = registry.entries.get(id).ok_or_else(|| PoolError::NotFound {
            host_id: id.to_string(),
            available: registry.host_ids(),
        })?;

        entry
            .handle(mode)
            .cloned()
            .ok_or_else(|| PoolError::Consistency {
                host_id: id.to_string(),
                message: format!("no {:?} handle registered", mode),
            })
    }

    /// Every entry with live server info, keyed by host identifier
    pub async fn list(&self) -> BTreeMap<String, ConnectionDetails> {
        let (entries, default_host) = {
            let registry = self.registry.read();
            let entries: Vec<Arc<ConnectionEntry>> = registry.entries.values().cloned().collect();
            (entries, registry.default_host.clone())
        };

        let rows = join_all(entries.iter().map(|entry| {
            let is_default = default_host.as_deref() == Some(entry.host_id());
            details_for(entry, is_default)
        }))
        .await;

        rows.into_iter()
            .map(|row| (row.host_id.clone(), row))
            .collect()
    }

    /// Details for one entry (default when `host_id` is omitted)
    pub async fn describe(&self, host_id: Option<&str>) -> ConnectionDescription {
        let lookup = {
            let registry = self.registry.read();
            let id = host_id
                .map(str::to_string)
                .or_else(|| registry.default_host.clone());
            match id {
                None => Err(PoolError::NoConnections.to_string()),
                Some(id) => match registry.entries.get(&id) {
                    Some(entry) => Ok((
                        entry.clone(),
                        registry.default_host.as_deref() == Some(id.as_str()),
                    )),
                    None => Err(PoolError::NotFound {
                        host_id: id,
                        available: registry.host_ids(),
                    }
                    .to_string()),
                },
            }
        };

        match lookup {
            Ok((entry, is_default)) => ConnectionDescription::Found(details_for(&entry, is_default).await),
            Err(error) => ConnectionDescription::Missing { error },
        }
    }

    // ========================================================================
    // remove / switch default
    // ========================================================================

    /// Evict `host_id` and close its handles. Unknown ids are not an error.
    pub async fn remove(&self, host_id: &str) -> String {
        let removed = {
            let mut registry = self.registry.write();
            let removed = registry.entries.remove(host_id);
            if removed.is_some() && registry.default_host.as_deref() == Some(host_id) {
                registry.default_host = registry.entries.keys().next().cloned();
                debug!(
                    removed = %host_id,
                    new_default = ?registry.default_host,
                    "[ConnectionPool] Default host reassigned"
                );
            }
            removed
        };

        match removed {
            Some(entry) => {
                entry.release().await;
                info!(host_id = %host_id, "[ConnectionPool] Connection removed");
                format!("Successfully disconnected from '{}'", host_id)
            }
            None => format!("Connection '{}' not found in pool", host_id),
        }
    }

    pub fn switch_default(&self, host_id: &str) -> String {
        let mut registry = self.registry.write();
        if !registry.entries.contains_key(host_id) {
            return format!(
                "Connection '{}' not found. Available connections: {:?}",
                host_id,
                registry.host_ids()
            );
        }
        registry.default_host = Some(host_id.to_string());
        info!(host_id = %host_id, "[ConnectionPool] Default connection switched");
        format!("Default connection switched to '{}'", host_id)
    }

    pub fn default_host(&self) -> Option<String> {
        self.registry.read().default_host.clone()
    }

    pub fn host_ids(&self) -> Vec<String> {
        self.registry.read().host_ids()
    }

    pub fn len(&self) -> usize {
        self.registry.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.read().entries.is_empty()
    }

    /// Release every entry (shutdown)
    pub async fn close_all(&self) {
        let entries: Vec<Arc<ConnectionEntry>> = {
            let mut registry = self.registry.write();
            registry.default_host = None;
            std::mem::take(&mut registry.entries).into_values().collect()
        };
        for entry in entries {
            entry.release().await;
        }
    }
}

async fn release_all(host_id: &str, handles: &BTreeMap<ReplyMode, Arc<RedisHandle>>) {
    for handle in handles.values() {
        release_best_effort(host_id, handle).await;
    }
}

/// Build a details row, querying `INFO server` on the decoding handle
async fn details_for(entry: &ConnectionEntry, is_default: bool) -> ConnectionDetails {
    let descriptor = entry.descriptor();
    let clustered = descriptor.cluster_mode.is_clustered();

    let (status, redis_version) = match entry.handle(ReplyMode::Decoded) {
        Some(handle) => match handle.query(redis::cmd("INFO").arg("server")).await {
            Ok(reply) => {
                let version = info_text(&reply)
                    .and_then(|info| info_field(info, "redis_version"))
                    .unwrap_or_else(|| "unknown".to_string());
                ("connected".to_string(), version)
            }
            Err(e) => (format!("error: {}", e), "unknown".to_string()),
        },
        None => ("error: decoding handle missing".to_string(), "unknown".to_string()),
    };

    ConnectionDetails {
        host_id: entry.host_id().to_string(),
        status,
        redis_version,
        host: descriptor.host.clone(),
        port: descriptor.port,
        db: if clustered {
            DbSlot::NotApplicable(CLUSTER_DB_PLACEHOLDER)
        } else {
            DbSlot::Index(descriptor.effective_db())
        },
        cluster_mode: clustered,
        ssl: descriptor.tls.enabled,
        is_default,
        connection_types: entry.handles.keys().copied().collect(),
    }
}

/// INFO payload text; cluster connections answer with one payload per node
/// and the first node is used.
pub fn info_text(reply: &Reply) -> Option<&str> {
    match reply {
        Reply::Map(pairs) => pairs.first().and_then(|(_, v)| v.as_text()),
        other => other.as_text(),
    }
}

/// Value of `field` in an INFO payload; the first match wins.
pub fn info_field(info: &str, field: &str) -> Option<String> {
    info.lines()
        .filter_map(|line| line.trim().split_once(':'))
        .find(|(key, _)| *key == field)
        .map(|(_, value)| value.trim().to_string())
}
