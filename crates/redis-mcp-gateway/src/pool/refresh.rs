//! Background token refresh for pooled channels
//!
//! One task per pooled host. It sleeps until the provider's refresh point,
//! acquires a fresh token and re-authenticates every channel of the host.
//! The task is aborted when the owning entry is released or dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::connector::CommandChannel;
use super::credential::{AccessToken, CredentialProvider};

/// Lower bound between refresh attempts
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Handle to a running refresh loop; aborts it on drop
pub struct RefreshTask {
    handle: JoinHandle<()>,
}

impl RefreshTask {
    pub fn spawn(
        host_id: String,
        provider: Arc<dyn CredentialProvider>,
        token: AccessToken,
        channels: Vec<Arc<dyn CommandChannel>>,
    ) -> Self {
        let handle = tokio::spawn(refresh_loop(host_id, provider, token, channels));
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn refresh_loop(
    host_id: String,
    provider: Arc<dyn CredentialProvider>,
    mut token: AccessToken,
    channels: Vec<Arc<dyn CommandChannel>>,
) {
    loop {
        let wait = (provider.refresh_at(&token) - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
            .max(MIN_REFRESH_INTERVAL);
        debug!(host_id = %host_id, wait_ms = wait.as_millis() as u64, "[TokenRefresh] Sleeping until refresh");
        tokio::time::sleep(wait).await;

        let fresh = match provider.acquire_token().await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(host_id = %host_id, error = %e, "[TokenRefresh] Failed to refresh token");
                tokio::time::sleep(provider.retry_delay()).await;
                continue;
            }
        };

        for channel in &channels {
            if let Err(e) = channel.reauthenticate(&fresh).await {
                warn!(host_id = %host_id, error = %e, "[TokenRefresh] Re-authentication failed");
            }
        }
        info!(
            host_id = %host_id,
            expires_at = %fresh.expires_at(),
            "[TokenRefresh] Channels re-authenticated"
        );
        token = fresh;
    }
}
