//! Cluster Topology Detector
//!
//! Opens a throwaway standalone channel, asks `INFO cluster` and reads
//! `cluster_enabled`. Never fails: any error (including servers that reply
//! "cluster support disabled") classifies the target as standalone.

use std::sync::Arc;

use redis_mcp_core::ConnectionDescriptor;
use tracing::{debug, info};

use super::connector::{ConnectRequest, Connector};
use super::credential::AccessToken;
use super::handle::{Reply, ReplyMode};

pub struct TopologyDetector {
    connector: Arc<dyn Connector>,
}

impl TopologyDetector {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// True when the target reports `cluster_enabled:1`
    pub async fn detect(&self, descriptor: &ConnectionDescriptor, token: Option<&AccessToken>) -> bool {
        let request = ConnectRequest::new(descriptor.clone(), false).with_token(token.cloned());

        let channel = match self.connector.open(&request).await {
            Ok(channel) => channel,
            Err(e) => {
                debug!(
                    address = %descriptor.address(),
                    error = %e,
                    "[TopologyDetector] Probe connection failed, assuming standalone"
                );
                return false;
            }
        };

        let clustered = match channel.execute(redis::cmd("INFO").arg("cluster")).await {
            Ok(value) => {
                let reply = Reply::from_value(value, ReplyMode::Decoded);
                reply.as_text().map(cluster_enabled).unwrap_or(false)
            }
            Err(e) => {
                if e.to_string().to_lowercase().contains("cluster support disabled") {
                    debug!(address = %descriptor.address(), "[TopologyDetector] Cluster support disabled");
                } else {
                    debug!(
                        address = %descriptor.address(),
                        error = %e,
                        "[TopologyDetector] INFO cluster failed, assuming standalone"
                    );
                }
                false
            }
        };

        if let Err(e) = channel.close().await {
            debug!(error = %e, "[TopologyDetector] Ignoring probe close error");
        }

        info!(
            address = %descriptor.address(),
            clustered,
            "[TopologyDetector] Detected topology"
        );
        clustered
    }
}

/// Parse the `cluster_enabled` field of an `INFO cluster` payload
pub fn cluster_enabled(info: &str) -> bool {
    info.lines()
        .filter_map(|line| line.trim().split_once(':'))
        .find(|(key, _)| *key == "cluster_enabled")
        .map(|(_, value)| value.trim() == "1")
        .unwrap_or(false)
}
