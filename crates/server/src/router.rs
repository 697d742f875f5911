//! Sticky routing of requests to execution shards.

use crate::ring::HashRing;
use dashmap::DashMap;
use std::time::Duration;
use tessera_common::config::RouterSettings;
use tessera_error::{ErrorCode, ErrorContext, Result, TesseraError};
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info};

/// Maps a routing key (the config id) to a shard and hands out that shard's channel.
///
/// Channels are created lazily on first use of a port and kept for the router's lifetime.
/// A channel that cannot connect surfaces the failure on the first call made over it.
#[derive(Debug)]
pub struct ShardRouter {
    host: String,
    ring: HashRing,
    channels: DashMap<u16, Channel>,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl ShardRouter {
    pub fn new(settings: &RouterSettings) -> Self {
        let ring = HashRing::with_ports(&settings.ports, settings.virtual_nodes);
        info!(
            target: "router",
            host = %settings.host,
            ports = ?ring.ports(),
            virtual_nodes = settings.virtual_nodes,
            "Shard ring built"
        );
        Self {
            host: settings.host.clone(),
            ring,
            channels: DashMap::new(),
            connect_timeout: settings.connect_timeout(),
            request_timeout: settings.request_timeout(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port_for(&self, key: &str) -> Result<u16> {
        self.ring.port_for(key).ok_or_else(|| {
            TesseraError::new(ErrorCode::ShardUnavailable, "No execution shards configured.")
        })
    }

    /// The shard port for `key` and its channel.
    pub fn channel_for(&self, key: &str) -> Result<(u16, Channel)> {
        let port = self.port_for(key)?;
        if let Some(channel) = self.channels.get(&port) {
            return Ok((port, channel.clone()));
        }

        let channel = self
            .channels
            .entry(port)
            .or_try_insert_with(|| self.connect_lazy(port))?
            .clone();
        Ok((port, channel))
    }

    /// Number of shard channels created so far.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn connect_lazy(&self, port: u16) -> Result<Channel> {
        let uri = format!("http://{}:{}", self.host, port);
        debug!(target: "router", %uri, "Creating shard channel");
        let endpoint = Endpoint::from_shared(uri.clone()).map_err(|e| {
            TesseraError::new(
                ErrorCode::ShardUnavailable,
                format!("Invalid shard address {}: {}", uri, e),
            )
            .with_context(ErrorContext::Shard {
                host: self.host.clone(),
                port,
            })
        })?;
        Ok(endpoint
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .connect_lazy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(ports: Vec<u16>) -> RouterSettings {
        RouterSettings {
            host: "127.0.0.1".into(),
            ports,
            ..RouterSettings::default()
        }
    }

    #[tokio::test]
    async fn test_one_channel_per_port() {
        let router = ShardRouter::new(&settings(vec![9090, 9091]));
        let (port, _) = router.channel_for("config-1").unwrap();
        let (again, _) = router.channel_for("config-1").unwrap();
        assert_eq!(port, again);
        assert_eq!(router.channel_count(), 1);

        for i in 0..200 {
            router.channel_for(&format!("config-{}", i)).unwrap();
        }
        assert_eq!(router.channel_count(), 2);
    }

    #[tokio::test]
    async fn test_no_ports() {
        let router = ShardRouter::new(&settings(vec![]));
        let err = router.channel_for("config-1").unwrap_err();
        assert_eq!(err.code, ErrorCode::ShardUnavailable);
    }
}
