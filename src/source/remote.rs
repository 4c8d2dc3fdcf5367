//! HTTP(S) tile source.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::error::SourceError;
use crate::tile::TileAddress;

use super::config::{SourceKind, TileSourceConfig};
use super::TileSource;

/// Tile source backed by an HTTP tile server.
///
/// Each fetch is a single GET against the expanded template, bounded by the
/// client timeout and sent with a fixed User-Agent (many public tile servers
/// reject anonymous clients).
#[derive(Debug, Clone)]
pub struct RemoteSource {
    config: TileSourceConfig,
    client: reqwest::Client,
}

impl RemoteSource {
    /// Create a remote source.
    ///
    /// # Arguments
    ///
    /// * `config` - Source config; must be of kind [`SourceKind::Remote`]
    /// * `timeout` - Upper bound on a whole request including the body
    /// * `user_agent` - Value of the `User-Agent` header
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidConfiguration`] if the config is not
    /// remote or the HTTP client cannot be built.
    pub fn new(
        config: TileSourceConfig,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, SourceError> {
        if config.kind() != SourceKind::Remote {
            return Err(SourceError::InvalidConfiguration(format!(
                "{} is not a remote source",
                config
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                SourceError::InvalidConfiguration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl TileSource for RemoteSource {
    async fn fetch(&self, address: TileAddress) -> Result<Bytes, SourceError> {
        let url = self.config.format(&address);
        trace!(url = %url, "GET tile");

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(
                url = %url,
                error = %e,
                is_timeout = e.is_timeout(),
                is_connect = e.is_connect(),
                "Tile request failed"
            );
            SourceError::Network(format!("Request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            debug!(url = %url, status = %status, "Tile server returned error status");
            return Err(SourceError::Network(format!("HTTP {} from {}", status, url)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read response: {}", e)))?;

        trace!(url = %url, bytes = body.len(), "Tile received");
        Ok(body)
    }

    fn config(&self) -> &TileSourceConfig {
        &self.config
    }
}
