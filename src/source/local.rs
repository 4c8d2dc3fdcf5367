//! Filesystem tile source.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::trace;

use crate::error::SourceError;
use crate::tile::TileAddress;

use super::config::{SourceKind, TileSourceConfig};
use super::TileSource;

/// Tile source reading image files from a path template such as
/// `/srv/tiles/{z}/{x}/{y}.png`.
#[derive(Debug, Clone)]
pub struct LocalSource {
    config: TileSourceConfig,
}

impl LocalSource {
    pub fn new(config: TileSourceConfig) -> Result<Self, SourceError> {
        if config.kind() != SourceKind::Local {
            return Err(SourceError::InvalidConfiguration(format!(
                "{} is not a local source",
                config
            )));
        }
        Ok(Self { config })
    }

    /// Filesystem path of a tile.
    pub fn path_for(&self, address: &TileAddress) -> PathBuf {
        PathBuf::from(self.config.format(address))
    }
}

#[async_trait]
impl TileSource for LocalSource {
    async fn fetch(&self, address: TileAddress) -> Result<Bytes, SourceError> {
        let path = self.path_for(&address);
        trace!(path = %path.display(), "Reading tile file");

        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(SourceError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(SourceError::Network(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn config(&self) -> &TileSourceConfig {
        &self.config
    }
}
