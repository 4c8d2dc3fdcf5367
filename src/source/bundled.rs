//! Tile source backed by assets packaged with the application.
//!
//! The host either embeds tiles at compile time and registers them with
//! [`AssetBundle::insert`], or loads a directory tree once at startup with
//! [`AssetBundle::load_dir`]. Lookups afterwards never touch the filesystem.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::SourceError;
use crate::tile::TileAddress;

use super::config::{SourceKind, TileSourceConfig};
use super::TileSource;

// =============================================================================
// Asset Bundle
// =============================================================================

/// In-memory collection of assets keyed by relative path (`tiles/3/1/2.png`).
#[derive(Debug, Clone, Default)]
pub struct AssetBundle {
    assets: HashMap<String, Bytes>,
}

impl AssetBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset. Leading slashes in `path` are ignored.
    pub fn insert(&mut self, path: impl AsRef<str>, data: impl Into<Bytes>) {
        self.assets.insert(normalize(path.as_ref()), data.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_asset(mut self, path: impl AsRef<str>, data: impl Into<Bytes>) -> Self {
        self.insert(path, data);
        self
    }

    pub fn get(&self, path: &str) -> Option<Bytes> {
        self.assets.get(&normalize(path)).cloned()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Load every file under `root`, keyed by its path relative to `root`.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error hit while walking the tree.
    pub async fn load_dir(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref();
        let mut bundle = Self::new();
        let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }

                let relative = path.strip_prefix(root).unwrap_or(&path);
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let data = tokio::fs::read(&path).await?;
                bundle.insert(key, data);
            }
        }

        debug!(root = %root.display(), assets = bundle.len(), "Loaded asset bundle");
        Ok(bundle)
    }
}

fn normalize(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

// =============================================================================
// Bundled Source
// =============================================================================

/// Tile source resolving addresses against an [`AssetBundle`].
#[derive(Debug, Clone)]
pub struct BundledSource {
    config: TileSourceConfig,
    bundle: Arc<AssetBundle>,
}

impl BundledSource {
    pub fn new(config: TileSourceConfig, bundle: Arc<AssetBundle>) -> Result<Self, SourceError> {
        if config.kind() != SourceKind::Bundled {
            return Err(SourceError::InvalidConfiguration(format!(
                "{} is not a bundled source",
                config
            )));
        }
        Ok(Self { config, bundle })
    }
}

#[async_trait]
impl TileSource for BundledSource {
    async fn fetch(&self, address: TileAddress) -> Result<Bytes, SourceError> {
        let key = self.config.bundle_key(&address);
        self.bundle.get(&key).ok_or(SourceError::NotFound(key))
    }

    fn config(&self) -> &TileSourceConfig {
        &self.config
    }
}
