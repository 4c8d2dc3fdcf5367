//! Tile sources.
//!
//! A tile source turns a [`TileAddress`] into encoded image bytes. Three
//! variants exist behind the [`TileSource`] trait:
//!
//! ```text
//!                  ┌──────────────────────┐
//!                  │   dyn TileSource     │
//!                  │  fetch(address)      │
//!                  └──────────┬───────────┘
//!          ┌──────────────────┼──────────────────┐
//!          ▼                  ▼                  ▼
//!   ┌─────────────┐    ┌─────────────┐    ┌───────────────┐
//!   │RemoteSource │    │ LocalSource │    │ BundledSource │
//!   │ HTTP GET    │    │ tokio::fs   │    │ AssetBundle   │
//!   └─────────────┘    └─────────────┘    └───────────────┘
//! ```
//!
//! Before a source becomes active it is [probed](probe): tile `0/0/0` is
//! fetched and decoded to check reachability and learn the tile size.

mod bundled;
mod config;
mod local;
pub mod presets;
mod remote;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::tile::{TileAddress, TileImage};

pub use bundled::{AssetBundle, BundledSource};
pub use config::{
    SourceKind, TileSourceConfig, BUNDLED_RESOURCE_PREFIX, BUNDLED_SCHEME, INVALID_TEMPLATE,
};
pub use local::LocalSource;
pub use remote::RemoteSource;

/// Default bound on a single fetch or probe.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default `User-Agent` sent by remote sources.
pub const DEFAULT_USER_AGENT: &str = concat!("tileview/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// TileSource Trait
// =============================================================================

/// Provider of encoded tile bytes.
///
/// Implementations must be cheap to share: the orchestrator holds the active
/// source in an `Arc` and clones it into every fetch task.
#[async_trait]
pub trait TileSource: Send + Sync {
    /// Fetch the encoded bytes of one tile.
    ///
    /// # Errors
    ///
    /// - [`SourceError::NotFound`] if the source has no such tile
    /// - [`SourceError::Network`] on transport failures, timeouts and
    ///   non-success HTTP statuses
    async fn fetch(&self, address: TileAddress) -> Result<Bytes, SourceError>;

    /// The config this source was built from.
    fn config(&self) -> &TileSourceConfig;
}

// =============================================================================
// Construction
// =============================================================================

/// Settings shared by every source the map builds.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Bound on each fetch and on the probe
    pub timeout: Duration,

    /// `User-Agent` header for remote sources
    pub user_agent: String,

    /// Assets for bundled sources; bundled sources see an empty bundle if unset
    pub bundle: Option<Arc<AssetBundle>>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            bundle: None,
        }
    }
}

/// Build the source described by `config`.
///
/// # Errors
///
/// Returns [`SourceError::InvalidConfiguration`] for the invalid sentinel or
/// if the HTTP client cannot be created.
pub fn build_source(
    config: &TileSourceConfig,
    settings: &SourceSettings,
) -> Result<Arc<dyn TileSource>, SourceError> {
    if config.is_invalid() {
        return Err(SourceError::InvalidConfiguration(
            "no tile source configured".to_string(),
        ));
    }

    let source: Arc<dyn TileSource> = match config.kind() {
        SourceKind::Remote => Arc::new(RemoteSource::new(
            config.clone(),
            settings.timeout,
            &settings.user_agent,
        )?),
        SourceKind::Local => Arc::new(LocalSource::new(config.clone())?),
        SourceKind::Bundled => {
            let bundle = settings.bundle.clone().unwrap_or_default();
            Arc::new(BundledSource::new(config.clone(), bundle)?)
        }
    };
    Ok(source)
}

// =============================================================================
// Probing
// =============================================================================

/// Outcome of a successful probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    /// Edge length in pixels of the probe tile
    pub tile_size: u32,
}

/// Fetch and decode tile `0/0/0`, bounded by `timeout`.
///
/// # Errors
///
/// Any fetch or decode error; an elapsed timeout is reported as
/// [`SourceError::Network`].
pub async fn probe(source: &dyn TileSource, timeout: Duration) -> Result<ProbeReport, SourceError> {
    let config = source.config();
    debug!(source = %config, "Probing tile source");

    let bytes = match tokio::time::timeout(timeout, source.fetch(TileAddress::root())).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::Network(format!(
            "probe timed out after {:?}",
            timeout
        ))),
    }
    .map_err(|e| {
        warn!(source = %config, error = %e, "Probe failed");
        e
    })?;

    let image = TileImage::decode(&bytes).map_err(|e| {
        warn!(source = %config, error = %e, "Probe tile is not an image");
        e
    })?;

    if image.width() != image.height() {
        warn!(
            source = %config,
            width = image.width(),
            height = image.height(),
            "Probe tile is not square, using its width as tile size"
        );
    }

    Ok(ProbeReport {
        tile_size: image.width(),
    })
}

/// Build a source and probe it in one step.
pub async fn connect(
    config: &TileSourceConfig,
    settings: &SourceSettings,
) -> Result<(Arc<dyn TileSource>, ProbeReport), SourceError> {
    let source = build_source(config, settings)?;
    let report = probe(source.as_ref(), settings.timeout).await?;
    Ok((source, report))
}
