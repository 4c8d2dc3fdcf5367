//! # tileview
//!
//! Tile management engine for pannable, zoomable raster maps.
//!
//! The crate does everything a slippy map needs except drawing: it projects
//! geographic coordinates onto the Web Mercator tile grid, works out which
//! tiles a viewport needs, fetches them concurrently from a tile source,
//! caches the decoded images and fails over to backup sources when the
//! active one stops answering.
//!
//! ## Features
//!
//! - **Projection**: geo, tile and screen coordinate conversions
//! - **Fetch orchestration**: deduplicated concurrent fetches with epoch-based
//!   discarding of stale results
//! - **Tile sources**: remote HTTP templates, local directories and bundled assets
//! - **Failover**: periodic probing of the active and backup sources
//! - **Rendering hook**: a [`MapRenderer`] trait plus an in-memory canvas
//!
//! ## Architecture
//!
//! - [`geo`] - Coordinate types and the Web Mercator projection
//! - [`tile`] - Tile addresses, decoded images, cache and fetch orchestration
//! - [`source`] - Tile source configs, presets and fetch backends
//! - [`view`] - Viewport state, failover and the [`MapView`] surface
//! - [`config`] - Map options and CLI configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tileview::{MapOptions, MapView, PixelSize, TileSourceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tileview::SourceError> {
//!     let mut map = MapView::new(MapOptions {
//!         viewport: PixelSize::new(1024, 768),
//!         ..MapOptions::default()
//!     });
//!
//!     let osm = TileSourceConfig::parse("https://tile.openstreetmap.org/{z}/{x}/{y}.png")?;
//!     map.set_tile_server(osm, true).await?;
//!
//!     let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
//!     map.run_until_idle(deadline).await;
//!     println!("{} tiles visible", map.visible_tiles().len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod geo;
pub mod source;
pub mod tile;
pub mod view;

// Re-export commonly used types
pub use config::{CheckConfig, Cli, Command, MapOptions, ViewConfig};
pub use error::{SourceError, TileKeyError};
pub use geo::{GeoPoint, MapPoint, MapSize, PixelSize, Projector, ScreenPoint, ScreenRect, TilePoint};
pub use source::{
    presets, AssetBundle, SourceKind, SourceSettings, TileSource, TileSourceConfig,
};
pub use tile::{TileAddress, TileCache, TileImage, TileOrchestrator, VisibleTile};
pub use view::{ImageCanvas, MapEvent, MapRenderer, MapView, TileWindow, ViewportState};
