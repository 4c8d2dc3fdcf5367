//! Tile identity, decoded tiles, the tile cache and fetch orchestration.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       MapView (viewport driver)         │
//! └────────────────────┬────────────────────┘
//!                      │ ensure_tiles / invalidate_all
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           TileOrchestrator              │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  TileCache   │  │  in-flight set  │  │
//! │  │ (decoded     │  │  (address →     │  │
//! │  │  tiles)      │  │   epoch)        │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │ spawned fetches
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            dyn TileSource               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileAddress`]: grid cell identity, including zoom
//! - [`TileImage`]: decoded RGBA bitmap
//! - [`TileCache`]: address → decoded tile, cleared wholesale on invalidation
//! - [`TileOrchestrator`]: dedups fetches, tags them with epochs, applies completions
//! - [`visible_tiles`]: read-only query used by renderers

mod address;
mod cache;
mod image;
mod orchestrator;
mod visible;

pub use address::TileAddress;
pub use cache::TileCache;
pub use image::TileImage;
pub use orchestrator::{
    CompletionReport, EnsureReport, FetchCompletion, FetchOutcome, OrchestratorStats,
    TileOrchestrator,
};
pub use visible::{tile_rect, visible_tiles, VisibleTile};
