//! Viewport driver, failover and the public map surface.
//!
//! - [`MapView`]: owns viewport, orchestrator and failover; the type hosts use
//! - [`ViewportState`] / [`TileWindow`]: clamped view state and the tiles it needs
//! - [`FailoverController`]: backup list and reconnection timer
//! - [`MapEvent`]: change notifications
//! - [`MapRenderer`]: drawing capability, with [`ImageCanvas`] as an in-memory backend

mod events;
mod failover;
mod map_view;
mod render;
mod viewport;

pub use events::{MapEvent, EVENT_CHANNEL_CAPACITY};
pub use failover::{FailoverController, DEFAULT_FAILOVER_INTERVAL};
pub use map_view::MapView;
pub use render::{ImageCanvas, MapRenderer};
pub use viewport::{TileWindow, ViewportState};
