//! Change notifications published by the map.

use serde::Serialize;

use crate::geo::GeoPoint;
use crate::source::TileSourceConfig;

/// Capacity of the broadcast channel; slow subscribers see `Lagged`.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something the host may want to react to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MapEvent {
    ZoomChanged { zoom: u8 },
    CenterChanged { center: GeoPoint },

    /// A new source is active and the cache was cleared
    TileServerChanged {
        source: TileSourceConfig,
        tile_size: u32,
    },

    /// A requested source failed its probe and was not activated
    TileServerRejected {
        source: TileSourceConfig,
        error: String,
    },

    /// The active source looks unreachable; failover started
    SourceDegraded { source: TileSourceConfig },

    /// The current batch of fetches finished, or needed no fetches
    RedrawNeeded,
}
