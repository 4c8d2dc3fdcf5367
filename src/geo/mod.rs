//! Geographic, tile-space and screen-space coordinates.
//!
//! Three coordinate spaces are in play:
//!
//! ```text
//!  GeoPoint (lat, lon)  ──geo_to_tile──▶  TilePoint (x, y) @ zoom  ──tile_to_screen──▶  ScreenPoint (px)
//!                       ◀──tile_to_geo──                           ◀──screen_to_tile──
//! ```
//!
//! The tile space is the Web Mercator grid where one unit is one tile and
//! the grid has `2^zoom` tiles per axis. Screen space is relative to the
//! viewport: the viewport center lands in the middle of the screen.

mod map_point;
mod projection;
mod types;

pub use map_point::{MapPoint, MapSize};
pub use projection::{
    geo_to_tile, screen_to_tile, tile_to_geo, tile_to_screen, tiles_per_axis, Projector,
    MAX_SUPPORTED_ZOOM,
};
pub use types::{
    clamp_latitude, clamp_longitude, GeoPoint, PixelSize, ScreenPoint, ScreenRect, TilePoint,
    MAX_LAT, MAX_LON, MIN_LAT, MIN_LON,
};
