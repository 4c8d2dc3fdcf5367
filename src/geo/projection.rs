//! Web Mercator projection between geographic, tile and screen space.
//!
//! All functions are pure and use `f64` throughout. Zoom levels above
//! [`MAX_SUPPORTED_ZOOM`] lose meaningful precision in tile coordinates and
//! are rejected by the callers that accept user input.

use std::f64::consts::PI;

use super::types::{GeoPoint, PixelSize, ScreenPoint, TilePoint};

/// Highest zoom level the engine accepts.
pub const MAX_SUPPORTED_ZOOM: u8 = 23;

/// Number of tiles along one axis of the grid at `zoom` (`2^zoom`).
#[inline]
pub fn tiles_per_axis(zoom: u8) -> u32 {
    1u32 << zoom.min(MAX_SUPPORTED_ZOOM)
}

/// Forward transform: geographic coordinates to fractional tile position.
#[inline]
pub fn geo_to_tile(latitude: f64, longitude: f64, zoom: u8) -> TilePoint {
    let n = tiles_per_axis(zoom) as f64;

    let x = (longitude + 180.0) / 360.0 * n;
    let y = (1.0 - (PI / 4.0 + latitude * PI / 360.0).tan().ln() / PI) / 2.0 * n;

    TilePoint::new(x, y)
}

/// Inverse of [`geo_to_tile`].
#[inline]
pub fn tile_to_geo(tile: TilePoint, zoom: u8) -> GeoPoint {
    let n = tiles_per_axis(zoom) as f64;

    let longitude = tile.x / n * 360.0 - 180.0;
    let latitude = (PI * (1.0 - 2.0 * tile.y / n)).sinh().atan().to_degrees();

    GeoPoint::new(latitude, longitude)
}

/// Screen position of a tile-space point.
///
/// The viewport center (`center_tile`) maps to the middle of the screen and
/// one tile unit spans `tile_size` pixels.
#[inline]
pub fn tile_to_screen(
    tile: TilePoint,
    center_tile: TilePoint,
    viewport: PixelSize,
    tile_size: u32,
) -> ScreenPoint {
    let ts = tile_size as f64;
    ScreenPoint::new(
        viewport.width as f64 / 2.0 + (tile.x - center_tile.x) * ts,
        viewport.height as f64 / 2.0 + (tile.y - center_tile.y) * ts,
    )
}

/// Inverse of [`tile_to_screen`].
#[inline]
pub fn screen_to_tile(
    screen: ScreenPoint,
    center_tile: TilePoint,
    viewport: PixelSize,
    tile_size: u32,
) -> TilePoint {
    let ts = tile_size.max(1) as f64;
    TilePoint::new(
        (screen.x - viewport.width as f64 / 2.0) / ts + center_tile.x,
        (screen.y - viewport.height as f64 / 2.0) / ts + center_tile.y,
    )
}

// =============================================================================
// Projector
// =============================================================================

/// A snapshot of everything needed to convert between the three spaces.
///
/// Overlay items and renderers receive a `Projector` explicitly instead of
/// looking up the map that owns them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projector {
    center: GeoPoint,
    center_tile: TilePoint,
    zoom: u8,
    viewport: PixelSize,
    tile_size: u32,
}

impl Projector {
    pub fn new(center: GeoPoint, zoom: u8, viewport: PixelSize, tile_size: u32) -> Self {
        Self {
            center,
            center_tile: geo_to_tile(center.latitude(), center.longitude(), zoom),
            zoom,
            viewport,
            tile_size,
        }
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    /// Tile-space position of the viewport center.
    pub fn center_tile(&self) -> TilePoint {
        self.center_tile
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn viewport(&self) -> PixelSize {
        self.viewport
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn geo_to_tile(&self, point: GeoPoint) -> TilePoint {
        geo_to_tile(point.latitude(), point.longitude(), self.zoom)
    }

    pub fn tile_to_geo(&self, tile: TilePoint) -> GeoPoint {
        tile_to_geo(tile, self.zoom)
    }

    pub fn tile_to_screen(&self, tile: TilePoint) -> ScreenPoint {
        tile_to_screen(tile, self.center_tile, self.viewport, self.tile_size)
    }

    pub fn screen_to_tile(&self, screen: ScreenPoint) -> TilePoint {
        screen_to_tile(screen, self.center_tile, self.viewport, self.tile_size)
    }

    pub fn geo_to_screen(&self, point: GeoPoint) -> ScreenPoint {
        self.tile_to_screen(self.geo_to_tile(point))
    }

    pub fn screen_to_geo(&self, screen: ScreenPoint) -> GeoPoint {
        self.tile_to_geo(self.screen_to_tile(screen))
    }
}
