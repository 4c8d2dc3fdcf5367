//! Viewport state and the tile window it requires.

use serde::Serialize;

use crate::geo::{geo_to_tile, tiles_per_axis, GeoPoint, PixelSize, Projector, MAX_SUPPORTED_ZOOM};
use crate::tile::TileAddress;

// =============================================================================
// Viewport State
// =============================================================================

/// Center, zoom and pixel size of the map, plus the zoom bounds.
///
/// Setters clamp their input and report whether the effective value changed,
/// so callers can skip redundant work when it did not.
///
/// `min_zoom <= zoom <= max_zoom <= MAX_SUPPORTED_ZOOM` holds after every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewportState {
    center: GeoPoint,
    zoom: u8,
    size: PixelSize,
    min_zoom: u8,
    max_zoom: u8,
}

impl ViewportState {
    pub fn new(center: GeoPoint, zoom: u8, size: PixelSize, min_zoom: u8, max_zoom: u8) -> Self {
        let max_zoom = max_zoom.min(MAX_SUPPORTED_ZOOM);
        let min_zoom = min_zoom.min(max_zoom);
        Self {
            center,
            zoom: zoom.clamp(min_zoom, max_zoom),
            size,
            min_zoom,
            max_zoom,
        }
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn size(&self) -> PixelSize {
        self.size
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    /// Set the zoom, clamped to `[min_zoom, max_zoom]`. Returns `true` if the
    /// zoom changed.
    pub fn set_zoom(&mut self, zoom: i32) -> bool {
        let clamped = zoom.clamp(self.min_zoom as i32, self.max_zoom as i32) as u8;
        if clamped == self.zoom {
            return false;
        }
        self.zoom = clamped;
        true
    }

    /// Returns `true` if the center changed.
    pub fn set_center(&mut self, center: GeoPoint) -> bool {
        if center == self.center {
            return false;
        }
        self.center = center;
        true
    }

    /// Returns `true` if the size changed.
    pub fn set_size(&mut self, size: PixelSize) -> bool {
        if size == self.size {
            return false;
        }
        self.size = size;
        true
    }

    /// Set the lower zoom bound.
    ///
    /// Raises `max_zoom` if needed to keep the bounds ordered, then re-clamps
    /// the current zoom. Returns `true` if the current zoom changed.
    pub fn set_min_zoom(&mut self, min_zoom: u8) -> bool {
        let min_zoom = min_zoom.min(MAX_SUPPORTED_ZOOM);
        self.min_zoom = min_zoom;
        if self.max_zoom < min_zoom {
            self.max_zoom = min_zoom;
        }
        self.set_zoom(self.zoom as i32)
    }

    /// Set the upper zoom bound.
    ///
    /// Lowers `min_zoom` if needed to keep the bounds ordered, then re-clamps
    /// the current zoom. Returns `true` if the current zoom changed.
    pub fn set_max_zoom(&mut self, max_zoom: u8) -> bool {
        let max_zoom = max_zoom.min(MAX_SUPPORTED_ZOOM);
        self.max_zoom = max_zoom;
        if self.min_zoom > max_zoom {
            self.min_zoom = max_zoom;
        }
        self.set_zoom(self.zoom as i32)
    }

    /// Projection handle for the current state.
    pub fn projector(&self, tile_size: u32) -> Projector {
        Projector::new(self.center, self.zoom, self.size, tile_size)
    }

    /// The tiles needed to cover the screen, plus one tile of halo per side.
    pub fn required_window(&self, tile_size: u32) -> TileWindow {
        TileWindow::covering(self.center, self.zoom, self.size, tile_size)
    }
}

// =============================================================================
// Tile Window
// =============================================================================

/// A rectangular block of grid cells, possibly extending past the grid edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileWindow {
    pub zoom: u8,
    pub x_start: i64,
    pub y_start: i64,
    pub columns: u32,
    pub rows: u32,
}

impl TileWindow {
    /// Window for a viewport centered on `center`.
    ///
    /// Per axis the screen needs `ceil(pixels / tile_size)` tiles; one extra
    /// tile on each side gives `ceil(pixels / tile_size) + 2`. An empty
    /// viewport needs no tiles.
    pub fn covering(center: GeoPoint, zoom: u8, size: PixelSize, tile_size: u32) -> Self {
        let empty = Self {
            zoom,
            x_start: 0,
            y_start: 0,
            columns: 0,
            rows: 0,
        };
        if size.is_empty() || tile_size == 0 {
            return empty;
        }

        let ts = tile_size as f64;
        let columns = (size.width as f64 / ts).ceil() as u32;
        let rows = (size.height as f64 / ts).ceil() as u32;

        // The south pole projects to y = +inf; keep the arithmetic finite.
        let n = tiles_per_axis(zoom) as f64;
        let bound = |v: f64, span: u32| v.clamp(-(span as f64) - 2.0, n + span as f64 + 2.0);

        let c = geo_to_tile(center.latitude(), center.longitude(), zoom);
        let cx = bound(c.x, columns);
        let cy = bound(c.y, rows);
        let x_start = (cx - columns as f64 / 2.0).floor() as i64 - 1;
        let y_start = (cy - rows as f64 / 2.0).floor() as i64 - 1;

        Self {
            zoom,
            x_start,
            y_start,
            columns: columns + 2,
            rows: rows + 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns == 0 || self.rows == 0
    }

    /// Whether the cell `(x, y)` lies in the window, ignoring grid validity.
    pub fn contains(&self, address: &TileAddress) -> bool {
        let x = address.x as i64;
        let y = address.y as i64;
        address.zoom == self.zoom
            && x >= self.x_start
            && x < self.x_start + self.columns as i64
            && y >= self.y_start
            && y < self.y_start + self.rows as i64
    }

    /// Valid grid addresses inside the window, row by row.
    pub fn addresses(&self) -> impl Iterator<Item = TileAddress> + '_ {
        let zoom = self.zoom;
        (self.y_start..self.y_start + self.rows as i64).flat_map(move |y| {
            (self.x_start..self.x_start + self.columns as i64).filter_map(move |x| {
                if x < 0 || y < 0 || x > u32::MAX as i64 || y > u32::MAX as i64 {
                    return None;
                }
                let address = TileAddress::new(x as u32, y as u32, zoom);
                address.is_valid().then_some(address)
            })
        })
    }
}
