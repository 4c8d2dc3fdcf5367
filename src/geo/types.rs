//! Value types shared by the projection layer.

use serde::{Deserialize, Serialize};

/// Southern latitude bound applied when a [`GeoPoint`] is written.
pub const MIN_LAT: f64 = -90.0;

/// Northern latitude bound applied when a [`GeoPoint`] is written.
pub const MAX_LAT: f64 = 90.0;

/// Western longitude bound applied when a [`GeoPoint`] is written.
pub const MIN_LON: f64 = -180.0;

/// Eastern longitude bound applied when a [`GeoPoint`] is written.
pub const MAX_LON: f64 = 180.0;

// =============================================================================
// Geographic coordinates
// =============================================================================

/// A geographic coordinate in degrees.
///
/// Latitude and longitude are clamped to their valid ranges whenever a
/// point is constructed, modified or deserialized, so a `GeoPoint` is
/// always in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawGeoPoint")]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    /// Create a point, clamping both components.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: clamp_latitude(latitude),
            longitude: clamp_longitude(longitude),
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Return a copy with a new (clamped) latitude.
    pub fn with_latitude(self, latitude: f64) -> Self {
        Self::new(latitude, self.longitude)
    }

    /// Return a copy with a new (clamped) longitude.
    pub fn with_longitude(self, longitude: f64) -> Self {
        Self::new(self.latitude, longitude)
    }
}

/// Wire form of [`GeoPoint`]; clamped on conversion.
#[derive(Deserialize)]
struct RawGeoPoint {
    latitude: f64,
    longitude: f64,
}

impl From<RawGeoPoint> for GeoPoint {
    fn from(raw: RawGeoPoint) -> Self {
        GeoPoint::new(raw.latitude, raw.longitude)
    }
}

impl Default for GeoPoint {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Clamp a latitude to `[-90, 90]`. NaN collapses to 0.
#[inline]
pub fn clamp_latitude(latitude: f64) -> f64 {
    if latitude.is_nan() {
        return 0.0;
    }
    latitude.clamp(MIN_LAT, MAX_LAT)
}

/// Clamp a longitude to `[-180, 180]`. NaN collapses to 0.
#[inline]
pub fn clamp_longitude(longitude: f64) -> f64 {
    if longitude.is_nan() {
        return 0.0;
    }
    longitude.clamp(MIN_LON, MAX_LON)
}

// =============================================================================
// Tile-space and screen-space points
// =============================================================================

/// A fractional position in tile space at some zoom level.
///
/// The integer part selects a grid cell, the fractional part is the
/// position inside that cell.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TilePoint {
    pub x: f64,
    pub y: f64,
}

impl TilePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A position on screen in pixels, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Viewport size in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// An axis-aligned rectangle in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle covering a whole viewport.
    pub fn from_size(size: PixelSize) -> Self {
        Self::new(0.0, 0.0, size.width as f64, size.height as f64)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// True when the two rectangles share a non-empty area.
    ///
    /// Rectangles that only touch along an edge do not intersect.
    pub fn intersects(&self, other: &ScreenRect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}
