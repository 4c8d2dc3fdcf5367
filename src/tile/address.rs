//! Tile identity and grid rules.
//!
//! A [`TileAddress`] names one cell of the Web Mercator grid at a given zoom.
//! The zoom is part of the identity: `(3, 5)` at zoom 4 and `(3, 5)` at zoom 5
//! are different tiles and hash to different cache entries.
//!
//! # Textual key
//!
//! Addresses format as `z/x/y`, the same order tile servers use in their URL
//! paths, and parse back from that form:
//!
//! ```
//! use tileview::tile::TileAddress;
//!
//! let address: TileAddress = "17/79333/49304".parse().unwrap();
//! assert_eq!(address, TileAddress::new(79333, 49304, 17));
//! assert_eq!(address.to_string(), "17/79333/49304");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TileKeyError;
use crate::geo::{tiles_per_axis, TilePoint, MAX_SUPPORTED_ZOOM};

/// Grid address of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileAddress {
    /// Column, 0 at the antimeridian, growing east
    pub x: u32,

    /// Row, 0 at the northern edge, growing south
    pub y: u32,

    /// Zoom level; the grid has `2^zoom` tiles per axis
    pub zoom: u8,
}

impl TileAddress {
    pub const fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// The single tile covering the whole world at zoom 0.
    pub const fn root() -> Self {
        Self::new(0, 0, 0)
    }

    /// Address of the tile cell containing a tile-space position.
    ///
    /// Returns `None` when the position falls outside the grid.
    pub fn containing(point: TilePoint, zoom: u8) -> Option<Self> {
        if point.x < 0.0 || point.y < 0.0 || point.x.is_nan() || point.y.is_nan() {
            return None;
        }
        let address = Self::new(point.x.floor() as u32, point.y.floor() as u32, zoom);
        address.is_valid().then_some(address)
    }

    /// True when `0 <= x, y < 2^zoom`.
    pub fn is_valid(&self) -> bool {
        if self.zoom > MAX_SUPPORTED_ZOOM {
            return false;
        }
        let n = tiles_per_axis(self.zoom);
        self.x < n && self.y < n
    }

    /// Tile-space position of the tile's top-left corner.
    pub fn origin(&self) -> TilePoint {
        TilePoint::new(self.x as f64, self.y as f64)
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

impl FromStr for TileAddress {
    type Err = TileKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || TileKeyError::Malformed(s.to_string());

        let mut parts = s.trim().split('/');
        let zoom: u8 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(malformed)?;
        let x: u32 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(malformed)?;
        let y: u32 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(malformed)?;

        if parts.next().is_some() {
            return Err(malformed());
        }

        let address = TileAddress::new(x, y, zoom);
        if !address.is_valid() {
            return Err(TileKeyError::OutOfGrid { x, y, zoom });
        }
        Ok(address)
    }
}
