//! Positions and sizes that may be expressed in either geographic or screen units.
//!
//! Overlay items store a [`MapPoint`] / [`MapSize`] and resolve it against a
//! [`Projector`] at the point of use.

use serde::{Deserialize, Serialize};

use super::projection::Projector;
use super::types::{GeoPoint, ScreenPoint};

/// A point on the map, anchored either to the ground or to the screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MapPoint {
    /// Follows the terrain as the map pans and zooms.
    Geo(GeoPoint),
    /// Fixed pixel position on the screen.
    Screen(ScreenPoint),
}

impl MapPoint {
    pub fn geo(latitude: f64, longitude: f64) -> Self {
        MapPoint::Geo(GeoPoint::new(latitude, longitude))
    }

    pub fn screen(x: f64, y: f64) -> Self {
        MapPoint::Screen(ScreenPoint::new(x, y))
    }

    /// Resolve to a screen position.
    pub fn to_screen(&self, projector: &Projector) -> ScreenPoint {
        match *self {
            MapPoint::Geo(point) => projector.geo_to_screen(point),
            MapPoint::Screen(point) => point,
        }
    }

    /// Resolve to a geographic position.
    pub fn to_geo(&self, projector: &Projector) -> GeoPoint {
        match *self {
            MapPoint::Geo(point) => point,
            MapPoint::Screen(point) => projector.screen_to_geo(point),
        }
    }
}

impl From<GeoPoint> for MapPoint {
    fn from(point: GeoPoint) -> Self {
        MapPoint::Geo(point)
    }
}

impl From<ScreenPoint> for MapPoint {
    fn from(point: ScreenPoint) -> Self {
        MapPoint::Screen(point)
    }
}

/// An extent on the map, in degrees or in pixels.
///
/// Converting between the two depends on where the extent is anchored,
/// because Mercator scale varies with latitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MapSize {
    /// Latitude / longitude span in degrees.
    Geo { latitude: f64, longitude: f64 },
    /// Width / height in pixels.
    Screen { width: f64, height: f64 },
}

impl MapSize {
    /// Pixel extent when anchored at `top_left`.
    pub fn to_screen(&self, projector: &Projector, top_left: &MapPoint) -> (f64, f64) {
        match *self {
            MapSize::Screen { width, height } => (width, height),
            MapSize::Geo {
                latitude,
                longitude,
            } => {
                let origin = top_left.to_geo(projector);
                let corner = GeoPoint::new(
                    origin.latitude() + latitude,
                    origin.longitude() + longitude,
                );

                let a = top_left.to_screen(projector);
                let b = projector.geo_to_screen(corner);
                (b.x - a.x, b.y - a.y)
            }
        }
    }

    /// Degree extent when anchored at `top_left`.
    pub fn to_geo(&self, projector: &Projector, top_left: &MapPoint) -> (f64, f64) {
        match *self {
            MapSize::Geo {
                latitude,
                longitude,
            } => (latitude, longitude),
            MapSize::Screen { width, height } => {
                let a = top_left.to_screen(projector);
                let corner = projector.screen_to_geo(ScreenPoint::new(a.x + width, a.y + height));
                let origin = top_left.to_geo(projector);
                (
                    corner.latitude() - origin.latitude(),
                    corner.longitude() - origin.longitude(),
                )
            }
        }
    }
}
