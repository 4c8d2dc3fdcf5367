//! Selection of cached tiles that intersect the screen.

use std::sync::Arc;

use crate::geo::{Projector, ScreenRect};

use super::address::TileAddress;
use super::cache::TileCache;
use super::image::TileImage;

/// A cached tile together with where it lands on screen.
#[derive(Debug, Clone)]
pub struct VisibleTile {
    pub address: TileAddress,
    pub rect: ScreenRect,
    pub image: Arc<TileImage>,
}

/// Screen rectangle covered by a tile under `projector`.
pub fn tile_rect(address: &TileAddress, projector: &Projector) -> ScreenRect {
    let origin = projector.tile_to_screen(address.origin());
    let size = projector.tile_size() as f64;
    ScreenRect::new(origin.x, origin.y, size, size)
}

/// Cached tiles whose screen rectangle intersects the viewport.
///
/// Read-only: never mutates the cache and never starts a fetch, so it is
/// safe to call on every redraw. Entries at other zoom levels are ignored.
/// Tiles are ordered top-to-bottom, then left-to-right.
pub fn visible_tiles(cache: &TileCache, projector: &Projector) -> Vec<VisibleTile> {
    let screen = ScreenRect::from_size(projector.viewport());

    let mut tiles: Vec<VisibleTile> = cache
        .iter()
        .filter(|(address, _)| address.zoom == projector.zoom())
        .filter_map(|(address, image)| {
            let rect = tile_rect(address, projector);
            rect.intersects(&screen).then(|| VisibleTile {
                address: *address,
                rect,
                image: Arc::clone(image),
            })
        })
        .collect();

    tiles.sort_by_key(|tile| (tile.address.y, tile.address.x));
    tiles
}
