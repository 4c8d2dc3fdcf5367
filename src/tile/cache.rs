//! Store of decoded tiles for the current zoom and source.
//!
//! # Cache Key
//!
//! Tiles are keyed by their full [`TileAddress`], zoom included.
//!
//! # Invalidation
//!
//! There is no per-entry eviction. When the zoom level or the tile source
//! changes, every entry becomes structurally stale and the whole cache is
//! cleared at once. The working set is bounded by the required tile window
//! of the viewport, so it never grows past a few dozen tiles per zoom.

use std::collections::HashMap;
use std::sync::Arc;

use super::address::TileAddress;
use super::image::TileImage;

// =============================================================================
// Tile Cache
// =============================================================================

/// Mapping from tile address to decoded tile.
///
/// The cache is owned by the [`TileOrchestrator`](super::TileOrchestrator);
/// entries are only created by completed fetches. Images are handed out as
/// `Arc<TileImage>` so renderers can hold one for the duration of a draw
/// pass without copying pixels.
#[derive(Debug, Default)]
pub struct TileCache {
    entries: HashMap<TileAddress, Arc<TileImage>>,
}

impl TileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a tile from the cache.
    pub fn get(&self, address: &TileAddress) -> Option<Arc<TileImage>> {
        self.entries.get(address).cloned()
    }

    pub fn contains(&self, address: &TileAddress) -> bool {
        self.entries.contains_key(address)
    }

    /// Store a decoded tile.
    ///
    /// Returns `false` and leaves the existing entry in place if the address
    /// is already cached; entries are never replaced.
    pub fn insert(&mut self, address: TileAddress, image: TileImage) -> bool {
        if self.entries.contains_key(&address) {
            return false;
        }
        self.entries.insert(address, Arc::new(image));
        true
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all cached tiles in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&TileAddress, &Arc<TileImage>)> {
        self.entries.iter()
    }
}

// =============================================================================
// Tests
// =============================================================================
