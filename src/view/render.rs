//! Rendering capability consumed by [`MapView::render`](super::MapView::render).
//!
//! The engine does not draw. A backend implements [`MapRenderer`] and
//! receives the visible tiles of each frame in draw order.

use image::{imageops, Rgba, RgbaImage};

use crate::geo::{PixelSize, Projector, ScreenRect};
use crate::tile::{TileAddress, TileImage};

/// Drawing backend.
pub trait MapRenderer {
    /// Called once before the tiles of a frame.
    fn begin_frame(&mut self, _projector: &Projector) {}

    /// Draw one tile into `rect`. The image is only borrowed for the call.
    fn draw_tile(&mut self, address: TileAddress, rect: ScreenRect, image: &TileImage);

    /// Called once after the last tile of a frame.
    fn end_frame(&mut self) {}
}

// =============================================================================
// Image Canvas
// =============================================================================

/// Renderer compositing tiles into an in-memory RGBA image.
///
/// Tiles are pasted at their integer screen offset; the background is filled
/// with `background` at the start of every frame.
#[derive(Debug, Clone)]
pub struct ImageCanvas {
    image: RgbaImage,
    background: Rgba<u8>,
    tiles_drawn: usize,
}

impl ImageCanvas {
    pub fn new(size: PixelSize) -> Self {
        Self::with_background(size, Rgba([0xE0, 0xE0, 0xE0, 0xFF]))
    }

    pub fn with_background(size: PixelSize, background: Rgba<u8>) -> Self {
        Self {
            image: RgbaImage::from_pixel(size.width, size.height, background),
            background,
            tiles_drawn: 0,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Tiles drawn in the last frame.
    pub fn tiles_drawn(&self) -> usize {
        self.tiles_drawn
    }
}

impl MapRenderer for ImageCanvas {
    fn begin_frame(&mut self, projector: &Projector) {
        let size = projector.viewport();
        if self.image.dimensions() != (size.width, size.height) {
            self.image = RgbaImage::new(size.width, size.height);
        }
        for pixel in self.image.pixels_mut() {
            *pixel = self.background;
        }
        self.tiles_drawn = 0;
    }

    fn draw_tile(&mut self, _address: TileAddress, rect: ScreenRect, image: &TileImage) {
        let pixels = if image.width() as f64 != rect.width || image.height() as f64 != rect.height
        {
            imageops::resize(
                image.pixels(),
                rect.width.round().max(1.0) as u32,
                rect.height.round().max(1.0) as u32,
                imageops::FilterType::Triangle,
            )
        } else {
            image.pixels().clone()
        };

        imageops::overlay(
            &mut self.image,
            &pixels,
            rect.x.round() as i64,
            rect.y.round() as i64,
        );
        self.tiles_drawn += 1;
    }
}
