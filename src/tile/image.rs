//! Decoded tile bitmaps.

use image::RgbaImage;

use crate::error::SourceError;

/// A decoded tile ready to be drawn.
///
/// Once inserted into the cache a `TileImage` is shared behind an `Arc` and
/// never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct TileImage {
    pixels: RgbaImage,
}

impl TileImage {
    /// Decode PNG or JPEG bytes into an RGBA bitmap.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Decode`] if the bytes are not a supported image
    /// or describe an image with no pixels.
    pub fn decode(data: &[u8]) -> Result<Self, SourceError> {
        let decoded = image::load_from_memory(data)
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(SourceError::Decode("image has no pixels".to_string()));
        }

        Ok(Self {
            pixels: decoded.to_rgba8(),
        })
    }

    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}
