use thiserror::Error;

/// Errors produced while turning a tile address into a decoded tile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Timeout, non-success HTTP status or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// The tile does not exist at the source (missing file or asset)
    #[error("Tile not found: {0}")]
    NotFound(String),

    /// The source returned bytes that are not a decodable image
    #[error("Decode error: {0}")]
    Decode(String),

    /// Malformed source template or other unusable source settings
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The fetch was aborted because its epoch was invalidated
    #[error("Fetch cancelled")]
    Cancelled,
}

impl SourceError {
    /// Missing tiles are not failures; the tile is simply unavailable.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound(_))
    }

    /// Whether this error says something about the health of the source itself.
    pub fn degrades_source(&self) -> bool {
        matches!(self, SourceError::Network(_))
    }
}

/// Errors from parsing a textual tile key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileKeyError {
    /// The key is not of the form `z/x/y`
    #[error("Malformed tile key: {0:?}")]
    Malformed(String),

    /// The key parses but addresses a cell outside the zoom level's grid
    #[error("Tile {x},{y} is outside the grid at zoom {zoom}")]
    OutOfGrid { x: u32, y: u32, zoom: u8 },
}
