//! Configuration for the map engine and the `tileview` binary.
//!
//! [`MapOptions`] is the library-side configuration handed to
//! [`MapView::new`](crate::MapView::new). The command-line layer parses
//! arguments and environment variables with clap and converts them into
//! `MapOptions`.
//!
//! # Environment Variables
//!
//! Every CLI option can also be set through a `TILEVIEW_` variable:
//!
//! - `TILEVIEW_SERVER` - Tile server preset name or URL/path template
//! - `TILEVIEW_BACKUP_SERVERS` - Comma-separated backup servers
//! - `TILEVIEW_WIDTH` / `TILEVIEW_HEIGHT` - Viewport size in pixels (default: 1024x768)
//! - `TILEVIEW_LAT` / `TILEVIEW_LON` - Map center
//! - `TILEVIEW_ZOOM` - Zoom level (default: 17)
//! - `TILEVIEW_MIN_ZOOM` / `TILEVIEW_MAX_ZOOM` - Zoom bounds (default: 0..21)
//! - `TILEVIEW_TIMEOUT_MS` - Per-request timeout (default: 5000)
//! - `TILEVIEW_DEADLINE_MS` - How long `view` waits for tiles (default: 30000)
//! - `TILEVIEW_OUTPUT` - Write the rendered viewport to this PNG file
//! - `TILEVIEW_ASSETS` - Directory served to `bundled://` templates

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::geo::{GeoPoint, PixelSize, MAX_SUPPORTED_ZOOM};
use crate::source::{
    presets, AssetBundle, SourceSettings, TileSourceConfig, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_USER_AGENT,
};
use crate::view::DEFAULT_FAILOVER_INTERVAL;
use crate::SourceError;

// =============================================================================
// Default Values
// =============================================================================

/// Default map center latitude.
pub const DEFAULT_LATITUDE: f64 = 39.912341799204775;

/// Default map center longitude.
pub const DEFAULT_LONGITUDE: f64 = 32.851170267919244;

/// Default zoom level.
pub const DEFAULT_ZOOM: u8 = 17;

/// Default lower zoom bound.
pub const DEFAULT_MIN_ZOOM: u8 = 0;

/// Default upper zoom bound.
pub const DEFAULT_MAX_ZOOM: u8 = 21;

/// Tile edge assumed until a source has been probed.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default CLI viewport width.
pub const DEFAULT_WIDTH: u32 = 1024;

/// Default CLI viewport height.
pub const DEFAULT_HEIGHT: u32 = 768;

/// Default time the `view` command waits for the viewport to fill (ms).
pub const DEFAULT_DEADLINE_MS: u64 = 30_000;

// =============================================================================
// Map Options
// =============================================================================

/// Initial state and tuning of a [`MapView`](crate::MapView).
#[derive(Debug, Clone)]
pub struct MapOptions {
    pub center: GeoPoint,
    pub zoom: u8,
    pub min_zoom: u8,
    pub max_zoom: u8,

    /// Viewport size; a zero-sized viewport needs no tiles
    pub viewport: PixelSize,

    /// Tile edge used before the first probe reports the real one
    pub tile_size: u32,

    /// Bound on each tile fetch and on source probes
    pub request_timeout: Duration,

    /// Period of the failover timer
    pub failover_interval: Duration,

    pub user_agent: String,

    /// Assets served to `bundled://` sources
    pub bundle: Option<Arc<AssetBundle>>,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            center: GeoPoint::new(DEFAULT_LATITUDE, DEFAULT_LONGITUDE),
            zoom: DEFAULT_ZOOM,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            viewport: PixelSize::new(0, 0),
            tile_size: DEFAULT_TILE_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            failover_interval: DEFAULT_FAILOVER_INTERVAL,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            bundle: None,
        }
    }
}

impl MapOptions {
    /// Settings used for every source the map builds.
    pub fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            timeout: self.request_timeout,
            user_agent: self.user_agent.clone(),
            bundle: self.bundle.clone(),
        }
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// tileview - headless slippy-map tile engine.
///
/// Resolves the tiles covering a viewport, fetches them from a tile server
/// and optionally renders the result to a PNG file.
#[derive(Parser, Debug)]
#[command(name = "tileview")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fill a viewport with tiles and report (or render) what is visible
    View(ViewConfig),

    /// Probe a tile server and report its tile size
    Check(CheckConfig),
}

/// Options of the `view` command.
#[derive(Args, Debug, Clone)]
pub struct ViewConfig {
    // =========================================================================
    // Tile Servers
    // =========================================================================
    /// Tile server: a preset name (e.g. `osm`) or a template with {x}, {y}, {z}.
    #[arg(long, default_value = "osm", env = "TILEVIEW_SERVER")]
    pub server: String,

    /// Backup servers tried when the primary is unreachable.
    #[arg(long = "backup", env = "TILEVIEW_BACKUP_SERVERS", value_delimiter = ',')]
    pub backup_servers: Vec<String>,

    // =========================================================================
    // Viewport
    // =========================================================================
    #[arg(long, default_value_t = DEFAULT_WIDTH, env = "TILEVIEW_WIDTH")]
    pub width: u32,

    #[arg(long, default_value_t = DEFAULT_HEIGHT, env = "TILEVIEW_HEIGHT")]
    pub height: u32,

    #[arg(long, default_value_t = DEFAULT_LATITUDE, env = "TILEVIEW_LAT", allow_hyphen_values = true)]
    pub lat: f64,

    #[arg(long, default_value_t = DEFAULT_LONGITUDE, env = "TILEVIEW_LON", allow_hyphen_values = true)]
    pub lon: f64,

    #[arg(short, long, default_value_t = DEFAULT_ZOOM, env = "TILEVIEW_ZOOM")]
    pub zoom: u8,

    #[arg(long, default_value_t = DEFAULT_MIN_ZOOM, env = "TILEVIEW_MIN_ZOOM")]
    pub min_zoom: u8,

    #[arg(long, default_value_t = DEFAULT_MAX_ZOOM, env = "TILEVIEW_MAX_ZOOM")]
    pub max_zoom: u8,

    // =========================================================================
    // Timing
    // =========================================================================
    /// Per-request timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_millis() as u64, env = "TILEVIEW_TIMEOUT_MS")]
    pub timeout_ms: u64,

    /// How long to wait for the viewport to fill, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_DEADLINE_MS, env = "TILEVIEW_DEADLINE_MS")]
    pub deadline_ms: u64,

    /// Directory whose files are served to `bundled://` templates.
    #[arg(long, env = "TILEVIEW_ASSETS")]
    pub assets: Option<PathBuf>,

    // =========================================================================
    // Output
    // =========================================================================
    /// Write the rendered viewport to this PNG file.
    #[arg(short, long, env = "TILEVIEW_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Print the visible tiles as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl ViewConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err("viewport width and height must be greater than 0".to_string());
        }
        if self.min_zoom > self.max_zoom {
            return Err(format!(
                "min_zoom ({}) must not exceed max_zoom ({})",
                self.min_zoom, self.max_zoom
            ));
        }
        if self.max_zoom > MAX_SUPPORTED_ZOOM {
            return Err(format!("max_zoom must be at most {}", MAX_SUPPORTED_ZOOM));
        }
        if self.timeout_ms == 0 {
            return Err("timeout_ms must be greater than 0".to_string());
        }
        if self.deadline_ms == 0 {
            return Err("deadline_ms must be greater than 0".to_string());
        }

        self.servers().map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Primary server followed by the backups, resolved to configs.
    pub fn servers(&self) -> Result<Vec<TileSourceConfig>, SourceError> {
        std::iter::once(&self.server)
            .chain(self.backup_servers.iter())
            .map(|s| resolve_server(s))
            .collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

impl From<&ViewConfig> for MapOptions {
    fn from(config: &ViewConfig) -> Self {
        MapOptions {
            center: GeoPoint::new(config.lat, config.lon),
            zoom: config.zoom,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            viewport: PixelSize::new(config.width, config.height),
            request_timeout: config.timeout(),
            ..MapOptions::default()
        }
    }
}

/// Options of the `check` command.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Tile server: a preset name or a template with {x}, {y}, {z}.
    #[arg(long, default_value = "osm", env = "TILEVIEW_SERVER")]
    pub server: String,

    /// Probe timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_millis() as u64, env = "TILEVIEW_TIMEOUT_MS")]
    pub timeout_ms: u64,

    /// Print the result as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CheckConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_ms == 0 {
            return Err("timeout_ms must be greater than 0".to_string());
        }
        resolve_server(&self.server).map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Resolve a preset name (case-insensitive) or a raw template.
pub fn resolve_server(server: &str) -> Result<TileSourceConfig, SourceError> {
    let template = presets::lookup(server).unwrap_or(server);
    TileSourceConfig::parse(template)
}
