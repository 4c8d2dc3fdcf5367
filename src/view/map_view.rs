//! The map view: viewport driver, public surface and owner loop.
//!
//! # Owner loop
//!
//! `MapView` is driven by whichever task holds `&mut MapView`. Public setters
//! update state and start fetches immediately; fetch results, background
//! probes and failover ticks are applied by [`MapView::step`]:
//!
//! ```text
//!   set_zoom / set_center / set_size ───▶ ensure_tiles ──▶ spawned fetches
//!                                                              │
//!   step(): select! {                                          │
//!       fetch completion ◀─────────────────────────────────────┘
//!       probe result     ◀── spawned probes (set_tile_server(wait = false), failover)
//!       failover tick    ◀── Interval, only while degraded
//!   }
//! ```
//!
//! Hosts that already run an event loop call `step()` from it; headless
//! callers use [`MapView::run_until_idle`].

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::MapOptions;
use crate::error::SourceError;
use crate::geo::{GeoPoint, PixelSize, Projector, ScreenPoint, TilePoint};
use crate::source::{self, ProbeReport, SourceKind, SourceSettings, TileSource, TileSourceConfig};
use crate::tile::{
    visible_tiles, FetchCompletion, FetchOutcome, OrchestratorStats, TileOrchestrator,
    VisibleTile,
};

use super::events::{MapEvent, EVENT_CHANNEL_CAPACITY};
use super::failover::FailoverController;
use super::render::MapRenderer;
use super::viewport::{TileWindow, ViewportState};

/// Why a background probe was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbePurpose {
    /// `set_tile_server(.., wait = false)`, tagged with its request ticket
    Requested(u64),
    /// Failover timer tick
    Failover,
}

struct ProbeResult {
    generation: u64,
    purpose: ProbePurpose,
    config: TileSourceConfig,
    result: Result<(Arc<dyn TileSource>, ProbeReport), SourceError>,
}

// =============================================================================
// Map View
// =============================================================================

/// A pannable, zoomable raster map without a screen.
///
/// # Example
///
/// ```no_run
/// use tileview::{MapOptions, MapView, PixelSize, TileSourceConfig};
/// use tileview::source::presets;
///
/// # async fn demo() -> Result<(), tileview::SourceError> {
/// let mut map = MapView::new(MapOptions::default());
/// map.set_size(PixelSize::new(1024, 768));
/// map.set_tile_server(TileSourceConfig::parse(presets::OSM)?, true).await?;
///
/// map.run_until_idle(tokio::time::Instant::now() + std::time::Duration::from_secs(10)).await;
/// for tile in map.visible_tiles() {
///     println!("{} at {:?}", tile.address, tile.rect);
/// }
/// # Ok(())
/// # }
/// ```
pub struct MapView {
    viewport: ViewportState,
    tile_size: u32,

    active: TileSourceConfig,
    settings: SourceSettings,
    orchestrator: TileOrchestrator,
    failover: FailoverController,

    probes_tx: mpsc::UnboundedSender<ProbeResult>,
    probes_rx: mpsc::UnboundedReceiver<ProbeResult>,
    pending_probes: usize,
    /// Bumped whenever the active source is decided; older failover probes are ignored
    probe_generation: u64,
    /// Ticket of the last caller-requested switch
    request_ticket: u64,
    /// Ticket of the background switch still awaiting its probe
    pending_request: Option<u64>,

    events: broadcast::Sender<MapEvent>,

    zoom_locked: bool,
    geolocation_locked: bool,
    wheel_zoom_enabled: bool,
    drag_pan_enabled: bool,
}

impl MapView {
    /// Create a map with no tile source.
    ///
    /// Nothing is fetched until [`set_tile_server`](Self::set_tile_server)
    /// succeeds. Must be called within a Tokio runtime.
    pub fn new(options: MapOptions) -> Self {
        let (probes_tx, probes_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            viewport: ViewportState::new(
                options.center,
                options.zoom,
                options.viewport,
                options.min_zoom,
                options.max_zoom,
            ),
            tile_size: options.tile_size.max(1),
            active: TileSourceConfig::invalid(),
            settings: options.source_settings(),
            orchestrator: TileOrchestrator::new(),
            failover: FailoverController::new(options.failover_interval),
            probes_tx,
            probes_rx,
            pending_probes: 0,
            probe_generation: 0,
            request_ticket: 0,
            pending_request: None,
            events,
            zoom_locked: false,
            geolocation_locked: false,
            wheel_zoom_enabled: true,
            drag_pan_enabled: true,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<MapEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: MapEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // =========================================================================
    // Zoom
    // =========================================================================

    pub fn zoom_level(&self) -> u8 {
        self.viewport.zoom()
    }

    /// Set the zoom level, clamped to `[min_zoom, max_zoom]`.
    ///
    /// A changed zoom invalidates the cache and fetches the new window.
    /// Ignored while the zoom is locked; a no-op if the clamped value equals
    /// the current one.
    pub fn set_zoom_level(&mut self, zoom: i32) {
        if self.zoom_locked {
            debug!(zoom, "Zoom locked, ignoring");
            return;
        }
        if self.viewport.set_zoom(zoom) {
            self.on_zoom_changed();
        }
    }

    /// Change the zoom by `steps` levels (mouse wheel).
    pub fn zoom_by(&mut self, steps: i32) {
        if !self.wheel_zoom_enabled {
            return;
        }
        let target = self.zoom_level() as i32 + steps;
        self.set_zoom_level(target);
    }

    pub fn min_zoom(&self) -> u8 {
        self.viewport.min_zoom()
    }

    /// Set the lower zoom bound, raising the upper bound if needed.
    pub fn set_min_zoom(&mut self, min_zoom: u8) {
        if self.viewport.set_min_zoom(min_zoom) {
            self.on_zoom_changed();
        }
    }

    pub fn max_zoom(&self) -> u8 {
        self.viewport.max_zoom()
    }

    /// Set the upper zoom bound, lowering the lower bound if needed.
    pub fn set_max_zoom(&mut self, max_zoom: u8) {
        if self.viewport.set_max_zoom(max_zoom) {
            self.on_zoom_changed();
        }
    }

    fn on_zoom_changed(&mut self) {
        let zoom = self.viewport.zoom();
        debug!(zoom, "Zoom changed");
        self.orchestrator.invalidate_all();
        self.refresh_tiles();
        self.emit(MapEvent::ZoomChanged { zoom });
    }

    pub fn is_zoom_locked(&self) -> bool {
        self.zoom_locked
    }

    pub fn lock_zoom(&mut self) {
        self.zoom_locked = true;
    }

    pub fn unlock_zoom(&mut self) {
        self.zoom_locked = false;
    }

    pub fn is_wheel_zoom_enabled(&self) -> bool {
        self.wheel_zoom_enabled
    }

    pub fn set_wheel_zoom_enabled(&mut self, enabled: bool) {
        self.wheel_zoom_enabled = enabled;
    }

    // =========================================================================
    // Center
    // =========================================================================

    pub fn center(&self) -> GeoPoint {
        self.viewport.center()
    }

    pub fn latitude(&self) -> f64 {
        self.viewport.center().latitude()
    }

    pub fn longitude(&self) -> f64 {
        self.viewport.center().longitude()
    }

    /// Move the map center. Latitude and longitude are clamped.
    ///
    /// Fetches only the tiles that became uncovered; the cache is kept.
    /// Ignored while the geolocation is locked.
    pub fn set_center(&mut self, center: GeoPoint) {
        if self.geolocation_locked {
            debug!("Geolocation locked, ignoring");
            return;
        }
        if self.viewport.set_center(center) {
            self.refresh_tiles();
            self.emit(MapEvent::CenterChanged {
                center: self.viewport.center(),
            });
        }
    }

    pub fn set_latitude(&mut self, latitude: f64) {
        self.set_center(self.center().with_latitude(latitude));
    }

    pub fn set_longitude(&mut self, longitude: f64) {
        self.set_center(self.center().with_longitude(longitude));
    }

    /// Pan by a pointer drag of `(dx, dy)` pixels.
    ///
    /// The content follows the pointer: dragging right moves the center west.
    pub fn pan_by_pixels(&mut self, dx: f64, dy: f64) {
        if !self.drag_pan_enabled {
            return;
        }
        let projector = self.projector();
        let middle = ScreenPoint::new(
            projector.viewport().width as f64 / 2.0,
            projector.viewport().height as f64 / 2.0,
        );
        let target = projector.screen_to_geo(ScreenPoint::new(middle.x - dx, middle.y - dy));
        self.set_center(target);
    }

    pub fn is_geolocation_locked(&self) -> bool {
        self.geolocation_locked
    }

    pub fn lock_geolocation(&mut self) {
        self.geolocation_locked = true;
    }

    pub fn unlock_geolocation(&mut self) {
        self.geolocation_locked = false;
    }

    pub fn is_drag_pan_enabled(&self) -> bool {
        self.drag_pan_enabled
    }

    pub fn set_drag_pan_enabled(&mut self, enabled: bool) {
        self.drag_pan_enabled = enabled;
    }

    // =========================================================================
    // Size
    // =========================================================================

    pub fn size(&self) -> PixelSize {
        self.viewport.size()
    }

    /// Resize the viewport (host widget resize).
    pub fn set_size(&mut self, size: PixelSize) {
        if self.viewport.set_size(size) {
            debug!(width = size.width, height = size.height, "Viewport resized");
            self.refresh_tiles();
        }
    }

    /// Edge length of a tile in pixels, as learned from the last probe.
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    // =========================================================================
    // Tile sources
    // =========================================================================

    /// The active source, or the invalid sentinel.
    pub fn tile_server(&self) -> &TileSourceConfig {
        &self.active
    }

    /// Switch to a new tile source.
    ///
    /// The source is probed (tile `0/0/0`, bounded by the request timeout)
    /// before it is committed. With `wait`, the probe runs inline and its
    /// failure is returned; otherwise it runs in the background, this returns
    /// `Ok(())` at once and the outcome arrives as a
    /// [`MapEvent::TileServerChanged`] or [`MapEvent::TileServerRejected`]
    /// during [`step`](Self::step).
    ///
    /// On failure the previous source stays active and failover starts.
    /// Setting the already active source is a no-op. A later call supersedes
    /// a background switch that has not finished; the superseded one is
    /// reported as rejected. Failover switching sources in the meantime does
    /// not cancel a pending request.
    ///
    /// # Errors
    ///
    /// With `wait`, returns the probe error.
    pub async fn set_tile_server(
        &mut self,
        config: TileSourceConfig,
        wait: bool,
    ) -> Result<(), SourceError> {
        let ticket = self.next_request_ticket();
        if config == self.active {
            return Ok(());
        }
        self.probe_generation += 1;

        if !wait {
            self.pending_request = Some(ticket);
            self.spawn_probe(config, ProbePurpose::Requested(ticket));
            return Ok(());
        }

        match source::connect(&config, &self.settings).await {
            Ok((source, report)) => {
                self.activate(config, source, report);
                Ok(())
            }
            Err(e) => {
                self.reject(config, &e);
                Err(e)
            }
        }
    }

    /// Activate the first source that probes successfully; every other
    /// entry becomes a backup.
    ///
    /// # Errors
    ///
    /// Returns the last probe error if no source could be reached; the
    /// sources are still registered as backups and failover keeps trying.
    pub async fn set_tile_servers(
        &mut self,
        configs: Vec<TileSourceConfig>,
    ) -> Result<(), SourceError> {
        self.next_request_ticket();
        self.probe_generation += 1;
        let mut last_error =
            SourceError::InvalidConfiguration("no tile servers given".to_string());
        let mut chosen: Option<usize> = None;

        for (index, config) in configs.iter().enumerate() {
            if config.is_invalid() {
                continue;
            }
            if *config == self.active {
                chosen = Some(index);
                break;
            }
            match source::connect(config, &self.settings).await {
                Ok((source, report)) => {
                    self.activate(config.clone(), source, report);
                    chosen = Some(index);
                    break;
                }
                Err(e) => {
                    warn!(source = %config, error = %e, "Tile server unavailable");
                    last_error = e;
                }
            }
        }

        for (index, config) in configs.into_iter().enumerate() {
            if Some(index) != chosen {
                self.failover.add_backup(config, &self.active);
            }
        }

        if chosen.is_some() {
            Ok(())
        } else {
            self.enter_degraded();
            Err(last_error)
        }
    }

    pub fn backup_tile_servers(&self) -> &[TileSourceConfig] {
        self.failover.backups()
    }

    /// Append a backup source; the active source and duplicates are ignored.
    pub fn add_backup_tile_server(&mut self, config: TileSourceConfig) {
        if self.failover.add_backup(config, &self.active) {
            debug!(backups = self.failover.backups().len(), "Backup tile server added");
        }
    }

    pub fn clear_backup_tile_servers(&mut self) {
        self.failover.clear_backups();
    }

    /// True while the failover timer is running.
    pub fn is_failover_active(&self) -> bool {
        self.failover.is_degraded()
    }

    fn activate(&mut self, config: TileSourceConfig, source: Arc<dyn TileSource>, report: ProbeReport) {
        info!(
            source = %config,
            tile_size = report.tile_size,
            previous = %self.active,
            "Tile server changed"
        );

        let previous = std::mem::replace(&mut self.active, config.clone());
        self.failover.promote(&config, &previous);
        self.probe_generation += 1;

        self.tile_size = report.tile_size.max(1);
        self.orchestrator.replace_source(Some(source));
        self.refresh_tiles();

        self.emit(MapEvent::TileServerChanged {
            source: config,
            tile_size: self.tile_size,
        });
    }

    fn reject(&mut self, config: TileSourceConfig, error: &SourceError) {
        warn!(source = %config, error = %error, "Failed to set the tile server");
        self.emit(MapEvent::TileServerRejected {
            source: config,
            error: error.to_string(),
        });
        self.enter_degraded();
    }

    fn enter_degraded(&mut self) {
        if self.failover.degrade() {
            info!(
                source = %self.active,
                backups = self.failover.backups().len(),
                interval_ms = self.failover.period().as_millis() as u64,
                "Tile source degraded, starting failover"
            );
            self.emit(MapEvent::SourceDegraded {
                source: self.active.clone(),
            });
        }
    }

    /// Start a new caller request, superseding any pending background switch.
    fn next_request_ticket(&mut self) -> u64 {
        self.request_ticket += 1;
        self.pending_request = None;
        self.request_ticket
    }

    fn spawn_probe(&mut self, config: TileSourceConfig, purpose: ProbePurpose) {
        let generation = self.probe_generation;
        let settings = self.settings.clone();
        let tx = self.probes_tx.clone();
        self.pending_probes += 1;

        tokio::spawn(async move {
            let result = source::connect(&config, &settings).await;
            let _ = tx.send(ProbeResult {
                generation,
                purpose,
                config,
                result,
            });
        });
    }

    // =========================================================================
    // Owner loop
    // =========================================================================

    /// True while fetches or probes are outstanding or failover is running.
    pub fn is_busy(&self) -> bool {
        self.orchestrator.has_outstanding() || self.pending_probes > 0 || self.failover.is_degraded()
    }

    /// Wait for and apply one fetch completion, probe result or failover tick.
    ///
    /// Returns `false` without waiting when there is nothing to wait for.
    pub async fn step(&mut self) -> bool {
        let fetching = self.orchestrator.has_outstanding();
        let probing = self.pending_probes > 0;
        let degraded = self.failover.is_degraded();

        if !fetching && !probing && !degraded {
            return false;
        }

        tokio::select! {
            completion = self.orchestrator.next_completion(), if fetching => {
                self.on_fetch_completion(completion);
            }
            Some(probe) = self.probes_rx.recv(), if probing => {
                self.on_probe_result(probe);
            }
            _ = self.failover.tick(), if degraded => {
                self.on_failover_tick();
            }
            else => {}
        }
        true
    }

    /// Drive [`step`](Self::step) until no tile of the current epoch is in
    /// flight and no probe is pending, or until `deadline`.
    ///
    /// A running failover timer alone does not keep this busy. Returns `true`
    /// if it finished before the deadline.
    pub async fn run_until_idle(&mut self, deadline: Instant) -> bool {
        loop {
            // Apply results that are already queued before deciding.
            while let Some(completion) = self.orchestrator.try_next_completion() {
                self.on_fetch_completion(completion);
            }

            let settled = self.orchestrator.in_flight_len() == 0 && self.pending_probes == 0;
            if settled {
                return true;
            }

            match tokio::time::timeout_at(deadline, self.step()).await {
                Ok(true) => continue,
                Ok(false) => return true,
                Err(_) => {
                    debug!(
                        in_flight = self.orchestrator.in_flight_len(),
                        "Deadline reached before the map settled"
                    );
                    return false;
                }
            }
        }
    }

    fn on_fetch_completion(&mut self, completion: FetchCompletion) {
        let report = self.orchestrator.handle_completion(completion);

        if let FetchOutcome::Failed(error) = &report.outcome {
            if error.degrades_source() && self.active.kind() == SourceKind::Remote {
                self.enter_degraded();
            }
        }

        if report.batch_complete {
            self.emit(MapEvent::RedrawNeeded);
        }
    }

    fn on_probe_result(&mut self, probe: ProbeResult) {
        self.pending_probes = self.pending_probes.saturating_sub(1);

        let ProbeResult {
            generation,
            purpose,
            config,
            result,
        } = probe;

        if let ProbePurpose::Requested(ticket) = purpose {
            if self.pending_request != Some(ticket) {
                debug!(source = %config, "Tile server request superseded");
                self.emit(MapEvent::TileServerRejected {
                    source: config,
                    error: "superseded by a later request".to_string(),
                });
                return;
            }
            self.pending_request = None;
            match result {
                Ok((source, report)) => self.activate(config, source, report),
                Err(e) => self.reject(config, &e),
            }
            return;
        }

        self.failover.probe_finished();
        if generation != self.probe_generation {
            debug!(source = %config, "Ignoring outdated probe result");
            return;
        }

        match result {
            Ok(_) if config == self.active => {
                info!(source = %config, "Tile server reachable again");
                self.failover.recover();
                self.refresh_tiles();
            }
            Ok((source, report)) => {
                info!(source = %config, failed = %self.active, "Failing over to backup tile server");
                self.activate(config, source, report);
            }
            Err(e) => {
                debug!(source = %config, error = %e, "Failover probe failed");
            }
        }
    }

    fn on_failover_tick(&mut self) {
        match self.failover.next_candidate(&self.active) {
            Some(candidate) => {
                debug!(source = %candidate, "Failover probe");
                self.spawn_probe(candidate, ProbePurpose::Failover);
            }
            None if self.pending_probes == 0 => {
                warn!("No tile server to fail over to, stopping failover");
                self.failover.recover();
            }
            None => {}
        }
    }

    // =========================================================================
    // Tiles
    // =========================================================================

    /// The tiles the current viewport needs (screen plus halo).
    pub fn required_window(&self) -> TileWindow {
        self.viewport.required_window(self.tile_size)
    }

    fn refresh_tiles(&mut self) {
        let window = self.required_window();
        let report = self.orchestrator.ensure_tiles(window.addresses());
        if report.redraw_now && self.orchestrator.source().is_some() {
            self.emit(MapEvent::RedrawNeeded);
        }
    }

    /// Cached tiles intersecting the screen, with their screen rectangles.
    pub fn visible_tiles(&self) -> Vec<VisibleTile> {
        visible_tiles(self.orchestrator.cache(), &self.projector())
    }

    /// Feed the visible tiles to a renderer. Returns the number drawn.
    pub fn render(&self, renderer: &mut dyn MapRenderer) -> usize {
        let projector = self.projector();
        let tiles = visible_tiles(self.orchestrator.cache(), &projector);

        renderer.begin_frame(&projector);
        for tile in &tiles {
            renderer.draw_tile(tile.address, tile.rect, &tile.image);
        }
        renderer.end_frame();
        tiles.len()
    }

    pub fn stats(&self) -> OrchestratorStats {
        self.orchestrator.stats()
    }

    // =========================================================================
    // Coordinate conversions
    // =========================================================================

    /// Projection handle for overlay items and renderers.
    pub fn projector(&self) -> Projector {
        self.viewport.projector(self.tile_size)
    }

    pub fn geo_to_screen(&self, point: GeoPoint) -> ScreenPoint {
        self.projector().geo_to_screen(point)
    }

    pub fn screen_to_geo(&self, point: ScreenPoint) -> GeoPoint {
        self.projector().screen_to_geo(point)
    }

    pub fn geo_to_tile(&self, point: GeoPoint) -> TilePoint {
        self.projector().geo_to_tile(point)
    }

    pub fn tile_to_geo(&self, tile: TilePoint) -> GeoPoint {
        self.projector().tile_to_geo(tile)
    }

    pub fn tile_to_screen(&self, tile: TilePoint) -> ScreenPoint {
        self.projector().tile_to_screen(tile)
    }

    pub fn screen_to_tile(&self, point: ScreenPoint) -> TilePoint {
        self.projector().screen_to_tile(point)
    }
}

// =============================================================================
// Tests
// =============================================================================
