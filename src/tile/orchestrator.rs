//! Fetch orchestration for the tile cache.
//!
//! The orchestrator owns the [`TileCache`] and the in-flight set and is the
//! only thing that mutates either. Fetches run as spawned tasks; their
//! results come back over a channel and are applied by the owner.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        TileOrchestrator                          │
//! │                                                                  │
//! │  ensure_tiles(batch)                 handle_completion(c)        │
//! │   1. skip cached / in flight          1. drop if c.epoch stale   │
//! │   2. mark in flight (epoch)           2. leave in-flight set     │
//! │   3. spawn fetch task ──┐             3. insert into cache       │
//! │                         │             4. batch done → redraw     │
//! │                         ▼                        ▲               │
//! │              ┌─────────────────────┐             │               │
//! │              │ fetch + decode      │  mpsc       │               │
//! │              │ select! cancelled() ├─────────────┘               │
//! │              └─────────────────────┘                             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Epochs
//!
//! Every fetch is tagged with the epoch current when it started.
//! [`invalidate_all`](TileOrchestrator::invalidate_all) bumps the epoch and
//! cancels the epoch's token. Cancellation is advisory: a task that already
//! finished its I/O still reports, and the report is discarded by the epoch
//! check rather than relying on the task having stopped.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::SourceError;
use crate::source::TileSource;

use super::address::TileAddress;
use super::cache::TileCache;
use super::image::TileImage;

// =============================================================================
// Completion
// =============================================================================

/// Result of one fetch task, delivered back to the owner.
#[derive(Debug)]
pub struct FetchCompletion {
    pub address: TileAddress,
    pub epoch: u64,
    pub result: Result<TileImage, SourceError>,
}

/// What the owner did with a completion.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Decoded tile stored in the cache
    Inserted,
    /// The source has no such tile
    Unavailable,
    /// Fetch or decode failed; the tile stays absent until asked for again
    Failed(SourceError),
    /// Completion from an invalidated epoch; ignored
    Stale,
}

/// Report returned by [`TileOrchestrator::handle_completion`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub address: TileAddress,
    pub outcome: FetchOutcome,

    /// The last in-flight fetch of the current epoch has finished
    pub batch_complete: bool,
}

/// Report returned by [`TileOrchestrator::ensure_tiles`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnsureReport {
    /// Number of fetches started by this call
    pub started: usize,

    /// Nothing needed fetching, so the caller should redraw right away
    pub redraw_now: bool,
}

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OrchestratorStats {
    pub cached: usize,
    pub in_flight: usize,
    pub epoch: u64,
    pub fetches_started: u64,
}

// =============================================================================
// Tile Orchestrator
// =============================================================================

/// Owner of the tile cache and the in-flight set.
///
/// Must be driven from a single task: call [`ensure_tiles`](Self::ensure_tiles)
/// when the required window changes and feed every value of
/// [`next_completion`](Self::next_completion) to
/// [`handle_completion`](Self::handle_completion).
pub struct TileOrchestrator {
    cache: TileCache,

    /// In-flight addresses with the epoch their fetch belongs to
    in_flight: HashMap<TileAddress, u64>,

    epoch: u64,
    cancel: CancellationToken,
    source: Option<Arc<dyn TileSource>>,

    completions_tx: mpsc::UnboundedSender<FetchCompletion>,
    completions_rx: mpsc::UnboundedReceiver<FetchCompletion>,

    /// Spawned tasks whose completion has not been received yet, stale included
    outstanding: usize,

    fetches_started: u64,
}

impl TileOrchestrator {
    /// Create an orchestrator with no active source.
    pub fn new() -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            cache: TileCache::new(),
            in_flight: HashMap::new(),
            epoch: 0,
            cancel: CancellationToken::new(),
            source: None,
            completions_tx,
            completions_rx,
            outstanding: 0,
            fetches_started: 0,
        }
    }

    /// Create an orchestrator fetching from `source`.
    pub fn with_source(source: Arc<dyn TileSource>) -> Self {
        let mut orchestrator = Self::new();
        orchestrator.source = Some(source);
        orchestrator
    }

    pub fn source(&self) -> Option<&Arc<dyn TileSource>> {
        self.source.as_ref()
    }

    /// Switch to a different source (or none).
    ///
    /// Tiles from the old source must not be shown under the new one, so
    /// this always invalidates.
    pub fn replace_source(&mut self, source: Option<Arc<dyn TileSource>>) {
        self.source = source;
        self.invalidate_all();
    }

    /// Start fetches for every address that is neither cached nor in flight.
    ///
    /// This is the dedup point: at most one fetch per address is outstanding
    /// at any time. Invalid addresses are skipped. Without an active source
    /// nothing is started and no redraw is requested.
    pub fn ensure_tiles<I>(&mut self, addresses: I) -> EnsureReport
    where
        I: IntoIterator<Item = TileAddress>,
    {
        let Some(source) = self.source.clone() else {
            return EnsureReport::default();
        };

        let mut started = 0;
        for address in addresses {
            if !address.is_valid() {
                trace!(%address, "Skipping address outside the grid");
                continue;
            }
            if self.cache.contains(&address) || self.in_flight.contains_key(&address) {
                continue;
            }

            self.in_flight.insert(address, self.epoch);
            self.spawn_fetch(Arc::clone(&source), address);
            started += 1;
        }

        if started > 0 {
            debug!(
                started,
                in_flight = self.in_flight.len(),
                epoch = self.epoch,
                "Started tile fetches"
            );
        }

        EnsureReport {
            started,
            redraw_now: started == 0,
        }
    }

    fn spawn_fetch(&mut self, source: Arc<dyn TileSource>, address: TileAddress) {
        let epoch = self.epoch;
        let token = self.cancel.clone();
        let tx = self.completions_tx.clone();

        self.outstanding += 1;
        self.fetches_started += 1;

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => Err(SourceError::Cancelled),
                fetched = source.fetch(address) => {
                    fetched.and_then(|bytes| TileImage::decode(&bytes))
                }
            };

            // The receiver lives as long as the orchestrator; a send error
            // only means the whole map was dropped.
            let _ = tx.send(FetchCompletion {
                address,
                epoch,
                result,
            });
        });
    }

    /// True while spawned fetch tasks have not reported back yet.
    pub fn has_outstanding(&self) -> bool {
        self.outstanding > 0
    }

    /// Wait for the next fetch task to report.
    ///
    /// Pends forever when nothing is outstanding; guard calls with
    /// [`has_outstanding`](Self::has_outstanding) inside `select!`.
    pub async fn next_completion(&mut self) -> FetchCompletion {
        match self.completions_rx.recv().await {
            Some(completion) => completion,
            // Unreachable while self holds a sender.
            None => std::future::pending().await,
        }
    }

    /// Take an already-delivered completion without waiting.
    pub fn try_next_completion(&mut self) -> Option<FetchCompletion> {
        self.completions_rx.try_recv().ok()
    }

    /// Apply one completion to the cache and in-flight set.
    pub fn handle_completion(&mut self, completion: FetchCompletion) -> CompletionReport {
        let FetchCompletion {
            address,
            epoch,
            result,
        } = completion;

        self.outstanding = self.outstanding.saturating_sub(1);

        if epoch != self.epoch || self.in_flight.get(&address) != Some(&epoch) {
            trace!(%address, epoch, current = self.epoch, "Discarding stale completion");
            return CompletionReport {
                address,
                outcome: FetchOutcome::Stale,
                batch_complete: false,
            };
        }

        self.in_flight.remove(&address);

        let outcome = match result {
            Ok(image) => {
                debug!(%address, epoch, "Tile cached");
                self.cache.insert(address, image);
                FetchOutcome::Inserted
            }
            Err(e) if e.is_not_found() => {
                trace!(%address, "Tile not available at source");
                FetchOutcome::Unavailable
            }
            Err(e) => {
                warn!(%address, epoch, error = %e, "Tile fetch failed");
                FetchOutcome::Failed(e)
            }
        };

        CompletionReport {
            address,
            outcome,
            batch_complete: self.in_flight.is_empty(),
        }
    }

    /// Clear the cache and abort every in-flight fetch.
    ///
    /// Starts a new epoch; completions from earlier epochs are discarded when
    /// they arrive.
    pub fn invalidate_all(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();

        let dropped = self.in_flight.len();
        self.in_flight.clear();
        self.cache.clear();
        self.epoch += 1;

        debug!(epoch = self.epoch, aborted = dropped, "Tile cache invalidated");
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn is_in_flight(&self, address: &TileAddress) -> bool {
        self.in_flight.contains_key(address)
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            cached: self.cache.len(),
            in_flight: self.in_flight.len(),
            epoch: self.epoch,
            fetches_started: self.fetches_started,
        }
    }
}

impl Default for TileOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::TileSourceConfig;
    use async_trait::async_trait;
    use bytes::Bytes;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    fn make_png() -> Bytes {
        let img = RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        Bytes::from(buf.into_inner())
    }

    /// Source whose fetches block until the test releases permits.
    struct GatedSource {
        config: TileSourceConfig,
        gate: Arc<Semaphore>,
        requests: Arc<AtomicUsize>,
        per_address: Mutex<HashMap<TileAddress, usize>>,
        missing: Vec<TileAddress>,
        failing: Vec<TileAddress>,
    }

    impl GatedSource {
        fn new() -> Self {
            Self {
                config: TileSourceConfig::remote("http://mock/{z}/{x}/{y}.png").unwrap(),
                gate: Arc::new(Semaphore::new(0)),
                requests: Arc::new(AtomicUsize::new(0)),
                per_address: Mutex::new(HashMap::new()),
                missing: Vec::new(),
                failing: Vec::new(),
            }
        }

        fn open(self) -> Self {
            self.gate.add_permits(Semaphore::MAX_PERMITS);
            self
        }

        fn count_for(&self, address: &TileAddress) -> usize {
            *self.per_address.lock().unwrap().get(address).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl TileSource for GatedSource {
        async fn fetch(&self, address: TileAddress) -> Result<Bytes, SourceError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            *self.per_address.lock().unwrap().entry(address).or_insert(0) += 1;

            let permit = self.gate.acquire().await.unwrap();
            permit.forget();

            if self.missing.contains(&address) {
                return Err(SourceError::NotFound(address.to_string()));
            }
            if self.failing.contains(&address) {
                return Err(SourceError::Network("HTTP 503".to_string()));
            }
            Ok(make_png())
        }

        fn config(&self) -> &TileSourceConfig {
            &self.config
        }
    }

    fn batch(zoom: u8) -> Vec<TileAddress> {
        vec![
            TileAddress::new(0, 0, zoom),
            TileAddress::new(1, 0, zoom),
            TileAddress::new(0, 1, zoom),
        ]
    }

    async fn drain(orchestrator: &mut TileOrchestrator) -> Vec<CompletionReport> {
        let mut reports = Vec::new();
        while orchestrator.has_outstanding() {
            let completion = orchestrator.next_completion().await;
            reports.push(orchestrator.handle_completion(completion));
        }
        reports
    }

    #[tokio::test]
    async fn test_fetches_populate_cache() {
        let source = Arc::new(GatedSource::new().open());
        let mut orchestrator = TileOrchestrator::with_source(source.clone());

        let report = orchestrator.ensure_tiles(batch(2));
        assert_eq!(report.started, 3);
        assert!(!report.redraw_now);
        assert_eq!(orchestrator.in_flight_len(), 3);

        let reports = drain(&mut orchestrator).await;
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.outcome == FetchOutcome::Inserted));

        // Only the last completion of the batch asks for a redraw.
        assert_eq!(reports.iter().filter(|r| r.batch_complete).count(), 1);
        assert!(reports.last().unwrap().batch_complete);

        assert_eq!(orchestrator.cache().len(), 3);
        assert_eq!(orchestrator.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_at_most_one_fetch_per_address() {
        let source = Arc::new(GatedSource::new());
        let mut orchestrator = TileOrchestrator::with_source(source.clone());

        orchestrator.ensure_tiles(batch(2));
        let second = orchestrator.ensure_tiles(batch(2));
        assert_eq!(second.started, 0);

        source.gate.add_permits(Semaphore::MAX_PERMITS);
        drain(&mut orchestrator).await;

        let third = orchestrator.ensure_tiles(batch(2));
        assert_eq!(third.started, 0);
        assert!(third.redraw_now);

        for address in batch(2) {
            assert_eq!(source.count_for(&address), 1, "{}", address);
        }
    }

    #[tokio::test]
    async fn test_in_flight_and_cache_are_disjoint() {
        let source = Arc::new(GatedSource::new());
        let mut orchestrator = TileOrchestrator::with_source(source.clone());

        orchestrator.ensure_tiles(batch(3));
        source.gate.add_permits(1);

        let completion = orchestrator.next_completion().await;
        let report = orchestrator.handle_completion(completion);
        assert_eq!(report.outcome, FetchOutcome::Inserted);

        for address in batch(3) {
            let cached = orchestrator.cache().contains(&address);
            let in_flight = orchestrator.is_in_flight(&address);
            assert!(cached ^ in_flight, "{} cached={} in_flight={}", address, cached, in_flight);
        }
    }

    #[tokio::test]
    async fn test_stale_completion_is_discarded() {
        let source = Arc::new(GatedSource::new());
        let mut orchestrator = TileOrchestrator::with_source(source.clone());

        let address = TileAddress::new(0, 0, 1);
        orchestrator.ensure_tiles([address]);
        assert_eq!(orchestrator.epoch(), 0);

        // Simulate a completion that raced past cancellation.
        let raced = FetchCompletion {
            address,
            epoch: 0,
            result: TileImage::decode(&make_png()),
        };

        orchestrator.invalidate_all();
        assert_eq!(orchestrator.epoch(), 1);

        let report = orchestrator.handle_completion(raced);
        assert_eq!(report.outcome, FetchOutcome::Stale);
        assert!(!report.batch_complete);
        assert!(orchestrator.cache().is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_cancels_in_flight_fetches() {
        let source = Arc::new(GatedSource::new());
        let mut orchestrator = TileOrchestrator::with_source(source.clone());

        orchestrator.ensure_tiles(batch(2));
        orchestrator.invalidate_all();
        assert_eq!(orchestrator.in_flight_len(), 0);

        // The gate never opens; tasks finish only through cancellation.
        let reports = drain(&mut orchestrator).await;
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.outcome == FetchOutcome::Stale));
        assert!(orchestrator.cache().is_empty());
    }

    #[tokio::test]
    async fn test_refetch_after_invalidation_is_not_clobbered_by_stale_result() {
        let source = Arc::new(GatedSource::new());
        let mut orchestrator = TileOrchestrator::with_source(source.clone());

        let address = TileAddress::new(1, 1, 1);
        orchestrator.ensure_tiles([address]);
        orchestrator.invalidate_all();
        orchestrator.ensure_tiles([address]);
        assert!(orchestrator.is_in_flight(&address));

        source.gate.add_permits(Semaphore::MAX_PERMITS);
        let reports = drain(&mut orchestrator).await;

        let stale = reports.iter().filter(|r| r.outcome == FetchOutcome::Stale).count();
        let inserted = reports.iter().filter(|r| r.outcome == FetchOutcome::Inserted).count();
        assert_eq!((stale, inserted), (1, 1));
        assert!(orchestrator.cache().contains(&address));
    }

    #[tokio::test]
    async fn test_missing_and_failed_tiles_stay_absent() {
        let mut source = GatedSource::new().open();
        source.missing = vec![TileAddress::new(0, 0, 2)];
        source.failing = vec![TileAddress::new(1, 0, 2)];
        let source = Arc::new(source);
        let mut orchestrator = TileOrchestrator::with_source(source.clone());

        orchestrator.ensure_tiles(batch(2));
        let reports = drain(&mut orchestrator).await;

        let outcome_for = |address: TileAddress| {
            reports
                .iter()
                .find(|r| r.address == address)
                .map(|r| r.outcome.clone())
                .unwrap()
        };
        assert_eq!(outcome_for(TileAddress::new(0, 0, 2)), FetchOutcome::Unavailable);
        assert!(matches!(
            outcome_for(TileAddress::new(1, 0, 2)),
            FetchOutcome::Failed(SourceError::Network(_))
        ));
        assert_eq!(outcome_for(TileAddress::new(0, 1, 2)), FetchOutcome::Inserted);
        assert_eq!(orchestrator.cache().len(), 1);

        // Failed tiles are retried on the next pass that still needs them.
        let retry = orchestrator.ensure_tiles(batch(2));
        assert_eq!(retry.started, 2);
    }

    #[tokio::test]
    async fn test_decode_failure_reported() {
        struct GarbageSource(TileSourceConfig);

        #[async_trait]
        impl TileSource for GarbageSource {
            async fn fetch(&self, _address: TileAddress) -> Result<Bytes, SourceError> {
                Ok(Bytes::from_static(b"not an image"))
            }

            fn config(&self) -> &TileSourceConfig {
                &self.0
            }
        }

        let config = TileSourceConfig::local("/tiles/{z}/{x}/{y}.png").unwrap();
        let mut orchestrator = TileOrchestrator::with_source(Arc::new(GarbageSource(config)));

        orchestrator.ensure_tiles([TileAddress::root()]);
        let reports = drain(&mut orchestrator).await;
        assert!(matches!(
            reports[0].outcome,
            FetchOutcome::Failed(SourceError::Decode(_))
        ));
        assert!(orchestrator.cache().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_addresses_skipped() {
        let source = Arc::new(GatedSource::new());
        let mut orchestrator = TileOrchestrator::with_source(source.clone());

        let report = orchestrator.ensure_tiles([TileAddress::new(2, 0, 1), TileAddress::new(0, 5, 2)]);
        assert_eq!(report.started, 0);
        assert_eq!(source.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_source_starts_nothing() {
        let mut orchestrator = TileOrchestrator::new();
        let report = orchestrator.ensure_tiles(batch(2));
        assert_eq!(report, EnsureReport::default());
        assert!(!orchestrator.has_outstanding());
    }

    #[tokio::test]
    async fn test_replace_source_invalidates() {
        let first = Arc::new(GatedSource::new().open());
        let mut orchestrator = TileOrchestrator::with_source(first.clone());

        orchestrator.ensure_tiles(batch(2));
        drain(&mut orchestrator).await;
        assert_eq!(orchestrator.cache().len(), 3);

        let second = Arc::new(GatedSource::new().open());
        orchestrator.replace_source(Some(second.clone()));
        assert!(orchestrator.cache().is_empty());
        assert_eq!(orchestrator.epoch(), 1);

        orchestrator.ensure_tiles(batch(2));
        drain(&mut orchestrator).await;
        assert_eq!(second.requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stats() {
        let source = Arc::new(GatedSource::new().open());
        let mut orchestrator = TileOrchestrator::with_source(source);

        orchestrator.ensure_tiles(batch(2));
        let stats = orchestrator.stats();
        assert_eq!(stats.in_flight, 3);
        assert_eq!(stats.fetches_started, 3);

        drain(&mut orchestrator).await;
        let stats = orchestrator.stats();
        assert_eq!(stats.cached, 3);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.epoch, 0);
    }
}
