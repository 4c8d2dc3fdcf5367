//! Tile-source failover.
//!
//! The controller is a small state machine; it never performs I/O itself.
//! The owner asks it for the next candidate on each timer tick, probes that
//! candidate, and reports back.
//!
//! ```text
//!              fetch / switch failure
//!   Healthy ─────────────────────────────▶ Degraded { cursor }
//!      ▲                                       │ every tick: probe
//!      │          any probe succeeds           │ [active, backups..][cursor]
//!      └───────────────────────────────────────┘ cursor += 1 (wraps)
//! ```

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::source::TileSourceConfig;

/// Default failover timer period.
pub const DEFAULT_FAILOVER_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailoverState {
    Healthy,
    Degraded {
        /// Index of the next candidate to probe
        cursor: usize,
        /// A probe started by a tick has not reported yet
        probe_in_flight: bool,
    },
}

/// Backup list plus the reconnection timer.
#[derive(Debug)]
pub struct FailoverController {
    backups: Vec<TileSourceConfig>,
    state: FailoverState,
    period: Duration,
    timer: Option<Interval>,
}

impl FailoverController {
    pub fn new(period: Duration) -> Self {
        Self {
            backups: Vec::new(),
            state: FailoverState::Healthy,
            period: period.max(Duration::from_millis(1)),
            timer: None,
        }
    }

    pub fn backups(&self) -> &[TileSourceConfig] {
        &self.backups
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Append a backup source.
    ///
    /// The active source, the invalid sentinel and duplicates are not added.
    /// Returns `true` if the list changed.
    pub fn add_backup(&mut self, config: TileSourceConfig, active: &TileSourceConfig) -> bool {
        if config.is_invalid() || &config == active || self.backups.contains(&config) {
            return false;
        }
        self.backups.push(config);
        true
    }

    pub fn clear_backups(&mut self) {
        self.backups.clear();
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.state, FailoverState::Degraded { .. })
    }

    /// Enter the degraded state and start the timer.
    ///
    /// Returns `true` on the transition, `false` if already degraded.
    pub fn degrade(&mut self) -> bool {
        if self.is_degraded() {
            return false;
        }
        self.state = FailoverState::Degraded {
            cursor: 0,
            probe_in_flight: false,
        };

        let mut timer = tokio::time::interval_at(Instant::now() + self.period, self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
        true
    }

    /// Wait for the next timer tick. Pends forever while healthy.
    pub async fn tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending().await,
        }
    }

    /// Pick the source to probe on this tick.
    ///
    /// Candidates are the active source followed by the backups; the cursor
    /// advances and wraps so every tick tries the next one. Returns `None`
    /// while healthy, while the previous probe is still running, or when
    /// there is nothing to probe.
    pub fn next_candidate(&mut self, active: &TileSourceConfig) -> Option<TileSourceConfig> {
        let FailoverState::Degraded {
            cursor,
            probe_in_flight,
        } = self.state
        else {
            return None;
        };
        if probe_in_flight {
            return None;
        }

        let candidates: Vec<&TileSourceConfig> = std::iter::once(active)
            .filter(|c| !c.is_invalid())
            .chain(self.backups.iter())
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let candidate = candidates[cursor % candidates.len()].clone();
        self.state = FailoverState::Degraded {
            cursor: (cursor + 1) % candidates.len(),
            probe_in_flight: true,
        };
        Some(candidate)
    }

    /// The probe handed out by [`next_candidate`](Self::next_candidate) has reported.
    pub fn probe_finished(&mut self) {
        if let FailoverState::Degraded { cursor, .. } = self.state {
            self.state = FailoverState::Degraded {
                cursor,
                probe_in_flight: false,
            };
        }
    }

    /// Return to healthy and stop the timer.
    pub fn recover(&mut self) {
        self.state = FailoverState::Healthy;
        self.timer = None;
    }

    /// Record a switch of the active source from `previous` to `next`.
    ///
    /// `next` leaves the backup list and `previous` is appended to it
    /// (unless it is the invalid sentinel or already listed). The controller
    /// returns to healthy.
    pub fn promote(&mut self, next: &TileSourceConfig, previous: &TileSourceConfig) {
        self.backups.retain(|b| b != next);
        if previous != next {
            self.add_backup(previous.clone(), next);
        }
        self.recover();
    }
}

impl Default for FailoverController {
    fn default() -> Self {
        Self::new(DEFAULT_FAILOVER_INTERVAL)
    }
}
