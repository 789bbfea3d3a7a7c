//! Staleness monitor.
//!
//! Runs on a fixed tick, independent of the read loop, so a silent socket
//! is still noticed. The classification itself is a pure function of the
//! shared state and the current time; the task only publishes edges.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::Observer;
use crate::transport::{ConnectionState, LinkState};

/// How alive the link looks from the data it delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Not connected, data (if any) still within the clear threshold.
    Disconnected,
    /// Connected, nothing received since connecting.
    AwaitingData,
    /// Connected with recent data.
    Fresh,
    /// Connected, but the last data is older than the stale threshold.
    Stale,
    /// Not connected and the last data is older than the clear threshold.
    Cleared,
}

/// Edges produced by one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessUpdate {
    /// Classification at this tick.
    pub liveness: Liveness,
    /// New stale flag, when it flipped.
    pub stale_changed: Option<bool>,
    /// Data should be dropped and consumers told there is none.
    pub clear: bool,
}

/// Edge-triggered liveness classification.
#[derive(Debug, Clone)]
pub struct LivenessTracker {
    stale_threshold: Duration,
    clear_threshold: Duration,
    stale: bool,
    /// `last_data` value that was already cleared, so each epoch clears once.
    cleared_epoch: Option<Option<Instant>>,
}

impl LivenessTracker {
    /// Create a tracker. `stale_threshold` must be below `clear_threshold`.
    pub fn new(stale_threshold: Duration, clear_threshold: Duration) -> Self {
        Self {
            stale_threshold,
            clear_threshold,
            stale: false,
            cleared_epoch: None,
        }
    }

    /// Classify the link without recording anything.
    pub fn classify(
        &self,
        state: ConnectionState,
        last_data: Option<Instant>,
        connected_at: Option<Instant>,
        now: Instant,
    ) -> Liveness {
        if state.is_connected() {
            // Only data from this connection counts.
            let session_data = match (last_data, connected_at) {
                (Some(data), Some(connected)) if data < connected => None,
                (data, _) => data,
            };
            match session_data {
                None => Liveness::AwaitingData,
                Some(data) if now.saturating_duration_since(data) > self.stale_threshold => Liveness::Stale,
                Some(_) => Liveness::Fresh,
            }
        } else {
            match last_data {
                Some(data) if now.saturating_duration_since(data) > self.clear_threshold => Liveness::Cleared,
                _ => Liveness::Disconnected,
            }
        }
    }

    /// Classify the link and report which edges fired.
    pub fn evaluate(
        &mut self,
        state: ConnectionState,
        last_data: Option<Instant>,
        connected_at: Option<Instant>,
        now: Instant,
    ) -> LivenessUpdate {
        let liveness = self.classify(state, last_data, connected_at, now);

        let stale = liveness == Liveness::Stale;
        let stale_changed = (stale != self.stale).then_some(stale);
        self.stale = stale;

        let clear = liveness == Liveness::Cleared && self.cleared_epoch != Some(last_data);
        if clear {
            self.cleared_epoch = Some(last_data);
        }

        LivenessUpdate {
            liveness,
            stale_changed,
            clear,
        }
    }

    /// Stale flag after the last evaluation.
    pub fn is_stale(&self) -> bool {
        self.stale
    }
}

/// Background task publishing liveness edges.
pub(crate) struct StalenessMonitor {
    tracker: LivenessTracker,
    tick: Duration,
    state: Arc<LinkState>,
    observer: Arc<dyn Observer>,
    cancel: CancellationToken,
}

impl StalenessMonitor {
    pub(crate) fn new(
        tracker: LivenessTracker,
        tick: Duration,
        state: Arc<LinkState>,
        observer: Arc<dyn Observer>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            tracker,
            tick,
            state,
            observer,
            cancel,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut ticker = time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => self.check(Instant::now()),
            }
        }
        debug!("Staleness monitor stopped");
    }

    fn check(&mut self, now: Instant) {
        let last_data = self.state.last_data();
        let update = self.tracker.evaluate(
            self.state.connection_state(),
            last_data,
            self.state.connected_at(),
            now,
        );

        if let Some(stale) = update.stale_changed {
            self.state.set_stale(stale);
            if stale {
                info!(
                    age_ms = last_data.map(|t| now.saturating_duration_since(t).as_millis() as u64),
                    "Telemetry went stale"
                );
            } else {
                info!("Telemetry fresh again");
            }
            self.observer.on_stale_changed(stale);
        }

        if update.clear {
            let dropped = last_data
                .map(|t| self.state.clear_snapshot_received_by(t.into_std()))
                .unwrap_or(false);
            info!(dropped, "No telemetry within clear threshold, clearing data");
            self.observer.on_snapshot(None);
        }
    }
}
