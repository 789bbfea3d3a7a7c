//! Connection state shared between the client's tasks.
//!
//! While the client runs, the supervisor is the only writer of the
//! snapshot, connection state and last-data time. The staleness monitor
//! owns the stale flag and may drop a snapshot that has aged out; it never
//! drops one newer than the data it judged.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;

use super::backoff::Backoff;
use crate::codec::Snapshot;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnectionState {
    /// No socket.
    #[default]
    Disconnected = 0,
    /// Connect attempt in progress.
    Connecting = 1,
    /// Socket open, read loop running.
    Connected = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }

    /// Check if a socket is open.
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

/// Monotonic counters for link activity.
#[derive(Debug, Default)]
pub struct LinkCounters {
    connects: AtomicU64,
    disconnects: AtomicU64,
    snapshots: AtomicU64,
    transport_heartbeats: AtomicU64,
    application_heartbeats: AtomicU64,
    decode_errors: AtomicU64,
    heartbeats_sent: AtomicU64,
}

impl LinkCounters {
    /// Record a successful connect.
    pub fn on_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session teardown.
    pub fn on_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a decoded snapshot.
    pub fn on_snapshot(&self) {
        self.snapshots.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a zero-length frame.
    pub fn on_transport_heartbeat(&self) {
        self.transport_heartbeats.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an empty-data payload.
    pub fn on_application_heartbeat(&self) {
        self.application_heartbeats.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an undecodable payload.
    pub fn on_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an outbound probe.
    pub fn on_heartbeat_sent(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    pub fn snapshot(&self) -> LinkStats {
        LinkStats {
            connects: self.connects.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            snapshots: self.snapshots.load(Ordering::Relaxed),
            transport_heartbeats: self.transport_heartbeats.load(Ordering::Relaxed),
            application_heartbeats: self.application_heartbeats.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`LinkCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Successful connects.
    pub connects: u64,
    /// Sessions torn down.
    pub disconnects: u64,
    /// Snapshots decoded.
    pub snapshots: u64,
    /// Zero-length frames received.
    pub transport_heartbeats: u64,
    /// Empty-data payloads received.
    pub application_heartbeats: u64,
    /// Payloads that failed to decode.
    pub decode_errors: u64,
    /// Outbound probes written.
    pub heartbeats_sent: u64,
}

/// Consumer-facing view of the link.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkStatus {
    /// Current connection state.
    pub state: ConnectionState,
    /// Connected but no fresh data.
    pub stale: bool,
    /// Time since the last liveness proof, if any was ever received.
    pub data_age: Option<Duration>,
    /// Address of the current or last connect attempt.
    pub target: Option<SocketAddr>,
    /// Failed reconnects in the current streak.
    pub reconnect_attempt: u32,
    /// Delay the next failed reconnect will wait.
    pub next_backoff: Duration,
    /// Reconnect exhaustion was signalled in this streak.
    pub escalated: bool,
    /// Activity counters.
    pub stats: LinkStats,
}

/// State shared by the read loop, heartbeat sender, staleness monitor
/// and the client handle.
#[derive(Debug, Default)]
pub struct LinkState {
    connection: AtomicU8,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    last_data: Mutex<Option<Instant>>,
    connected_at: Mutex<Option<Instant>>,
    target: Mutex<Option<SocketAddr>>,
    stale: AtomicBool,
    backoff_attempt: AtomicU32,
    backoff_delay_ms: AtomicU64,
    escalated: AtomicBool,
    counters: LinkCounters,
}

impl LinkState {
    /// Create shared state in the disconnected, no-data condition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.connection.load(Ordering::Acquire))
    }

    /// Set the connection state and return the previous one.
    ///
    /// Entering `Connected` records the connect time.
    pub fn set_connection_state(&self, state: ConnectionState) -> ConnectionState {
        if state == ConnectionState::Connected {
            *lock(&self.connected_at) = Some(Instant::now());
        }
        ConnectionState::from_u8(self.connection.swap(state as u8, Ordering::AcqRel))
    }

    /// When the current connection was established.
    pub fn connected_at(&self) -> Option<Instant> {
        *lock(&self.connected_at)
    }

    /// Latest snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the snapshot.
    pub fn publish_snapshot(&self, snapshot: Arc<Snapshot>) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    /// Drop the snapshot. Returns whether one was present.
    pub fn clear_snapshot(&self) -> bool {
        self.snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    /// Drop the snapshot if it was received at or before `cutoff`.
    ///
    /// A snapshot published after `cutoff` survives.
    pub fn clear_snapshot_received_by(&self, cutoff: std::time::Instant) -> bool {
        let mut slot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(snapshot) if snapshot.receive_time <= cutoff => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Record a liveness proof (data, transport or application heartbeat).
    pub fn mark_alive(&self, now: Instant) {
        let mut last = lock(&self.last_data);
        // Keep the timestamp non-decreasing.
        if last.is_none_or(|previous| now >= previous) {
            *last = Some(now);
        }
    }

    /// Time of the last liveness proof.
    pub fn last_data(&self) -> Option<Instant> {
        *lock(&self.last_data)
    }

    /// Forget the last liveness proof.
    pub fn clear_last_data(&self) {
        *lock(&self.last_data) = None;
    }

    /// Age of the freshest evidence the current connection is alive.
    ///
    /// Uses the connect time when no data arrived since connecting, so a
    /// fresh connection is not judged by the previous one's data.
    pub fn session_data_age(&self, now: Instant) -> Option<Duration> {
        let reference = match (self.last_data(), self.connected_at()) {
            (Some(data), Some(connected)) => Some(data.max(connected)),
            (data, connected) => data.or(connected),
        };
        reference.map(|t| now.saturating_duration_since(t))
    }

    /// Stale flag as last published by the staleness monitor.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Set the stale flag and return the previous value.
    pub fn set_stale(&self, stale: bool) -> bool {
        self.stale.swap(stale, Ordering::AcqRel)
    }

    /// Record the address of the current connect attempt.
    pub fn set_target(&self, target: Option<SocketAddr>) {
        *lock(&self.target) = target;
    }

    /// Address of the current or last connect attempt.
    pub fn target(&self) -> Option<SocketAddr> {
        *lock(&self.target)
    }

    /// Publish the supervisor's backoff state for readers.
    pub fn publish_backoff(&self, backoff: &Backoff) {
        self.backoff_attempt.store(backoff.attempt(), Ordering::Release);
        self.backoff_delay_ms
            .store(backoff.next_delay().as_millis() as u64, Ordering::Release);
        self.escalated.store(backoff.is_escalated(), Ordering::Release);
    }

    /// Activity counters.
    pub fn counters(&self) -> &LinkCounters {
        &self.counters
    }

    /// Build a consumer-facing status view.
    pub fn status(&self, now: Instant) -> LinkStatus {
        LinkStatus {
            state: self.connection_state(),
            stale: self.is_stale(),
            data_age: self.last_data().map(|t| now.saturating_duration_since(t)),
            target: self.target(),
            reconnect_attempt: self.backoff_attempt.load(Ordering::Acquire),
            next_backoff: Duration::from_millis(self.backoff_delay_ms.load(Ordering::Acquire)),
            escalated: self.escalated.load(Ordering::Acquire),
            stats: self.counters.snapshot(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
