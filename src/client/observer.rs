//! Ready-made [`Observer`] implementations.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::codec::Snapshot;
use crate::core::Observer;

/// One observer callback, as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// New snapshot, or `None` when data was cleared.
    Snapshot(Option<Arc<Snapshot>>),
    /// Link went up or down.
    ConnectionChanged(bool),
    /// Link entered or left the stale state.
    StaleChanged(bool),
    /// Reconnect attempts crossed the escalation threshold.
    ReconnectExhausted,
}

/// Observer that forwards every callback into a channel.
///
/// Useful for async consumers that want to `recv().await` events instead
/// of handling callbacks on the client's tasks.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiver for its events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: ClientEvent) {
        // Receiver gone means nobody is listening anymore.
        let _ = self.tx.send(event);
    }
}

impl Observer for ChannelObserver {
    fn on_snapshot(&self, snapshot: Option<Arc<Snapshot>>) {
        self.emit(ClientEvent::Snapshot(snapshot));
    }

    fn on_connection_changed(&self, connected: bool) {
        self.emit(ClientEvent::ConnectionChanged(connected));
    }

    fn on_stale_changed(&self, stale: bool) {
        self.emit(ClientEvent::StaleChanged(stale));
    }

    fn on_reconnect_exhausted(&self) {
        self.emit(ClientEvent::ReconnectExhausted);
    }
}

/// Observer that ignores everything.
///
/// For consumers that only poll [`TelemetryClient::snapshot`](super::TelemetryClient::snapshot).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn on_snapshot(&self, _snapshot: Option<Arc<Snapshot>>) {}
}
