//! Collaborator traits for the telemetry client.
//!
//! The client talks to the outside world through exactly two seams: an
//! [`Observer`] that receives snapshots and status edges, and an
//! [`AddressProvider`] that says where the telemetry source currently lives.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::codec::Snapshot;

/// Consumer of decoded snapshots and link status transitions.
///
/// Callbacks are invoked from the client's background tasks and must not
/// block. Snapshot callbacks arrive in decode order. Connection, stale and
/// exhaustion callbacks come from other tasks and may interleave with them;
/// treat each as an independent last-write-wins signal.
///
/// # Example
///
/// ```ignore
/// struct Dashboard;
///
/// impl Observer for Dashboard {
///     fn on_snapshot(&self, snapshot: Option<Arc<Snapshot>>) {
///         match snapshot {
///             Some(s) => render(&s),
///             None => render_placeholder(),
///         }
///     }
///
///     fn on_stale_changed(&self, stale: bool) {
///         set_stale_badge(stale);
///     }
/// }
/// ```
pub trait Observer: Send + Sync + 'static {
    /// A new snapshot was decoded, or `None` when data was cleared.
    fn on_snapshot(&self, snapshot: Option<Arc<Snapshot>>);

    /// The link went up (`true`) or down (`false`).
    fn on_connection_changed(&self, connected: bool) {
        let _ = connected;
    }

    /// The link entered (`true`) or left (`false`) the connected-but-stale state.
    fn on_stale_changed(&self, stale: bool) {
        let _ = stale;
    }

    /// Reconnect attempts crossed the escalation threshold.
    ///
    /// Fires at most once per failure streak. Retrying continues.
    fn on_reconnect_exhausted(&self) {}
}

/// Source of the telemetry endpoint address.
///
/// Polled by the connection supervisor before each connect attempt and
/// after every read event while connected.
pub trait AddressProvider: Send + Sync + 'static {
    /// Current address of the telemetry source, if known.
    fn current_address(&self) -> Option<SocketAddr>;
}

impl<F> AddressProvider for F
where
    F: Fn() -> Option<SocketAddr> + Send + Sync + 'static,
{
    fn current_address(&self) -> Option<SocketAddr> {
        self()
    }
}
