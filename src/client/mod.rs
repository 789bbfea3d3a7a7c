//! Telemetry Link - Client Library
//!
//! High-level API for telemetry consumers: [`TelemetryClient`] plus the
//! background tasks it owns.
//!
//! ```text
//! TelemetryClient ── start() ──┬── Supervisor ── connect / backoff
//!                              │       └── session: read loop + HeartbeatSender
//!                              └── StalenessMonitor (fixed tick)
//! ```

mod address;
#[allow(clippy::module_inception)]
mod client;
mod config;
mod heartbeat;
mod monitor;
mod observer;
mod session;
mod supervisor;

pub use address::*;
pub use client::*;
pub use config::*;
pub use monitor::{Liveness, LivenessTracker, LivenessUpdate};
pub use observer::*;
pub use session::SessionEnd;
