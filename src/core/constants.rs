//! Protocol and client constants.
//!
//! Wire-level values are fixed by the telemetry source. Timing values are
//! defaults for [`ClientConfig`](crate::client::ClientConfig) and may be tuned.

use std::time::Duration;

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// TCP port the telemetry source listens on.
pub const DEFAULT_PORT: u16 = 7711;

/// Size of the big-endian length prefix in front of every frame.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest payload accepted as a normal frame.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Lengths above this are treated as irrecoverable stream corruption.
pub const HARD_FRAME_CEILING: usize = 1024 * 1024;

/// Outbound liveness probe. Written raw, without a length prefix.
pub const HEARTBEAT_PROBE: [u8; 4] = 0u32.to_be_bytes();

// =============================================================================
// TIMING
// =============================================================================

/// Idle read deadline while waiting for the next frame header.
pub const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(3);

/// Deadline for reading the remainder of a frame once its header started.
pub const FRAME_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for establishing a TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for writing one heartbeat probe.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Data older than this marks a live connection as stale.
pub const STALE_THRESHOLD: Duration = Duration::from_secs(4);

/// Data older than this on a dead connection clears the snapshot.
pub const DISCONNECT_CLEAR_THRESHOLD: Duration = Duration::from_secs(10);

/// Interval between outbound heartbeat probes.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Staleness monitor tick.
pub const MONITOR_TICK: Duration = Duration::from_secs(1);

/// Retry interval while no target address is available.
pub const ADDRESS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// First reconnect delay after a failure.
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(2000);

/// Upper bound for the reconnect delay.
pub const MAX_BACKOFF: Duration = Duration::from_millis(30000);

/// Bound on how long `stop()` waits for owned tasks to finish.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// =============================================================================
// FAILURE POLICY
// =============================================================================

/// Consecutive failed reconnects before the escalation callback fires.
pub const ESCALATION_THRESHOLD: u32 = 10;

/// Consecutive idle read timeouts tolerated while data is also stale.
pub const READ_TIMEOUT_TOLERANCE: u32 = 5;

/// Consecutive undecodable payloads tolerated before teardown.
pub const DECODE_ERROR_TOLERANCE: u32 = 10;
