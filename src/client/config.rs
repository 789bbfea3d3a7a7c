//! Client configuration.

use std::time::Duration;

use crate::codec::FrameLimits;
use crate::core::ConfigError;
use crate::core::constants::*;

/// Client configuration.
///
/// Defaults are the recommended constants from [`crate::core::constants`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Deadline for establishing a TCP connection.
    pub connect_timeout: Duration,

    /// Idle read deadline while waiting for a frame to start.
    pub read_idle_timeout: Duration,

    /// Deadline for completing a frame once it started.
    pub frame_read_timeout: Duration,

    /// Deadline for writing one heartbeat probe.
    pub write_timeout: Duration,

    /// Interval between outbound heartbeat probes.
    pub heartbeat_interval: Duration,

    /// Data older than this marks a live connection as stale.
    pub stale_threshold: Duration,

    /// Data older than this on a dead connection clears the snapshot.
    pub disconnect_clear_threshold: Duration,

    /// Staleness monitor tick.
    pub monitor_tick: Duration,

    /// Retry interval while no address is available.
    pub address_poll_interval: Duration,

    /// First reconnect delay.
    pub initial_backoff: Duration,

    /// Reconnect delay cap.
    pub max_backoff: Duration,

    /// Consecutive failed reconnects before escalation.
    pub escalation_threshold: u32,

    /// Idle timeouts tolerated while data is stale past the clear threshold.
    pub read_timeout_tolerance: u32,

    /// Consecutive undecodable payloads tolerated.
    pub decode_error_tolerance: u32,

    /// Largest accepted payload.
    pub max_frame_size: usize,

    /// Lengths above this are treated as stream corruption.
    pub hard_frame_ceiling: usize,

    /// How long `stop()` waits for tasks before aborting them.
    pub shutdown_grace: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            read_idle_timeout: READ_IDLE_TIMEOUT,
            frame_read_timeout: FRAME_READ_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            stale_threshold: STALE_THRESHOLD,
            disconnect_clear_threshold: DISCONNECT_CLEAR_THRESHOLD,
            monitor_tick: MONITOR_TICK,
            address_poll_interval: ADDRESS_POLL_INTERVAL,
            initial_backoff: INITIAL_BACKOFF,
            max_backoff: MAX_BACKOFF,
            escalation_threshold: ESCALATION_THRESHOLD,
            read_timeout_tolerance: READ_TIMEOUT_TOLERANCE,
            decode_error_tolerance: DECODE_ERROR_TOLERANCE,
            max_frame_size: MAX_FRAME_SIZE,
            hard_frame_ceiling: HARD_FRAME_CEILING,
            shutdown_grace: SHUTDOWN_GRACE,
        }
    }
}

impl ClientConfig {
    /// Frame size limits for the reader.
    pub fn frame_limits(&self) -> FrameLimits {
        FrameLimits {
            max_frame: self.max_frame_size,
            hard_ceiling: self.hard_frame_ceiling,
        }
    }

    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("connect_timeout", self.connect_timeout),
            ("read_idle_timeout", self.read_idle_timeout),
            ("frame_read_timeout", self.frame_read_timeout),
            ("write_timeout", self.write_timeout),
            ("heartbeat_interval", self.heartbeat_interval),
            ("stale_threshold", self.stale_threshold),
            ("monitor_tick", self.monitor_tick),
            ("address_poll_interval", self.address_poll_interval),
            ("initial_backoff", self.initial_backoff),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::ZeroDuration(*name));
        }

        let counts = [
            ("escalation_threshold", self.escalation_threshold),
            ("read_timeout_tolerance", self.read_timeout_tolerance),
            ("decode_error_tolerance", self.decode_error_tolerance),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, c)| *c == 0) {
            return Err(ConfigError::ZeroCount(*name));
        }

        if self.stale_threshold >= self.disconnect_clear_threshold {
            return Err(ConfigError::ThresholdOrder);
        }
        if self.initial_backoff > self.max_backoff {
            return Err(ConfigError::BackoffOrder);
        }
        if self.max_frame_size == 0 || self.max_frame_size > self.hard_frame_ceiling {
            return Err(ConfigError::FrameLimitOrder {
                max: self.max_frame_size,
                ceiling: self.hard_frame_ceiling,
            });
        }

        Ok(())
    }
}

/// Builder for a validated [`ClientConfig`].
#[derive(Debug, Default)]
pub struct TelemetryClientBuilder {
    config: ClientConfig,
}

impl TelemetryClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the idle read timeout.
    pub fn read_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_idle_timeout = timeout;
        self
    }

    /// Set the per-frame read deadline.
    pub fn frame_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.frame_read_timeout = timeout;
        self
    }

    /// Set the heartbeat write timeout.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Set the outbound heartbeat interval.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Set the staleness threshold.
    pub fn stale_threshold(mut self, threshold: Duration) -> Self {
        self.config.stale_threshold = threshold;
        self
    }

    /// Set the disconnect-clear threshold.
    pub fn disconnect_clear_threshold(mut self, threshold: Duration) -> Self {
        self.config.disconnect_clear_threshold = threshold;
        self
    }

    /// Set the staleness monitor tick.
    pub fn monitor_tick(mut self, tick: Duration) -> Self {
        self.config.monitor_tick = tick;
        self
    }

    /// Set the retry interval used while no address is known.
    pub fn address_poll_interval(mut self, interval: Duration) -> Self {
        self.config.address_poll_interval = interval;
        self
    }

    /// Set the initial and maximum reconnect delay.
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set the number of failed reconnects before escalation.
    pub fn escalation_threshold(mut self, attempts: u32) -> Self {
        self.config.escalation_threshold = attempts;
        self
    }

    /// Set the idle timeout tolerance.
    pub fn read_timeout_tolerance(mut self, timeouts: u32) -> Self {
        self.config.read_timeout_tolerance = timeouts;
        self
    }

    /// Set the decode error tolerance.
    pub fn decode_error_tolerance(mut self, errors: u32) -> Self {
        self.config.decode_error_tolerance = errors;
        self
    }

    /// Set the maximum frame size and the hard corruption ceiling.
    pub fn frame_limits(mut self, max_frame: usize, hard_ceiling: usize) -> Self {
        self.config.max_frame_size = max_frame;
        self.config.hard_frame_ceiling = hard_ceiling;
        self
    }

    /// Set the shutdown grace period.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
