//! Error types for the telemetry link.

use thiserror::Error;

/// Errors raised while interpreting a frame's length prefix.
///
/// Every variant means the byte stream is desynchronized. The connection
/// must be torn down; there is no in-stream recovery.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Length prefix is negative when read as a signed 32-bit integer.
    #[error("invalid frame length: {0}")]
    InvalidLength(i32),

    /// Length exceeds the configured maximum frame size.
    #[error("frame too large: {len} bytes (max {max})")]
    Oversized {
        /// Announced payload length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Length exceeds the hard ceiling; the stream is corrupt.
    #[error("corrupt frame length: {len} bytes (ceiling {ceiling})")]
    Corrupt {
        /// Announced payload length.
        len: usize,
        /// Hard ceiling.
        ceiling: usize,
    },
}

/// Errors raised while decoding a frame payload.
///
/// These are never fatal on their own; the read loop counts them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not valid UTF-8.
    #[error("payload is not valid utf-8: {0}")]
    InvalidUtf8(String),

    /// Payload is not valid JSON or a field has the wrong type.
    #[error("malformed json: {0}")]
    Json(String),

    /// Envelope has no `data` member.
    #[error("missing data object")]
    MissingData,

    /// `data` is present but is not a JSON object.
    #[error("data is not an object")]
    DataNotObject,
}

/// Invalid client configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A duration that must be positive is zero.
    #[error("{0} must be non-zero")]
    ZeroDuration(&'static str),

    /// A tolerance or threshold that must be positive is zero.
    #[error("{0} must be at least 1")]
    ZeroCount(&'static str),

    /// Stale threshold must be strictly below the disconnect-clear threshold.
    #[error("stale threshold must be below the disconnect-clear threshold")]
    ThresholdOrder,

    /// Initial backoff exceeds the maximum backoff.
    #[error("initial backoff exceeds max backoff")]
    BackoffOrder,

    /// Maximum frame size exceeds the hard ceiling.
    #[error("max frame size {max} exceeds hard ceiling {ceiling}")]
    FrameLimitOrder {
        /// Configured maximum frame size.
        max: usize,
        /// Configured hard ceiling.
        ceiling: usize,
    },
}

/// Top-level telemetry link errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Framing error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Decode error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
