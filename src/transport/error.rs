//! Transport layer error types.

use std::io;

use thiserror::Error;

use crate::core::FrameError;

/// Transport layer errors.
///
/// None of these escape the client. Each ends the current session and
/// sends the supervisor back into its reconnect loop.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Frame length prefix was invalid; the stream is desynchronized.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// I/O error (socket operations).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Peer closed the connection.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Connect attempt did not complete in time.
    #[error("connect timeout")]
    ConnectTimeout,

    /// A frame started arriving but did not complete within its deadline.
    #[error("frame read deadline exceeded")]
    FrameTimeout,

    /// Outbound write did not complete in time.
    #[error("write timeout")]
    WriteTimeout,
}

impl LinkError {
    /// Check if this error means the byte stream can no longer be parsed.
    ///
    /// A partially read frame leaves the reader mid-message, so a frame
    /// deadline is as unrecoverable as a bad length.
    pub fn is_desync(&self) -> bool {
        matches!(self, LinkError::Frame(_) | LinkError::FrameTimeout)
    }
}

/// Result type for transport operations.
pub type LinkResult<T> = Result<T, LinkError>;
