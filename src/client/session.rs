//! One connected session and the reason it ended.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

/// Why a session was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client was stopped.
    Stopped,
    /// The target address changed.
    Retargeted,
    /// Bad length prefix or a frame that stalled mid-read.
    FramingError,
    /// Peer closed or the socket failed.
    TransportError,
    /// Repeated idle timeouts with data older than the clear threshold.
    ReadStalled,
    /// Too many consecutive undecodable payloads.
    DecodeErrors,
    /// An outbound heartbeat could not be written.
    HeartbeatFailed,
}

impl SessionEnd {
    /// Whether the supervisor should reconnect without waiting.
    pub fn reconnect_immediately(self) -> bool {
        self == Self::Retargeted
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Stopped => "stopped",
            Self::Retargeted => "target changed",
            Self::FramingError => "framing error",
            Self::TransportError => "transport error",
            Self::ReadStalled => "read stalled",
            Self::DecodeErrors => "too many decode errors",
            Self::HeartbeatFailed => "heartbeat write failed",
        };
        f.write_str(reason)
    }
}

/// Shared handle for one connected session.
///
/// Whoever closes it first decides the end reason.
#[derive(Debug)]
pub(crate) struct Session {
    token: CancellationToken,
    end: Mutex<Option<SessionEnd>>,
}

impl Session {
    /// Create a session cancelled along with `parent`.
    pub(crate) fn new(parent: &CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            token: parent.child_token(),
            end: Mutex::new(None),
        })
    }

    /// Close the session. Only the first reason is kept.
    pub(crate) fn close(&self, reason: SessionEnd) {
        {
            let mut end = self.end.lock().unwrap_or_else(PoisonError::into_inner);
            if end.is_none() {
                *end = Some(reason);
            }
        }
        self.token.cancel();
    }

    /// Recorded end reason. A session cancelled through its parent ended
    /// because the client stopped.
    pub(crate) fn end_reason(&self) -> SessionEnd {
        self.end
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or(SessionEnd::Stopped)
    }

    /// Wait until the session is closed.
    pub(crate) async fn closed(&self) {
        self.token.cancelled().await
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}
