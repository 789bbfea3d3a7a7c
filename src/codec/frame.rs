//! Length-prefixed framing.
//!
//! Wire format:
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ Payload (Length bytes)   │
//! │ Big-endian u32   │ UTF-8 JSON               │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! A zero length is a transport heartbeat and carries no payload.

use crate::core::FrameError;
use crate::core::constants::{HARD_FRAME_CEILING, LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE};

/// Size limits applied to announced frame lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Largest payload accepted.
    pub max_frame: usize,
    /// Lengths above this are reported as corruption rather than oversize.
    pub hard_ceiling: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_frame: MAX_FRAME_SIZE,
            hard_ceiling: HARD_FRAME_CEILING,
        }
    }
}

/// What a length prefix announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Zero-length frame proving the socket is alive.
    TransportHeartbeat,
    /// A payload of the given length follows.
    Payload(usize),
}

/// Interpret a raw length prefix.
///
/// The prefix is unsigned on the wire, but a value with the top bit set is
/// what a sender writing a negative signed length produces, so it is
/// rejected as invalid rather than as merely oversized.
pub fn parse_length(prefix: [u8; LENGTH_PREFIX_SIZE], limits: &FrameLimits) -> Result<FrameKind, FrameError> {
    let signed = i32::from_be_bytes(prefix);
    if signed < 0 {
        return Err(FrameError::InvalidLength(signed));
    }

    let len = signed as usize;
    if len == 0 {
        return Ok(FrameKind::TransportHeartbeat);
    }
    if len > limits.hard_ceiling {
        return Err(FrameError::Corrupt {
            len,
            ceiling: limits.hard_ceiling,
        });
    }
    if len > limits.max_frame {
        return Err(FrameError::Oversized {
            len,
            max: limits.max_frame,
        });
    }

    Ok(FrameKind::Payload(len))
}

/// Prefix a payload with its big-endian length.
///
/// Payloads above the hard ceiling are refused; no receiver would accept them.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > HARD_FRAME_CEILING {
        return Err(FrameError::Corrupt {
            len: payload.len(),
            ceiling: HARD_FRAME_CEILING,
        });
    }
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// A zero-length transport heartbeat frame.
pub fn transport_heartbeat_frame() -> [u8; LENGTH_PREFIX_SIZE] {
    0u32.to_be_bytes()
}
