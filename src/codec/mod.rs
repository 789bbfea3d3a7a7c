//! Telemetry codec.
//!
//! Pure functions for the wire protocol: length-prefix framing
//! ([`parse_length`], [`encode_frame`]) and payload decoding into a
//! [`Snapshot`] ([`decode_payload`]). No I/O happens here.
//!
//! ```text
//! frame := length:uint32(big-endian) payload:byte[length]
//! length == 0             => transport heartbeat
//! length > max frame      => framing error, disconnect
//! otherwise               => JSON payload
//!   data == {}            => application heartbeat
//!   data != {}            => snapshot
//! ```

mod decode;
mod frame;
mod snapshot;

pub use decode::*;
pub use frame::*;
pub use snapshot::*;
