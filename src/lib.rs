//! # Telemetry Link
//!
//! A resilient client for a length-prefixed JSON telemetry stream over TCP.
//!
//! A telemetry source (typically a vehicle computer on the local network)
//! streams snapshots of vehicle state. This crate keeps a connection to it
//! alive and hands every decoded snapshot to the consumer:
//!
//! - **Framing**: 4-byte big-endian length prefix, zero-length heartbeats
//! - **Liveness**: outbound heartbeats, idle and per-frame read deadlines
//! - **Recovery**: capped exponential reconnect backoff with escalation
//! - **Staleness**: edge-triggered stale and disconnect notifications
//!
//! ## Feature Flags
//!
//! - `transport` (default): async frame stream, link state, backoff
//! - `client` (default): [`client::TelemetryClient`] and its background tasks
//!
//! ## Modules
//!
//! - [`core`]: constants, error types and collaborator traits (always included)
//! - [`codec`]: framing and payload decoding, no I/O (always included)
//! - [`transport`]: transport layer (requires `transport` feature)
//! - [`client`]: client API (requires `client` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use telemetry_link::prelude::*;
//!
//! let frame = encode_frame(br#"{"sequence":1,"timestamp":0.0,"data":{"carState":{"vEgo":12.5}}}"#).unwrap();
//! let (prefix, payload) = frame.split_at(4);
//!
//! let limits = FrameLimits::default();
//! assert_eq!(
//!     parse_length(prefix.try_into().unwrap(), &limits).unwrap(),
//!     FrameKind::Payload(payload.len())
//! );
//!
//! match decode_payload(payload, std::time::Instant::now()) {
//!     DecodeOutcome::Data(snapshot) => {
//!         assert_eq!(snapshot.data.car_state.unwrap().v_ego, 12.5);
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Wire codec (always included)
pub mod codec;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Client API (feature-gated)
#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod client;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::codec::*;
    pub use crate::core::*;

    #[cfg(feature = "transport")]
    pub use crate::transport::{ConnectionState, LinkError, LinkStats, LinkStatus};

    #[cfg(feature = "client")]
    pub use crate::client::{
        ChannelObserver, ClientConfig, ClientError, ClientEvent, NoopObserver, SharedAddress,
        StaticAddress, TelemetryClient, TelemetryClientBuilder,
    };
}

// Re-export commonly used items at crate root
pub use crate::codec::{Snapshot, SnapshotData};
pub use crate::core::{AddressProvider, Observer, TelemetryError};

#[cfg(feature = "transport")]
pub use crate::transport::{ConnectionState, LinkStatus};

#[cfg(feature = "client")]
pub use crate::client::{ClientConfig, TelemetryClient};
