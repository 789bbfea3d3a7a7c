//! Telemetry Link - Transport Layer
//!
//! This module provides the pieces the client's tasks are built from:
//!
//! - **Frame stream**: [`FrameReader`] reads length-prefixed frames with idle
//!   and per-frame deadlines; [`write_probe`] writes the outbound heartbeat
//! - **Connection state**: [`ConnectionState`] and the shared [`LinkState`]
//! - **Backoff**: [`Backoff`], the capped exponential reconnect delay
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Client                     │
//! │  supervisor, heartbeat, staleness       │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   frame stream, link state, backoff     │
//! ├─────────────────────────────────────────┤
//! │              Codec                      │
//! ├─────────────────────────────────────────┤
//! │              TCP                        │
//! └─────────────────────────────────────────┘
//! ```

mod backoff;
mod connection;
mod error;
mod stream;

pub use backoff::*;
pub use connection::*;
pub use error::*;
pub use stream::*;
