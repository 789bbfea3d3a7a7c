//! Ready-made [`AddressProvider`] implementations.

use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::core::AddressProvider;

/// A fixed telemetry source address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticAddress(pub SocketAddr);

impl AddressProvider for StaticAddress {
    fn current_address(&self) -> Option<SocketAddr> {
        Some(self.0)
    }
}

/// An address slot updated by some discovery mechanism.
///
/// Clones share the same slot: keep one clone for the discovery side and
/// hand another to the client.
#[derive(Debug, Clone, Default)]
pub struct SharedAddress {
    inner: Arc<RwLock<Option<SocketAddr>>>,
}

impl SharedAddress {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot holding `addr`.
    pub fn with_address(addr: SocketAddr) -> Self {
        let shared = Self::new();
        shared.set(Some(addr));
        shared
    }

    /// Replace the address. `None` means the source is currently unknown.
    pub fn set(&self, addr: Option<SocketAddr>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = addr;
    }

    /// Current address.
    pub fn get(&self) -> Option<SocketAddr> {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AddressProvider for SharedAddress {
    fn current_address(&self) -> Option<SocketAddr> {
        self.get()
    }
}
