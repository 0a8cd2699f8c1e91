//! # Device identity registration.
//!
//! Registration is the identity handshake with the backend: it yields the
//! stable device identifier every network-facing child inherits. The
//! mechanics (key generation, API calls, retry) live in the implementation;
//! the supervisor only needs the outcome.

use async_trait::async_trait;

/// Sentinel identifier persisted when a device runs without a completed
/// registration. Network-dependent processes are excluded while the stored
/// identity is absent or equals this value.
pub const UNREGISTERED_DEVICE_ID: &str = "UnregisteredDevice";

/// # Identity handshake collaborator.
///
/// ## Contract
/// - A successful call returns the stable device identifier and persists
///   it in the configuration store under `DongleId`.
/// - Implementations surface their own progress indication while the
///   handshake is in flight.
/// - `None` means no identifier could be obtained; the caller treats this
///   as fatal and attaches the hardware serial for diagnostics.
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Performs registration, returning the device identifier on success.
    async fn register(&self) -> Option<String>;
}
