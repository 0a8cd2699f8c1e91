//! # Subscription surface for device and car state.
//!
//! The control loop is driven entirely by the device-started topic: its
//! only suspension point is [`StateSource::wait_update`], which resolves
//! when a fresh started sample arrives. The car-configuration topic is
//! read alongside but never wakes the loop on its own.
//!
//! There is deliberately no timeout on the wait: the monitored topic has
//! its own guaranteed periodicity, so a stalled source stalls the loop.
//!
//! Each topic carries "has this ever been received" semantics — before the
//! first car-configuration message, [`StateSource::car_config`] returns the
//! default snapshot and [`StateSource::car_config_seen`] is `false`.

use async_trait::async_trait;

use crate::error::ManagerError;

/// Opaque car-configuration snapshot.
///
/// Decoding car parameters is out of scope here; the supervisor forwards
/// the raw snapshot to the orchestration policy untouched. `Default` is
/// the "never received" value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CarConfig {
    /// Encoded car-parameter blob as published on the transport.
    pub raw: Vec<u8>,
}

/// # Latest-value view over the subscribed topics.
///
/// Implementations wrap the pub/sub transport; the supervisor sees only
/// the freshest sample per topic.
#[async_trait]
pub trait StateSource: Send {
    /// Blocks until a fresh device-started sample is available.
    ///
    /// Updates to other topics must not resolve this future. Fails only
    /// when the transport can no longer deliver samples at all.
    async fn wait_update(&mut self) -> Result<(), ManagerError>;

    /// Latest device-started flag (default `false` before first receipt).
    fn started(&self) -> bool;

    /// Latest car-configuration snapshot, or default if never received.
    fn car_config(&self) -> CarConfig;

    /// True once at least one car-configuration message has arrived.
    fn car_config_seen(&self) -> bool;
}
