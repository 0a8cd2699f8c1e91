//! # Shutdown reasons and system-action dispatch.
//!
//! Operators request a system-level action by setting one of three boolean
//! flags in the configuration store. The control loop polls them once per
//! iteration in a fixed priority order; the first flag found true is
//! persisted as the exit reason and stops the loop.
//!
//! Several flags set simultaneously is accepted, not rejected: priority
//! order decides, matching observed operator behavior. The detection order
//! and the post-teardown dispatch order differ deliberately — see
//! [`ShutdownReason::PRIORITY`] and [`ShutdownReason::DISPATCH`].

use crate::params::ParamStore;

/// Configuration key receiving the exit reason before the loop stops.
pub const EXIT_REASON_KEY: &str = "LastManagerExitReason";

/// System-level action requested by an operator flag.
///
/// # Example
/// ```
/// use procvisor::{MemoryParams, ParamStore, ShutdownReason};
///
/// let params = MemoryParams::new();
/// assert_eq!(ShutdownReason::pending(&params), None);
///
/// params.put_bool("DoReboot", true);
/// assert_eq!(ShutdownReason::pending(&params), Some(ShutdownReason::Reboot));
///
/// // Uninstall outranks an already-set reboot in the loop's check.
/// params.put_bool("DoUninstall", true);
/// assert_eq!(ShutdownReason::pending(&params), Some(ShutdownReason::Uninstall));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Remove the installation from the device.
    Uninstall,
    /// Power the device off.
    Shutdown,
    /// Reboot the device.
    Reboot,
}

impl ShutdownReason {
    /// Loop detection order: the first flag found true wins and is
    /// persisted as the exit reason.
    pub const PRIORITY: [ShutdownReason; 3] = [
        ShutdownReason::Uninstall,
        ShutdownReason::Shutdown,
        ShutdownReason::Reboot,
    ];

    /// Post-teardown dispatch order. At most one action is taken.
    pub const DISPATCH: [ShutdownReason; 3] = [
        ShutdownReason::Uninstall,
        ShutdownReason::Reboot,
        ShutdownReason::Shutdown,
    ];

    /// The boolean configuration key carrying this request.
    pub fn param_key(self) -> &'static str {
        match self {
            ShutdownReason::Uninstall => "DoUninstall",
            ShutdownReason::Shutdown => "DoShutdown",
            ShutdownReason::Reboot => "DoReboot",
        }
    }

    /// Short stable label (snake_case) for logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            ShutdownReason::Uninstall => "uninstall",
            ShutdownReason::Shutdown => "shutdown",
            ShutdownReason::Reboot => "reboot",
        }
    }

    /// Returns the highest-priority reason whose flag is currently set.
    pub fn pending(params: &dyn ParamStore) -> Option<ShutdownReason> {
        Self::PRIORITY
            .iter()
            .copied()
            .find(|reason| params.get_bool(reason.param_key()))
    }
}
