//! # Hardware abstraction and build identity.
//!
//! [`Hardware`] collects the platform operations the supervisor needs:
//! best-effort clock sync and boot logging during initialization, device
//! identity reads, and the three terminal system actions dispatched after
//! teardown. [`BuildInfo`] carries the version identity persisted
//! unconditionally at every start.

use std::io;

use async_trait::async_trait;

/// Build/version identity of the running supervisor.
///
/// Persisted into the configuration store on every start, overwriting any
/// stale values from a previous run.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    /// Semantic version string.
    pub version: String,
    /// VCS commit hash.
    pub commit: String,
    /// VCS branch name.
    pub branch: String,
    /// VCS remote URL.
    pub remote: String,
    /// Whether this branch is part of the tested set.
    pub tested_branch: bool,
    /// True when the working tree has uncommitted modifications.
    pub dirty: bool,
}

/// # Platform operations behind one seam.
///
/// The terminal actions (`uninstall`, `reboot`, `shutdown`) do not return
/// control on real hardware; test doubles simply record the call.
#[async_trait]
pub trait Hardware: Send + Sync {
    /// Synchronizes the system clock from an external time source.
    /// Best-effort: failures are logged by the caller, never fatal.
    async fn sync_clock(&self) -> io::Result<()>;

    /// Persists a boot-log marker. Best-effort, like `sync_clock`.
    async fn write_boot_log(&self) -> io::Result<()>;

    /// Hardware serial number, for registration-failure diagnostics.
    fn serial(&self) -> String;

    /// Device class bound into logging context (e.g. "tici", "pc").
    fn device_type(&self) -> &str;

    /// True when running on a development PC rather than a device.
    fn is_pc(&self) -> bool;

    /// Removes the installation from the device. Terminal.
    async fn uninstall(&self);

    /// Reboots the device. Terminal.
    async fn reboot(&self);

    /// Powers the device off. Terminal.
    async fn shutdown(&self);
}
