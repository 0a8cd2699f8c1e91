//! # Crash reporting and logging bootstrap.
//!
//! Initialization binds the resolved identity into the crash reporter as
//! permanent context and installs the global tracing subscriber. The
//! supervisor reports exactly one class of failure here: a loop-fatal
//! error caught by the run wrapper.

use tracing_subscriber::EnvFilter;

use crate::error::ManagerError;

/// Permanent context bound to every crash report and log line after
/// initialization completes.
#[derive(Clone, Debug)]
pub struct CrashContext {
    /// Registered device identifier.
    pub device_id: String,
    /// Semantic version of the running build.
    pub version: String,
    /// Whether the working tree was dirty at start.
    pub dirty: bool,
    /// Device class (e.g. "tici", "pc").
    pub device_type: String,
}

/// Crash-telemetry collaborator.
pub trait CrashReporter: Send + Sync {
    /// Binds permanent context; called once, at the end of initialization.
    fn bind(&self, ctx: &CrashContext);

    /// Reports a loop-fatal error.
    fn capture(&self, err: &ManagerError);

    /// Removes any stale error marker left by a previous failed run.
    fn clear_stale_report(&self);
}

/// No-op [`CrashReporter`] for setups without telemetry plumbing.
pub struct NullCrashReporter;

impl CrashReporter for NullCrashReporter {
    fn bind(&self, _ctx: &CrashContext) {}
    fn capture(&self, _err: &ManagerError) {}
    fn clear_stale_report(&self) {}
}

/// Installs the global tracing subscriber (fmt output, `RUST_LOG` filter,
/// "info" when unset). Safe to call more than once; later calls are no-ops.
pub fn install_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
