//! # Orchestration policy seam.
//!
//! The supervisor decides *when* to reconcile; the [`Orchestrator`]
//! decides *what* each process's desired run state is and performs the
//! start/stop transitions. Per-process crash handling, restart decisions,
//! and car-dependent enablement all live behind this trait.

use async_trait::async_trait;

use crate::core::ExclusionSet;
use crate::error::ManagerError;
use crate::process::Registry;
use crate::state::CarConfig;

/// Decision procedure transitioning every registered process toward its
/// desired run state.
///
/// ## Contract
/// - **Idempotent**: calling `converge` repeatedly with identical inputs
///   leaves every process's alive state unchanged after the first call and
///   never double-starts a process that is already alive.
/// - Processes named in `excluded` must not be running when the call
///   returns, regardless of `started`.
/// - Errors propagate to the run wrapper as loop-fatal; a single process
///   failing to start should be handled inside the policy, not raised.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Reconciles the registry against the desired run state.
    async fn converge(
        &self,
        registry: &Registry,
        started: bool,
        car: &CarConfig,
        excluded: &ExclusionSet,
    ) -> Result<(), ManagerError>;
}
