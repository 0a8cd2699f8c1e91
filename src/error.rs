//! Error types used by the supervisor runtime and its collaborators.
//!
//! This module defines three error enums, one per failure tier:
//!
//! - [`InitError`] — fatal-init failures: the control loop never starts.
//! - [`ProcessError`] — failures of a single managed process operation.
//! - [`ManagerError`] — errors surfaced by the supervisor runtime itself.
//!
//! All types provide `as_label` for logging/metrics, following the
//! convention that labels are short, stable, snake_case strings.
//!
//! ## Failure tiers
//! Recoverable initialization failures (clock sync, boot log, shared-memory
//! permissions) never become errors at all — they are logged at their
//! originating step and startup continues. Everything in [`InitError`]
//! aborts startup; everything escaping a loop iteration propagates as a
//! [`ManagerError`] to the run wrapper.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// # Fatal initialization failures.
///
/// Any of these aborts startup before the control loop runs. They are the
/// only failures shown on the terminal error surface.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum InitError {
    /// No operating mode could be resolved: the environment override is
    /// absent and no prior value is persisted. The supervisor must never
    /// run with unknown mode.
    #[error("operating mode is not set: no environment override and no persisted value")]
    ModeUnset,

    /// Device identity registration yielded no stable identifier.
    /// Carries the hardware serial number for diagnostics.
    #[error("device registration failed (serial: {serial})")]
    RegistrationFailed {
        /// Hardware serial read from the configuration store.
        serial: String,
    },

    /// The shared-memory mount point could not be created for a reason
    /// other than "already exists" or "permission denied".
    #[error("cannot create shared-memory dir {path:?}: {source}")]
    SharedMemory {
        /// The mount point that was being created.
        path: PathBuf,
        /// Underlying filesystem error.
        source: io::Error,
    },
}

impl InitError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use procvisor::InitError;
    ///
    /// let err = InitError::ModeUnset;
    /// assert_eq!(err.as_label(), "init_mode_unset");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            InitError::ModeUnset => "init_mode_unset",
            InitError::RegistrationFailed { .. } => "init_registration_failed",
            InitError::SharedMemory { .. } => "init_shared_memory",
        }
    }
}

/// # Errors produced by a single managed process operation.
///
/// The supervisor does not interpret these beyond logging; restart and
/// recovery decisions belong to the orchestration policy.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProcessError {
    /// One-time preparation (artifact staging, environment setup) failed.
    #[error("prepare failed: {reason}")]
    Prepare {
        /// Underlying failure message.
        reason: String,
    },

    /// The process could not be started.
    #[error("start failed: {reason}")]
    Start {
        /// Underlying failure message.
        reason: String,
    },

    /// The process could not be stopped (or did not confirm termination).
    #[error("stop failed: {reason}")]
    Stop {
        /// Underlying failure message.
        reason: String,
    },
}

impl ProcessError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::Prepare { .. } => "process_prepare_failed",
            ProcessError::Start { .. } => "process_start_failed",
            ProcessError::Stop { .. } => "process_stop_failed",
        }
    }
}

/// # Errors surfaced by the supervisor runtime.
///
/// These cover everything from construction problems (duplicate process
/// names, missing collaborators) to loop-fatal conditions (a process
/// operation failing, the state source closing, a termination signal).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ManagerError {
    /// Startup aborted before the loop could run.
    #[error("initialization failed: {0}")]
    Init(#[from] InitError),

    /// Two registered processes share a name; the registry requires
    /// unique, stable keys.
    #[error("duplicate process name: {name}")]
    DuplicateProcess {
        /// The offending name.
        name: String,
    },

    /// An operation on a named managed process failed.
    #[error("process {name}: {source}")]
    Process {
        /// Name of the process the operation targeted.
        name: String,
        /// The failing operation.
        #[source]
        source: ProcessError,
    },

    /// The state source can no longer deliver snapshots; the loop cannot
    /// continue without its only wake-up signal.
    #[error("state source unavailable: {reason}")]
    StateSource {
        /// Why the source stopped.
        reason: String,
    },

    /// An OS termination signal was translated into a controlled exit.
    #[error("terminated by signal")]
    Interrupted,

    /// The builder was asked to build without a required collaborator.
    #[error("missing collaborator: {what}")]
    MissingCollaborator {
        /// Which collaborator was absent.
        what: &'static str,
    },
}

impl ManagerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use procvisor::ManagerError;
    ///
    /// let err = ManagerError::Interrupted;
    /// assert_eq!(err.as_label(), "manager_interrupted");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ManagerError::Init(_) => "manager_init_failed",
            ManagerError::DuplicateProcess { .. } => "manager_duplicate_process",
            ManagerError::Process { .. } => "manager_process_failed",
            ManagerError::StateSource { .. } => "manager_state_source",
            ManagerError::Interrupted => "manager_interrupted",
            ManagerError::MissingCollaborator { .. } => "manager_missing_collaborator",
        }
    }

    /// True for the signal-derived controlled exit.
    ///
    /// The run wrapper treats an interrupt differently from a loop-fatal
    /// error: teardown still runs, but no system action is dispatched and
    /// the failure is not sent to crash telemetry.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, ManagerError::Interrupted)
    }
}
