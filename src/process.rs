//! # Managed process abstraction and registry.
//!
//! A [`ManagedProcess`] is an independently running OS-level unit whose
//! lifecycle the supervisor controls through a narrow handle: `prepare`,
//! `start`, `stop`, plus liveness and status reads. The common handle type
//! is [`ProcessRef`], an `Arc<dyn ManagedProcess>` suitable for sharing
//! across the runtime.
//!
//! The [`Registry`] is the ordered, name-keyed collection of every process
//! the supervisor may run. Its order is fixed at construction and stable
//! for the supervisor's lifetime; health snapshots and teardown both walk
//! it in that order.
//!
//! ## Rules
//! - Liveness is derived from the OS handle on every call, never cached.
//! - `stop(block = false)` delivers the termination signal and returns;
//!   `stop(block = true)` waits for confirmed exit.
//! - Process names are unique; registry construction rejects duplicates.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ManagerError, ProcessError};

/// Point-in-time status of one managed process, as reported by its handle.
///
/// One of these per registered process makes up each health snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessReport {
    /// Stable process name.
    pub name: String,
    /// Whether the OS-level unit is currently alive.
    pub running: bool,
    /// OS process id, if running.
    pub pid: Option<u32>,
    /// Exit code of the last terminated instance, if any.
    pub exit_code: Option<i32>,
}

/// # One controllable OS-level unit.
///
/// Implementations own the concrete start/stop mechanics (fork/exec,
/// daemon handles, containers); the supervisor only sequences calls.
///
/// Implementations must tolerate redundant transitions: starting an alive
/// process and stopping a dead one are both no-ops, not errors.
#[async_trait]
pub trait ManagedProcess: Send + Sync {
    /// Returns the stable, unique process name.
    fn name(&self) -> &str;

    /// Performs one-time setup before the first start (artifact staging,
    /// cache warming). Called exactly once per run, before steady state.
    async fn prepare(&self) -> Result<(), ProcessError>;

    /// Brings the process up if it is not already running.
    async fn start(&self) -> Result<(), ProcessError>;

    /// Brings the process down.
    ///
    /// With `block = false` the termination signal is delivered and the
    /// call returns immediately; with `block = true` the call waits until
    /// the OS-level unit has confirmed exit.
    async fn stop(&self, block: bool) -> Result<(), ProcessError>;

    /// Reads liveness from the underlying OS handle.
    fn is_alive(&self) -> bool;

    /// Builds the current status entry for health publication.
    fn report(&self) -> ProcessReport;
}

/// Shared handle to a managed process.
pub type ProcessRef = Arc<dyn ManagedProcess>;

/// Ordered, name-keyed collection of every manageable process.
///
/// # Example
/// ```no_run
/// use procvisor::{ProcessRef, Registry};
///
/// # fn handles() -> Vec<ProcessRef> { Vec::new() }
/// let registry = Registry::new(handles()).expect("unique names");
/// for process in registry.iter() {
///     println!("{}", process.name());
/// }
/// ```
pub struct Registry {
    procs: Vec<ProcessRef>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("procs", &self.names()).finish()
    }
}

impl Registry {
    /// Builds a registry from handles, preserving their order.
    ///
    /// Fails with [`ManagerError::DuplicateProcess`] if two handles share
    /// a name.
    pub fn new(procs: Vec<ProcessRef>) -> Result<Self, ManagerError> {
        let mut seen = std::collections::HashSet::new();
        for p in &procs {
            if !seen.insert(p.name().to_string()) {
                return Err(ManagerError::DuplicateProcess {
                    name: p.name().to_string(),
                });
            }
        }
        Ok(Self { procs })
    }

    /// Looks up a process by name.
    pub fn get(&self, name: &str) -> Option<&ProcessRef> {
        self.procs.iter().find(|p| p.name() == name)
    }

    /// Iterates processes in registry order.
    pub fn iter(&self) -> std::slice::Iter<'_, ProcessRef> {
        self.procs.iter()
    }

    /// Returns process names in registry order.
    pub fn names(&self) -> Vec<&str> {
        self.procs.iter().map(|p| p.name()).collect()
    }

    /// Number of registered processes.
    pub fn len(&self) -> usize {
        self.procs.len()
    }

    /// True if no processes are registered.
    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }
}
