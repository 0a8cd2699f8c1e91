//! # Exclusion-set policy.
//!
//! Decides which process names are ineligible to run for the entire run.
//! Computed exactly once, before the loop's first iteration, and held
//! constant afterwards — conditions that change later (a registration
//! completing mid-run, say) do not re-admit a process until restart.
//!
//! Exclusion reasons are additive:
//! - no stable device identity → the network-dependent processes;
//! - "no hardware board" environment marker → the board process;
//! - the operator block-list → its entries verbatim.

use std::collections::BTreeSet;

use crate::config::Config;
use crate::params::ParamStore;
use crate::registration::UNREGISTERED_DEVICE_ID;

/// Process names forcibly prevented from running for the run's duration.
///
/// # Example
/// ```
/// use procvisor::ExclusionSet;
///
/// let mut excluded = ExclusionSet::new();
/// excluded.insert("uploader");
/// assert!(excluded.contains("uploader"));
/// assert!(!excluded.contains("ui"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    names: BTreeSet<String>,
}

impl ExclusionSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a name. Re-inserting is a no-op; there is no removal.
    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    /// True if `name` is excluded.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Excluded names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Number of excluded names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when nothing is excluded.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Computes the exclusion set from the stored identity, the environment
/// markers, and the operator block-list.
pub fn compute(params: &dyn ParamStore, cfg: &Config) -> ExclusionSet {
    let mut excluded = ExclusionSet::new();

    let registered = matches!(
        params.get("DongleId").as_deref(),
        Some(id) if id != UNREGISTERED_DEVICE_ID
    );
    if !registered {
        for name in &cfg.net_processes {
            excluded.insert(name.clone());
        }
    }

    if cfg.no_board {
        excluded.insert(cfg.board_process.clone());
    }

    for name in &cfg.block {
        excluded.insert(name.clone());
    }

    excluded
}
