//! # Aggregated health publication.
//!
//! Once per loop iteration the supervisor rebuilds a [`HealthSnapshot`]
//! from every registered process and hands it to the [`HealthSink`].
//! Publication happens every iteration whether or not anything changed —
//! external watchdogs use the stream as a liveness heartbeat.
//!
//! ## Rules
//! - Exactly one entry per registered process, in registry order.
//! - Snapshots are rebuilt fresh each iteration, never diffed or cached.
//! - `publish` must not block the control loop.

use crate::process::{ProcessReport, Registry};

/// Per-iteration aggregate status of all managed processes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthSnapshot {
    /// One status entry per registered process, in registry order.
    pub processes: Vec<ProcessReport>,
}

impl HealthSnapshot {
    /// Builds a fresh snapshot by querying every handle in the registry.
    pub fn collect(registry: &Registry) -> Self {
        Self {
            processes: registry.iter().map(|p| p.report()).collect(),
        }
    }

    /// Number of entries (equals the registry size).
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    /// True when the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

/// One-way channel accepting one snapshot per loop iteration.
///
/// Implementations wrap the pub/sub transport's publish side. The call is
/// fire-and-forget: delivery failures are the transport's concern.
pub trait HealthSink: Send + Sync {
    /// Publishes the snapshot to external consumers.
    fn publish(&self, snapshot: HealthSnapshot);
}
