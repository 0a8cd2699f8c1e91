//! Runtime core: lifecycle sequencing and the control loop.
//!
//! This module contains the embedded implementation of the supervisor
//! runtime. The public API from this module is [`Supervisor`] (with its
//! builder) and [`ExclusionSet`].
//!
//! Internal modules:
//! - [`init`]: the strictly ordered initialization sequencer;
//! - [`exclusions`]: the run-constant process-eligibility policy;
//! - [`supervisor`]: control loop, teardown, and the run wrapper;
//! - [`shutdown`]: cross-platform termination-signal handling.

mod exclusions;
mod init;
mod shutdown;
mod supervisor;

pub use exclusions::ExclusionSet;
pub use supervisor::{Supervisor, SupervisorBuilder};
