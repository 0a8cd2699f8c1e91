//! # procvisor
//!
//! **Procvisor** is the root supervisor of an embedded control stack: once
//! per control cycle it decides which subordinate processes must be
//! running, brings them up or down through an injected orchestration
//! policy, republishes aggregated health, and guarantees an orderly
//! system-level action (reboot/shutdown/uninstall) when requested.
//!
//! The crate owns the *lifecycle*: initialization sequencing, the
//! eligibility (exclusion) policy, the steady-state control loop, and
//! teardown. Everything with its own substantial machinery — per-process
//! supervision mechanics, the persisted configuration store, the identity
//! handshake, the pub/sub transport, crash telemetry, the failure screen —
//! is an injected collaborator behind a trait.
//!
//! ## Architecture
//! ```text
//!  ┌────────────┐  ┌─────────────┐  ┌──────────────┐  ┌───────────────┐
//!  │ ParamStore │  │ StateSource │  │ Orchestrator │  │ HealthSink    │
//!  │ (persisted │  │ (started +  │  │ (per-process │  │ (aggregated   │
//!  │  k/v)      │  │  car state) │  │  run policy) │  │  heartbeat)   │
//!  └─────┬──────┘  └──────┬──────┘  └──────┬───────┘  └──────┬────────┘
//!        └────────────────┴───────┬────────┴─────────────────┘
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (lifecycle state machine)                             │
//! │  - init sequencer (11 ordered steps, fatal ⇒ error screen)        │
//! │  - preparation phase (concurrent, per-process isolation)          │
//! │  - exclusion set (fixed once per run)                             │
//! │  - control loop: STARTING ─► RUNNING ─► STOPPING                  │
//! │  - two-phase teardown (signal all, then wait all)                 │
//! │  - system-action dispatch (uninstall | reboot | shutdown)         │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!  ┌───────────┐      ┌───────────┐      ┌───────────┐
//!  │ Managed   │      │ Managed   │      │ Managed   │     (independent
//!  │ Process   │      │ Process   │      │ Process   │      OS units)
//!  └───────────┘      └───────────┘      └───────────┘
//! ```
//!
//! ## Loop contract
//! A single control task drives the loop. Its only suspension point is
//! [`StateSource::wait_update`], which resolves on a fresh device-started
//! sample; each iteration then reconciles the registry through the
//! idempotent [`Orchestrator`], publishes one [`HealthSnapshot`] (every
//! iteration, changed or not), and polls the three shutdown flags in
//! priority order. A termination signal is converted into one cooperative
//! cancellation between iterations; teardown runs on every exit path.
//!
//! ## Example
//! ```no_run
//! use std::io;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use async_trait::async_trait;
//! use procvisor::{
//!     BuildInfo, CarConfig, Config, ExclusionSet, Hardware, HealthSink, HealthSnapshot,
//!     ManagedProcess, ManagerError, MemoryParams, Orchestrator, ParamStore, ProcessError,
//!     ProcessRef, ProcessReport, Registrar, Registry, StateSource, Supervisor,
//! };
//!
//! struct Proc(&'static str, AtomicBool);
//!
//! #[async_trait]
//! impl ManagedProcess for Proc {
//!     fn name(&self) -> &str { self.0 }
//!     async fn prepare(&self) -> Result<(), ProcessError> { Ok(()) }
//!     async fn start(&self) -> Result<(), ProcessError> {
//!         self.1.store(true, Ordering::SeqCst);
//!         Ok(())
//!     }
//!     async fn stop(&self, _block: bool) -> Result<(), ProcessError> {
//!         self.1.store(false, Ordering::SeqCst);
//!         Ok(())
//!     }
//!     fn is_alive(&self) -> bool { self.1.load(Ordering::SeqCst) }
//!     fn report(&self) -> ProcessReport {
//!         ProcessReport {
//!             name: self.0.to_string(),
//!             running: self.is_alive(),
//!             pid: None,
//!             exit_code: None,
//!         }
//!     }
//! }
//!
//! /// Wakes the loop every 100ms with started=true.
//! struct Ticker;
//!
//! #[async_trait]
//! impl StateSource for Ticker {
//!     async fn wait_update(&mut self) -> Result<(), ManagerError> {
//!         tokio::time::sleep(Duration::from_millis(100)).await;
//!         Ok(())
//!     }
//!     fn started(&self) -> bool { true }
//!     fn car_config(&self) -> CarConfig { CarConfig::default() }
//!     fn car_config_seen(&self) -> bool { false }
//! }
//!
//! struct EnsureRunning;
//!
//! #[async_trait]
//! impl Orchestrator for EnsureRunning {
//!     async fn converge(
//!         &self,
//!         registry: &Registry,
//!         started: bool,
//!         _car: &CarConfig,
//!         excluded: &ExclusionSet,
//!     ) -> Result<(), ManagerError> {
//!         for p in registry.iter() {
//!             let want = started && !excluded.contains(p.name());
//!             if want && !p.is_alive() {
//!                 p.start().await.map_err(|source| ManagerError::Process {
//!                     name: p.name().to_string(),
//!                     source,
//!                 })?;
//!             } else if !want && p.is_alive() {
//!                 p.stop(false).await.map_err(|source| ManagerError::Process {
//!                     name: p.name().to_string(),
//!                     source,
//!                 })?;
//!             }
//!         }
//!         Ok(())
//!     }
//! }
//!
//! struct StdoutHealth;
//!
//! impl HealthSink for StdoutHealth {
//!     fn publish(&self, snapshot: HealthSnapshot) {
//!         let alive = snapshot.processes.iter().filter(|r| r.running).count();
//!         println!("{alive}/{} alive", snapshot.len());
//!     }
//! }
//!
//! struct DevMachine;
//!
//! #[async_trait]
//! impl Hardware for DevMachine {
//!     async fn sync_clock(&self) -> io::Result<()> { Ok(()) }
//!     async fn write_boot_log(&self) -> io::Result<()> { Ok(()) }
//!     fn serial(&self) -> String { "serial-000".to_string() }
//!     fn device_type(&self) -> &str { "pc" }
//!     fn is_pc(&self) -> bool { true }
//!     async fn uninstall(&self) {}
//!     async fn reboot(&self) {}
//!     async fn shutdown(&self) {}
//! }
//!
//! /// Offline registrar handing out a fixed identity.
//! struct Offline(Arc<MemoryParams>);
//!
//! #[async_trait]
//! impl Registrar for Offline {
//!     async fn register(&self) -> Option<String> {
//!         self.0.put("DongleId", "eeff00112233");
//!         Some("eeff00112233".to_string())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), ManagerError> {
//!     let params = Arc::new(MemoryParams::new());
//!     let registry = Registry::new(vec![
//!         Arc::new(Proc("controlsd", AtomicBool::new(false))) as ProcessRef,
//!         Arc::new(Proc("ui", AtomicBool::new(false))) as ProcessRef,
//!     ])?;
//!
//!     let cfg = Config {
//!         passive_override: Some(false),
//!         ..Config::from_env()
//!     };
//!     let build = BuildInfo {
//!         version: "0.1.0".to_string(),
//!         commit: String::new(),
//!         branch: String::new(),
//!         remote: String::new(),
//!         tested_branch: false,
//!         dirty: true,
//!     };
//!
//!     Supervisor::builder(cfg, build)
//!         .with_params(params.clone())
//!         .with_registry(registry)
//!         .with_state(Box::new(Ticker))
//!         .with_orchestrator(Arc::new(EnsureRunning))
//!         .with_health(Arc::new(StdoutHealth))
//!         .with_hardware(Arc::new(DevMachine))
//!         .with_registrar(Arc::new(Offline(params)))
//!         .build()?
//!         .run()
//!         .await
//! }
//! ```

mod action;
mod config;
mod core;
mod display;
mod error;
mod health;
mod orchestrate;
mod params;
mod platform;
mod process;
mod registration;
mod state;
mod telemetry;

#[cfg(test)]
mod testutil;

// ---- Public re-exports ----

pub use action::{ShutdownReason, EXIT_REASON_KEY};
pub use config::{
    Config, BLOCK_ENV, CLEAN_ENV, DEVICE_ID_ENV, NO_BOARD_ENV, PASSIVE_ENV, PREPARE_ONLY_ENV,
};
pub use core::{ExclusionSet, Supervisor, SupervisorBuilder};
pub use display::{ErrorScreen, NullScreen};
pub use error::{InitError, ManagerError, ProcessError};
pub use health::{HealthSink, HealthSnapshot};
pub use orchestrate::Orchestrator;
pub use params::{MemoryParams, ParamStore};
pub use platform::{BuildInfo, Hardware};
pub use process::{ManagedProcess, ProcessRef, ProcessReport, Registry};
pub use registration::{Registrar, UNREGISTERED_DEVICE_ID};
pub use state::{CarConfig, StateSource};
pub use telemetry::{install_logging, CrashContext, CrashReporter, NullCrashReporter};
