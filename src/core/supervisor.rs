//! # Supervisor: lifecycle sequencing, control loop, and guaranteed teardown.
//!
//! The [`Supervisor`] owns the injected collaborator seams and drives one
//! run from cold start to system action: initialization, preparation, the
//! steady-state monitoring loop, teardown, and at most one system-level
//! action at the end.
//!
//! ## High-level flow
//! ```text
//! run():
//!   startup()
//!     ├─ init::run()                 11 ordered steps, fatal ⇒ outer boundary
//!     ├─ ui.start()                  front-end first, user sees activity
//!     └─ prepare_all()               every process, concurrently, isolated
//!   (PREPARE_ONLY ⇒ return here)
//!   exclusions::compute()            fixed for the whole run
//!   signal listener ──► CancellationToken
//!
//!   control_loop():                  STARTING ─► RUNNING ─► STOPPING
//!     converge(started = false)      nothing from a previous session survives
//!     loop {
//!       state.wait_update()          the loop's only suspension point
//!       orchestrator.converge(...)   idempotent reconcile
//!       health.publish(snapshot)     every iteration, liveness heartbeat
//!       ShutdownReason::pending()    first true flag wins ─► STOPPING
//!     }
//!
//!   teardown():                      runs on EVERY exit path
//!     phase 1: stop(block=false)     parallel signal to all
//!     phase 2: stop(block=true)      registry order, confirmed exits
//!
//!   dispatch_system_action()         uninstall | reboot | shutdown, at most one
//! ```
//!
//! ## Failure tiers
//! - A failure before or during initialization stops the front-end
//!   (best-effort), shows the diagnostic tail on the error screen, and
//!   re-raises — the loop never starts, nothing is dispatched.
//! - A failure escaping a loop iteration is logged, sent to crash
//!   telemetry, and still followed by teardown and dispatch: the run
//!   completed, just abnormally.
//! - A termination signal becomes one cooperative cancellation observed
//!   between loop iterations; teardown runs, dispatch does not.

use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::action::{ShutdownReason, EXIT_REASON_KEY};
use crate::config::Config;
use crate::core::{exclusions, init, shutdown, ExclusionSet};
use crate::display::{ErrorScreen, NullScreen};
use crate::error::ManagerError;
use crate::health::{HealthSink, HealthSnapshot};
use crate::orchestrate::Orchestrator;
use crate::params::ParamStore;
use crate::platform::{BuildInfo, Hardware};
use crate::process::Registry;
use crate::registration::Registrar;
use crate::state::StateSource;
use crate::telemetry::{CrashReporter, NullCrashReporter};

/// Control-loop state machine phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// Pre-session reconcile; no fresh state consumed yet.
    Starting,
    /// Steady-state monitoring.
    Running,
    /// Exit reason persisted; the loop does no further work.
    Stopping,
}

/// Root supervisor for a fleet of managed processes.
///
/// Construct via [`Supervisor::builder`]; every external seam is injected
/// rather than reached through process-wide globals. [`Supervisor::run`]
/// consumes the instance and performs exactly one full run.
pub struct Supervisor {
    cfg: Config,
    build: BuildInfo,
    params: Arc<dyn ParamStore>,
    registry: Registry,
    state: Box<dyn StateSource>,
    orchestrator: Arc<dyn Orchestrator>,
    health: Arc<dyn HealthSink>,
    hardware: Arc<dyn Hardware>,
    registrar: Arc<dyn Registrar>,
    crash: Arc<dyn CrashReporter>,
    screen: Arc<dyn ErrorScreen>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Starts a builder for the given configuration and build identity.
    pub fn builder(cfg: Config, build: BuildInfo) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg, build)
    }

    /// Performs one full supervisor run.
    ///
    /// Returns `Ok(())` when the run completed — including an abnormal
    /// completion where the loop failed but teardown and dispatch still
    /// ran. Returns `Err` for a fatal initialization failure or a
    /// signal-interrupted run; the caller maps `Err` to a non-zero
    /// process exit status.
    pub async fn run(mut self) -> Result<(), ManagerError> {
        if let Err(err) = self.startup().await {
            return self.report_startup_failure(err).await;
        }

        if self.cfg.prepare_only {
            info!("prepare-only run, exiting before the loop");
            return Ok(());
        }

        let excluded = exclusions::compute(self.params.as_ref(), &self.cfg);
        if !excluded.is_empty() {
            info!(
                excluded = ?excluded.names().collect::<Vec<_>>(),
                "exclusion set fixed for this run"
            );
        }

        let cancel = CancellationToken::new();
        spawn_signal_listener(cancel.clone());

        let result = tokio::select! {
            res = self.control_loop(&excluded) => res,
            _ = cancel.cancelled() => Err(ManagerError::Interrupted),
        };

        match &result {
            Ok(()) => {}
            Err(err) if err.is_interrupt() => {
                warn!("termination signal received, tearing down");
            }
            Err(err) => {
                error!(error = %err, label = err.as_label(), "control loop failed");
                self.crash.capture(err);
            }
        }

        // No managed process survives the supervisor, on any exit path.
        self.teardown().await;

        match result {
            Err(err) if err.is_interrupt() => Err(err),
            _ => {
                self.dispatch_system_action().await;
                Ok(())
            }
        }
    }

    /// Initialization, front-end start, and the preparation phase.
    async fn startup(&mut self) -> Result<(), ManagerError> {
        init::run(
            &self.cfg,
            &self.build,
            self.params.as_ref(),
            self.hardware.as_ref(),
            self.registrar.as_ref(),
            self.crash.as_ref(),
        )
        .await?;

        // Front-end first, so preparation happens behind a live screen.
        if !self.cfg.prepare_only {
            if let Some(ui) = self.registry.get(&self.cfg.ui_process) {
                ui.start().await.map_err(|source| ManagerError::Process {
                    name: ui.name().to_string(),
                    source,
                })?;
            }
        }

        self.prepare_all().await;
        Ok(())
    }

    /// Runs `prepare()` on every registered process concurrently.
    ///
    /// Preparations are independent; one process failing is logged and
    /// does not block the others.
    async fn prepare_all(&self) {
        let jobs = self.registry.iter().map(|p| {
            let p = Arc::clone(p);
            async move {
                if let Err(err) = p.prepare().await {
                    warn!(process = p.name(), error = %err, "prepare failed");
                }
            }
        });
        join_all(jobs).await;
    }

    /// The steady-state monitoring loop.
    ///
    /// Errors are not caught here; they propagate to [`Supervisor::run`],
    /// which owns logging, crash reporting, and guaranteed teardown.
    async fn control_loop(&mut self, excluded: &ExclusionSet) -> Result<(), ManagerError> {
        let mut phase = Phase::Starting;
        debug!(?phase, "reconciling pre-session state");

        // One out-of-band reconcile with started=false so no process from
        // a previous session is left running while the loop spins up.
        let car = self.state.car_config();
        self.orchestrator
            .converge(&self.registry, false, &car, excluded)
            .await?;
        phase = Phase::Running;
        info!("supervisor running");

        while phase == Phase::Running {
            self.state.wait_update().await?;

            let started = self.state.started();
            let car = self.state.car_config();
            self.orchestrator
                .converge(&self.registry, started, &car, excluded)
                .await?;

            let snapshot = HealthSnapshot::collect(&self.registry);
            debug!(
                started,
                alive = snapshot.processes.iter().filter(|r| r.running).count(),
                total = snapshot.len(),
                "loop iteration"
            );
            self.health.publish(snapshot);

            if let Some(reason) = ShutdownReason::pending(self.params.as_ref()) {
                self.params.put(EXIT_REASON_KEY, reason.param_key());
                warn!(reason = reason.as_label(), "shutdown requested, stopping supervisor");
                phase = Phase::Stopping;
            }
        }

        debug!(?phase, "loop exited");
        Ok(())
    }

    /// Two-phase teardown.
    ///
    /// Phase one delivers the termination signal to every process in
    /// parallel, so slow-to-stop processes start exiting early. Phase two
    /// waits for each confirmed exit in registry order. Collapsing this
    /// into a single blocking pass would serialize signal delivery behind
    /// the slowest process.
    async fn teardown(&self) {
        let signals = self.registry.iter().map(|p| {
            let p = Arc::clone(p);
            async move {
                if let Err(err) = p.stop(false).await {
                    warn!(process = p.name(), error = %err, "stop signal failed");
                }
            }
        });
        join_all(signals).await;

        for p in self.registry.iter() {
            if let Err(err) = p.stop(true).await {
                warn!(process = p.name(), error = %err, "blocking stop failed");
            }
        }

        info!("everything is dead");
    }

    /// Dispatches at most one system action, in fixed order.
    async fn dispatch_system_action(&self) {
        for reason in ShutdownReason::DISPATCH {
            if self.params.get_bool(reason.param_key()) {
                warn!(action = reason.as_label(), "dispatching system action");
                match reason {
                    ShutdownReason::Uninstall => self.hardware.uninstall().await,
                    ShutdownReason::Reboot => self.hardware.reboot().await,
                    ShutdownReason::Shutdown => self.hardware.shutdown().await,
                }
                return;
            }
        }
    }

    /// Outermost startup boundary: stop the front-end, show the
    /// diagnostic tail, re-raise.
    async fn report_startup_failure(&self, err: ManagerError) -> Result<(), ManagerError> {
        error!(error = %err, label = err.as_label(), "supervisor failed to start");

        if let Some(ui) = self.registry.get(&self.cfg.ui_process) {
            let _ = ui.stop(true).await;
        }

        let text = format!("Supervisor failed to start\n\n{}", diagnostic_tail(&err, 3));
        self.screen.show(&text).await;

        Err(err)
    }
}

/// Renders the last `depth` entries of an error's cause chain.
fn diagnostic_tail(err: &ManagerError, depth: usize) -> String {
    let mut chain = vec![err.to_string()];
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    let skip = chain.len().saturating_sub(depth);
    chain[skip..].join("\n")
}

/// Converts the first termination signal into one cooperative
/// cancellation observed by the run wrapper, never into unwinding from
/// arbitrary call sites.
fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        match shutdown::wait_for_termination().await {
            Ok(()) => cancel.cancel(),
            Err(err) => warn!(error = %err, "signal listener unavailable"),
        }
    });
}

/// Builder wiring the collaborator seams into a [`Supervisor`].
///
/// The crash reporter and error screen default to no-op implementations;
/// everything else is required and checked at [`SupervisorBuilder::build`].
pub struct SupervisorBuilder {
    cfg: Config,
    build: BuildInfo,
    params: Option<Arc<dyn ParamStore>>,
    registry: Option<Registry>,
    state: Option<Box<dyn StateSource>>,
    orchestrator: Option<Arc<dyn Orchestrator>>,
    health: Option<Arc<dyn HealthSink>>,
    hardware: Option<Arc<dyn Hardware>>,
    registrar: Option<Arc<dyn Registrar>>,
    crash: Arc<dyn CrashReporter>,
    screen: Arc<dyn ErrorScreen>,
}

impl SupervisorBuilder {
    /// Creates a builder with no collaborators wired yet.
    pub fn new(cfg: Config, build: BuildInfo) -> Self {
        Self {
            cfg,
            build,
            params: None,
            registry: None,
            state: None,
            orchestrator: None,
            health: None,
            hardware: None,
            registrar: None,
            crash: Arc::new(NullCrashReporter),
            screen: Arc::new(NullScreen),
        }
    }

    /// Sets the persisted configuration store.
    pub fn with_params(mut self, params: Arc<dyn ParamStore>) -> Self {
        self.params = Some(params);
        self
    }

    /// Sets the process registry.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the device/car state source.
    pub fn with_state(mut self, state: Box<dyn StateSource>) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets the orchestration policy.
    pub fn with_orchestrator(mut self, orchestrator: Arc<dyn Orchestrator>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    /// Sets the health publisher.
    pub fn with_health(mut self, health: Arc<dyn HealthSink>) -> Self {
        self.health = Some(health);
        self
    }

    /// Sets the hardware abstraction.
    pub fn with_hardware(mut self, hardware: Arc<dyn Hardware>) -> Self {
        self.hardware = Some(hardware);
        self
    }

    /// Sets the identity registrar.
    pub fn with_registrar(mut self, registrar: Arc<dyn Registrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// Sets the crash-telemetry reporter (defaults to a no-op).
    pub fn with_crash_reporter(mut self, crash: Arc<dyn CrashReporter>) -> Self {
        self.crash = crash;
        self
    }

    /// Sets the terminal failure surface (defaults to a no-op).
    pub fn with_error_screen(mut self, screen: Arc<dyn ErrorScreen>) -> Self {
        self.screen = screen;
        self
    }

    /// Builds the supervisor, failing if a required collaborator is
    /// missing.
    pub fn build(self) -> Result<Supervisor, ManagerError> {
        fn require<T>(opt: Option<T>, what: &'static str) -> Result<T, ManagerError> {
            opt.ok_or(ManagerError::MissingCollaborator { what })
        }

        Ok(Supervisor {
            cfg: self.cfg,
            build: self.build,
            params: require(self.params, "params")?,
            registry: require(self.registry, "registry")?,
            state: require(self.state, "state source")?,
            orchestrator: require(self.orchestrator, "orchestrator")?,
            health: require(self.health, "health sink")?,
            hardware: require(self.hardware, "hardware")?,
            registrar: require(self.registrar, "registrar")?,
            crash: self.crash,
            screen: self.screen,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::InitError;
    use crate::params::MemoryParams;
    use crate::process::{ManagedProcess, ProcessRef};
    use crate::testutil::{
        build_info, CollectingHealth, ConvergeOrchestrator, FakeHardware, FakeProcess,
        FakeRegistrar, FlagAfterPublishes, RecordingCrash, RecordingScreen, ScriptedState,
    };

    struct Fixture {
        params: Arc<MemoryParams>,
        procs: Vec<Arc<FakeProcess>>,
        hardware: Arc<FakeHardware>,
        crash: Arc<RecordingCrash>,
        screen: Arc<RecordingScreen>,
    }

    fn fixture(names: &[&str]) -> Fixture {
        Fixture {
            params: Arc::new(MemoryParams::new()),
            procs: names.iter().map(|n| Arc::new(FakeProcess::new(n))).collect(),
            hardware: Arc::new(FakeHardware::new("serial-000")),
            crash: Arc::new(RecordingCrash::default()),
            screen: Arc::new(RecordingScreen::default()),
        }
    }

    fn test_cfg() -> Config {
        Config {
            passive_override: Some(false),
            shm_path: std::env::temp_dir(),
            ..Config::default()
        }
    }

    fn supervisor(
        cfg: Config,
        fx: &Fixture,
        samples: Vec<bool>,
        health: Arc<dyn HealthSink>,
        registrar: FakeRegistrar,
    ) -> Supervisor {
        let registry = Registry::new(
            fx.procs.iter().map(|p| Arc::clone(p) as ProcessRef).collect(),
        )
        .unwrap();
        Supervisor::builder(cfg, build_info(true))
            .with_params(fx.params.clone())
            .with_registry(registry)
            .with_state(Box::new(ScriptedState::new(samples)))
            .with_orchestrator(Arc::new(ConvergeOrchestrator::keeping(&["ui"])))
            .with_health(health)
            .with_hardware(fx.hardware.clone())
            .with_registrar(Arc::new(registrar))
            .with_crash_reporter(fx.crash.clone())
            .with_error_screen(fx.screen.clone())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_reboot_flag_stops_loop_then_dispatches() {
        let fx = fixture(&["boardd", "controlsd", "ui"]);
        let health = Arc::new(FlagAfterPublishes::new(fx.params.clone(), "DoReboot", 2));
        let registrar = FakeRegistrar::succeeding(fx.params.clone(), "eeff00112233");

        supervisor(test_cfg(), &fx, vec![true; 10], health.clone(), registrar)
            .run()
            .await
            .unwrap();

        assert_eq!(fx.params.get(EXIT_REASON_KEY).as_deref(), Some("DoReboot"));
        assert_eq!(fx.hardware.actions(), vec!["reboot"]);
        assert_eq!(health.publishes(), 2);
        for p in &fx.procs {
            assert!(!p.is_alive(), "{} survived teardown", p.name());
            assert!(p.blocking_stop_count() >= 1);
        }
        assert!(fx.crash.captured().is_empty());
        assert!(fx.screen.shown().is_empty());
    }

    #[tokio::test]
    async fn test_first_true_flag_wins_detection_priority() {
        let fx = fixture(&["controlsd", "ui"]);
        fx.params.put_bool("DoShutdown", true);
        fx.params.put_bool("DoReboot", true);
        let health = Arc::new(CollectingHealth::default());
        let registrar = FakeRegistrar::succeeding(fx.params.clone(), "eeff00112233");

        supervisor(test_cfg(), &fx, vec![true; 4], health, registrar)
            .run()
            .await
            .unwrap();

        // Detection order persists Shutdown; dispatch order still picks
        // Reboot over Shutdown when both flags are set.
        assert_eq!(fx.params.get(EXIT_REASON_KEY).as_deref(), Some("DoShutdown"));
        assert_eq!(fx.hardware.actions(), vec!["reboot"]);
    }

    #[tokio::test]
    async fn test_loop_failure_still_tears_down_and_reports() {
        let fx = fixture(&["boardd", "controlsd", "ui"]);
        let health = Arc::new(CollectingHealth::default());
        let registrar = FakeRegistrar::succeeding(fx.params.clone(), "eeff00112233");

        // One good sample, then the source dies mid-run.
        supervisor(test_cfg(), &fx, vec![true], health.clone(), registrar)
            .run()
            .await
            .unwrap();

        assert_eq!(fx.crash.captured(), vec!["manager_state_source"]);
        assert_eq!(health.snapshots().len(), 1);
        for p in &fx.procs {
            assert!(!p.is_alive(), "{} survived teardown", p.name());
        }
        // No flags set, so nothing is dispatched even on abnormal exit.
        assert!(fx.hardware.actions().is_empty());
    }

    #[tokio::test]
    async fn test_health_snapshot_complete_every_iteration() {
        let fx = fixture(&["boardd", "controlsd", "ui"]);
        let health = Arc::new(FlagAfterPublishes::new(fx.params.clone(), "DoShutdown", 3));
        let registrar = FakeRegistrar::succeeding(fx.params.clone(), "eeff00112233");

        supervisor(test_cfg(), &fx, vec![true, false, true, true], health.clone(), registrar)
            .run()
            .await
            .unwrap();

        let snapshots = health.snapshots();
        assert_eq!(snapshots.len(), 3);
        for snapshot in &snapshots {
            let names: Vec<&str> =
                snapshot.processes.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(names, vec!["boardd", "controlsd", "ui"]);
        }
    }

    #[tokio::test]
    async fn test_no_board_keeps_board_process_excluded_while_started() {
        let fx = fixture(&["boardd", "controlsd", "ui"]);
        let cfg = Config {
            no_board: true,
            ..test_cfg()
        };
        let health = Arc::new(FlagAfterPublishes::new(fx.params.clone(), "DoShutdown", 2));
        let registrar = FakeRegistrar::succeeding(fx.params.clone(), "eeff00112233");

        supervisor(cfg, &fx, vec![true; 4], health, registrar)
            .run()
            .await
            .unwrap();

        let board = &fx.procs[0];
        let controls = &fx.procs[1];
        assert_eq!(board.start_count(), 0, "excluded process was started");
        assert!(controls.start_count() >= 1);
    }

    #[tokio::test]
    async fn test_ui_started_once_before_loop_and_kept_alive() {
        let fx = fixture(&["controlsd", "ui"]);
        let health = Arc::new(FlagAfterPublishes::new(fx.params.clone(), "DoShutdown", 2));
        let registrar = FakeRegistrar::succeeding(fx.params.clone(), "eeff00112233");

        supervisor(test_cfg(), &fx, vec![true; 4], health, registrar)
            .run()
            .await
            .unwrap();

        // Started during startup; the idempotent policy never restarts it.
        assert_eq!(fx.procs[1].start_count(), 1);
    }

    #[tokio::test]
    async fn test_prepare_failure_does_not_block_others() {
        let fx = Fixture {
            params: Arc::new(MemoryParams::new()),
            procs: vec![
                Arc::new(FakeProcess::failing_prepare("loggerd")),
                Arc::new(FakeProcess::new("controlsd")),
            ],
            hardware: Arc::new(FakeHardware::new("serial-000")),
            crash: Arc::new(RecordingCrash::default()),
            screen: Arc::new(RecordingScreen::default()),
        };
        let cfg = Config {
            prepare_only: true,
            ..test_cfg()
        };
        let health = Arc::new(CollectingHealth::default());
        let registrar = FakeRegistrar::succeeding(fx.params.clone(), "eeff00112233");

        supervisor(cfg, &fx, vec![], health, registrar)
            .run()
            .await
            .unwrap();

        assert!(!fx.procs[0].was_prepared());
        assert!(fx.procs[1].was_prepared());
    }

    #[tokio::test]
    async fn test_prepare_only_never_enters_loop() {
        let fx = fixture(&["controlsd", "ui"]);
        let cfg = Config {
            prepare_only: true,
            ..test_cfg()
        };
        let health = Arc::new(CollectingHealth::default());
        let registrar = FakeRegistrar::succeeding(fx.params.clone(), "eeff00112233");

        supervisor(cfg, &fx, vec![true; 4], health.clone(), registrar)
            .run()
            .await
            .unwrap();

        assert!(health.snapshots().is_empty());
        assert!(fx.hardware.actions().is_empty());
        // The front-end is not started on a prepare-only run.
        assert_eq!(fx.procs[1].start_count(), 0);
        for p in &fx.procs {
            assert!(p.was_prepared());
            assert!(!p.is_alive());
        }
    }

    #[tokio::test]
    async fn test_registration_failure_shows_screen_and_stops_ui() {
        let fx = fixture(&["controlsd", "ui"]);
        fx.params.put("HardwareSerial", "cb38a1e2");
        let health = Arc::new(CollectingHealth::default());
        let registrar = FakeRegistrar::failing(fx.params.clone());

        let err = supervisor(test_cfg(), &fx, vec![true; 4], health.clone(), registrar)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ManagerError::Init(InitError::RegistrationFailed { ref serial }) if serial == "cb38a1e2"
        ));
        let shown = fx.screen.shown();
        assert_eq!(shown.len(), 1);
        assert!(shown[0].starts_with("Supervisor failed to start"));
        assert!(shown[0].contains("cb38a1e2"));
        // The front-end was stopped by the boundary; the loop never ran.
        assert!(!fx.procs[1].is_alive());
        assert!(health.snapshots().is_empty());
        assert!(fx.hardware.actions().is_empty());
    }

    #[tokio::test]
    async fn test_builder_rejects_missing_collaborators() {
        let err = Supervisor::builder(test_cfg(), build_info(true))
            .build()
            .unwrap_err();
        assert!(matches!(err, ManagerError::MissingCollaborator { .. }));
    }

    #[test]
    fn test_diagnostic_tail_keeps_innermost_causes() {
        let err = ManagerError::Init(InitError::RegistrationFailed {
            serial: "cb38a1e2".to_string(),
        });
        let tail = diagnostic_tail(&err, 1);
        assert_eq!(tail, "device registration failed (serial: cb38a1e2)");
        let full = diagnostic_tail(&err, 3);
        assert!(full.starts_with("initialization failed"));
    }
}
