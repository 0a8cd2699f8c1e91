//! Shared test doubles for the collaborator seams.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::ExclusionSet;
use crate::display::ErrorScreen;
use crate::error::{ManagerError, ProcessError};
use crate::health::{HealthSink, HealthSnapshot};
use crate::orchestrate::Orchestrator;
use crate::params::{MemoryParams, ParamStore};
use crate::platform::{BuildInfo, Hardware};
use crate::process::{ManagedProcess, ProcessReport, Registry};
use crate::registration::Registrar;
use crate::state::{CarConfig, StateSource};
use crate::telemetry::{CrashContext, CrashReporter};

pub fn build_info(dirty: bool) -> BuildInfo {
    BuildInfo {
        version: "0.9.1".to_string(),
        commit: "abc123".to_string(),
        branch: "release".to_string(),
        remote: "git@github.com:solti-org/procvisor.git".to_string(),
        tested_branch: true,
        dirty,
    }
}

/// Managed-process double backed by an atomic liveness flag.
pub struct FakeProcess {
    name: String,
    alive: AtomicBool,
    fail_prepare: bool,
    prepared: AtomicBool,
    starts: AtomicU32,
    blocking_stops: AtomicU32,
}

impl FakeProcess {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            alive: AtomicBool::new(false),
            fail_prepare: false,
            prepared: AtomicBool::new(false),
            starts: AtomicU32::new(0),
            blocking_stops: AtomicU32::new(0),
        }
    }

    pub fn failing_prepare(name: &str) -> Self {
        Self {
            fail_prepare: true,
            ..Self::new(name)
        }
    }

    pub fn was_prepared(&self) -> bool {
        self.prepared.load(Ordering::SeqCst)
    }

    pub fn start_count(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn blocking_stop_count(&self) -> u32 {
        self.blocking_stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManagedProcess for FakeProcess {
    fn name(&self) -> &str {
        &self.name
    }

    async fn prepare(&self) -> Result<(), ProcessError> {
        if self.fail_prepare {
            return Err(ProcessError::Prepare {
                reason: "artifact staging failed".to_string(),
            });
        }
        self.prepared.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn start(&self) -> Result<(), ProcessError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.alive.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self, block: bool) -> Result<(), ProcessError> {
        if block {
            self.blocking_stops.fetch_add(1, Ordering::SeqCst);
        }
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn report(&self) -> ProcessReport {
        let running = self.is_alive();
        ProcessReport {
            name: self.name.clone(),
            running,
            pid: running.then_some(4242),
            exit_code: None,
        }
    }
}

/// Reference orchestration policy: start what should run, stop the rest,
/// never touch a process already in its desired state.
#[derive(Default)]
pub struct ConvergeOrchestrator {
    always: Vec<String>,
}

impl ConvergeOrchestrator {
    /// Policy that keeps `names` running regardless of the started flag
    /// (the front-end, typically).
    pub fn keeping(names: &[&str]) -> Self {
        Self {
            always: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

#[async_trait]
impl Orchestrator for ConvergeOrchestrator {
    async fn converge(
        &self,
        registry: &Registry,
        started: bool,
        _car: &CarConfig,
        excluded: &ExclusionSet,
    ) -> Result<(), ManagerError> {
        for p in registry.iter() {
            let persistent = self.always.iter().any(|n| n == p.name());
            let want = (started || persistent) && !excluded.contains(p.name());
            if want && !p.is_alive() {
                p.start().await.map_err(|source| ManagerError::Process {
                    name: p.name().to_string(),
                    source,
                })?;
            } else if !want && p.is_alive() {
                p.stop(false).await.map_err(|source| ManagerError::Process {
                    name: p.name().to_string(),
                    source,
                })?;
            }
        }
        Ok(())
    }
}

/// State source replaying a fixed script of started samples; errors once
/// the script is exhausted.
pub struct ScriptedState {
    samples: VecDeque<bool>,
    started: bool,
    car: CarConfig,
    car_seen: bool,
}

impl ScriptedState {
    pub fn new(samples: impl IntoIterator<Item = bool>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
            started: false,
            car: CarConfig::default(),
            car_seen: false,
        }
    }
}

#[async_trait]
impl StateSource for ScriptedState {
    async fn wait_update(&mut self) -> Result<(), ManagerError> {
        match self.samples.pop_front() {
            Some(started) => {
                self.started = started;
                Ok(())
            }
            None => Err(ManagerError::StateSource {
                reason: "script exhausted".to_string(),
            }),
        }
    }

    fn started(&self) -> bool {
        self.started
    }

    fn car_config(&self) -> CarConfig {
        self.car.clone()
    }

    fn car_config_seen(&self) -> bool {
        self.car_seen
    }
}

/// Health sink collecting every published snapshot.
#[derive(Default)]
pub struct CollectingHealth {
    snapshots: Mutex<Vec<HealthSnapshot>>,
}

impl CollectingHealth {
    pub fn snapshots(&self) -> Vec<HealthSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }
}

impl HealthSink for CollectingHealth {
    fn publish(&self, snapshot: HealthSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot);
    }
}

/// Health sink that raises a shutdown flag after the n-th publish,
/// simulating an operator request arriving mid-run.
pub struct FlagAfterPublishes {
    params: Arc<MemoryParams>,
    key: &'static str,
    after: u32,
    count: AtomicU32,
    snapshots: Mutex<Vec<HealthSnapshot>>,
}

impl FlagAfterPublishes {
    pub fn new(params: Arc<MemoryParams>, key: &'static str, after: u32) -> Self {
        Self {
            params,
            key,
            after,
            count: AtomicU32::new(0),
            snapshots: Mutex::new(Vec::new()),
        }
    }

    pub fn publishes(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn snapshots(&self) -> Vec<HealthSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }
}

impl HealthSink for FlagAfterPublishes {
    fn publish(&self, snapshot: HealthSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot);
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.after {
            self.params.put_bool(self.key, true);
        }
    }
}

/// Hardware double recording dispatched system actions.
pub struct FakeHardware {
    serial: String,
    device: String,
    pc: bool,
    fail_clock: bool,
    actions: Mutex<Vec<&'static str>>,
}

impl FakeHardware {
    pub fn new(serial: &str) -> Self {
        Self {
            serial: serial.to_string(),
            device: "tici".to_string(),
            pc: false,
            fail_clock: false,
            actions: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_clock(serial: &str) -> Self {
        Self {
            fail_clock: true,
            ..Self::new(serial)
        }
    }

    pub fn actions(&self) -> Vec<&'static str> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Hardware for FakeHardware {
    async fn sync_clock(&self) -> io::Result<()> {
        if self.fail_clock {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no time source"));
        }
        Ok(())
    }

    async fn write_boot_log(&self) -> io::Result<()> {
        Ok(())
    }

    fn serial(&self) -> String {
        self.serial.clone()
    }

    fn device_type(&self) -> &str {
        &self.device
    }

    fn is_pc(&self) -> bool {
        self.pc
    }

    async fn uninstall(&self) {
        self.actions.lock().unwrap().push("uninstall");
    }

    async fn reboot(&self) {
        self.actions.lock().unwrap().push("reboot");
    }

    async fn shutdown(&self) {
        self.actions.lock().unwrap().push("shutdown");
    }
}

/// Registrar double; on success it persists the identity like the real
/// handshake does.
pub struct FakeRegistrar {
    params: Arc<MemoryParams>,
    id: Option<String>,
    called: AtomicBool,
}

impl FakeRegistrar {
    pub fn succeeding(params: Arc<MemoryParams>, id: &str) -> Self {
        Self {
            params,
            id: Some(id.to_string()),
            called: AtomicBool::new(false),
        }
    }

    pub fn failing(params: Arc<MemoryParams>) -> Self {
        Self {
            params,
            id: None,
            called: AtomicBool::new(false),
        }
    }

    pub fn was_called(&self) -> bool {
        self.called.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registrar for FakeRegistrar {
    async fn register(&self) -> Option<String> {
        self.called.store(true, Ordering::SeqCst);
        if let Some(id) = &self.id {
            self.params.put("DongleId", id);
        }
        self.id.clone()
    }
}

/// Crash reporter double recording bind/capture/clear calls.
#[derive(Default)]
pub struct RecordingCrash {
    bound: Mutex<Option<CrashContext>>,
    captured: Mutex<Vec<String>>,
    cleared: AtomicBool,
}

impl RecordingCrash {
    pub fn bound_context(&self) -> Option<CrashContext> {
        self.bound.lock().unwrap().clone()
    }

    pub fn captured(&self) -> Vec<String> {
        self.captured.lock().unwrap().clone()
    }

    pub fn stale_report_cleared(&self) -> bool {
        self.cleared.load(Ordering::SeqCst)
    }
}

impl CrashReporter for RecordingCrash {
    fn bind(&self, ctx: &CrashContext) {
        *self.bound.lock().unwrap() = Some(ctx.clone());
    }

    fn capture(&self, err: &ManagerError) {
        self.captured.lock().unwrap().push(err.as_label().to_string());
    }

    fn clear_stale_report(&self) {
        self.cleared.store(true, Ordering::SeqCst);
    }
}

/// Error screen double recording shown texts.
#[derive(Default)]
pub struct RecordingScreen {
    shown: Mutex<Vec<String>>,
}

impl RecordingScreen {
    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl ErrorScreen for RecordingScreen {
    async fn show(&self, text: &str) {
        self.shown.lock().unwrap().push(text.to_string());
    }
}
