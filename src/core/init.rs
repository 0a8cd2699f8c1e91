//! # Initialization sequencer.
//!
//! Brings the system from cold start to "ready to supervise" exactly once
//! per run. Steps execute strictly in order; a fatal step aborts the whole
//! sequence with no partial retry at this layer.
//!
//! ```text
//!  1. clock sync                  best-effort, logged
//!  2. boot-log marker             best-effort, logged
//!  3. clear clear-on-start keys
//!  4. apply first-boot defaults   unset keys only
//!  5. resolve operating mode      FATAL if unresolvable
//!  6. shared-memory mount point   permission failure tolerated
//!  7. persist build identity      unconditional overwrite
//!  8. device registration         FATAL on failure, exports DEVICE_ID
//!  9. clean-tree marker           exports CLEAN
//! 10. logging + crash context
//! 11. clear stale error marker
//! ```

use std::io::ErrorKind;

use tracing::{info, warn};

use crate::config::{Config, CLEAN_ENV, DEVICE_ID_ENV};
use crate::error::InitError;
use crate::params::ParamStore;
use crate::platform::{BuildInfo, Hardware};
use crate::registration::Registrar;
use crate::telemetry::{self, CrashContext, CrashReporter};

/// Factory defaults for every first-boot key.
///
/// Applied only where no value is set; operator and user values are never
/// overwritten. The table is the exhaustive first-boot contract.
const DEFAULT_PARAMS: &[(&str, &str)] = &[
    ("AccMadsCombo", "1"),
    ("AutoLaneChangeTimer", "0"),
    ("BelowSpeedPause", "0"),
    ("BrakeLights", "0"),
    ("BrightnessControl", "0"),
    ("CustomTorqueLateral", "0"),
    ("CameraControl", "2"),
    ("CameraControlToggle", "0"),
    ("CameraOffset", "0"),
    ("CarModel", ""),
    ("CarModelText", ""),
    ("ChevronInfo", "1"),
    ("CustomBootScreen", "0"),
    ("CustomOffsets", "0"),
    ("CompletedTrainingVersion", "0"),
    ("DevUI", "1"),
    ("DevUIRow", "1"),
    ("DisableOnroadUploads", "0"),
    ("DisengageLateralOnBrake", "1"),
    ("DisengageOnAccelerator", "0"),
    ("DynamicLaneProfile", "2"),
    ("DynamicLaneProfileToggle", "1"),
    ("EnableMads", "1"),
    ("EndToEndLongToggle", "1"),
    ("EnhancedScc", "0"),
    ("GapAdjustCruise", "1"),
    ("GapAdjustCruiseMode", "0"),
    ("GapAdjustCruiseTr", "4"),
    ("GpxDeleteAfterUpload", "1"),
    ("GpxDeleteIfUploaded", "1"),
    ("GsmMetered", "1"),
    ("HandsOnWheelMonitoring", "0"),
    ("HasAcceptedTerms", "0"),
    ("LanguageSetting", "main_en"),
    ("LastSpeedLimitSignTap", "0"),
    ("MadsIconToggle", "1"),
    ("MaxTimeOffroad", "9"),
    ("OnroadScreenOff", "0"),
    ("OnroadScreenOffBrightness", "50"),
    ("OpenpilotEnabledToggle", "1"),
    ("PathOffset", "0"),
    ("ReverseAccChange", "0"),
    ("ShowDebugUI", "1"),
    ("SpeedLimitControl", "1"),
    ("SpeedLimitPercOffset", "1"),
    ("SpeedLimitStyle", "0"),
    ("SpeedLimitValueOffset", "0"),
    ("StandStillTimer", "0"),
    ("StockLongToyota", "0"),
    ("TorqueDeadzoneDeg", "0"),
    ("TorqueFriction", "1"),
    ("TorqueMaxLatAccel", "250"),
    ("TurnSpeedControl", "0"),
    ("TurnVisionControl", "0"),
    ("VisionCurveLaneless", "0"),
    ("VwAccType", "0"),
];

/// Runs the full initialization sequence.
///
/// Returns the fatal error that aborted it, if any. Recoverable failures
/// (clock, boot log, shared-memory permissions) are logged and skipped.
pub(crate) async fn run(
    cfg: &Config,
    build: &BuildInfo,
    params: &dyn ParamStore,
    hardware: &dyn Hardware,
    registrar: &dyn Registrar,
    crash: &dyn CrashReporter,
) -> Result<(), InitError> {
    if let Err(err) = hardware.sync_clock().await {
        warn!(error = %err, "clock sync failed");
    }
    if let Err(err) = hardware.write_boot_log().await {
        warn!(error = %err, "boot log write failed");
    }

    params.clear_on_start();

    apply_defaults(params, hardware.is_pc());

    resolve_mode(cfg, params)?;

    ensure_shm(cfg)?;

    params.put("Version", &build.version);
    params.put("GitCommit", &build.commit);
    params.put("GitBranch", &build.branch);
    params.put("GitRemote", &build.remote);
    params.put_bool("IsTestedBranch", build.tested_branch);

    let device_id = match registrar.register().await {
        Some(id) => id,
        None => {
            let serial = params.get("HardwareSerial").unwrap_or_default();
            return Err(InitError::RegistrationFailed { serial });
        }
    };
    // Children inherit the identity through the environment.
    std::env::set_var(DEVICE_ID_ENV, &device_id);

    if !build.dirty {
        std::env::set_var(CLEAN_ENV, "1");
    }

    telemetry::install_logging();
    crash.bind(&CrashContext {
        device_id: device_id.clone(),
        version: build.version.clone(),
        dirty: build.dirty,
        device_type: hardware.device_type().to_string(),
    });
    info!(
        device_id = %device_id,
        version = %build.version,
        dirty = build.dirty,
        device = hardware.device_type(),
        "initialization complete"
    );

    crash.clear_stale_report();

    Ok(())
}

/// Writes the factory default for every key that has no value yet.
fn apply_defaults(params: &dyn ParamStore, is_pc: bool) {
    // A locked front-recording preference forces the toggle on before
    // defaults are considered.
    if params.get_bool("RecordFrontLock") {
        params.put_bool("RecordFront", true);
    }

    for (key, value) in DEFAULT_PARAMS {
        if params.get_bytes(key).is_none() {
            params.put(key, value);
        }
    }

    // Devices track their last update time from first boot; PCs do not.
    if !is_pc && params.get_bytes("LastUpdateTime").is_none() {
        params.put("LastUpdateTime", &chrono::Utc::now().to_rfc3339());
    }
}

/// Resolves passive/active mode; the environment override wins and is
/// persisted, otherwise the prior persisted value is used.
fn resolve_mode(cfg: &Config, params: &dyn ParamStore) -> Result<(), InitError> {
    if let Some(passive) = cfg.passive_override {
        params.put_bool("Passive", passive);
    }
    if params.get_bytes("Passive").is_none() {
        return Err(InitError::ModeUnset);
    }
    Ok(())
}

/// Ensures the shared-memory mount point exists. "Already exists" is
/// success, "permission denied" is a tolerated warning, anything else is
/// fatal.
fn ensure_shm(cfg: &Config) -> Result<(), InitError> {
    match std::fs::create_dir(&cfg.shm_path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(err) if err.kind() == ErrorKind::PermissionDenied => {
            warn!(path = %cfg.shm_path.display(), "cannot create shared-memory dir");
            Ok(())
        }
        Err(source) => Err(InitError::SharedMemory {
            path: cfg.shm_path.clone(),
            source,
        }),
    }
}
