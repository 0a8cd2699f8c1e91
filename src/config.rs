//! # Supervisor configuration.
//!
//! [`Config`] is read once at startup — environment variables on top of
//! documented defaults — and handed to the supervisor; nothing re-reads
//! the environment later in the run.
//!
//! ## Environment contract
//! | Variable       | Effect                                                        |
//! |----------------|---------------------------------------------------------------|
//! | `PASSIVE`      | Mode override: `"0"` = active, anything else = passive.       |
//! | `NO_BOARD`     | Present: exclude the board-communication process.             |
//! | `BLOCK`        | Comma-separated process names to force-exclude.               |
//! | `PREPARE_ONLY` | Present: stop after the preparation phase, never loop.        |
//! | `DEVICE_ID`    | Written (not read) with the registered identity for children. |
//! | `CLEAN`        | Written (`"1"`) when the working tree has no modifications.   |

use std::env;
use std::path::PathBuf;

/// Mode override variable; presence wins over the persisted mode.
pub const PASSIVE_ENV: &str = "PASSIVE";
/// "No hardware board present" marker variable.
pub const NO_BOARD_ENV: &str = "NO_BOARD";
/// Operator block-list variable (comma-separated process names).
pub const BLOCK_ENV: &str = "BLOCK";
/// "Prepare processes, then exit" marker variable.
pub const PREPARE_ONLY_ENV: &str = "PREPARE_ONLY";
/// Variable exported with the registered device identity for children.
pub const DEVICE_ID_ENV: &str = "DEVICE_ID";
/// Variable exported when the build has no uncommitted modifications.
pub const CLEAN_ENV: &str = "CLEAN";

/// Startup configuration for the supervisor.
///
/// All fields are public; [`Config::from_env`] layers the environment
/// contract over [`Config::default`].
#[derive(Clone, Debug)]
pub struct Config {
    /// Operating-mode override from the environment, if present.
    /// `Some(_)` wins over the persisted mode and is itself persisted.
    pub passive_override: Option<bool>,

    /// Exclude the board-communication process for the whole run.
    pub no_board: bool,

    /// Operator-supplied names to force-exclude for the whole run.
    pub block: Vec<String>,

    /// Stop after the preparation phase; never enter the loop.
    pub prepare_only: bool,

    /// Name of the interactive front-end process, started before
    /// preparation so the user sees activity immediately.
    pub ui_process: String,

    /// Name of the board-communication process (excluded by `no_board`).
    pub board_process: String,

    /// Processes that need a registered identity; excluded while the
    /// stored identity is absent or unregistered.
    pub net_processes: Vec<String>,

    /// Shared-memory mount point required by the inter-process transport.
    pub shm_path: PathBuf,
}

impl Config {
    /// Reads the environment contract on top of the defaults.
    pub fn from_env() -> Self {
        Self {
            passive_override: env::var(PASSIVE_ENV).ok().map(|v| parse_flag(&v)),
            no_board: env::var_os(NO_BOARD_ENV).is_some(),
            block: env::var(BLOCK_ENV)
                .map(|v| parse_block_list(&v))
                .unwrap_or_default(),
            prepare_only: env::var_os(PREPARE_ONLY_ENV).is_some(),
            ..Self::default()
        }
    }
}

impl Default for Config {
    /// Defaults:
    /// - no mode override, no board exclusion, empty block-list
    /// - `ui_process = "ui"`, `board_process = "boardd"`
    /// - `net_processes = ["cloudd", "uploader"]`
    /// - `shm_path = "/dev/shm"`
    fn default() -> Self {
        Self {
            passive_override: None,
            no_board: false,
            block: Vec::new(),
            prepare_only: false,
            ui_process: "ui".to_string(),
            board_process: "boardd".to_string(),
            net_processes: vec!["cloudd".to_string(), "uploader".to_string()],
            shm_path: PathBuf::from("/dev/shm"),
        }
    }
}

/// `"0"` means false, any other value means true.
fn parse_flag(value: &str) -> bool {
    value.trim() != "0"
}

/// Splits a comma-separated block-list, dropping empty segments.
fn parse_block_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
