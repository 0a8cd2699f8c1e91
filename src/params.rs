//! # Persisted configuration store interface.
//!
//! The supervisor never owns persistence; it reads and writes named values
//! through [`ParamStore`]. Keys are stable strings, values are byte blobs
//! with string and boolean views layered on top.
//!
//! ## Rules
//! - Booleans encode as the blobs `b"1"` / `b"0"`; an absent or malformed
//!   value reads as `false`.
//! - String accessors are UTF-8 views over the blob; a non-UTF-8 blob reads
//!   as absent.
//! - `clear_on_start` removes exactly the keys tagged clear-on-start at
//!   store construction; all other keys survive a supervisor restart.
//!
//! [`MemoryParams`] is the in-process implementation used by tests and
//! demos; a production store would be file- or service-backed.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Typed get/put access to the persisted key-value store.
///
/// Only `get_bytes`, `put_bytes`, and `clear_on_start` are required;
/// the string and boolean views are derived.
pub trait ParamStore: Send + Sync {
    /// Returns the raw blob stored under `key`, if any.
    fn get_bytes(&self, key: &str) -> Option<Vec<u8>>;

    /// Stores a raw blob under `key`, replacing any previous value.
    fn put_bytes(&self, key: &str, value: &[u8]);

    /// Removes every key tagged clear-on-start.
    fn clear_on_start(&self);

    /// Returns the UTF-8 string stored under `key`, if present and valid.
    fn get(&self, key: &str) -> Option<String> {
        self.get_bytes(key)
            .and_then(|raw| String::from_utf8(raw).ok())
    }

    /// Stores a string value under `key`.
    fn put(&self, key: &str, value: &str) {
        self.put_bytes(key, value.as_bytes());
    }

    /// Returns the boolean stored under `key`; absent reads as `false`.
    fn get_bool(&self, key: &str) -> bool {
        matches!(self.get_bytes(key).as_deref(), Some(b"1"))
    }

    /// Stores a boolean under `key`.
    fn put_bool(&self, key: &str, value: bool) {
        self.put_bytes(key, if value { b"1" } else { b"0" });
    }
}

/// In-memory [`ParamStore`] for tests and demos.
///
/// Keys tagged clear-on-start are fixed at construction via
/// [`MemoryParams::with_clear_on_start`].
///
/// # Example
/// ```
/// use procvisor::{MemoryParams, ParamStore};
///
/// let params = MemoryParams::with_clear_on_start(["BootCount"]);
/// params.put("BootCount", "7");
/// params.put_bool("OpenpilotEnabledToggle", true);
///
/// params.clear_on_start();
/// assert_eq!(params.get("BootCount"), None);
/// assert!(params.get_bool("OpenpilotEnabledToggle"));
/// ```
#[derive(Default)]
pub struct MemoryParams {
    values: RwLock<HashMap<String, Vec<u8>>>,
    volatile: HashSet<String>,
}

impl MemoryParams {
    /// Creates an empty store with no clear-on-start keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store tagging `keys` as clear-on-start.
    pub fn with_clear_on_start<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: RwLock::new(HashMap::new()),
            volatile: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl ParamStore for MemoryParams {
    fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn put_bytes(&self, key: &str, value: &[u8]) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_vec());
    }

    fn clear_on_start(&self) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.retain(|key, _| !self.volatile.contains(key));
    }
}
