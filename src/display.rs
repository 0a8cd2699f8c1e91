//! Terminal failure surface.
//!
//! Shown exactly once, by the outermost startup boundary, when
//! initialization fails fatally. Not used anywhere else.

use async_trait::async_trait;

/// Blocking modal that displays a diagnostic text until the user
/// dismisses it.
#[async_trait]
pub trait ErrorScreen: Send + Sync {
    /// Shows `text` and resolves only on explicit user dismissal.
    async fn show(&self, text: &str);
}

/// No-op [`ErrorScreen`] for headless setups.
pub struct NullScreen;

#[async_trait]
impl ErrorScreen for NullScreen {
    async fn show(&self, _text: &str) {}
}
