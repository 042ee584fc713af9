//! User-visible notifications.

use std::fmt::Debug;

/// Shown when a submission fails.
pub const SEND_FAILED: &str = "Something went wrong. Please try again.";

/// Sink for short messages shown to the user, e.g. a toast.
pub trait Notifier: Send + Sync + Debug {
    /// Surface an error.
    fn error(&self, message: &str);
}

/// Notifier that emits a `tracing` warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn error(&self, message: &str) {
        tracing::warn!(name: "notify.error", message = %message, "User notification");
    }
}
