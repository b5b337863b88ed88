//! Non-blocking user notification seam.
//!
//! Matches the reported half of the error taxonomy: the composer never
//! surfaces an error by failing an operation, it hands a short user-facing
//! message (plus the underlying cause) to the notifier and carries on.

use std::fmt;

/// Notification shown when a draft push fails for a reportable reason.
pub const CANNOT_UPDATE_DRAFT: &str = "Cannot update issue draft";
/// Notification shown when issue creation fails.
pub const CANNOT_CREATE_ISSUE: &str = "Cannot create issue";
/// Notification shown when an attachment upload fails.
pub const CANNOT_ATTACH_FILE: &str = "Cannot attach file";
/// Notification shown when the picker/camera fails to produce a file.
pub const PICKER_FAILED: &str = "ImagePicker error";

/// Sink for non-blocking error notifications.
pub trait Notifier: Send + Sync {
    /// Show a non-blocking error notification. Must not block the caller.
    fn error(&self, summary: &str, cause: &dyn fmt::Display);
}

/// Production default: routes notifications to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, summary: &str, cause: &dyn fmt::Display) {
        tracing::warn!(cause = %cause, "{summary}");
    }
}

/// Swallows notifications; useful when a host renders errors elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn error(&self, _summary: &str, _cause: &dyn fmt::Display) {}
}
