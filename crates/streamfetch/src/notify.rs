//! User-facing failure notifications.
//!
//! The client never renders anything itself. When a failure should be shown
//! to the user it hands a [`Notification`] to the injected [`Notifier`] and
//! moves on; the notifier is fire-and-forget and must be reentrant.
//!
//! | Notifier | Use case |
//! |----------|----------|
//! | [`NoopNotifier`] | Tests, headless callers |
//! | [`LoggingNotifier`] | Route notifications into `tracing` |
//! | [`FnNotifier`] | Quick closures (toast bridges, test recorders) |

use tracing::{error, info, warn};

use crate::error::ABORT_MESSAGE;

/// Teardown noise raised when a page unloads mid-stream.
pub const TEARDOWN_MARKER: &str = "TypeError: Cannot assign to read only property";

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    /// Shown as a destructive toast.
    Error,
}

/// A request to show a message to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

/// Receiver of user-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Discards every notification.
pub struct NoopNotifier;
impl Notifier for NoopNotifier {
    fn notify(&self, _notification: &Notification) {}
}

/// Logs notifications through `tracing`.
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, notification: &Notification) {
        match notification.severity {
            Severity::Info => info!("{}", notification.message),
            Severity::Warning => warn!("{}", notification.message),
            Severity::Error => error!("{}", notification.message),
        }
    }
}

/// A notifier backed by a closure.
///
/// ```ignore
/// let notifier = FnNotifier::new(|n| eprintln!("{}", n.message));
/// ```
pub struct FnNotifier<F>(F)
where
    F: Fn(&Notification) + Send + Sync;

impl<F> FnNotifier<F>
where
    F: Fn(&Notification) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Notifier for FnNotifier<F>
where
    F: Fn(&Notification) + Send + Sync,
{
    fn notify(&self, notification: &Notification) {
        (self.0)(notification)
    }
}

/// Whether an error message describes a user abort or navigation teardown.
///
/// Matches on message text only. Such failures are still reported to the
/// caller but never shown to the user.
pub fn is_benign_cancellation(message: &str) -> bool {
    message == ABORT_MESSAGE || message.contains(TEARDOWN_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn benign_messages_are_recognized() {
        assert!(is_benign_cancellation(ABORT_MESSAGE));
        assert!(is_benign_cancellation(
            "TypeError: Cannot assign to read only property 'x' of object"
        ));
        assert!(!is_benign_cancellation("request failed: connection refused"));
        assert!(!is_benign_cancellation("bad request"));
    }

    #[test]
    fn fn_notifier_receives_notifications() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let notifier = FnNotifier::new(move |n: &Notification| {
            sink.lock().unwrap().push(n.clone());
        });
        notifier.notify(&Notification::error("boom"));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].severity, Severity::Error);
        assert_eq!(seen[0].message, "boom");
    }
}
