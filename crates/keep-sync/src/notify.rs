use keep_core::KeepError;

/// Receives failures that should reach the user.
pub trait Notifier: Send + Sync {
    fn notify_failure(&self, action: &str, error: &KeepError);
}

/// Reports failures through the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_failure(&self, action: &str, error: &KeepError) {
        tracing::warn!(kind = ?error.kind, "failed to {action}: {}", error.message);
    }
}
