//! Native notifications for incoming inbox items.

/// Shows a notification outside the application window.
pub trait SystemNotifier: Send + Sync {
    /// Whether the user allowed notifications.
    fn permission_granted(&self) -> bool;

    fn notify(&self, title: &str, body: &str);
}

/// Logs notifications instead of showing them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl SystemNotifier for TracingNotifier {
    fn permission_granted(&self) -> bool {
        true
    }

    fn notify(&self, title: &str, body: &str) {
        tracing::info!(title, body, "System notification");
    }
}
