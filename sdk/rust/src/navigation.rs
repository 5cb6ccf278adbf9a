//! View navigation and user notifications.

use std::time::Duration;

/// How long a toast stays on screen.
pub const TOAST_TIMEOUT: Duration = Duration::from_secs(5);

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Success,
    Error,
    Info,
}

impl AlertLevel {
    /// Case-insensitive parse; anything unknown is informational.
    pub fn parse(level: &str) -> Self {
        match level.to_lowercase().as_str() {
            "success" => AlertLevel::Success,
            "error" => AlertLevel::Error,
            _ => AlertLevel::Info,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AlertLevel::Success => "Success",
            AlertLevel::Error => "Error",
            AlertLevel::Info => "Info",
        }
    }
}

/// Moves the user between views.
pub trait Navigator: Send + Sync {
    /// In-app route change (keeps the application loaded).
    fn navigate(&self, path: &str);
    /// Hard navigation that reloads the application at `path`.
    fn assign(&self, path: &str);
}

/// Shows toasts. Implementations replace any toast already visible.
pub trait Notifier: Send + Sync {
    fn alert(&self, level: AlertLevel, message: &str);
}

/// Navigator for headless use: records the move in the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, path: &str) {
        tracing::info!(path, "Navigate");
    }

    fn assign(&self, path: &str) {
        tracing::info!(path, "Hard navigation");
    }
}

/// Notifier for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, level: AlertLevel, message: &str) {
        match level {
            AlertLevel::Error => tracing::error!(title = level.title(), "{}", message),
            _ => tracing::info!(title = level.title(), "{}", message),
        }
    }
}
