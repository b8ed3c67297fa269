//! Notifier that forwards messages to `tracing`.

use crate::{Notifier, Severity};

#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info | Severity::Success => {
                tracing::info!(severity = severity.as_str(), "{message}")
            }
            Severity::Warning => tracing::warn!(severity = severity.as_str(), "{message}"),
            Severity::Error => tracing::error!(severity = severity.as_str(), "{message}"),
        }
    }
}
