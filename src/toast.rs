//! Transient user-facing notifications

use std::sync::Mutex;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastLevel { Success, Info, Error }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toast { pub level: ToastLevel, pub message: String }

pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);

    fn success(&self, message: &str) { self.notify(Toast { level: ToastLevel::Success, message: message.to_string() }) }
    fn info(&self, message: &str) { self.notify(Toast { level: ToastLevel::Info, message: message.to_string() }) }
    fn error(&self, message: &str) { self.notify(Toast { level: ToastLevel::Error, message: message.to_string() }) }
}

/// Writes toasts to the log. Used when there is no UI attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, toast: Toast) {
        match toast.level {
            ToastLevel::Error => warn!(message = %toast.message, "toast"),
            _ => info!(message = %toast.message, level = ?toast.level, "toast"),
        }
    }
}

/// Keeps every toast in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier { toasts: Mutex<Vec<Toast>> }

impl RecordingNotifier {
    pub fn new() -> Self { Self::default() }
    pub fn toasts(&self) -> Vec<Toast> { self.toasts.lock().map(|t| t.clone()).unwrap_or_default() }
    pub fn last(&self) -> Option<Toast> { self.toasts().pop() }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, toast: Toast) {
        if let Ok(mut toasts) = self.toasts.lock() { toasts.push(toast); }
    }
}
