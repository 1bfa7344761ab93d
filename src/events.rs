use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Upload,
    Download,
}

/// Progress and outcome of a single transfer call.
#[derive(Debug, Clone, Serialize)]
pub struct TransferEvent {
    /// `user@host:port` of the issuing session
    pub source: String,
    pub action: ActionType,
    /// Caller supplied, never checked against the bytes actually moved
    pub total_size: u64,
    pub completed_size: u64,
    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    pub succeeded: bool,
}

impl TransferEvent {
    pub fn new(source: impl Into<String>, action: ActionType, total_size: u64) -> Self {
        Self {
            source: source.into(),
            action,
            total_size,
            completed_size: 0,
            start_time: Local::now(),
            end_time: None,
            succeeded: false,
        }
    }

    pub fn set_completed_size(&mut self, completed: u64) {
        self.completed_size = completed;
    }

    /// Mark the transfer as successfully finished. No-op once finished.
    pub fn finish_succeeded(&mut self) {
        if self.end_time.is_none() {
            self.succeeded = true;
            self.end_time = Some(Local::now());
        }
    }

    /// Stamp the end time without success. No-op once finished.
    pub fn finish(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(Local::now());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Completion percentage, 0 when the total size is unknown.
    pub fn percent(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            self.completed_size as f64 * 100.0 / self.total_size as f64
        }
    }

    pub fn elapsed(&self) -> Duration {
        let end = self.end_time.unwrap_or_else(Local::now);
        (end - self.start_time).to_std().unwrap_or_default()
    }
}

/// Observer of transfer progress.
///
/// `before` and `on_progress` return the continue-flag: `false` stops the
/// transfer. `after` fires once per transfer and cannot veto.
pub trait TransferListener: Send + Sync {
    fn before(&self, _event: &TransferEvent) -> bool {
        true
    }

    fn on_progress(&self, _event: &TransferEvent) -> bool {
        true
    }

    fn after(&self, _event: &TransferEvent) {}
}

/// Ordered set of listeners, unique by handle identity.
#[derive(Default, Clone)]
pub struct ListenerRegistry {
    listeners: Vec<Arc<dyn TransferListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`. Registering the same handle twice is ignored.
    pub fn add(&mut self, listener: Arc<dyn TransferListener>) {
        if !self.contains(&listener) {
            self.listeners.push(listener);
        }
    }

    pub fn remove(&mut self, listener: &Arc<dyn TransferListener>) {
        self.listeners.retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn contains(&self, listener: &Arc<dyn TransferListener>) -> bool {
        self.listeners.iter().any(|l| Arc::ptr_eq(l, listener))
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Stops at the first listener returning `false`.
    pub fn fire_before(&self, event: &TransferEvent) -> bool {
        self.listeners.iter().all(|l| l.before(event))
    }

    /// Stops at the first listener returning `false`.
    pub fn fire_progress(&self, event: &TransferEvent) -> bool {
        self.listeners.iter().all(|l| l.on_progress(event))
    }

    pub fn fire_after(&self, event: &TransferEvent) {
        for listener in &self.listeners {
            listener.after(event);
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
