//! Notification delivery transports.

use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, info};

use super::Notification;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Delivers a rendered notification to its recipients.
///
/// Called from the outbox worker thread, never from inside a transaction.
pub trait NotificationTransport: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Default transport for dev.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTransport;

impl NotificationTransport for LoggingTransport {
    fn send(&self, n: &Notification) -> Result<(), NotifyError> {
        info!(
            event_key = n.event_key,
            resource_type = n.resource_type,
            resource_id = %n.resource_id,
            recipients = n.recipients.len(),
            title = %n.title,
            "notification delivered"
        );
        if let Ok(payload) = serde_json::to_string(n) {
            debug!(%payload, "notification payload");
        }
        Ok(())
    }
}

/// Keeps every delivered notification in memory. Can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Notification>>,
    fail_with: Mutex<Option<String>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Make every subsequent `send` fail with `reason` (or succeed with `None`).
    pub fn fail_with(&self, reason: Option<&str>) {
        if let Ok(mut f) = self.fail_with.lock() {
            *f = reason.map(str::to_string);
        }
    }
}

impl NotificationTransport for RecordingTransport {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if let Some(reason) = self.fail_with.lock().ok().and_then(|f| f.clone()) {
            return Err(NotifyError::Delivery(reason));
        }
        self.sent
            .lock()
            .map_err(|_| NotifyError::Delivery("recorder lock poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}
