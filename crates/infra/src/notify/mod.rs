//! Post-commit supplier notifications.
//!
//! ```text
//! AwardService (after commit) → NotificationFanout → Outbox (event bus)
//!                                                      └─ NotificationWorker → NotificationTransport
//! ```
//!
//! Nothing in this module can fail an award: recipient lookups, publication and
//! delivery problems are logged and dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use sourcing_core::UserId;
use sourcing_events::{Event, EventEnvelope, InMemoryEventBus};

pub mod directory;
pub mod fanout;
pub mod transport;

pub use directory::{
    InMemoryRecipientDirectory, PgRecipientDirectory, RecipientDirectory, RecipientScope,
};
pub use fanout::{FanoutReport, NotificationFanout};
pub use transport::{LoggingTransport, NotificationTransport, NotifyError, RecordingTransport};

/// In-process outbox carrying rendered notifications to the delivery worker.
pub type Outbox = InMemoryEventBus<EventEnvelope<Notification>>;

/// A rendered notification ready for the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub recipients: Vec<UserId>,
    pub event_key: &'static str,
    pub title: String,
    pub body: String,
    pub resource_type: &'static str,
    pub resource_id: Uuid,
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl Event for Notification {
    fn event_type(&self) -> &'static str {
        self.event_key
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
