use std::io;
use std::sync::Arc;

use sourcing_core::TenantId;
use sourcing_events::{EventBus, EventEnvelope};

use crate::notify::{Notification, NotificationTransport, Outbox};

use super::{WorkerHandle, spawn_worker};

/// Drains the notification outbox into a transport.
///
/// Delivery failures are logged by the worker loop and the notification is
/// dropped; awards are never affected.
#[derive(Debug)]
pub struct NotificationWorker;

impl NotificationWorker {
    /// Subscribe to `outbox` and start delivering on a dedicated thread.
    ///
    /// The subscription is taken before this returns, so anything published
    /// afterwards is delivered.
    pub fn spawn(
        outbox: &Outbox,
        transport: Arc<dyn NotificationTransport>,
        tenant_id: Option<TenantId>,
    ) -> io::Result<WorkerHandle> {
        spawn_worker(
            "notification-worker",
            outbox.subscribe(),
            tenant_id,
            move |envelope: EventEnvelope<Notification>| transport.send(envelope.payload()),
        )
    }
}
