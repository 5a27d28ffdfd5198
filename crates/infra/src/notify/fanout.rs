use std::sync::Arc;

use tracing::{debug, warn};

use sourcing_auth::{Audience, RecipientPolicy};
use sourcing_awarding::{AwardNotice, AwardOutcome, SupplierId};
use sourcing_core::UserId;
use sourcing_events::{Event, EventBus, EventEnvelope};

use crate::store::StoreError;

use super::directory::{RecipientDirectory, RecipientScope};
use super::{Notification, Outbox};

const RESOURCE_TYPE: &str = "rfq";

/// Counts of what one fan-out did, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub enqueued: usize,
    pub skipped_no_recipients: usize,
    pub failed: usize,
}

/// Turns a committed [`AwardOutcome`] into per-supplier notifications on the
/// outbox.
#[derive(Clone)]
pub struct NotificationFanout {
    directory: Arc<dyn RecipientDirectory>,
    policy: RecipientPolicy,
    outbox: Arc<Outbox>,
}

impl NotificationFanout {
    pub fn new(
        directory: Arc<dyn RecipientDirectory>,
        policy: RecipientPolicy,
        outbox: Arc<Outbox>,
    ) -> Self {
        Self {
            directory,
            policy,
            outbox,
        }
    }

    pub fn outbox(&self) -> &Arc<Outbox> {
        &self.outbox
    }

    /// Supplier contacts of `supplier_id` plus platform oversight, per the
    /// audience table.
    pub async fn recipients(&self, supplier_id: SupplierId) -> Result<Vec<UserId>, StoreError> {
        let mut users = Vec::new();
        for rule in self.policy.rules() {
            let scope = match rule.audience {
                Audience::SupplierContacts => RecipientScope::Supplier(supplier_id),
                Audience::PlatformOversight => RecipientScope::Platform,
            };
            users.extend(self.directory.users_with_roles(scope, &rule.roles).await?);
        }
        users.sort();
        users.dedup();
        Ok(users)
    }

    /// Enqueue one notification per notice. Never fails.
    pub async fn dispatch(&self, outcome: &AwardOutcome) -> FanoutReport {
        let mut report = FanoutReport::default();

        for notice in outcome.notices() {
            let supplier_id = notice.supplier_id();
            let recipients = match self.recipients(supplier_id).await {
                Ok(r) => r,
                Err(err) => {
                    warn!(supplier_id = %supplier_id, error = %err, "recipient lookup failed");
                    report.failed += 1;
                    continue;
                }
            };
            if recipients.is_empty() {
                debug!(supplier_id = %supplier_id, event_key = notice.event_type(), "no recipients");
                report.skipped_no_recipients += 1;
                continue;
            }

            let envelope = EventEnvelope::wrap(
                outcome.tenant_id,
                RESOURCE_TYPE,
                *outcome.rfq_id.as_uuid(),
                render(&notice, recipients),
            );
            match self.outbox.publish(envelope) {
                Ok(()) => report.enqueued += 1,
                Err(err) => {
                    warn!(supplier_id = %supplier_id, error = ?err, "outbox publish failed");
                    report.failed += 1;
                }
            }
        }

        report
    }
}

fn render(notice: &AwardNotice, recipients: Vec<UserId>) -> Notification {
    Notification {
        recipients,
        event_key: notice.event_type(),
        title: notice.title(),
        body: notice.body(),
        resource_type: RESOURCE_TYPE,
        resource_id: *notice.rfq_id().as_uuid(),
        metadata: notice.metadata(),
        occurred_at: notice.occurred_at(),
    }
}
