//! The award engine entry point.
//!
//! Ties the pieces together per request:
//!
//! 1. open a tenant-scoped transaction and lock the RFQ row
//! 2. refuse lines that already carry an active award
//! 3. load the referenced rows (administrative visibility) and normalize
//! 4. run the commit executor
//! 5. commit
//! 6. fan out notifications (outside the transaction, never fails the call)

use std::sync::Arc;

use chrono::Utc;
use tracing::{Span, debug, error, info, instrument};

use sourcing_awarding::{
    Award, AwardError, AwardId, AwardRequestRow, CandidateSnapshot, ErrorKind, Rfq, RfqId,
    RfqLineId, ensure_rescindable, normalize,
};
use sourcing_core::{TenantId, UserId};

use crate::notify::NotificationFanout;
use crate::purchase_order::PurchaseOrderMaterializer;
use crate::store::{AwardStore, AwardTransaction, StoreError, Visibility};

use super::commit::{CommitExecutor, CommitReceipt, CommitRequest, ensure_lines_unawarded};
use super::reversal::{RescindReceipt, ReversalExecutor};

#[derive(Clone)]
pub struct AwardService {
    store: Arc<dyn AwardStore>,
    commit: CommitExecutor,
    reversal: ReversalExecutor,
    fanout: Option<NotificationFanout>,
}

impl AwardService {
    pub fn new(
        store: Arc<dyn AwardStore>,
        materializer: Arc<dyn PurchaseOrderMaterializer>,
    ) -> Self {
        Self {
            store,
            commit: CommitExecutor::new(materializer),
            reversal: ReversalExecutor,
            fanout: None,
        }
    }

    pub fn with_notifications(mut self, fanout: NotificationFanout) -> Self {
        self.fanout = Some(fanout);
        self
    }

    /// Award a batch of RFQ lines, optionally converting the winners into
    /// purchase orders (one per winning supplier).
    #[instrument(
        skip(self, rows),
        fields(
            tenant_id = %tenant_id,
            rfq_id = %rfq_id,
            actor = %actor,
            rows = rows.len(),
            awards = tracing::field::Empty,
            purchase_orders = tracing::field::Empty
        )
    )]
    pub async fn award(
        &self,
        tenant_id: TenantId,
        rfq_id: RfqId,
        rows: &[AwardRequestRow],
        actor: UserId,
        create_purchase_orders: bool,
    ) -> Result<CommitReceipt, AwardError> {
        let receipt = self
            .commit_batch(tenant_id, rfq_id, rows, actor, create_purchase_orders)
            .await
            .inspect_err(|err| log_failure("award", err))?;

        let span = Span::current();
        span.record("awards", receipt.awards.len());
        span.record("purchase_orders", receipt.purchase_orders.len());
        info!(rfq_status = %receipt.rfq_status, "award batch committed");

        if let Some(fanout) = &self.fanout {
            let report = fanout.dispatch(&receipt.outcome).await;
            debug!(
                enqueued = report.enqueued,
                skipped = report.skipped_no_recipients,
                failed = report.failed,
                "award notifications dispatched"
            );
        }

        Ok(receipt)
    }

    /// Rescind an award that has not been converted into a purchase order.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, award_id = %award_id, actor = %actor))]
    pub async fn rescind(
        &self,
        tenant_id: TenantId,
        award_id: AwardId,
        actor: UserId,
    ) -> Result<RescindReceipt, AwardError> {
        let receipt = self
            .rescind_award(tenant_id, award_id)
            .await
            .inspect_err(|err| log_failure("rescind", err))?;

        info!(
            rfq_id = %receipt.award.rfq_id,
            rfq_line_id = %receipt.award.rfq_line_id,
            rfq_status = %receipt.rfq_status,
            "award rescinded"
        );
        Ok(receipt)
    }

    /// Active awards of an RFQ.
    pub async fn list_awards(
        &self,
        tenant_id: TenantId,
        rfq_id: RfqId,
    ) -> Result<Vec<Award>, AwardError> {
        self.store
            .list_awards(tenant_id, rfq_id)
            .await
            .map_err(|e| {
                let err = AwardError::from(e);
                log_failure("list_awards", &err);
                err
            })
    }

    async fn commit_batch(
        &self,
        tenant_id: TenantId,
        rfq_id: RfqId,
        rows: &[AwardRequestRow],
        actor: UserId,
        create_purchase_orders: bool,
    ) -> Result<CommitReceipt, AwardError> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        let rfq = tx
            .lock_rfq(rfq_id)
            .await?
            .ok_or(AwardError::RfqNotFound { rfq_id })?;

        // Ahead of normalize: after a competing commit the quotes and the RFQ
        // already carry the winner's statuses.
        let requested: Vec<(usize, RfqLineId)> = rows
            .iter()
            .enumerate()
            .map(|(row, r)| (row, r.rfq_line_id))
            .collect();
        ensure_lines_unawarded(tx.as_mut(), rfq.id, &requested).await?;

        let snapshot = load_candidates(tx.as_mut(), &rfq, rows).await?;
        let normalized = normalize(&rfq, rows, &snapshot)?;

        let receipt = self
            .commit
            .execute(
                tx.as_mut(),
                CommitRequest {
                    rfq,
                    rows: normalized,
                    actor,
                    create_purchase_orders,
                    now,
                },
            )
            .await?;

        tx.commit().await?;
        Ok(receipt)
    }

    async fn rescind_award(
        &self,
        tenant_id: TenantId,
        award_id: AwardId,
    ) -> Result<RescindReceipt, AwardError> {
        let award = self
            .store
            .get_award(tenant_id, award_id)
            .await?
            .ok_or(AwardError::AwardNotFound { award_id })?;
        ensure_rescindable(&award)?;

        let mut tx = self.store.begin(tenant_id).await?;
        let receipt = self
            .reversal
            .execute(tx.as_mut(), award.id, award.rfq_id)
            .await?;
        tx.commit().await?;
        Ok(receipt)
    }
}

/// Load everything the normalizer may look at, in one pass per table.
async fn load_candidates(
    tx: &mut dyn AwardTransaction,
    rfq: &Rfq,
    rows: &[AwardRequestRow],
) -> Result<CandidateSnapshot, StoreError> {
    let quote_line_ids: Vec<_> = rows.iter().map(|r| r.quote_line_id).collect();

    let snapshot = CandidateSnapshot::new()
        .with_rfq_lines(tx.rfq_lines(rfq.id).await?)
        .with_quote_lines(
            tx.quote_lines(&quote_line_ids, Visibility::Administrative)
                .await?,
        );
    let quote_ids = snapshot.quote_ids();
    let snapshot = snapshot.with_quotes(tx.quotes(&quote_ids).await?);
    let supplier_ids = snapshot.supplier_ids();
    let snapshot = snapshot.with_suppliers(tx.suppliers(&supplier_ids).await?);
    Ok(snapshot)
}

fn log_failure(operation: &'static str, err: &AwardError) {
    match err.kind() {
        ErrorKind::Fatal => error!(operation, error = %err, "award operation failed"),
        _ => debug!(
            operation,
            code = err.code(),
            row = err.row(),
            error = %err,
            "award operation rejected"
        ),
    }
}
