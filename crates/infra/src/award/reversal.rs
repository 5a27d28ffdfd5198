//! Award reversal (rescission of an unconverted award).

use std::collections::HashSet;

use tracing::instrument;

use sourcing_awarding::{
    Award, AwardError, AwardId, AwardStatus, QuoteId, QuoteLineStatus, RfqId, RfqStatus,
    all_lines_rejected, ensure_rescindable,
};

use crate::store::AwardTransaction;

use super::recompute::{recompute_quotes, recompute_rfq};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescindReceipt {
    /// The award as it was, marked rescinded. The row itself is gone.
    pub award: Award,
    pub rfq_status: RfqStatus,
}

/// Rescinds a single award inside a caller-owned transaction.
///
/// Locks the RFQ before the award, the same order a commit takes them in.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReversalExecutor;

impl ReversalExecutor {
    #[instrument(skip(self, tx), fields(tenant_id = %tx.tenant_id(), award_id = %award_id, rfq_id = %rfq_id))]
    pub async fn execute(
        &self,
        tx: &mut dyn AwardTransaction,
        award_id: AwardId,
        rfq_id: RfqId,
    ) -> Result<RescindReceipt, AwardError> {
        let rfq = tx
            .lock_rfq(rfq_id)
            .await?
            .ok_or(AwardError::RfqNotFound { rfq_id })?;
        let award = tx
            .lock_award(award_id)
            .await?
            .filter(|a| a.rfq_id == rfq.id)
            .ok_or(AwardError::AwardNotFound { award_id })?;

        // Re-check under the lock; a concurrent conversion or rescission wins.
        ensure_rescindable(&award)?;

        let lines = tx.quote_lines_for_rfq_lines(&[award.rfq_line_id]).await?;
        let quote_ids: Vec<QuoteId> = lines.iter().map(|l| l.quote_id).collect();

        // Read before the reset: afterwards every such quote has a pending line.
        let before = tx.quote_lines_for_quotes(&quote_ids).await?;
        let engine_rejected: HashSet<QuoteId> = quote_ids
            .iter()
            .copied()
            .filter(|id| {
                all_lines_rejected(
                    before
                        .iter()
                        .filter(|l| l.quote_id == *id)
                        .map(|l| l.status),
                )
            })
            .collect();

        let line_ids: Vec<_> = lines.iter().map(|l| l.id).collect();
        tx.set_quote_line_status(&line_ids, QuoteLineStatus::Pending)
            .await?;

        tx.delete_award(award.id).await?;

        recompute_quotes(tx, &quote_ids, &engine_rejected).await?;
        let rfq_status = recompute_rfq(tx, &rfq).await?;

        Ok(RescindReceipt {
            award: Award {
                status: AwardStatus::Rescinded,
                ..award
            },
            rfq_status,
        })
    }
}
