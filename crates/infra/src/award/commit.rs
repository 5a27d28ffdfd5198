//! Award commit: the transactional core of the engine.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use sourcing_awarding::{
    Award, AwardError, AwardId, AwardOutcome, AwardStatus, NormalizedAward, PurchaseOrder,
    QuoteId, QuoteLine, QuoteLineStatus, Rfq, RfqId, RfqLineId, RfqStatus, SupplierId,
    ensure_open_for_award, group_by_supplier, losing_quote_lines,
};
use sourcing_core::UserId;

use crate::purchase_order::PurchaseOrderMaterializer;
use crate::store::{AwardTransaction, StoreError};

use super::recompute::{recompute_quotes, recompute_rfq};

/// A normalized batch ready to be written.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub rfq: Rfq,
    pub rows: Vec<NormalizedAward>,
    pub actor: UserId,
    pub create_purchase_orders: bool,
    pub now: DateTime<Utc>,
}

/// What a successful commit wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub awards: Vec<Award>,
    pub purchase_orders: Vec<PurchaseOrder>,
    pub rfq_status: RfqStatus,
    pub outcome: AwardOutcome,
}

/// Writes an award batch inside a caller-owned transaction.
///
/// The executor never commits; on error the caller drops the transaction and
/// every write made here is rolled back with it.
#[derive(Clone)]
pub struct CommitExecutor {
    materializer: Arc<dyn PurchaseOrderMaterializer>,
}

impl CommitExecutor {
    pub fn new(materializer: Arc<dyn PurchaseOrderMaterializer>) -> Self {
        Self { materializer }
    }

    #[instrument(
        skip(self, tx, request),
        fields(
            tenant_id = %tx.tenant_id(),
            rfq_id = %request.rfq.id,
            rows = request.rows.len(),
            create_purchase_orders = request.create_purchase_orders
        )
    )]
    pub async fn execute(
        &self,
        tx: &mut dyn AwardTransaction,
        request: CommitRequest,
    ) -> Result<CommitReceipt, AwardError> {
        let CommitRequest {
            rfq,
            rows,
            actor,
            create_purchase_orders,
            now,
        } = request;

        ensure_open_for_award(&rfq, now)?;

        let requested: Vec<(usize, RfqLineId)> =
            rows.iter().map(|r| (r.row, r.rfq_line.id)).collect();
        ensure_lines_unawarded(tx, rfq.id, &requested).await?;
        let line_ids: Vec<RfqLineId> = requested.iter().map(|(_, id)| *id).collect();

        let candidates = tx.quote_lines_for_rfq_lines(&line_ids).await?;
        let losers: Vec<QuoteLine> = losing_quote_lines(&candidates, &rows)
            .into_iter()
            .cloned()
            .collect();

        let mut awards = Vec::with_capacity(rows.len());
        let mut purchase_orders = Vec::new();

        for group in group_by_supplier(rows) {
            let mut materialized = if create_purchase_orders {
                Some(
                    self.materializer
                        .create_from_quote_lines(
                            &mut *tx,
                            &rfq,
                            &group.supplier,
                            &group.quote_line_ids(),
                            actor,
                            now,
                        )
                        .await?,
                )
            } else {
                None
            };

            for row in &group.rows {
                let award = Award {
                    id: AwardId::new(),
                    tenant_id: tx.tenant_id(),
                    rfq_id: rfq.id,
                    rfq_line_id: row.rfq_line.id,
                    supplier_id: row.supplier.id,
                    quote_id: row.quote.id,
                    quote_line_id: row.quote_line.id,
                    awarded_quantity: row.quantity.get(),
                    purchase_order_id: materialized.as_ref().map(|m| m.order.id),
                    awarded_by: actor,
                    awarded_at: now,
                    status: AwardStatus::Awarded,
                };

                tx.insert_award(&award).await.map_err(|e| match e {
                    StoreError::UniqueViolation(_) => AwardError::AlreadyAwarded {
                        rfq_line_id: row.rfq_line.id,
                        row: Some(row.row),
                    },
                    other => other.into(),
                })?;

                if let Some(m) = materialized.as_mut() {
                    let po_line = m.lines_by_rfq_line.get(&row.rfq_line.id).map(|l| l.id);
                    if let Some(line_id) = po_line {
                        tx.link_purchase_order_line(line_id, award.id, award.awarded_quantity)
                            .await?;
                        for line in m.order.lines.iter_mut().filter(|l| l.id == line_id) {
                            line.award_id = Some(award.id);
                            line.quantity = award.awarded_quantity;
                        }
                    }
                }

                tx.set_quote_line_status(&[row.quote_line.id], QuoteLineStatus::Awarded)
                    .await?;
                awards.push(award);
            }

            if let Some(m) = materialized {
                purchase_orders.push(m.order);
            }
        }

        let loser_ids: Vec<_> = losers.iter().map(|l| l.id).collect();
        tx.set_quote_line_status(&loser_ids, QuoteLineStatus::Rejected)
            .await?;

        let affected: Vec<QuoteId> = awards
            .iter()
            .map(|a| a.quote_id)
            .chain(losers.iter().map(|l| l.quote_id))
            .collect();
        let quotes = recompute_quotes(tx, &affected, &HashSet::new()).await?;
        let rfq_status = recompute_rfq(tx, &rfq).await?;

        let supplier_of: HashMap<QuoteId, SupplierId> =
            quotes.iter().map(|q| (q.id, q.supplier_id)).collect();
        let rejected = losers
            .iter()
            .filter_map(|l| supplier_of.get(&l.quote_id).map(|s| (*s, l.rfq_line_id)));
        let outcome = AwardOutcome::build(
            tx.tenant_id(),
            rfq.id,
            &awards,
            &purchase_orders,
            rejected,
            now,
        );

        Ok(CommitReceipt {
            awards,
            purchase_orders,
            rfq_status,
            outcome,
        })
    }
}

/// Fail with `AlreadyAwarded` if any requested line of `rfq_id` carries an
/// active award. `requested` pairs each batch row index with its line.
///
/// Locking read: holders of these rows serialize on the lines being awarded.
/// Lines of other RFQs are ignored and left to the normalizer.
pub(crate) async fn ensure_lines_unawarded(
    tx: &mut dyn AwardTransaction,
    rfq_id: RfqId,
    requested: &[(usize, RfqLineId)],
) -> Result<(), AwardError> {
    let line_ids: Vec<RfqLineId> = requested.iter().map(|(_, id)| *id).collect();
    let existing = tx.active_awards_for_lines(&line_ids).await?;

    let Some(existing) = existing.iter().find(|a| a.rfq_id == rfq_id) else {
        return Ok(());
    };
    let row = requested
        .iter()
        .find(|(_, id)| *id == existing.rfq_line_id)
        .map(|(row, _)| *row);
    debug!(rfq_line_id = %existing.rfq_line_id, award_id = %existing.id, "line already awarded");
    Err(AwardError::AlreadyAwarded {
        rfq_line_id: existing.rfq_line_id,
        row,
    })
}
