//! Purchase order materialization.
//!
//! The award commit delegates PO creation to a [`PurchaseOrderMaterializer`]
//! that writes through the award transaction, so a failed commit never leaves
//! an orphaned purchase order behind.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use sourcing_awarding::{
    PurchaseOrder, PurchaseOrderId, PurchaseOrderLine, PurchaseOrderLineId, QuoteLineId, Rfq,
    RfqLineId, Supplier,
};
use sourcing_core::UserId;

use crate::store::{AwardTransaction, StoreError, Visibility};

pub const DEFAULT_NUMBER_PREFIX: &str = "PO";

/// A purchase order created for one supplier, with its lines keyed by the RFQ
/// line they fulfil.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedOrder {
    pub order: PurchaseOrder,
    pub lines_by_rfq_line: HashMap<RfqLineId, PurchaseOrderLine>,
}

#[async_trait]
pub trait PurchaseOrderMaterializer: Send + Sync {
    async fn create_from_quote_lines(
        &self,
        tx: &mut dyn AwardTransaction,
        rfq: &Rfq,
        supplier: &Supplier,
        quote_line_ids: &[QuoteLineId],
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<MaterializedOrder, StoreError>;
}

/// Creates draft purchase orders numbered `{prefix}-{sequence:06}`.
///
/// Each line starts at the full requested quantity of its RFQ line; the award
/// commit reconciles it to the awarded quantity.
#[derive(Debug, Clone)]
pub struct DraftOrderMaterializer {
    prefix: String,
}

impl DraftOrderMaterializer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn number(&self, sequence: i64) -> String {
        format!("{}-{:06}", self.prefix, sequence)
    }
}

impl Default for DraftOrderMaterializer {
    fn default() -> Self {
        Self::new(DEFAULT_NUMBER_PREFIX)
    }
}

#[async_trait]
impl PurchaseOrderMaterializer for DraftOrderMaterializer {
    async fn create_from_quote_lines(
        &self,
        tx: &mut dyn AwardTransaction,
        rfq: &Rfq,
        supplier: &Supplier,
        quote_line_ids: &[QuoteLineId],
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<MaterializedOrder, StoreError> {
        let quote_lines = tx
            .quote_lines(quote_line_ids, Visibility::Supplier(supplier.id))
            .await?;
        let quantities: HashMap<RfqLineId, i64> = tx
            .rfq_lines(rfq.id)
            .await?
            .into_iter()
            .map(|l| (l.id, l.quantity))
            .collect();

        let id = PurchaseOrderId::new();
        let mut lines = Vec::with_capacity(quote_line_ids.len());
        for quote_line_id in quote_line_ids {
            let quote_line = quote_lines
                .iter()
                .find(|ql| ql.id == *quote_line_id)
                .ok_or_else(|| {
                    StoreError::Backend(format!(
                        "quote line {quote_line_id} is not visible for supplier {}",
                        supplier.id
                    ))
                })?;
            let quantity = quantities.get(&quote_line.rfq_line_id).copied().ok_or_else(|| {
                StoreError::Backend(format!(
                    "rfq line {} not found on rfq {}",
                    quote_line.rfq_line_id, rfq.id
                ))
            })?;

            lines.push(PurchaseOrderLine {
                id: PurchaseOrderLineId::new(),
                purchase_order_id: id,
                line_no: lines.len() as u32 + 1,
                rfq_line_id: quote_line.rfq_line_id,
                quote_line_id: quote_line.id,
                quantity,
                award_id: None,
            });
        }

        let sequence = tx.next_purchase_order_number().await?;
        let order = PurchaseOrder {
            id,
            tenant_id: tx.tenant_id(),
            number: self.number(sequence),
            rfq_id: rfq.id,
            supplier_id: supplier.id,
            created_by,
            created_at: now,
            lines,
        };
        tx.insert_purchase_order(&order).await?;

        let lines_by_rfq_line = order
            .lines
            .iter()
            .map(|l| (l.rfq_line_id, l.clone()))
            .collect();
        Ok(MaterializedOrder {
            order,
            lines_by_rfq_line,
        })
    }
}
