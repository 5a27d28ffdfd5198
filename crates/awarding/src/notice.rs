//! Supplier notices produced by a committed award batch.
//!
//! An [`AwardOutcome`] is computed inside the commit from what was actually
//! written, then turned into one [`AwardNotice`] per supplier after the
//! transaction commits. Building notices from committed rows (rather than
//! from the request) keeps what suppliers hear consistent with stored state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use sourcing_core::TenantId;
use sourcing_events::Event;

use crate::ids::{PurchaseOrderId, RfqId, RfqLineId, SupplierId};
use crate::model::{Award, PurchaseOrder};

pub const LINES_AWARDED: &str = "rfq.lines_awarded";
pub const LINES_AWARDED_TO_OTHER: &str = "rfq.lines_awarded_to_other";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderRef {
    pub id: PurchaseOrderId,
    pub number: String,
}

impl From<&PurchaseOrder> for PurchaseOrderRef {
    fn from(po: &PurchaseOrder) -> Self {
        Self {
            id: po.id,
            number: po.number.clone(),
        }
    }
}

/// A supplier won one or more lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinesAwarded {
    pub supplier_id: SupplierId,
    pub rfq_id: RfqId,
    pub rfq_line_ids: Vec<RfqLineId>,
    pub purchase_order: Option<PurchaseOrderRef>,
    pub occurred_at: DateTime<Utc>,
}

/// A supplier quoted lines that went to someone else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinesAwardedToOther {
    pub supplier_id: SupplierId,
    pub rfq_id: RfqId,
    pub rfq_line_ids: Vec<RfqLineId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AwardNotice {
    LinesAwarded(LinesAwarded),
    LinesAwardedToOther(LinesAwardedToOther),
}

impl AwardNotice {
    pub fn supplier_id(&self) -> SupplierId {
        match self {
            AwardNotice::LinesAwarded(n) => n.supplier_id,
            AwardNotice::LinesAwardedToOther(n) => n.supplier_id,
        }
    }

    pub fn rfq_id(&self) -> RfqId {
        match self {
            AwardNotice::LinesAwarded(n) => n.rfq_id,
            AwardNotice::LinesAwardedToOther(n) => n.rfq_id,
        }
    }

    pub fn rfq_line_ids(&self) -> &[RfqLineId] {
        match self {
            AwardNotice::LinesAwarded(n) => &n.rfq_line_ids,
            AwardNotice::LinesAwardedToOther(n) => &n.rfq_line_ids,
        }
    }

    pub fn title(&self) -> String {
        match self {
            AwardNotice::LinesAwarded(_) => "RFQ lines awarded".to_string(),
            AwardNotice::LinesAwardedToOther(_) => {
                "RFQ lines awarded to another supplier".to_string()
            }
        }
    }

    pub fn body(&self) -> String {
        let count = self.rfq_line_ids().len();
        let lines = if count == 1 { "line" } else { "lines" };
        match self {
            AwardNotice::LinesAwarded(n) => match &n.purchase_order {
                Some(po) => format!(
                    "{count} {lines} on RFQ {} awarded to you. Purchase order {} was created.",
                    n.rfq_id, po.number
                ),
                None => format!("{count} {lines} on RFQ {} awarded to you.", n.rfq_id),
            },
            AwardNotice::LinesAwardedToOther(n) => format!(
                "{count} {lines} you quoted on RFQ {} were awarded to another supplier.",
                n.rfq_id
            ),
        }
    }

    /// Structured payload handed to the transport alongside title and body.
    pub fn metadata(&self) -> serde_json::Value {
        match self {
            AwardNotice::LinesAwarded(n) => json!({
                "rfq_id": n.rfq_id,
                "rfq_line_ids": n.rfq_line_ids,
                "purchase_order_id": n.purchase_order.as_ref().map(|po| po.id),
                "purchase_order_number": n.purchase_order.as_ref().map(|po| po.number.clone()),
            }),
            AwardNotice::LinesAwardedToOther(n) => json!({
                "rfq_id": n.rfq_id,
                "rfq_line_ids": n.rfq_line_ids,
            }),
        }
    }
}

impl Event for AwardNotice {
    fn event_type(&self) -> &'static str {
        match self {
            AwardNotice::LinesAwarded(_) => LINES_AWARDED,
            AwardNotice::LinesAwardedToOther(_) => LINES_AWARDED_TO_OTHER,
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AwardNotice::LinesAwarded(n) => n.occurred_at,
            AwardNotice::LinesAwardedToOther(n) => n.occurred_at,
        }
    }
}

/// Winners and losers of one committed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardOutcome {
    pub tenant_id: TenantId,
    pub rfq_id: RfqId,
    pub winners: Vec<LinesAwarded>,
    pub losers: Vec<LinesAwardedToOther>,
    pub occurred_at: DateTime<Utc>,
}

impl AwardOutcome {
    /// Build the outcome from the committed awards, the purchase orders they
    /// were converted into, and the `(supplier, rfq line)` pairs that were
    /// rejected.
    ///
    /// A supplier that won anything in this batch is not also told it lost.
    pub fn build(
        tenant_id: TenantId,
        rfq_id: RfqId,
        awards: &[Award],
        purchase_orders: &[PurchaseOrder],
        rejected: impl IntoIterator<Item = (SupplierId, RfqLineId)>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        let mut winners: Vec<LinesAwarded> = Vec::new();
        for award in awards {
            match winners.iter_mut().find(|w| w.supplier_id == award.supplier_id) {
                Some(w) => w.rfq_line_ids.push(award.rfq_line_id),
                None => winners.push(LinesAwarded {
                    supplier_id: award.supplier_id,
                    rfq_id,
                    rfq_line_ids: vec![award.rfq_line_id],
                    purchase_order: award.purchase_order_id.and_then(|id| {
                        purchase_orders
                            .iter()
                            .find(|po| po.id == id)
                            .map(PurchaseOrderRef::from)
                    }),
                    occurred_at,
                }),
            }
        }

        let mut losers: Vec<LinesAwardedToOther> = Vec::new();
        for (supplier_id, rfq_line_id) in rejected {
            if winners.iter().any(|w| w.supplier_id == supplier_id) {
                continue;
            }
            match losers.iter_mut().find(|l| l.supplier_id == supplier_id) {
                Some(l) => l.rfq_line_ids.push(rfq_line_id),
                None => losers.push(LinesAwardedToOther {
                    supplier_id,
                    rfq_id,
                    rfq_line_ids: vec![rfq_line_id],
                    occurred_at,
                }),
            }
        }

        for ids in winners
            .iter_mut()
            .map(|w| &mut w.rfq_line_ids)
            .chain(losers.iter_mut().map(|l| &mut l.rfq_line_ids))
        {
            ids.sort();
            ids.dedup();
        }

        Self {
            tenant_id,
            rfq_id,
            winners,
            losers,
            occurred_at,
        }
    }

    /// Winner notices first, then loser notices.
    pub fn notices(&self) -> impl Iterator<Item = AwardNotice> + '_ {
        self.winners
            .iter()
            .cloned()
            .map(AwardNotice::LinesAwarded)
            .chain(self.losers.iter().cloned().map(AwardNotice::LinesAwardedToOther))
    }

    pub fn is_empty(&self) -> bool {
        self.winners.is_empty() && self.losers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use sourcing_core::UserId;

    use super::*;
    use crate::ids::{AwardId, QuoteId, QuoteLineId};
    use crate::model::AwardStatus;

    fn award(supplier_id: SupplierId, rfq_id: RfqId, po: Option<PurchaseOrderId>) -> Award {
        Award {
            id: AwardId::new(),
            tenant_id: TenantId::new(),
            rfq_id,
            rfq_line_id: RfqLineId::new(),
            supplier_id,
            quote_id: QuoteId::new(),
            quote_line_id: QuoteLineId::new(),
            awarded_quantity: 1,
            purchase_order_id: po,
            awarded_by: UserId::new(),
            awarded_at: Utc::now(),
            status: AwardStatus::Awarded,
        }
    }

    fn order(id: PurchaseOrderId, rfq_id: RfqId, supplier_id: SupplierId) -> PurchaseOrder {
        PurchaseOrder {
            id,
            tenant_id: TenantId::new(),
            number: "PO-000001".to_string(),
            rfq_id,
            supplier_id,
            created_by: UserId::new(),
            created_at: Utc::now(),
            lines: Vec::new(),
        }
    }

    #[test]
    fn winner_notice_carries_the_purchase_order() {
        let rfq_id = RfqId::new();
        let supplier = SupplierId::new();
        let po_id = PurchaseOrderId::new();
        let a1 = award(supplier, rfq_id, Some(po_id));
        let a2 = award(supplier, rfq_id, Some(po_id));

        let outcome = AwardOutcome::build(
            TenantId::new(),
            rfq_id,
            &[a1.clone(), a2.clone()],
            &[order(po_id, rfq_id, supplier)],
            Vec::<(SupplierId, RfqLineId)>::new(),
            Utc::now(),
        );

        assert_eq!(outcome.winners.len(), 1);
        let mut expected = vec![a1.rfq_line_id, a2.rfq_line_id];
        expected.sort();
        assert_eq!(outcome.winners[0].rfq_line_ids, expected);
        assert_eq!(
            outcome.winners[0].purchase_order.as_ref().map(|po| po.id),
            Some(po_id)
        );
    }

    #[test]
    fn losers_are_grouped_and_deduplicated() {
        let rfq_id = RfqId::new();
        let winner = SupplierId::new();
        let loser = SupplierId::new();
        let won = award(winner, rfq_id, None);
        let line = won.rfq_line_id;

        let outcome = AwardOutcome::build(
            TenantId::new(),
            rfq_id,
            &[won],
            &[],
            [(loser, line), (loser, line)],
            Utc::now(),
        );

        assert_eq!(outcome.losers.len(), 1);
        assert_eq!(outcome.losers[0].supplier_id, loser);
        assert_eq!(outcome.losers[0].rfq_line_ids, vec![line]);
    }

    #[test]
    fn a_supplier_that_won_in_the_batch_is_not_told_it_lost() {
        let rfq_id = RfqId::new();
        let supplier = SupplierId::new();
        let won = award(supplier, rfq_id, None);

        let outcome = AwardOutcome::build(
            TenantId::new(),
            rfq_id,
            &[won],
            &[],
            [(supplier, RfqLineId::new())],
            Utc::now(),
        );

        assert!(outcome.losers.is_empty());
        assert_eq!(outcome.notices().count(), 1);
    }

    #[test]
    fn notice_event_types_are_stable() {
        let rfq_id = RfqId::new();
        let outcome = AwardOutcome::build(
            TenantId::new(),
            rfq_id,
            &[award(SupplierId::new(), rfq_id, None)],
            &[],
            [(SupplierId::new(), RfqLineId::new())],
            Utc::now(),
        );

        let types: Vec<&str> = outcome.notices().map(|n| n.event_type()).collect();
        assert_eq!(types, vec![LINES_AWARDED, LINES_AWARDED_TO_OTHER]);
    }

    #[test]
    fn body_mentions_the_purchase_order_number() {
        let notice = AwardNotice::LinesAwarded(LinesAwarded {
            supplier_id: SupplierId::new(),
            rfq_id: RfqId::new(),
            rfq_line_ids: vec![RfqLineId::new()],
            purchase_order: Some(PurchaseOrderRef {
                id: PurchaseOrderId::new(),
                number: "PO-000042".to_string(),
            }),
            occurred_at: Utc::now(),
        });

        assert!(notice.body().contains("PO-000042"));
        assert!(notice.body().starts_with("1 line "));
        assert_eq!(notice.metadata()["purchase_order_number"], "PO-000042");
    }
}
