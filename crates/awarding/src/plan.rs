//! Commit and reversal planning rules.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::AwardError;
use crate::ids::{QuoteLineId, RfqLineId};
use crate::model::{Award, QuoteLine, Rfq, RfqStatus, Supplier};
use crate::request::NormalizedAward;

/// RFQ-level preconditions for a commit, checked under the RFQ row lock.
pub fn ensure_open_for_award(rfq: &Rfq, now: DateTime<Utc>) -> Result<(), AwardError> {
    if matches!(
        rfq.status,
        RfqStatus::Cancelled | RfqStatus::Awarded | RfqStatus::Closed
    ) {
        return Err(AwardError::RfqNotOpenForAward {
            rfq_id: rfq.id,
            status: rfq.status,
        });
    }

    if let Some(deadline) = rfq.deadline {
        if deadline < now {
            return Err(AwardError::DeadlinePassed {
                rfq_id: rfq.id,
                deadline,
            });
        }
    }

    Ok(())
}

/// Award preconditions, checked once on read and again under the award lock.
pub fn ensure_rescindable(award: &Award) -> Result<(), AwardError> {
    if !award.is_active() {
        return Err(AwardError::NotActive { award_id: award.id });
    }
    if let Some(purchase_order_id) = award.purchase_order_id {
        return Err(AwardError::AlreadyConverted {
            award_id: award.id,
            purchase_order_id,
        });
    }
    Ok(())
}

/// Winning rows of one supplier within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplierGroup {
    pub supplier: Supplier,
    pub rows: Vec<NormalizedAward>,
}

impl SupplierGroup {
    pub fn quote_line_ids(&self) -> Vec<QuoteLineId> {
        self.rows.iter().map(|r| r.quote_line.id).collect()
    }

    pub fn rfq_line_ids(&self) -> Vec<RfqLineId> {
        self.rows.iter().map(|r| r.rfq_line.id).collect()
    }
}

/// Group rows by winning supplier.
///
/// Groups appear in the order their supplier first appears in the batch and
/// keep their rows in batch order, so purchase order numbering is stable for a
/// given request.
pub fn group_by_supplier(rows: Vec<NormalizedAward>) -> Vec<SupplierGroup> {
    let mut groups: Vec<SupplierGroup> = Vec::new();
    for row in rows {
        match groups.iter_mut().find(|g| g.supplier.id == row.supplier.id) {
            Some(group) => group.rows.push(row),
            None => groups.push(SupplierGroup {
                supplier: row.supplier.clone(),
                rows: vec![row],
            }),
        }
    }
    groups
}

/// Quote lines that lose because another quote line won their RFQ line.
///
/// `candidates` is every quote line answering any RFQ line in the batch. A
/// line is a loser regardless of its current status or its quote's status.
pub fn losing_quote_lines<'a>(
    candidates: &'a [QuoteLine],
    winners: &[NormalizedAward],
) -> Vec<&'a QuoteLine> {
    let lines: HashSet<RfqLineId> = winners.iter().map(|w| w.rfq_line.id).collect();
    let won: HashSet<QuoteLineId> = winners.iter().map(|w| w.quote_line.id).collect();

    candidates
        .iter()
        .filter(|ql| lines.contains(&ql.rfq_line_id) && !won.contains(&ql.id))
        .collect()
}
