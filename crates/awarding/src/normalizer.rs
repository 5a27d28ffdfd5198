//! Award request normalization.
//!
//! Turns raw `(rfq line, quote line, qty?)` rows into fully resolved
//! [`NormalizedAward`]s, or rejects the whole batch with the first row error.
//! Lookups go through [`CandidateLookup`] so the rules run against whatever the
//! caller loaded (a transaction snapshot in production, literals in tests).

use std::collections::{HashMap, HashSet};

use crate::error::AwardError;
use crate::ids::{QuoteId, QuoteLineId, RfqLineId, SupplierId};
use crate::model::{Quote, QuoteLine, QuoteLineStatus, Rfq, RfqLine, Supplier};
use crate::request::{AwardRequestRow, AwardedQuantity, NormalizedAward};

/// Read access to the entities a batch refers to.
///
/// Quote lines must be resolvable regardless of which supplier owns them:
/// awarding is an administrative action that looks across suppliers.
pub trait CandidateLookup {
    fn rfq_line(&self, id: RfqLineId) -> Option<&RfqLine>;
    fn quote_line(&self, id: QuoteLineId) -> Option<&QuoteLine>;
    fn quote(&self, id: QuoteId) -> Option<&Quote>;
    fn supplier(&self, id: SupplierId) -> Option<&Supplier>;
}

/// Owned, pre-loaded [`CandidateLookup`].
#[derive(Debug, Clone, Default)]
pub struct CandidateSnapshot {
    rfq_lines: HashMap<RfqLineId, RfqLine>,
    quote_lines: HashMap<QuoteLineId, QuoteLine>,
    quotes: HashMap<QuoteId, Quote>,
    suppliers: HashMap<SupplierId, Supplier>,
}

impl CandidateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rfq_lines(mut self, lines: impl IntoIterator<Item = RfqLine>) -> Self {
        self.rfq_lines.extend(lines.into_iter().map(|l| (l.id, l)));
        self
    }

    pub fn with_quote_lines(mut self, lines: impl IntoIterator<Item = QuoteLine>) -> Self {
        self.quote_lines.extend(lines.into_iter().map(|l| (l.id, l)));
        self
    }

    pub fn with_quotes(mut self, quotes: impl IntoIterator<Item = Quote>) -> Self {
        self.quotes.extend(quotes.into_iter().map(|q| (q.id, q)));
        self
    }

    pub fn with_suppliers(mut self, suppliers: impl IntoIterator<Item = Supplier>) -> Self {
        self.suppliers.extend(suppliers.into_iter().map(|s| (s.id, s)));
        self
    }

    /// Quote ids referenced by the loaded quote lines.
    pub fn quote_ids(&self) -> Vec<QuoteId> {
        let mut ids: Vec<QuoteId> = self.quote_lines.values().map(|l| l.quote_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Supplier ids referenced by the loaded quotes.
    pub fn supplier_ids(&self) -> Vec<SupplierId> {
        let mut ids: Vec<SupplierId> = self.quotes.values().map(|q| q.supplier_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

impl CandidateLookup for CandidateSnapshot {
    fn rfq_line(&self, id: RfqLineId) -> Option<&RfqLine> {
        self.rfq_lines.get(&id)
    }

    fn quote_line(&self, id: QuoteLineId) -> Option<&QuoteLine> {
        self.quote_lines.get(&id)
    }

    fn quote(&self, id: QuoteId) -> Option<&Quote> {
        self.quotes.get(&id)
    }

    fn supplier(&self, id: SupplierId) -> Option<&Supplier> {
        self.suppliers.get(&id)
    }
}

/// Validate and enrich an award batch for `rfq`.
///
/// Rows are checked in order; the first failing row fails the batch. Nothing
/// here mutates state, so a failed batch has no side effects.
pub fn normalize<L>(
    rfq: &Rfq,
    rows: &[AwardRequestRow],
    lookup: &L,
) -> Result<Vec<NormalizedAward>, AwardError>
where
    L: CandidateLookup + ?Sized,
{
    if rows.is_empty() {
        return Err(AwardError::EmptyBatch);
    }

    let mut seen: HashSet<RfqLineId> = HashSet::with_capacity(rows.len());
    let mut normalized = Vec::with_capacity(rows.len());

    for (row, request) in rows.iter().enumerate() {
        let rfq_line = lookup
            .rfq_line(request.rfq_line_id)
            .filter(|l| l.rfq_id == rfq.id)
            .ok_or(AwardError::UnknownRfqLine {
                row,
                rfq_id: rfq.id,
                rfq_line_id: request.rfq_line_id,
            })?;

        if !seen.insert(rfq_line.id) {
            return Err(AwardError::DuplicateRfqLine {
                row,
                rfq_line_id: rfq_line.id,
            });
        }

        let quote_line = lookup
            .quote_line(request.quote_line_id)
            .ok_or(AwardError::UnknownQuoteLine {
                row,
                quote_line_id: request.quote_line_id,
            })?;

        let mismatch = AwardError::QuoteLineMismatch {
            row,
            quote_line_id: quote_line.id,
            rfq_line_id: rfq_line.id,
        };
        let quote = match lookup.quote(quote_line.quote_id) {
            Some(q) if q.rfq_id == rfq.id && quote_line.rfq_line_id == rfq_line.id => q,
            _ => return Err(mismatch),
        };

        if !quote.is_eligible_for_award() {
            return Err(AwardError::QuoteNotEligible {
                row,
                quote_id: quote.id,
                status: quote.status,
            });
        }

        if quote_line.status == QuoteLineStatus::Awarded {
            return Err(AwardError::AlreadyAwarded {
                rfq_line_id: rfq_line.id,
                row: Some(row),
            });
        }

        let quantity = AwardedQuantity::resolve(request.awarded_qty, rfq_line).map_err(
            |requested| AwardError::InvalidQuantity {
                row,
                requested,
                max: rfq_line.quantity,
            },
        )?;

        let supplier = lookup
            .supplier(quote.supplier_id)
            .ok_or(AwardError::SupplierMissing {
                row,
                quote_id: quote.id,
            })?;

        normalized.push(NormalizedAward {
            row,
            rfq_line: rfq_line.clone(),
            quote: quote.clone(),
            quote_line: quote_line.clone(),
            supplier: supplier.clone(),
            quantity,
        });
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use sourcing_core::TenantId;

    use super::*;
    use crate::ids::RfqId;
    use crate::model::{QuoteStatus, RfqStatus};

    struct Fixture {
        rfq: Rfq,
        line: RfqLine,
        quote: Quote,
        quote_line: QuoteLine,
        supplier: Supplier,
    }

    impl Fixture {
        fn new() -> Self {
            let tenant_id = TenantId::new();
            let rfq = Rfq {
                id: RfqId::new(),
                tenant_id,
                status: RfqStatus::Open,
                deadline: None,
            };
            let line = RfqLine {
                id: RfqLineId::new(),
                rfq_id: rfq.id,
                quantity: 10,
            };
            let supplier = Supplier {
                id: SupplierId::new(),
                tenant_id,
                name: "Acme Castings".to_string(),
            };
            let quote = Quote {
                id: QuoteId::new(),
                tenant_id,
                rfq_id: rfq.id,
                supplier_id: supplier.id,
                status: QuoteStatus::Submitted,
                withdrawn_at: None,
            };
            let quote_line = QuoteLine {
                id: QuoteLineId::new(),
                quote_id: quote.id,
                rfq_line_id: line.id,
                status: QuoteLineStatus::Pending,
            };
            Self {
                rfq,
                line,
                quote,
                quote_line,
                supplier,
            }
        }

        fn snapshot(&self) -> CandidateSnapshot {
            CandidateSnapshot::new()
                .with_rfq_lines([self.line.clone()])
                .with_quotes([self.quote.clone()])
                .with_quote_lines([self.quote_line.clone()])
                .with_suppliers([self.supplier.clone()])
        }

        fn row(&self, qty: Option<i64>) -> AwardRequestRow {
            AwardRequestRow {
                rfq_line_id: self.line.id,
                quote_line_id: self.quote_line.id,
                awarded_qty: qty,
            }
        }
    }

    #[test]
    fn resolves_a_valid_row_with_default_quantity() {
        let f = Fixture::new();
        let out = normalize(&f.rfq, &[f.row(None)], &f.snapshot()).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].row, 0);
        assert_eq!(out[0].quantity.get(), 10);
        assert_eq!(out[0].supplier.id, f.supplier.id);
        assert_eq!(out[0].quote.id, f.quote.id);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let f = Fixture::new();
        assert_eq!(
            normalize(&f.rfq, &[], &f.snapshot()).unwrap_err(),
            AwardError::EmptyBatch
        );
    }

    #[test]
    fn rfq_line_from_another_rfq_is_unknown() {
        let f = Fixture::new();
        let mut other = f.rfq.clone();
        other.id = RfqId::new();

        let err = normalize(&other, &[f.row(None)], &f.snapshot()).unwrap_err();
        assert!(matches!(err, AwardError::UnknownRfqLine { row: 0, .. }));
    }

    #[test]
    fn missing_quote_line_is_unknown() {
        let f = Fixture::new();
        let mut row = f.row(None);
        row.quote_line_id = QuoteLineId::new();

        let err = normalize(&f.rfq, &[row], &f.snapshot()).unwrap_err();
        assert!(matches!(err, AwardError::UnknownQuoteLine { row: 0, .. }));
    }

    #[test]
    fn quote_line_for_a_different_rfq_line_is_a_mismatch() {
        let f = Fixture::new();
        let second = RfqLine {
            id: RfqLineId::new(),
            rfq_id: f.rfq.id,
            quantity: 5,
        };
        let snapshot = f.snapshot().with_rfq_lines([second.clone()]);
        let row = AwardRequestRow {
            rfq_line_id: second.id,
            quote_line_id: f.quote_line.id,
            awarded_qty: None,
        };

        let err = normalize(&f.rfq, &[row], &snapshot).unwrap_err();
        assert!(matches!(err, AwardError::QuoteLineMismatch { row: 0, .. }));
    }

    #[test]
    fn quote_on_another_rfq_is_a_mismatch() {
        let f = Fixture::new();
        let mut quote = f.quote.clone();
        quote.rfq_id = RfqId::new();
        let snapshot = f.snapshot().with_quotes([quote]);

        let err = normalize(&f.rfq, &[f.row(None)], &snapshot).unwrap_err();
        assert!(matches!(err, AwardError::QuoteLineMismatch { .. }));
    }

    #[test]
    fn withdrawn_quote_is_not_eligible() {
        let f = Fixture::new();
        let mut quote = f.quote.clone();
        quote.withdrawn_at = Some(Utc::now() - Duration::hours(1));
        let snapshot = f.snapshot().with_quotes([quote]);

        let err = normalize(&f.rfq, &[f.row(None)], &snapshot).unwrap_err();
        assert!(matches!(
            err,
            AwardError::QuoteNotEligible {
                status: QuoteStatus::Submitted,
                ..
            }
        ));
    }

    #[test]
    fn rejected_quote_is_not_eligible() {
        let f = Fixture::new();
        let mut quote = f.quote.clone();
        quote.status = QuoteStatus::Rejected;
        let snapshot = f.snapshot().with_quotes([quote]);

        let err = normalize(&f.rfq, &[f.row(None)], &snapshot).unwrap_err();
        assert!(matches!(err, AwardError::QuoteNotEligible { .. }));
    }

    #[test]
    fn already_awarded_quote_line_is_a_conflict() {
        let f = Fixture::new();
        let mut ql = f.quote_line.clone();
        ql.status = QuoteLineStatus::Awarded;
        let snapshot = f.snapshot().with_quote_lines([ql]);

        let err = normalize(&f.rfq, &[f.row(None)], &snapshot).unwrap_err();
        assert_eq!(
            err,
            AwardError::AlreadyAwarded {
                rfq_line_id: f.line.id,
                row: Some(0)
            }
        );
    }

    #[test]
    fn quantity_above_requested_is_invalid() {
        let f = Fixture::new();
        let err = normalize(&f.rfq, &[f.row(Some(11))], &f.snapshot()).unwrap_err();
        assert_eq!(
            err,
            AwardError::InvalidQuantity {
                row: 0,
                requested: 11,
                max: 10
            }
        );
    }

    #[test]
    fn missing_supplier_is_reported() {
        let f = Fixture::new();
        let snapshot = CandidateSnapshot::new()
            .with_rfq_lines([f.line.clone()])
            .with_quotes([f.quote.clone()])
            .with_quote_lines([f.quote_line.clone()]);

        let err = normalize(&f.rfq, &[f.row(None)], &snapshot).unwrap_err();
        assert!(matches!(err, AwardError::SupplierMissing { row: 0, .. }));
    }

    #[test]
    fn same_rfq_line_twice_is_rejected() {
        let f = Fixture::new();
        let err = normalize(&f.rfq, &[f.row(None), f.row(Some(2))], &f.snapshot()).unwrap_err();
        assert!(matches!(err, AwardError::DuplicateRfqLine { row: 1, .. }));
    }

    #[test]
    fn one_bad_row_fails_the_whole_batch() {
        let f = Fixture::new();
        let bad = AwardRequestRow {
            rfq_line_id: RfqLineId::new(),
            quote_line_id: QuoteLineId::new(),
            awarded_qty: None,
        };

        let err = normalize(&f.rfq, &[f.row(None), bad], &f.snapshot()).unwrap_err();
        assert_eq!(err.row(), Some(1));
    }
}
