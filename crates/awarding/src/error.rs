//! Award workflow error taxonomy.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ids::{AwardId, PurchaseOrderId, QuoteId, QuoteLineId, RfqId, RfqLineId};
use crate::model::{QuoteStatus, RfqStatus};

/// Broad class of an [`AwardError`], used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; the batch was rejected wholesale.
    Validation,
    /// Input was fine but business state does not allow the action.
    Conflict,
    NotFound,
    /// Storage or other unexpected failure; nothing was applied.
    Fatal,
}

/// Failure of an award commit or reversal.
///
/// Every variant is raised before the surrounding transaction commits, so an
/// error always means "no state changed". Row-level variants carry the index
/// of the offending request row.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AwardError {
    #[error("award batch is empty")]
    EmptyBatch,

    #[error("row {row}: rfq line {rfq_line_id} is not part of rfq {rfq_id}")]
    UnknownRfqLine {
        row: usize,
        rfq_id: RfqId,
        rfq_line_id: RfqLineId,
    },

    #[error("row {row}: rfq line {rfq_line_id} appears more than once in the batch")]
    DuplicateRfqLine { row: usize, rfq_line_id: RfqLineId },

    #[error("row {row}: quote line {quote_line_id} not found")]
    UnknownQuoteLine { row: usize, quote_line_id: QuoteLineId },

    #[error("row {row}: quote line {quote_line_id} does not answer rfq line {rfq_line_id}")]
    QuoteLineMismatch {
        row: usize,
        quote_line_id: QuoteLineId,
        rfq_line_id: RfqLineId,
    },

    #[error("row {row}: quote {quote_id} is not eligible for award (status {status})")]
    QuoteNotEligible {
        row: usize,
        quote_id: QuoteId,
        status: QuoteStatus,
    },

    #[error("row {row}: awarded quantity {requested} must be between 1 and {max}")]
    InvalidQuantity { row: usize, requested: i64, max: i64 },

    #[error("row {row}: supplier for quote {quote_id} not found")]
    SupplierMissing { row: usize, quote_id: QuoteId },

    #[error("rfq line {rfq_line_id} is already awarded")]
    AlreadyAwarded {
        rfq_line_id: RfqLineId,
        row: Option<usize>,
    },

    #[error("rfq {rfq_id} is {status} and cannot be awarded")]
    RfqNotOpenForAward { rfq_id: RfqId, status: RfqStatus },

    #[error("rfq {rfq_id} deadline {deadline} has passed")]
    DeadlinePassed {
        rfq_id: RfqId,
        deadline: DateTime<Utc>,
    },

    #[error("award {award_id} was converted to purchase order {purchase_order_id}; cancel the purchase order instead")]
    AlreadyConverted {
        award_id: AwardId,
        purchase_order_id: PurchaseOrderId,
    },

    #[error("award {award_id} is not active")]
    NotActive { award_id: AwardId },

    #[error("rfq {rfq_id} not found")]
    RfqNotFound { rfq_id: RfqId },

    #[error("award {award_id} not found")]
    AwardNotFound { award_id: AwardId },

    #[error("storage failure: {0}")]
    Storage(String),
}

impl AwardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AwardError::EmptyBatch
            | AwardError::UnknownRfqLine { .. }
            | AwardError::DuplicateRfqLine { .. }
            | AwardError::UnknownQuoteLine { .. }
            | AwardError::QuoteLineMismatch { .. }
            | AwardError::QuoteNotEligible { .. }
            | AwardError::InvalidQuantity { .. }
            | AwardError::SupplierMissing { .. } => ErrorKind::Validation,
            AwardError::AlreadyAwarded { .. }
            | AwardError::RfqNotOpenForAward { .. }
            | AwardError::DeadlinePassed { .. }
            | AwardError::AlreadyConverted { .. }
            | AwardError::NotActive { .. } => ErrorKind::Conflict,
            AwardError::RfqNotFound { .. } | AwardError::AwardNotFound { .. } => {
                ErrorKind::NotFound
            }
            AwardError::Storage(_) => ErrorKind::Fatal,
        }
    }

    /// Stable machine-readable code (snake_case).
    pub fn code(&self) -> &'static str {
        match self {
            AwardError::EmptyBatch => "empty_batch",
            AwardError::UnknownRfqLine { .. } => "unknown_rfq_line",
            AwardError::DuplicateRfqLine { .. } => "duplicate_rfq_line",
            AwardError::UnknownQuoteLine { .. } => "unknown_quote_line",
            AwardError::QuoteLineMismatch { .. } => "quote_line_mismatch",
            AwardError::QuoteNotEligible { .. } => "quote_not_eligible",
            AwardError::InvalidQuantity { .. } => "invalid_quantity",
            AwardError::SupplierMissing { .. } => "supplier_missing",
            AwardError::AlreadyAwarded { .. } => "already_awarded",
            AwardError::RfqNotOpenForAward { .. } => "rfq_not_open_for_award",
            AwardError::DeadlinePassed { .. } => "deadline_passed",
            AwardError::AlreadyConverted { .. } => "already_converted",
            AwardError::NotActive { .. } => "not_active",
            AwardError::RfqNotFound { .. } => "rfq_not_found",
            AwardError::AwardNotFound { .. } => "award_not_found",
            AwardError::Storage(_) => "storage_error",
        }
    }

    /// Index of the request row that caused the failure, when there is one.
    pub fn row(&self) -> Option<usize> {
        match self {
            AwardError::UnknownRfqLine { row, .. }
            | AwardError::DuplicateRfqLine { row, .. }
            | AwardError::UnknownQuoteLine { row, .. }
            | AwardError::QuoteLineMismatch { row, .. }
            | AwardError::QuoteNotEligible { row, .. }
            | AwardError::InvalidQuantity { row, .. }
            | AwardError::SupplierMissing { row, .. } => Some(*row),
            AwardError::AlreadyAwarded { row, .. } => *row,
            _ => None,
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_errors_are_validation_and_report_their_row() {
        let err = AwardError::InvalidQuantity {
            row: 3,
            requested: 0,
            max: 10,
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.row(), Some(3));
        assert_eq!(err.code(), "invalid_quantity");
    }

    #[test]
    fn already_awarded_is_a_conflict_not_a_validation_error() {
        let err = AwardError::AlreadyAwarded {
            rfq_line_id: RfqLineId::new(),
            row: Some(0),
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.row(), Some(0));
    }

    #[test]
    fn reversal_errors_have_no_row() {
        let err = AwardError::NotActive {
            award_id: AwardId::new(),
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.row(), None);
    }
}
