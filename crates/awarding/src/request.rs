//! Raw award requests and their normalized form.

use serde::{Deserialize, Serialize};

use sourcing_core::ValueObject;

use crate::ids::{QuoteLineId, RfqLineId};
use crate::model::{Quote, QuoteLine, RfqLine, Supplier};

/// One requested `(rfq line, quote line)` selection as submitted by a buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardRequestRow {
    pub rfq_line_id: RfqLineId,
    pub quote_line_id: QuoteLineId,
    /// Defaults to the full requested quantity of the RFQ line.
    #[serde(default)]
    pub awarded_qty: Option<i64>,
}

/// Quantity granted by an award, always within `1..=rfq_line.quantity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AwardedQuantity(i64);

impl ValueObject for AwardedQuantity {}

impl AwardedQuantity {
    /// Resolve the quantity to award against `line`.
    ///
    /// Returns the offending value when it falls outside `1..=line.quantity`.
    pub fn resolve(requested: Option<i64>, line: &RfqLine) -> Result<Self, i64> {
        let qty = requested.unwrap_or(line.quantity);
        if qty < 1 || qty > line.quantity {
            return Err(qty);
        }
        Ok(Self(qty))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

/// A request row resolved against stored state and checked against every
/// per-row business rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAward {
    /// Position of the originating row in the request batch.
    pub row: usize,
    pub rfq_line: RfqLine,
    pub quote: Quote,
    pub quote_line: QuoteLine,
    pub supplier: Supplier,
    pub quantity: AwardedQuantity,
}
