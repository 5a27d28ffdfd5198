//! Sourcing entities as seen by the award engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sourcing_core::{DomainError, Entity, TenantId, UserId};

use crate::ids::{
    AwardId, PurchaseOrderId, PurchaseOrderLineId, QuoteId, QuoteLineId, RfqId, RfqLineId,
    SupplierId,
};

macro_rules! text_status {
    ($t:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $t {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($t::$variant => $text,)+
                }
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl core::str::FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($t::$variant),)+
                    other => Err(DomainError::validation(format!(
                        "unknown {}: '{}'",
                        $label, other
                    ))),
                }
            }
        }
    };
}

/// RFQ lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RfqStatus {
    Draft,
    Open,
    Closed,
    Awarded,
    Cancelled,
}

text_status!(RfqStatus, "rfq status", {
    Draft => "draft",
    Open => "open",
    Closed => "closed",
    Awarded => "awarded",
    Cancelled => "cancelled",
});

/// Supplier quote status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Submitted,
    Withdrawn,
    Rejected,
    Awarded,
}

text_status!(QuoteStatus, "quote status", {
    Submitted => "submitted",
    Withdrawn => "withdrawn",
    Rejected => "rejected",
    Awarded => "awarded",
});

/// Disposition of one priced quote line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteLineStatus {
    Pending,
    Awarded,
    Rejected,
}

text_status!(QuoteLineStatus, "quote line status", {
    Pending => "pending",
    Awarded => "awarded",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AwardStatus {
    Awarded,
    Rescinded,
}

text_status!(AwardStatus, "award status", {
    Awarded => "awarded",
    Rescinded => "rescinded",
});

/// A buyer's sourcing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rfq {
    pub id: RfqId,
    pub tenant_id: TenantId,
    pub status: RfqStatus,
    pub deadline: Option<DateTime<Utc>>,
}

/// One requested part/quantity. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfqLine {
    pub id: RfqLineId,
    pub rfq_id: RfqId,
    pub quantity: i64,
}

/// A supplier's submitted response to an RFQ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub tenant_id: TenantId,
    pub rfq_id: RfqId,
    pub supplier_id: SupplierId,
    pub status: QuoteStatus,
    /// Set when the supplier pulled the quote back, independent of `status`.
    pub withdrawn_at: Option<DateTime<Utc>>,
}

impl Quote {
    /// Only live submissions (or quotes that already won other lines) can win.
    pub fn is_eligible_for_award(&self) -> bool {
        matches!(self.status, QuoteStatus::Submitted | QuoteStatus::Awarded)
            && self.withdrawn_at.is_none()
    }
}

/// A supplier's priced response to one RFQ line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub id: QuoteLineId,
    pub quote_id: QuoteId,
    pub rfq_line_id: RfqLineId,
    pub status: QuoteLineStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub tenant_id: TenantId,
    pub name: String,
}

/// The binding decision that an RFQ line goes to one supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    pub id: AwardId,
    pub tenant_id: TenantId,
    pub rfq_id: RfqId,
    pub rfq_line_id: RfqLineId,
    pub supplier_id: SupplierId,
    pub quote_id: QuoteId,
    pub quote_line_id: QuoteLineId,
    pub awarded_quantity: i64,
    pub purchase_order_id: Option<PurchaseOrderId>,
    pub awarded_by: UserId,
    pub awarded_at: DateTime<Utc>,
    pub status: AwardStatus,
}

impl Award {
    pub fn is_active(&self) -> bool {
        self.status == AwardStatus::Awarded
    }

    /// Once a purchase order exists the award is the PO's business, not ours.
    pub fn is_converted(&self) -> bool {
        self.purchase_order_id.is_some()
    }
}

/// Purchase order materialized from one supplier's winning lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub tenant_id: TenantId,
    pub number: String,
    pub rfq_id: RfqId,
    pub supplier_id: SupplierId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<PurchaseOrderLine>,
}

impl PurchaseOrder {
    pub fn line_for(&self, rfq_line_id: RfqLineId) -> Option<&PurchaseOrderLine> {
        self.lines.iter().find(|l| l.rfq_line_id == rfq_line_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub id: PurchaseOrderLineId,
    pub purchase_order_id: PurchaseOrderId,
    pub line_no: u32,
    pub rfq_line_id: RfqLineId,
    pub quote_line_id: QuoteLineId,
    pub quantity: i64,
    /// Award that produced this line (set once the award row exists).
    pub award_id: Option<AwardId>,
}

macro_rules! impl_entity {
    ($($t:ty => $id:ty),+ $(,)?) => {
        $(
            impl Entity for $t {
                type Id = $id;

                fn id(&self) -> &Self::Id {
                    &self.id
                }
            }
        )+
    };
}

impl_entity!(
    Rfq => RfqId,
    RfqLine => RfqLineId,
    Quote => QuoteId,
    QuoteLine => QuoteLineId,
    Supplier => SupplierId,
    Award => AwardId,
    PurchaseOrder => PurchaseOrderId,
    PurchaseOrderLine => PurchaseOrderLineId,
);
