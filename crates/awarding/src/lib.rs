//! RFQ line-item awarding domain (pure rules, no IO).
//!
//! This crate decides *what* an award batch means: which rows are valid, which
//! quote lines win or lose, what the RFQ and quote statuses become and who
//! must be told. Persistence, locking and delivery live in `sourcing-infra`.

pub mod error;
pub mod ids;
pub mod model;
pub mod normalizer;
pub mod notice;
pub mod plan;
pub mod request;
pub mod status;

pub use error::{AwardError, ErrorKind};
pub use ids::{
    AwardId, PurchaseOrderId, PurchaseOrderLineId, QuoteId, QuoteLineId, RfqId, RfqLineId,
    SupplierId,
};
pub use model::{
    Award, AwardStatus, PurchaseOrder, PurchaseOrderLine, Quote, QuoteLine, QuoteLineStatus,
    QuoteStatus, Rfq, RfqLine, RfqStatus, Supplier,
};
pub use normalizer::{CandidateLookup, CandidateSnapshot, normalize};
pub use notice::{AwardNotice, AwardOutcome, LinesAwarded, LinesAwardedToOther, PurchaseOrderRef};
pub use plan::{SupplierGroup, ensure_open_for_award, ensure_rescindable, group_by_supplier, losing_quote_lines};
pub use request::{AwardRequestRow, AwardedQuantity, NormalizedAward};
pub use status::{
    LineDisposition, all_lines_rejected, derive_quote_status, derive_rfq_status,
    reinstated_quote_status,
};
