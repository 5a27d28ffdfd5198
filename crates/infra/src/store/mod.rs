//! Transactional storage for the award engine.
//!
//! The engine never talks to a database directly; it opens an
//! [`AwardTransaction`] from an [`AwardStore`] and performs every read and
//! write of one commit (or reversal) through it. Nothing is visible to other
//! transactions until [`AwardTransaction::commit`] succeeds, and dropping a
//! transaction without committing rolls it back.
//!
//! ## Locking
//!
//! Methods documented as *locking* take row locks that are held until the
//! transaction ends. Callers acquire them in a fixed order (RFQ row, then
//! awards, then quote lines) so that commit and reversal cannot deadlock.

use async_trait::async_trait;
use thiserror::Error;

use sourcing_awarding::{
    Award, AwardError, AwardId, PurchaseOrder, PurchaseOrderLineId, Quote, QuoteId, QuoteLine,
    QuoteLineId, QuoteLineStatus, QuoteStatus, Rfq, RfqId, RfqLine, RfqLineId, RfqStatus,
    Supplier, SupplierId,
};
use sourcing_core::TenantId;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryAwardStore;
pub use postgres::PgAwardStore;

/// Row-level visibility applied to quote data.
///
/// Supplier users only ever see their own quotes. Awarding compares quotes
/// across suppliers and reads with [`Visibility::Administrative`]; tenant
/// scoping still applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Supplier(SupplierId),
    Administrative,
}

impl Visibility {
    pub fn allows(&self, supplier_id: SupplierId) -> bool {
        match self {
            Visibility::Supplier(own) => *own == supplier_id,
            Visibility::Administrative => true,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write (e.g. a second active award
    /// for one RFQ line).
    #[error("unique violation: {0}")]
    UniqueViolation(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for AwardError {
    fn from(err: StoreError) -> Self {
        AwardError::storage(err.to_string())
    }
}

/// Entry point to transactional storage.
#[async_trait]
pub trait AwardStore: Send + Sync {
    /// Open a transaction scoped to `tenant_id`.
    async fn begin(&self, tenant_id: TenantId) -> Result<Box<dyn AwardTransaction>, StoreError>;

    /// Awards of an RFQ, active ones only, oldest first.
    async fn list_awards(&self, tenant_id: TenantId, rfq_id: RfqId)
    -> Result<Vec<Award>, StoreError>;

    /// Non-locking read of a single award.
    async fn get_award(
        &self,
        tenant_id: TenantId,
        award_id: AwardId,
    ) -> Result<Option<Award>, StoreError>;
}

/// One open, tenant-scoped unit of work.
#[async_trait]
pub trait AwardTransaction: Send {
    fn tenant_id(&self) -> TenantId;

    /// Locking read of the RFQ row.
    async fn lock_rfq(&mut self, rfq_id: RfqId) -> Result<Option<Rfq>, StoreError>;

    async fn rfq_lines(&mut self, rfq_id: RfqId) -> Result<Vec<RfqLine>, StoreError>;

    async fn quote_lines(
        &mut self,
        ids: &[QuoteLineId],
        visibility: Visibility,
    ) -> Result<Vec<QuoteLine>, StoreError>;

    /// Locking read of every quote line answering any of `rfq_line_ids`.
    async fn quote_lines_for_rfq_lines(
        &mut self,
        rfq_line_ids: &[RfqLineId],
    ) -> Result<Vec<QuoteLine>, StoreError>;

    async fn quote_lines_for_quotes(
        &mut self,
        quote_ids: &[QuoteId],
    ) -> Result<Vec<QuoteLine>, StoreError>;

    async fn quotes(&mut self, ids: &[QuoteId]) -> Result<Vec<Quote>, StoreError>;

    async fn suppliers(&mut self, ids: &[SupplierId]) -> Result<Vec<Supplier>, StoreError>;

    /// Locking read of the active awards on `rfq_line_ids`.
    async fn active_awards_for_lines(
        &mut self,
        rfq_line_ids: &[RfqLineId],
    ) -> Result<Vec<Award>, StoreError>;

    async fn active_awards_for_rfq(&mut self, rfq_id: RfqId) -> Result<Vec<Award>, StoreError>;

    /// Locking read of one award.
    async fn lock_award(&mut self, award_id: AwardId) -> Result<Option<Award>, StoreError>;

    /// Fails with [`StoreError::UniqueViolation`] when the RFQ line already has
    /// an active award.
    async fn insert_award(&mut self, award: &Award) -> Result<(), StoreError>;

    async fn delete_award(&mut self, award_id: AwardId) -> Result<(), StoreError>;

    async fn set_quote_line_status(
        &mut self,
        ids: &[QuoteLineId],
        status: QuoteLineStatus,
    ) -> Result<(), StoreError>;

    async fn set_quote_status(
        &mut self,
        quote_id: QuoteId,
        status: QuoteStatus,
    ) -> Result<(), StoreError>;

    async fn set_rfq_status(&mut self, rfq_id: RfqId, status: RfqStatus)
    -> Result<(), StoreError>;

    /// Next value of the purchase order number sequence.
    async fn next_purchase_order_number(&mut self) -> Result<i64, StoreError>;

    async fn insert_purchase_order(&mut self, order: &PurchaseOrder) -> Result<(), StoreError>;

    /// Attach the producing award to a purchase order line and reconcile its
    /// quantity to the awarded quantity.
    async fn link_purchase_order_line(
        &mut self,
        line_id: PurchaseOrderLineId,
        award_id: AwardId,
        quantity: i64,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
