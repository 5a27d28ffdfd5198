use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use sourcing_awarding::{
    Award, AwardId, PurchaseOrder, PurchaseOrderId, PurchaseOrderLineId, Quote, QuoteId,
    QuoteLine, QuoteLineId, QuoteLineStatus, QuoteStatus, Rfq, RfqId, RfqLine, RfqLineId,
    RfqStatus, Supplier, SupplierId,
};
use sourcing_core::TenantId;

use super::{AwardStore, AwardTransaction, StoreError, Visibility};

#[derive(Debug, Clone, Default)]
struct Tables {
    rfqs: HashMap<RfqId, Rfq>,
    rfq_lines: HashMap<RfqLineId, RfqLine>,
    quotes: HashMap<QuoteId, Quote>,
    quote_lines: HashMap<QuoteLineId, QuoteLine>,
    suppliers: HashMap<SupplierId, Supplier>,
    awards: HashMap<AwardId, Award>,
    purchase_orders: HashMap<PurchaseOrderId, PurchaseOrder>,
    po_sequence: i64,
}

impl Tables {
    fn quote_in_tenant(&self, tenant_id: TenantId, quote_id: QuoteId) -> Option<&Quote> {
        self.quotes
            .get(&quote_id)
            .filter(|q| q.tenant_id == tenant_id)
    }
}

/// In-memory award store.
///
/// Intended for tests/dev. A transaction holds the store lock for its whole
/// lifetime and works on a private copy of the tables, so transactions are
/// fully serialized and an uncommitted transaction leaves no trace.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAwardStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryAwardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_rfq(&self, rfq: Rfq, lines: impl IntoIterator<Item = RfqLine>) {
        let mut tables = self.tables.lock().await;
        tables.rfq_lines.extend(lines.into_iter().map(|l| (l.id, l)));
        tables.rfqs.insert(rfq.id, rfq);
    }

    pub async fn seed_supplier(&self, supplier: Supplier) {
        self.tables
            .lock()
            .await
            .suppliers
            .insert(supplier.id, supplier);
    }

    pub async fn seed_quote(&self, quote: Quote, lines: impl IntoIterator<Item = QuoteLine>) {
        let mut tables = self.tables.lock().await;
        tables.quote_lines.extend(lines.into_iter().map(|l| (l.id, l)));
        tables.quotes.insert(quote.id, quote);
    }

    pub async fn rfq(&self, rfq_id: RfqId) -> Option<Rfq> {
        self.tables.lock().await.rfqs.get(&rfq_id).cloned()
    }

    pub async fn quote(&self, quote_id: QuoteId) -> Option<Quote> {
        self.tables.lock().await.quotes.get(&quote_id).cloned()
    }

    pub async fn quote_line(&self, quote_line_id: QuoteLineId) -> Option<QuoteLine> {
        self.tables
            .lock()
            .await
            .quote_lines
            .get(&quote_line_id)
            .cloned()
    }

    pub async fn purchase_orders(&self, tenant_id: TenantId, rfq_id: RfqId) -> Vec<PurchaseOrder> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<PurchaseOrder> = tables
            .purchase_orders
            .values()
            .filter(|po| po.tenant_id == tenant_id && po.rfq_id == rfq_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.number.cmp(&b.number));
        orders
    }

    /// Every award row on `rfq_line_id`, regardless of status.
    pub async fn awards_on_line(&self, rfq_line_id: RfqLineId) -> Vec<Award> {
        self.tables
            .lock()
            .await
            .awards
            .values()
            .filter(|a| a.rfq_line_id == rfq_line_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AwardStore for InMemoryAwardStore {
    async fn begin(&self, tenant_id: TenantId) -> Result<Box<dyn AwardTransaction>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let work = (*guard).clone();
        Ok(Box::new(InMemoryTransaction {
            tenant_id,
            guard,
            work,
        }))
    }

    async fn list_awards(
        &self,
        tenant_id: TenantId,
        rfq_id: RfqId,
    ) -> Result<Vec<Award>, StoreError> {
        let tables = self.tables.lock().await;
        let mut awards: Vec<Award> = tables
            .awards
            .values()
            .filter(|a| a.tenant_id == tenant_id && a.rfq_id == rfq_id && a.is_active())
            .cloned()
            .collect();
        awards.sort_by_key(|a| (a.awarded_at, a.id));
        Ok(awards)
    }

    async fn get_award(
        &self,
        tenant_id: TenantId,
        award_id: AwardId,
    ) -> Result<Option<Award>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .awards
            .get(&award_id)
            .filter(|a| a.tenant_id == tenant_id)
            .cloned())
    }
}

struct InMemoryTransaction {
    tenant_id: TenantId,
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

impl InMemoryTransaction {
    fn check_tenant(&self, tenant_id: TenantId, what: &str) -> Result<(), StoreError> {
        if tenant_id != self.tenant_id {
            return Err(StoreError::TenantIsolation(format!(
                "{what} belongs to tenant {tenant_id}, transaction is scoped to {}",
                self.tenant_id
            )));
        }
        Ok(())
    }

    fn active_awards(&self) -> impl Iterator<Item = &Award> {
        self.work
            .awards
            .values()
            .filter(move |a| a.tenant_id == self.tenant_id && a.is_active())
    }
}

#[async_trait]
impl AwardTransaction for InMemoryTransaction {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    async fn lock_rfq(&mut self, rfq_id: RfqId) -> Result<Option<Rfq>, StoreError> {
        Ok(self
            .work
            .rfqs
            .get(&rfq_id)
            .filter(|r| r.tenant_id == self.tenant_id)
            .cloned())
    }

    async fn rfq_lines(&mut self, rfq_id: RfqId) -> Result<Vec<RfqLine>, StoreError> {
        if self.lock_rfq(rfq_id).await?.is_none() {
            return Ok(Vec::new());
        }
        let mut lines: Vec<RfqLine> = self
            .work
            .rfq_lines
            .values()
            .filter(|l| l.rfq_id == rfq_id)
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.id);
        Ok(lines)
    }

    async fn quote_lines(
        &mut self,
        ids: &[QuoteLineId],
        visibility: Visibility,
    ) -> Result<Vec<QuoteLine>, StoreError> {
        let tables = &self.work;
        Ok(ids
            .iter()
            .filter_map(|id| tables.quote_lines.get(id))
            .filter(|ql| {
                tables
                    .quote_in_tenant(self.tenant_id, ql.quote_id)
                    .is_some_and(|q| visibility.allows(q.supplier_id))
            })
            .cloned()
            .collect())
    }

    async fn quote_lines_for_rfq_lines(
        &mut self,
        rfq_line_ids: &[RfqLineId],
    ) -> Result<Vec<QuoteLine>, StoreError> {
        let tables = &self.work;
        let mut lines: Vec<QuoteLine> = tables
            .quote_lines
            .values()
            .filter(|ql| rfq_line_ids.contains(&ql.rfq_line_id))
            .filter(|ql| tables.quote_in_tenant(self.tenant_id, ql.quote_id).is_some())
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.id);
        Ok(lines)
    }

    async fn quote_lines_for_quotes(
        &mut self,
        quote_ids: &[QuoteId],
    ) -> Result<Vec<QuoteLine>, StoreError> {
        let tables = &self.work;
        let mut lines: Vec<QuoteLine> = tables
            .quote_lines
            .values()
            .filter(|ql| quote_ids.contains(&ql.quote_id))
            .filter(|ql| tables.quote_in_tenant(self.tenant_id, ql.quote_id).is_some())
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.id);
        Ok(lines)
    }

    async fn quotes(&mut self, ids: &[QuoteId]) -> Result<Vec<Quote>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.work.quote_in_tenant(self.tenant_id, *id))
            .cloned()
            .collect())
    }

    async fn suppliers(&mut self, ids: &[SupplierId]) -> Result<Vec<Supplier>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.work.suppliers.get(id))
            .filter(|s| s.tenant_id == self.tenant_id)
            .cloned()
            .collect())
    }

    async fn active_awards_for_lines(
        &mut self,
        rfq_line_ids: &[RfqLineId],
    ) -> Result<Vec<Award>, StoreError> {
        Ok(self
            .active_awards()
            .filter(|a| rfq_line_ids.contains(&a.rfq_line_id))
            .cloned()
            .collect())
    }

    async fn active_awards_for_rfq(&mut self, rfq_id: RfqId) -> Result<Vec<Award>, StoreError> {
        Ok(self
            .active_awards()
            .filter(|a| a.rfq_id == rfq_id)
            .cloned()
            .collect())
    }

    async fn lock_award(&mut self, award_id: AwardId) -> Result<Option<Award>, StoreError> {
        Ok(self
            .work
            .awards
            .get(&award_id)
            .filter(|a| a.tenant_id == self.tenant_id)
            .cloned())
    }

    async fn insert_award(&mut self, award: &Award) -> Result<(), StoreError> {
        self.check_tenant(award.tenant_id, "award")?;
        if award.is_active()
            && self
                .active_awards()
                .any(|a| a.rfq_line_id == award.rfq_line_id)
        {
            return Err(StoreError::UniqueViolation(format!(
                "rfq line {} already has an active award",
                award.rfq_line_id
            )));
        }
        self.work.awards.insert(award.id, award.clone());
        Ok(())
    }

    async fn delete_award(&mut self, award_id: AwardId) -> Result<(), StoreError> {
        if self.lock_award(award_id).await?.is_some() {
            self.work.awards.remove(&award_id);
        }
        Ok(())
    }

    async fn set_quote_line_status(
        &mut self,
        ids: &[QuoteLineId],
        status: QuoteLineStatus,
    ) -> Result<(), StoreError> {
        let tenant_id = self.tenant_id;
        let Tables {
            quotes,
            quote_lines,
            ..
        } = &mut self.work;
        for id in ids {
            if let Some(ql) = quote_lines.get_mut(id) {
                if quotes
                    .get(&ql.quote_id)
                    .is_some_and(|q| q.tenant_id == tenant_id)
                {
                    ql.status = status;
                }
            }
        }
        Ok(())
    }

    async fn set_quote_status(
        &mut self,
        quote_id: QuoteId,
        status: QuoteStatus,
    ) -> Result<(), StoreError> {
        if let Some(q) = self.work.quotes.get_mut(&quote_id) {
            if q.tenant_id == self.tenant_id {
                q.status = status;
            }
        }
        Ok(())
    }

    async fn set_rfq_status(&mut self, rfq_id: RfqId, status: RfqStatus) -> Result<(), StoreError> {
        if let Some(r) = self.work.rfqs.get_mut(&rfq_id) {
            if r.tenant_id == self.tenant_id {
                r.status = status;
            }
        }
        Ok(())
    }

    async fn next_purchase_order_number(&mut self) -> Result<i64, StoreError> {
        self.work.po_sequence += 1;
        Ok(self.work.po_sequence)
    }

    async fn insert_purchase_order(&mut self, order: &PurchaseOrder) -> Result<(), StoreError> {
        self.check_tenant(order.tenant_id, "purchase order")?;
        if self
            .work
            .purchase_orders
            .values()
            .any(|po| po.tenant_id == order.tenant_id && po.number == order.number)
        {
            return Err(StoreError::UniqueViolation(format!(
                "purchase order number {} already exists",
                order.number
            )));
        }
        self.work.purchase_orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn link_purchase_order_line(
        &mut self,
        line_id: PurchaseOrderLineId,
        award_id: AwardId,
        quantity: i64,
    ) -> Result<(), StoreError> {
        let tenant_id = self.tenant_id;
        let line = self
            .work
            .purchase_orders
            .values_mut()
            .filter(|po| po.tenant_id == tenant_id)
            .flat_map(|po| po.lines.iter_mut())
            .find(|l| l.id == line_id)
            .ok_or_else(|| {
                StoreError::Backend(format!("purchase order line {line_id} not found"))
            })?;
        line.award_id = Some(award_id);
        line.quantity = quantity;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTransaction {
            mut guard, work, ..
        } = *self;
        *guard = work;
        Ok(())
    }
}
