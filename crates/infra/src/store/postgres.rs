//! Postgres-backed award store.
//!
//! Every transaction runs on one pooled connection. Locking reads use
//! `SELECT ... FOR UPDATE`, and the partial unique index
//! `awards_one_active_per_line` backs the one-active-award-per-line rule even
//! if a caller skips the locking read.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / other | N/A | `Backend` |
//!
//! ## Tenant Isolation
//!
//! Every query filters on `tenant_id` (quote lines through their parent quote),
//! so a transaction can never read or write another tenant's rows.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use sourcing_awarding::{
    Award, AwardId, AwardStatus, PurchaseOrder, PurchaseOrderLineId, Quote, QuoteId, QuoteLine,
    QuoteLineId, QuoteLineStatus, QuoteStatus, Rfq, RfqId, RfqLine, RfqLineId, RfqStatus,
    Supplier, SupplierId,
};
use sourcing_core::{TenantId, UserId};

use super::{AwardStore, AwardTransaction, StoreError, Visibility};

const SCHEMA: &str = include_str!("../../migrations/0001_award_engine.sql");

const AWARD_COLUMNS: &str = r#"
    id, tenant_id, rfq_id, rfq_line_id, supplier_id, quote_id, quote_line_id,
    awarded_quantity, purchase_order_id, awarded_by, awarded_at, status
"#;

#[derive(Debug, Clone)]
pub struct PgAwardStore {
    pool: Arc<PgPool>,
}

impl PgAwardStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Apply the award engine schema. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl AwardStore for PgAwardStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn begin(&self, tenant_id: TenantId) -> Result<Box<dyn AwardTransaction>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PgAwardTransaction { tenant_id, tx }))
    }

    #[instrument(
        skip(self),
        fields(tenant_id = %tenant_id, rfq_id = %rfq_id, award_count = tracing::field::Empty),
        err
    )]
    async fn list_awards(
        &self,
        tenant_id: TenantId,
        rfq_id: RfqId,
    ) -> Result<Vec<Award>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {AWARD_COLUMNS} FROM awards
             WHERE tenant_id = $1 AND rfq_id = $2 AND status = 'awarded'
             ORDER BY awarded_at, id"
        ))
        .bind(tenant_id.as_uuid())
        .bind(rfq_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_awards", e))?;

        Span::current().record("award_count", rows.len());
        decode_all::<AwardRow, Award>(&rows)
    }

    async fn get_award(
        &self,
        tenant_id: TenantId,
        award_id: AwardId,
    ) -> Result<Option<Award>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {AWARD_COLUMNS} FROM awards WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(award_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_award", e))?;

        row.as_ref().map(decode::<AwardRow, Award>).transpose()
    }
}

struct PgAwardTransaction {
    tenant_id: TenantId,
    tx: Transaction<'static, Postgres>,
}

impl PgAwardTransaction {
    fn tenant(&self) -> Uuid {
        *self.tenant_id.as_uuid()
    }

    fn check_tenant(&self, tenant_id: TenantId, what: &str) -> Result<(), StoreError> {
        if tenant_id != self.tenant_id {
            return Err(StoreError::TenantIsolation(format!(
                "{what} belongs to tenant {tenant_id}, transaction is scoped to {}",
                self.tenant_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AwardTransaction for PgAwardTransaction {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    async fn lock_rfq(&mut self, rfq_id: RfqId) -> Result<Option<Rfq>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, status, deadline
            FROM rfqs
            WHERE tenant_id = $1 AND id = $2
            FOR UPDATE
            "#,
        )
        .bind(self.tenant())
        .bind(rfq_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_rfq", e))?;

        row.as_ref().map(decode::<RfqRow, Rfq>).transpose()
    }

    async fn rfq_lines(&mut self, rfq_id: RfqId) -> Result<Vec<RfqLine>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT l.id, l.rfq_id, l.quantity
            FROM rfq_lines l
            JOIN rfqs r ON r.id = l.rfq_id
            WHERE r.tenant_id = $1 AND l.rfq_id = $2
            ORDER BY l.id
            "#,
        )
        .bind(self.tenant())
        .bind(rfq_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("rfq_lines", e))?;

        decode_all::<RfqLineRow, RfqLine>(&rows)
    }

    async fn quote_lines(
        &mut self,
        ids: &[QuoteLineId],
        visibility: Visibility,
    ) -> Result<Vec<QuoteLine>, StoreError> {
        let supplier = match visibility {
            Visibility::Supplier(id) => Some(*id.as_uuid()),
            Visibility::Administrative => None,
        };
        let rows = sqlx::query(
            r#"
            SELECT ql.id, ql.quote_id, ql.rfq_line_id, ql.status
            FROM quote_lines ql
            JOIN quotes q ON q.id = ql.quote_id
            WHERE q.tenant_id = $1
              AND ql.id = ANY($2)
              AND ($3::uuid IS NULL OR q.supplier_id = $3)
            "#,
        )
        .bind(self.tenant())
        .bind(uuids(ids))
        .bind(supplier)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("quote_lines", e))?;

        decode_all::<QuoteLineRow, QuoteLine>(&rows)
    }

    async fn quote_lines_for_rfq_lines(
        &mut self,
        rfq_line_ids: &[RfqLineId],
    ) -> Result<Vec<QuoteLine>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT ql.id, ql.quote_id, ql.rfq_line_id, ql.status
            FROM quote_lines ql
            JOIN quotes q ON q.id = ql.quote_id
            WHERE q.tenant_id = $1 AND ql.rfq_line_id = ANY($2)
            ORDER BY ql.id
            FOR UPDATE OF ql
            "#,
        )
        .bind(self.tenant())
        .bind(uuids(rfq_line_ids))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("quote_lines_for_rfq_lines", e))?;

        decode_all::<QuoteLineRow, QuoteLine>(&rows)
    }

    async fn quote_lines_for_quotes(
        &mut self,
        quote_ids: &[QuoteId],
    ) -> Result<Vec<QuoteLine>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT ql.id, ql.quote_id, ql.rfq_line_id, ql.status
            FROM quote_lines ql
            JOIN quotes q ON q.id = ql.quote_id
            WHERE q.tenant_id = $1 AND ql.quote_id = ANY($2)
            ORDER BY ql.id
            "#,
        )
        .bind(self.tenant())
        .bind(uuids(quote_ids))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("quote_lines_for_quotes", e))?;

        decode_all::<QuoteLineRow, QuoteLine>(&rows)
    }

    async fn quotes(&mut self, ids: &[QuoteId]) -> Result<Vec<Quote>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, rfq_id, supplier_id, status, withdrawn_at
            FROM quotes
            WHERE tenant_id = $1 AND id = ANY($2)
            "#,
        )
        .bind(self.tenant())
        .bind(uuids(ids))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("quotes", e))?;

        decode_all::<QuoteRow, Quote>(&rows)
    }

    async fn suppliers(&mut self, ids: &[SupplierId]) -> Result<Vec<Supplier>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, name FROM suppliers WHERE tenant_id = $1 AND id = ANY($2)",
        )
        .bind(self.tenant())
        .bind(uuids(ids))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("suppliers", e))?;

        decode_all::<SupplierRow, Supplier>(&rows)
    }

    async fn active_awards_for_lines(
        &mut self,
        rfq_line_ids: &[RfqLineId],
    ) -> Result<Vec<Award>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {AWARD_COLUMNS} FROM awards
             WHERE tenant_id = $1 AND rfq_line_id = ANY($2) AND status = 'awarded'
             ORDER BY id
             FOR UPDATE"
        ))
        .bind(self.tenant())
        .bind(uuids(rfq_line_ids))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("active_awards_for_lines", e))?;

        decode_all::<AwardRow, Award>(&rows)
    }

    async fn active_awards_for_rfq(&mut self, rfq_id: RfqId) -> Result<Vec<Award>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {AWARD_COLUMNS} FROM awards
             WHERE tenant_id = $1 AND rfq_id = $2 AND status = 'awarded'"
        ))
        .bind(self.tenant())
        .bind(rfq_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("active_awards_for_rfq", e))?;

        decode_all::<AwardRow, Award>(&rows)
    }

    async fn lock_award(&mut self, award_id: AwardId) -> Result<Option<Award>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {AWARD_COLUMNS} FROM awards WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(self.tenant())
        .bind(award_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_award", e))?;

        row.as_ref().map(decode::<AwardRow, Award>).transpose()
    }

    async fn insert_award(&mut self, award: &Award) -> Result<(), StoreError> {
        self.check_tenant(award.tenant_id, "award")?;
        sqlx::query(&format!(
            "INSERT INTO awards ({AWARD_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(award.id.as_uuid())
        .bind(award.tenant_id.as_uuid())
        .bind(award.rfq_id.as_uuid())
        .bind(award.rfq_line_id.as_uuid())
        .bind(award.supplier_id.as_uuid())
        .bind(award.quote_id.as_uuid())
        .bind(award.quote_line_id.as_uuid())
        .bind(award.awarded_quantity)
        .bind(award.purchase_order_id.map(Uuid::from))
        .bind(award.awarded_by.as_uuid())
        .bind(award.awarded_at)
        .bind(award.status.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::UniqueViolation(format!(
                    "rfq line {} already has an active award",
                    award.rfq_line_id
                ))
            } else {
                map_sqlx_error("insert_award", e)
            }
        })?;
        Ok(())
    }

    async fn delete_award(&mut self, award_id: AwardId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM awards WHERE tenant_id = $1 AND id = $2")
            .bind(self.tenant())
            .bind(award_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_award", e))?;
        Ok(())
    }

    async fn set_quote_line_status(
        &mut self,
        ids: &[QuoteLineId],
        status: QuoteLineStatus,
    ) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            UPDATE quote_lines ql
            SET status = $3
            FROM quotes q
            WHERE q.id = ql.quote_id AND q.tenant_id = $1 AND ql.id = ANY($2)
            "#,
        )
        .bind(self.tenant())
        .bind(uuids(ids))
        .bind(status.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("set_quote_line_status", e))?;
        Ok(())
    }

    async fn set_quote_status(
        &mut self,
        quote_id: QuoteId,
        status: QuoteStatus,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE quotes SET status = $3 WHERE tenant_id = $1 AND id = $2")
            .bind(self.tenant())
            .bind(quote_id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_quote_status", e))?;
        Ok(())
    }

    async fn set_rfq_status(&mut self, rfq_id: RfqId, status: RfqStatus) -> Result<(), StoreError> {
        sqlx::query("UPDATE rfqs SET status = $3 WHERE tenant_id = $1 AND id = $2")
            .bind(self.tenant())
            .bind(rfq_id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_rfq_status", e))?;
        Ok(())
    }

    async fn next_purchase_order_number(&mut self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT nextval('purchase_order_number_seq') AS n")
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("next_purchase_order_number", e))?;
        row.try_get("n")
            .map_err(|e| map_sqlx_error("next_purchase_order_number", e))
    }

    async fn insert_purchase_order(&mut self, order: &PurchaseOrder) -> Result<(), StoreError> {
        self.check_tenant(order.tenant_id, "purchase order")?;
        sqlx::query(
            r#"
            INSERT INTO purchase_orders
                (id, tenant_id, number, rfq_id, supplier_id, status, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, 'draft', $6, $7)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.tenant_id.as_uuid())
        .bind(&order.number)
        .bind(order.rfq_id.as_uuid())
        .bind(order.supplier_id.as_uuid())
        .bind(order.created_by.as_uuid())
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::UniqueViolation(format!(
                    "purchase order number {} already exists",
                    order.number
                ))
            } else {
                map_sqlx_error("insert_purchase_order", e)
            }
        })?;

        for line in &order.lines {
            sqlx::query(
                r#"
                INSERT INTO purchase_order_lines
                    (id, purchase_order_id, line_no, rfq_line_id, quote_line_id, quantity, award_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(line.id.as_uuid())
            .bind(line.purchase_order_id.as_uuid())
            .bind(line.line_no as i32)
            .bind(line.rfq_line_id.as_uuid())
            .bind(line.quote_line_id.as_uuid())
            .bind(line.quantity)
            .bind(line.award_id.map(Uuid::from))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_purchase_order_line", e))?;
        }
        Ok(())
    }

    async fn link_purchase_order_line(
        &mut self,
        line_id: PurchaseOrderLineId,
        award_id: AwardId,
        quantity: i64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE purchase_order_lines pol
            SET award_id = $3, quantity = $4
            FROM purchase_orders po
            WHERE po.id = pol.purchase_order_id AND po.tenant_id = $1 AND pol.id = $2
            "#,
        )
        .bind(self.tenant())
        .bind(line_id.as_uuid())
        .bind(award_id.as_uuid())
        .bind(quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("link_purchase_order_line", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(format!(
                "purchase order line {line_id} not found"
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

fn uuids<T>(ids: &[T]) -> Vec<Uuid>
where
    T: Copy + Into<Uuid>,
{
    ids.iter().map(|id| (*id).into()).collect()
}

fn parse_status<S>(text: &str) -> Result<S, sqlx::Error>
where
    S: std::str::FromStr,
    S::Err: std::error::Error + Send + Sync + 'static,
{
    text.parse::<S>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn decode<R, T>(row: &PgRow) -> Result<T, StoreError>
where
    R: for<'r> FromRow<'r, PgRow> + Into<T>,
{
    R::from_row(row)
        .map(Into::into)
        .map_err(|e| StoreError::Backend(format!("failed to decode row: {e}")))
}

fn decode_all<R, T>(rows: &[PgRow]) -> Result<Vec<T>, StoreError>
where
    R: for<'r> FromRow<'r, PgRow> + Into<T>,
{
    rows.iter().map(decode::<R, T>).collect()
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code() {
                Some(code) if code.as_ref() == "23505" => StoreError::UniqueViolation(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

// SQLx row types

struct RfqRow(Rfq);

impl<'r> FromRow<'r, PgRow> for RfqRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(RfqRow(Rfq {
            id: RfqId::from_uuid(row.try_get("id")?),
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
            status: parse_status(row.try_get("status")?)?,
            deadline: row.try_get("deadline")?,
        }))
    }
}

struct RfqLineRow(RfqLine);

impl<'r> FromRow<'r, PgRow> for RfqLineRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(RfqLineRow(RfqLine {
            id: RfqLineId::from_uuid(row.try_get("id")?),
            rfq_id: RfqId::from_uuid(row.try_get("rfq_id")?),
            quantity: row.try_get("quantity")?,
        }))
    }
}

struct QuoteRow(Quote);

impl<'r> FromRow<'r, PgRow> for QuoteRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(QuoteRow(Quote {
            id: QuoteId::from_uuid(row.try_get("id")?),
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
            rfq_id: RfqId::from_uuid(row.try_get("rfq_id")?),
            supplier_id: SupplierId::from_uuid(row.try_get("supplier_id")?),
            status: parse_status(row.try_get("status")?)?,
            withdrawn_at: row.try_get("withdrawn_at")?,
        }))
    }
}

struct QuoteLineRow(QuoteLine);

impl<'r> FromRow<'r, PgRow> for QuoteLineRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(QuoteLineRow(QuoteLine {
            id: QuoteLineId::from_uuid(row.try_get("id")?),
            quote_id: QuoteId::from_uuid(row.try_get("quote_id")?),
            rfq_line_id: RfqLineId::from_uuid(row.try_get("rfq_line_id")?),
            status: parse_status(row.try_get("status")?)?,
        }))
    }
}

struct SupplierRow(Supplier);

impl<'r> FromRow<'r, PgRow> for SupplierRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(SupplierRow(Supplier {
            id: SupplierId::from_uuid(row.try_get("id")?),
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
            name: row.try_get("name")?,
        }))
    }
}

struct AwardRow(Award);

impl<'r> FromRow<'r, PgRow> for AwardRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let purchase_order_id: Option<Uuid> = row.try_get("purchase_order_id")?;
        let status: AwardStatus = parse_status(row.try_get("status")?)?;
        Ok(AwardRow(Award {
            id: AwardId::from_uuid(row.try_get("id")?),
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
            rfq_id: RfqId::from_uuid(row.try_get("rfq_id")?),
            rfq_line_id: RfqLineId::from_uuid(row.try_get("rfq_line_id")?),
            supplier_id: SupplierId::from_uuid(row.try_get("supplier_id")?),
            quote_id: QuoteId::from_uuid(row.try_get("quote_id")?),
            quote_line_id: QuoteLineId::from_uuid(row.try_get("quote_line_id")?),
            awarded_quantity: row.try_get("awarded_quantity")?,
            purchase_order_id: purchase_order_id.map(Into::into),
            awarded_by: UserId::from_uuid(row.try_get("awarded_by")?),
            awarded_at: row.try_get("awarded_at")?,
            status,
        }))
    }
}

macro_rules! unwrap_row {
    ($($row:ident => $t:ty),+ $(,)?) => {
        $(
            impl From<$row> for $t {
                fn from(row: $row) -> Self {
                    row.0
                }
            }
        )+
    };
}

unwrap_row!(
    RfqRow => Rfq,
    RfqLineRow => RfqLine,
    QuoteRow => Quote,
    QuoteLineRow => QuoteLine,
    SupplierRow => Supplier,
    AwardRow => Award,
);
