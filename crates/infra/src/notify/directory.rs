//! Who holds which role, per supplier or platform-wide.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use sourcing_auth::Role;
use sourcing_awarding::SupplierId;
use sourcing_core::UserId;

use crate::store::StoreError;

/// Where a role is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientScope {
    Supplier(SupplierId),
    Platform,
}

#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Users holding any of `roles` within `scope`, sorted and deduplicated.
    async fn users_with_roles(
        &self,
        scope: RecipientScope,
        roles: &[Role],
    ) -> Result<Vec<UserId>, StoreError>;
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryRecipientDirectory {
    grants: RwLock<Vec<(UserId, RecipientScope, Role)>>,
}

impl InMemoryRecipientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn grant(
        &self,
        user_id: UserId,
        scope: RecipientScope,
        role: Role,
    ) -> Result<(), StoreError> {
        let mut grants = self
            .grants
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        grants.push((user_id, scope, role));
        Ok(())
    }
}

#[async_trait]
impl RecipientDirectory for InMemoryRecipientDirectory {
    async fn users_with_roles(
        &self,
        scope: RecipientScope,
        roles: &[Role],
    ) -> Result<Vec<UserId>, StoreError> {
        let grants = self
            .grants
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        let mut users: Vec<UserId> = grants
            .iter()
            .filter(|(_, s, r)| *s == scope && roles.contains(r))
            .map(|(u, _, _)| *u)
            .collect();
        users.sort();
        users.dedup();
        Ok(users)
    }
}

/// Directory backed by the `user_roles` table.
#[derive(Debug, Clone)]
pub struct PgRecipientDirectory {
    pool: Arc<PgPool>,
}

impl PgRecipientDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl RecipientDirectory for PgRecipientDirectory {
    async fn users_with_roles(
        &self,
        scope: RecipientScope,
        roles: &[Role],
    ) -> Result<Vec<UserId>, StoreError> {
        if roles.is_empty() {
            return Ok(Vec::new());
        }
        let supplier: Option<Uuid> = match scope {
            RecipientScope::Supplier(id) => Some(id.into()),
            RecipientScope::Platform => None,
        };
        let roles: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();

        let rows = sqlx::query(
            r#"
            SELECT DISTINCT user_id
            FROM user_roles
            WHERE supplier_id IS NOT DISTINCT FROM $1 AND role = ANY($2)
            ORDER BY user_id
            "#,
        )
        .bind(supplier)
        .bind(roles)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| StoreError::Backend(format!("recipient lookup failed: {e}")))?;

        rows.iter()
            .map(|row| {
                row.try_get::<Uuid, _>("user_id")
                    .map(UserId::from_uuid)
                    .map_err(|e| StoreError::Backend(format!("failed to decode row: {e}")))
            })
            .collect()
    }
}
