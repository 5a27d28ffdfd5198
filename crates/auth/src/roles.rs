use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC and recipient resolution.
///
/// Roles are intentionally opaque strings at this layer; which users hold a
/// role is decided by the directory that owns user data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supplier-side administrator (manages the supplier's account and quotes).
pub const SUPPLIER_ADMIN: Role = Role::from_static("supplier_admin");
/// Supplier-side sales contact who submits quotes.
pub const SUPPLIER_SALES: Role = Role::from_static("supplier_sales");
/// Platform operator with oversight over every tenant.
pub const PLATFORM_ADMIN: Role = Role::from_static("platform_admin");
/// Platform support staff who follow award activity.
pub const PLATFORM_SUPPORT: Role = Role::from_static("platform_support");
