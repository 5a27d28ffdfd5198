//! Declarative audience table for award notifications.
//!
//! Each [`Audience`] maps to the set of roles whose holders should hear about
//! an award decision. The table is data, so it can be inspected, overridden
//! from configuration and tested without touching award logic.

use serde::{Deserialize, Serialize};

use crate::roles::{self, Role};

/// A persona that receives award notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// Users belonging to the supplier the notice is about.
    SupplierContacts,
    /// Platform staff with oversight across tenants.
    PlatformOversight,
}

/// One row of the audience table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceRule {
    pub audience: Audience,
    pub roles: Vec<Role>,
}

/// The full audience table used when resolving recipients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientPolicy {
    rules: Vec<AudienceRule>,
}

impl RecipientPolicy {
    pub fn new(rules: Vec<AudienceRule>) -> Self {
        Self { rules }
    }

    /// Replace the roles for one audience, keeping the rest of the table.
    pub fn with_roles(mut self, audience: Audience, roles: Vec<Role>) -> Self {
        match self.rules.iter_mut().find(|r| r.audience == audience) {
            Some(rule) => rule.roles = roles,
            None => self.rules.push(AudienceRule { audience, roles }),
        }
        self
    }

    pub fn rules(&self) -> &[AudienceRule] {
        &self.rules
    }

    /// Roles that make up `audience` (empty when the audience is not configured).
    pub fn roles_for(&self, audience: Audience) -> &[Role] {
        self.rules
            .iter()
            .find(|r| r.audience == audience)
            .map(|r| r.roles.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for RecipientPolicy {
    fn default() -> Self {
        Self::new(vec![
            AudienceRule {
                audience: Audience::SupplierContacts,
                roles: vec![roles::SUPPLIER_ADMIN, roles::SUPPLIER_SALES],
            },
            AudienceRule {
                audience: Audience::PlatformOversight,
                roles: vec![roles::PLATFORM_ADMIN, roles::PLATFORM_SUPPORT],
            },
        ])
    }
}
