//! Engine configuration loaded from the environment.
//!
//! | variable | default |
//! |---|---|
//! | `SOURCING_STORE` | `memory` (`postgres` requires `DATABASE_URL`) |
//! | `DATABASE_URL` | unset |
//! | `SOURCING_BIND_ADDR` | `0.0.0.0:8080` |
//! | `SOURCING_PO_NUMBER_PREFIX` | `PO` |
//! | `SOURCING_NOTIFY_PLATFORM_ROLES` | `platform_admin,platform_support` |

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

use sourcing_auth::{Audience, RecipientPolicy, Role};

use crate::purchase_order::DEFAULT_NUMBER_PREFIX;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },

    #[error("{0} must be set when SOURCING_STORE=postgres")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub po_number_prefix: String,
    /// `None` keeps the default platform oversight roles.
    pub platform_roles: Option<Vec<Role>>,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. `lookup` returns `None` for unset
    /// variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let store = match get("SOURCING_STORE") {
            Some(raw) => raw.parse().map_err(|message| ConfigError::Invalid {
                var: "SOURCING_STORE",
                message,
            })?,
            None => StoreBackend::default(),
        };

        let database_url = get("DATABASE_URL");
        if store == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let bind_raw = get("SOURCING_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|e| ConfigError::Invalid {
            var: "SOURCING_BIND_ADDR",
            message: format!("{e}"),
        })?;

        let po_number_prefix =
            get("SOURCING_PO_NUMBER_PREFIX").unwrap_or_else(|| DEFAULT_NUMBER_PREFIX.to_string());

        let platform_roles = get("SOURCING_NOTIFY_PLATFORM_ROLES").map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(|r| Role::new(r.to_string()))
                .collect()
        });

        Ok(Self {
            store,
            database_url,
            bind_addr,
            po_number_prefix: po_number_prefix.trim().to_string(),
            platform_roles,
        })
    }

    pub fn recipient_policy(&self) -> RecipientPolicy {
        let policy = RecipientPolicy::default();
        match &self.platform_roles {
            Some(roles) => policy.with_roles(Audience::PlatformOversight, roles.clone()),
            None => policy,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store: StoreBackend::Memory,
            database_url: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            po_number_prefix: DEFAULT_NUMBER_PREFIX.to_string(),
            platform_roles: None,
        }
    }
}
