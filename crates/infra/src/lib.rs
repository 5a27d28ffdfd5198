//! Infrastructure layer: transactional storage, the award commit/reversal
//! executors, purchase order materialization and notification delivery.

pub mod award;
pub mod config;
pub mod notify;
pub mod purchase_order;
pub mod store;
pub mod workers;

#[cfg(test)]
mod integration_tests;

pub use award::{AwardService, CommitReceipt, RescindReceipt};
pub use config::{ConfigError, EngineConfig, StoreBackend};
