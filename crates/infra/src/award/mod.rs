//! Award commit, reversal and the service that drives them.

pub mod commit;
mod recompute;
pub mod reversal;
pub mod service;

pub use commit::{CommitExecutor, CommitReceipt, CommitRequest};
pub use reversal::{RescindReceipt, ReversalExecutor};
pub use service::AwardService;
