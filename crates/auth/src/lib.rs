//! `sourcing-auth` — role vocabulary and role-based audience rules.
//!
//! This crate is intentionally decoupled from HTTP and storage. It answers
//! "which roles make up this audience", never "who holds those roles".

pub mod audience;
pub mod roles;

pub use audience::{Audience, AudienceRule, RecipientPolicy};
pub use roles::Role;
