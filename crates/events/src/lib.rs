//! `sourcing-events` — event facts and the pub/sub plumbing that carries them.
//!
//! Committed business decisions are described as [`Event`]s, wrapped in a
//! tenant-scoped [`EventEnvelope`] and handed to an [`EventBus`]. Consumers
//! (notification workers, tests) read them from a [`Subscription`].

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod tenant;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use tenant::TenantScoped;
