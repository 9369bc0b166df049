//! Event mechanics shared by the ledger and its consumers: the `Event` trait,
//! the sequenced envelope, pub/sub and projections.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod projection;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use projection::Projection;
