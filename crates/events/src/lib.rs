//! `procura-events` — structured event publishing.
//!
//! Pipeline stages describe what they did as typed events; the bus fans those events
//! out to whoever is listening (tests, the API, log shippers).

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{BusError, EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::InMemoryEventBus;
