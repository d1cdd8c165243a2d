//! Append-only event store boundary.
//!
//! This module defines an infrastructure-facing abstraction for storing and
//! loading aggregate event streams, an in-memory implementation, and a JSON-lines
//! journal that makes the in-memory store durable across restarts.

pub mod in_memory;
pub mod journal;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use journal::JournaledEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
