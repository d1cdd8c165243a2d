//! Command execution pipeline (application-level orchestration).
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store
//!   ↓
//! 2. Rehydrate aggregate (apply historical events to rebuild state)
//!   ↓
//! 3. Handle command (pure decision logic, produces events)
//!   ↓
//! 4. Persist events to store (append-only, optimistic concurrency check)
//!   ↓
//! 5. Publish events to bus (SSE subscribers)
//! ```
//!
//! This module contains no IO itself; it composes the `EventStore` and `EventBus` traits.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use gasline_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use gasline_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure or a duplicate create.
    #[error("conflict: {0}")]
    Concurrency(String),
    /// Domain validation failure (deterministic).
    #[error("validation failed: {0}")]
    Validation(String),
    /// Domain invariant failure (deterministic).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    /// Domain authorization failure.
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    /// Failed to deserialize historical event payloads into the aggregate event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),
    /// Persisting to the event store failed.
    #[error("event store failure: {0}")]
    Store(EventStoreError),
    /// Publication failed after a successful append.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// ## Execution Guarantees
///
/// - **Atomicity**: events are persisted before publication (if append fails, nothing is published)
/// - **Consistency**: optimistic concurrency is enforced against the loaded stream version
/// - **Isolation**: each command operates on a single aggregate instance
///
/// If publication fails after a successful append, the error is returned to the
/// caller even though the events are already stored.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full event-sourcing pipeline.
    ///
    /// `make_aggregate` builds the empty aggregate the history is replayed onto
    /// (e.g. `Cylinder::empty(CylinderId::new(id))`).
    ///
    /// Returns the committed events, or an empty vector when the command was a no-op.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: gasline_events::Event + Serialize + DeserializeOwned,
    {
        let aggregate_type = aggregate_type.into();

        // 1) Load history
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &aggregate_type, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist (append-only, optimistic)
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(aggregate_id, aggregate_type.clone(), Uuid::now_v7(), ev)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        // 5) Publish committed events (after append)
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        tracing::debug!(
            aggregate_type = %aggregate_type,
            aggregate_id = %aggregate_id,
            events = committed.len(),
            "command committed"
        );

        Ok(committed)
    }

    /// Rehydrate an aggregate without handling a command.
    ///
    /// Returns `None` when the stream is empty.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Option<A>, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        if history.is_empty() {
            return Ok(None);
        }
        validate_loaded_stream(aggregate_id, aggregate_type, &history)?;
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(Some(aggregate))
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    aggregate_id: AggregateId,
    aggregate_type: &str,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // The stream must belong to this aggregate and be strictly increasing.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.aggregate_type != aggregate_type {
            return Err(DispatchError::Store(EventStoreError::AggregateTypeMismatch(format!(
                "stream is '{}', expected '{aggregate_type}'",
                e.aggregate_type
            ))));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use gasline_bulletin::{
        Announcement, AnnouncementCommand, AnnouncementId, EditAnnouncement, PublishAnnouncement,
    };
    use gasline_core::UserId;
    use gasline_events::InMemoryEventBus;

    use crate::event_store::InMemoryEventStore;

    type Dispatcher =
        CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    fn dispatcher() -> Dispatcher {
        CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()))
    }

    fn publish(id: AggregateId) -> AnnouncementCommand {
        AnnouncementCommand::Publish(PublishAnnouncement {
            announcement_id: AnnouncementId::new(id),
            author_id: UserId::new(),
            title: "Holiday schedule".to_string(),
            content: "Deliveries pause on the 1st.".to_string(),
            pinned: false,
            occurred_at: Utc::now(),
        })
    }

    fn make(id: AggregateId) -> Announcement {
        Announcement::empty(AnnouncementId::new(id))
    }

    #[test]
    fn dispatch_persists_and_publishes() {
        let d = dispatcher();
        let sub = d.bus().subscribe();
        let id = AggregateId::new();

        let committed = d
            .dispatch(id, "bulletin.announcement", publish(id), make)
            .unwrap();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].sequence_number, 1);

        let env = sub.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(env.aggregate_id(), id);
        assert_eq!(env.event_type(), "bulletin.announcement.published");
    }

    #[test]
    fn dispatch_rehydrates_before_handling() {
        let d = dispatcher();
        let id = AggregateId::new();
        d.dispatch(id, "bulletin.announcement", publish(id), make).unwrap();

        // A second publish on the same stream is refused by the rehydrated aggregate.
        let err = d
            .dispatch(id, "bulletin.announcement", publish(id), make)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Concurrency(_)));

        let edit = AnnouncementCommand::Edit(EditAnnouncement {
            announcement_id: AnnouncementId::new(id),
            title: Some("Updated".to_string()),
            content: None,
            pinned: None,
            occurred_at: Utc::now(),
        });
        let committed = d.dispatch(id, "bulletin.announcement", edit, make).unwrap();
        assert_eq!(committed[0].sequence_number, 2);

        let loaded = d
            .load(id, "bulletin.announcement", make)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.title(), "Updated");
    }

    #[test]
    fn domain_errors_are_mapped_and_nothing_is_stored() {
        let d = dispatcher();
        let id = AggregateId::new();
        let edit = AnnouncementCommand::Edit(EditAnnouncement {
            announcement_id: AnnouncementId::new(id),
            title: Some("x".to_string()),
            content: None,
            pinned: None,
            occurred_at: Utc::now(),
        });
        let err = d.dispatch(id, "bulletin.announcement", edit, make).unwrap_err();
        assert!(matches!(err, DispatchError::NotFound));
        assert!(d.store().load_all().unwrap().is_empty());
    }

    #[test]
    fn wrong_aggregate_type_is_rejected() {
        let d = dispatcher();
        let id = AggregateId::new();
        d.dispatch(id, "bulletin.announcement", publish(id), make).unwrap();
        let err = d.load(id, "orders.order", make).unwrap_err();
        assert!(matches!(err, DispatchError::Store(EventStoreError::AggregateTypeMismatch(_))));
    }
}
