use std::collections::HashMap;
use std::sync::RwLock;

use gasline_core::{AggregateId, ExpectedVersion};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<AggregateId, Vec<StoredEvent>>,
    /// Every stored event in commit order.
    log: Vec<StoredEvent>,
}

/// In-memory append-only event store.
///
/// The process-local source of truth; wrap it in a
/// [`JournaledEventStore`](super::JournaledEventStore) for durability.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Insert already-sequenced events (journal replay).
    ///
    /// Each event must continue its stream exactly (`last + 1`).
    pub fn import(&self, events: Vec<StoredEvent>) -> Result<(), EventStoreError> {
        let mut inner = self.inner.write().map_err(|_| EventStoreError::Poisoned)?;
        for e in events {
            let stream = inner.streams.entry(e.aggregate_id).or_default();
            let current = Self::current_version(stream);
            if e.sequence_number != current + 1 {
                return Err(EventStoreError::InvalidAppend(format!(
                    "imported event for {} has sequence {} but stream is at {current}",
                    e.aggregate_id, e.sequence_number
                )));
            }
            if let Some(first) = stream.first() {
                if first.aggregate_type != e.aggregate_type {
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "stream is '{}', imported event is '{}'",
                        first.aggregate_type, e.aggregate_type
                    )));
                }
            }
            stream.push(e.clone());
            inner.log.push(e);
        }
        Ok(())
    }

    /// Number of events stored across all streams.
    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl InMemoryEventStore {
    /// Validate a batch against the current stream and assign sequence numbers
    /// without storing anything. Commit the result with [`Self::import`].
    pub fn sequence(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self.inner.read().map_err(|_| EventStoreError::Poisoned)?;
        let stream = events
            .first()
            .and_then(|e| inner.streams.get(&e.aggregate_id))
            .map(Vec::as_slice)
            .unwrap_or_default();
        sequence_batch(stream, events, expected_version)
    }
}

fn sequence_batch(
    stream: &[StoredEvent],
    events: Vec<UncommittedEvent>,
    expected_version: ExpectedVersion,
) -> Result<Vec<StoredEvent>, EventStoreError> {
    let Some(first) = events.first() else {
        return Ok(vec![]);
    };

    // All events must target the same aggregate stream.
    let aggregate_id = first.aggregate_id;
    let aggregate_type = first.aggregate_type.clone();

    for (idx, e) in events.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(EventStoreError::InvalidAppend(format!(
                "batch contains multiple aggregate_ids (index {idx})"
            )));
        }
        if e.aggregate_type != aggregate_type {
            return Err(EventStoreError::AggregateTypeMismatch(format!(
                "batch contains multiple aggregate_types (index {idx})"
            )));
        }
    }

    let current = InMemoryEventStore::current_version(stream);
    if !expected_version.matches(current) {
        return Err(EventStoreError::Concurrency(format!(
            "expected {expected_version:?}, found {current}"
        )));
    }

    // Enforce aggregate type stability across the stream.
    if let Some(existing) = stream.first() {
        if existing.aggregate_type != aggregate_type {
            return Err(EventStoreError::AggregateTypeMismatch(format!(
                "stream is '{}', append is '{aggregate_type}'",
                existing.aggregate_type
            )));
        }
    }

    Ok(events
        .into_iter()
        .zip(current + 1..)
        .map(|(e, sequence_number)| StoredEvent {
            event_id: e.event_id,
            aggregate_id: e.aggregate_id,
            aggregate_type: e.aggregate_type,
            sequence_number,
            event_type: e.event_type,
            event_version: e.event_version,
            occurred_at: e.occurred_at,
            payload: e.payload,
        })
        .collect())
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let mut inner = self.inner.write().map_err(|_| EventStoreError::Poisoned)?;
        let aggregate_id = events[0].aggregate_id;
        let stream = inner.streams.entry(aggregate_id).or_default();

        let committed = sequence_batch(stream, events, expected_version)?;
        stream.extend(committed.iter().cloned());
        inner.log.extend(committed.iter().cloned());

        Ok(committed)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self.inner.read().map_err(|_| EventStoreError::Poisoned)?;
        Ok(inner.streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self.inner.read().map_err(|_| EventStoreError::Poisoned)?;
        Ok(inner.log.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn uncommitted(aggregate_id: AggregateId, aggregate_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "test.happened".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({"n": 1}),
        }
    }

    #[test]
    fn assigns_sequence_numbers_per_stream() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        let first = store
            .append(vec![uncommitted(a, "t"), uncommitted(a, "t")], ExpectedVersion::Exact(0))
            .unwrap();
        assert_eq!(
            first.iter().map(|e| e.sequence_number).collect::<Vec<_>>(),
            vec![1, 2]
        );

        let other = store
            .append(vec![uncommitted(b, "t")], ExpectedVersion::Exact(0))
            .unwrap();
        assert_eq!(other[0].sequence_number, 1);

        assert_eq!(store.load_stream(a).unwrap().len(), 2);
        assert_eq!(store.load_all().unwrap().len(), 3);
    }

    #[test]
    fn sequencing_does_not_store() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        store.append(vec![uncommitted(a, "t")], ExpectedVersion::Exact(0)).unwrap();

        let batch = store
            .sequence(vec![uncommitted(a, "t")], ExpectedVersion::Exact(1))
            .unwrap();
        assert_eq!(batch[0].sequence_number, 2);
        assert_eq!(store.len(), 1);

        assert!(matches!(
            store.sequence(vec![uncommitted(a, "t")], ExpectedVersion::Exact(0)),
            Err(EventStoreError::Concurrency(_))
        ));

        store.import(batch).unwrap();
        assert_eq!(store.load_stream(a).unwrap().len(), 2);
    }

    #[test]
    fn stale_expected_version_is_a_concurrency_error() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        store
            .append(vec![uncommitted(a, "t")], ExpectedVersion::Exact(0))
            .unwrap();
        let err = store
            .append(vec![uncommitted(a, "t")], ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
    }

    #[test]
    fn rejects_mixed_batches_and_type_changes() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let err = store
            .append(
                vec![uncommitted(a, "t"), uncommitted(AggregateId::new(), "t")],
                ExpectedVersion::Any,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::InvalidAppend(_)));

        store.append(vec![uncommitted(a, "t")], ExpectedVersion::Any).unwrap();
        let err = store
            .append(vec![uncommitted(a, "u")], ExpectedVersion::Any)
            .unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));
    }

    #[test]
    fn import_requires_contiguous_sequences() {
        let source = InMemoryEventStore::new();
        let a = AggregateId::new();
        source
            .append(vec![uncommitted(a, "t"), uncommitted(a, "t")], ExpectedVersion::Any)
            .unwrap();
        let mut events = source.load_all().unwrap();

        let target = InMemoryEventStore::new();
        let second = events.pop().unwrap();
        assert!(target.import(vec![second.clone()]).is_err());
        target.import(events).unwrap();
        target.import(vec![second]).unwrap();
        assert_eq!(target.load_stream(a).unwrap().len(), 2);
    }
}
