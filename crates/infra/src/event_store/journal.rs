//! Durable event store: an in-memory store backed by a JSON-lines journal.
//!
//! A batch is written to the journal (one `StoredEvent` per line) and flushed
//! before it is committed to memory, so memory never holds an event the journal
//! lacks. Opening a journal replays it into a fresh [`InMemoryEventStore`]; a
//! torn final line left by a crash mid-write is dropped.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use gasline_core::{AggregateId, ExpectedVersion};

use super::in_memory::InMemoryEventStore;
use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug)]
struct JournalFile {
    file: File,
    /// Length of the journal up to the last complete batch.
    committed_len: u64,
}

#[derive(Debug)]
pub struct JournaledEventStore {
    inner: InMemoryEventStore,
    path: PathBuf,
    journal: Mutex<JournalFile>,
}

fn io_err(e: std::io::Error) -> EventStoreError {
    EventStoreError::Io(e.to_string())
}

impl JournaledEventStore {
    /// Open (or create) the journal at `path` and replay its contents.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EventStoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let inner = InMemoryEventStore::new();
        let mut valid_len = 0;
        let mut needs_newline = false;
        if path.exists() {
            let replay = read_journal(&path)?;
            let count = replay.events.len();
            inner.import(replay.events)?;
            valid_len = replay.valid_len;
            needs_newline = replay.missing_newline;
            tracing::info!(path = %path.display(), events = count, "journal replayed");
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        if file.metadata().map_err(io_err)?.len() > valid_len {
            tracing::warn!(path = %path.display(), valid_len, "dropping torn journal tail");
            file.set_len(valid_len).map_err(io_err)?;
        }
        if needs_newline {
            file.write_all(b"\n").map_err(io_err)?;
            valid_len += 1;
        }

        Ok(Self {
            inner,
            path,
            journal: Mutex::new(JournalFile {
                file,
                committed_len: valid_len,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct Replay {
    events: Vec<StoredEvent>,
    valid_len: u64,
    /// The last event parsed but its trailing newline never made it to disk.
    missing_newline: bool,
}

fn read_journal(path: &Path) -> Result<Replay, EventStoreError> {
    let bytes = std::fs::read(path).map_err(io_err)?;
    let mut events = Vec::new();
    let mut offset = 0usize;
    let mut missing_newline = false;

    let mut lines = bytes.split_inclusive(|b| *b == b'\n').enumerate().peekable();
    while let Some((idx, raw)) = lines.next() {
        let is_last = lines.peek().is_none();
        let complete = raw.ends_with(b"\n");
        let text = String::from_utf8_lossy(raw);
        if text.trim().is_empty() {
            offset += raw.len();
            continue;
        }

        match serde_json::from_str::<StoredEvent>(text.trim_end()) {
            Ok(event) => {
                events.push(event);
                offset += raw.len();
                missing_newline = !complete;
            }
            Err(e) if is_last && !complete => {
                tracing::warn!(line = idx + 1, error = %e, "ignoring torn final journal line");
            }
            Err(e) => {
                return Err(EventStoreError::Corrupt {
                    line: idx + 1,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(Replay {
        events,
        valid_len: offset as u64,
        missing_newline,
    })
}

impl EventStore for JournaledEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        // Held from sequencing to commit; only this store writes to `inner`.
        let mut journal = self.journal.lock().map_err(|_| EventStoreError::Poisoned)?;

        let sequenced = self.inner.sequence(events, expected_version)?;
        if sequenced.is_empty() {
            return Ok(sequenced);
        }

        let mut batch = String::new();
        for stored in &sequenced {
            let line = serde_json::to_string(stored)
                .map_err(|e| EventStoreError::Io(format!("journal encode failed: {e}")))?;
            batch.push_str(&line);
            batch.push('\n');
        }

        let written = journal
            .file
            .write_all(batch.as_bytes())
            .and_then(|_| journal.file.sync_data());
        if let Err(e) = written {
            // Cut off whatever part of the batch reached the file.
            let committed_len = journal.committed_len;
            if let Err(trunc) = journal.file.set_len(committed_len) {
                tracing::error!(error = %trunc, "failed to truncate journal after write error");
            }
            return Err(io_err(e));
        }
        journal.committed_len += batch.len() as u64;

        self.inner.import(sequenced.clone())?;
        Ok(sequenced)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.inner.load_stream(aggregate_id)
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.inner.load_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn uncommitted(aggregate_id: AggregateId) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            aggregate_id,
            aggregate_type: "test.thing".to_string(),
            event_type: "test.happened".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({"ok": true}),
        }
    }

    #[test]
    fn reopening_replays_committed_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let a = AggregateId::new();

        {
            let store = JournaledEventStore::open(&path).unwrap();
            store
                .append(vec![uncommitted(a), uncommitted(a)], ExpectedVersion::Exact(0))
                .unwrap();
        }

        let reopened = JournaledEventStore::open(&path).unwrap();
        let stream = reopened.load_stream(a).unwrap();
        assert_eq!(stream.len(), 2);
        assert_eq!(stream[1].sequence_number, 2);

        // The replayed stream keeps its version for optimistic concurrency.
        let next = reopened
            .append(vec![uncommitted(a)], ExpectedVersion::Exact(2))
            .unwrap();
        assert_eq!(next[0].sequence_number, 3);
    }

    #[test]
    fn rejected_appends_are_not_journaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let a = AggregateId::new();

        let store = JournaledEventStore::open(&path).unwrap();
        store.append(vec![uncommitted(a)], ExpectedVersion::Exact(0)).unwrap();
        assert!(store
            .append(vec![uncommitted(a)], ExpectedVersion::Exact(0))
            .is_err());
        drop(store);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn torn_final_line_is_dropped_on_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let a = AggregateId::new();

        {
            let store = JournaledEventStore::open(&path).unwrap();
            store.append(vec![uncommitted(a)], ExpectedVersion::Exact(0)).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"event_id":"0190"#).unwrap();
        drop(file);

        let store = JournaledEventStore::open(&path).unwrap();
        assert_eq!(store.load_all().unwrap().len(), 1);
        store.append(vec![uncommitted(a)], ExpectedVersion::Exact(1)).unwrap();
        drop(store);

        let reopened = JournaledEventStore::open(&path).unwrap();
        assert_eq!(reopened.load_stream(a).unwrap().len(), 2);
    }

    #[test]
    fn complete_final_line_without_newline_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let a = AggregateId::new();

        {
            let store = JournaledEventStore::open(&path).unwrap();
            store.append(vec![uncommitted(a)], ExpectedVersion::Exact(0)).unwrap();
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, contents.trim_end()).unwrap();

        let store = JournaledEventStore::open(&path).unwrap();
        store.append(vec![uncommitted(a)], ExpectedVersion::Exact(1)).unwrap();
        drop(store);

        let reopened = JournaledEventStore::open(&path).unwrap();
        assert_eq!(reopened.load_stream(a).unwrap().len(), 2);
    }

    #[test]
    fn failed_journal_write_leaves_memory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let a = AggregateId::new();

        let store = JournaledEventStore::open(&path).unwrap();
        store.append(vec![uncommitted(a)], ExpectedVersion::Exact(0)).unwrap();

        // Swap in a read-only handle so the next write fails.
        {
            let mut journal = store.journal.lock().unwrap();
            journal.file = File::open(&path).unwrap();
        }
        let err = store
            .append(vec![uncommitted(a)], ExpectedVersion::Exact(1))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Io(_)));

        assert_eq!(store.load_stream(a).unwrap().len(), 1);
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn corrupt_lines_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        std::fs::write(&path, "not json\n").unwrap();

        let err = JournaledEventStore::open(&path).unwrap_err();
        assert!(matches!(err, EventStoreError::Corrupt { line: 1, .. }));
    }
}
