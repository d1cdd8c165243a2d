use std::collections::HashMap;
use std::sync::RwLock;

use gasline_core::AggregateId;

use super::ProjectionError;

/// Last applied sequence number per aggregate stream.
///
/// Replays at or below the cursor are ignored, which makes every projection
/// idempotent under redelivery.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, aggregate_id: AggregateId) -> u64 {
        match self.inner.read() {
            Ok(cursors) => cursors.get(&aggregate_id).copied().unwrap_or(0),
            Err(_) => 0,
        }
    }

    /// Decide whether `seq` should be applied.
    ///
    /// `Ok(false)` for an already applied event, an error for a gap.
    pub fn admit(&self, aggregate_id: AggregateId, seq: u64) -> Result<bool, ProjectionError> {
        let last = self.get(aggregate_id);
        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }

    pub fn advance(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.insert(aggregate_id, seq);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_sequences_are_skipped_and_gaps_rejected() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();

        assert!(cursors.admit(id, 1).unwrap());
        cursors.advance(id, 1);
        assert!(!cursors.admit(id, 1).unwrap());
        assert!(cursors.admit(id, 2).unwrap());
        assert!(matches!(
            cursors.admit(id, 3),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 3 })
        ));
        assert!(cursors.admit(id, 0).is_err());
    }
}
