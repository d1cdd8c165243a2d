//! Read-side projections.
//!
//! Each projection folds the committed events of one aggregate type into a
//! [`ReadStore`](crate::read_model::ReadStore). Projections are idempotent per
//! stream (see [`StreamCursors`]) and can be rebuilt from the full event log.

pub mod announcements;
pub mod cursor;
pub mod cylinders;
pub mod orders;
pub mod safety;
pub mod users;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use gasline_core::AggregateId;
use gasline_events::EventEnvelope;

pub use announcements::{AnnouncementReadModel, AnnouncementsProjection};
pub use cursor::StreamCursors;
pub use cylinders::{CylinderReadModel, CylindersProjection};
pub use orders::{OrderReadModel, OrdersProjection, RatingReadModel};
pub use safety::{SafetyRecordReadModel, SafetyRecordsProjection};
pub use users::{UserReadModel, UsersProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize {aggregate_type} event: {reason}")]
    Deserialize { aggregate_type: String, reason: String },
    #[error("event does not belong to its stream: {0}")]
    StreamMismatch(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Admit and decode an envelope for a projection.
///
/// Returns `Ok(None)` for other aggregate types and already applied events.
/// On `Ok(Some(_))` the caller applies the event and then advances the cursor.
pub(crate) fn decode<E>(
    envelope: &EventEnvelope<JsonValue>,
    aggregate_type: &str,
    cursors: &StreamCursors,
) -> Result<Option<E>, ProjectionError>
where
    E: DeserializeOwned,
{
    if envelope.aggregate_type() != aggregate_type {
        return Ok(None);
    }
    if !cursors.admit(envelope.aggregate_id(), envelope.sequence_number())? {
        return Ok(None);
    }
    serde_json::from_value(envelope.payload().clone())
        .map(Some)
        .map_err(|e| ProjectionError::Deserialize {
            aggregate_type: aggregate_type.to_string(),
            reason: e.to_string(),
        })
}

pub(crate) fn ensure_same_stream(
    envelope: &EventEnvelope<JsonValue>,
    event_aggregate: AggregateId,
) -> Result<(), ProjectionError> {
    if envelope.aggregate_id() != event_aggregate {
        return Err(ProjectionError::StreamMismatch(format!(
            "event targets {event_aggregate} but was stored in stream {}",
            envelope.aggregate_id()
        )));
    }
    Ok(())
}

/// Sort envelopes into per-stream order for a rebuild.
pub(crate) fn rebuild_order(envelopes: &mut [EventEnvelope<JsonValue>]) {
    envelopes.sort_by_key(|e| (e.aggregate_id(), e.sequence_number()));
}

/// All read models of the service, fed from the same event log.
#[derive(Debug, Default)]
pub struct ReadModels {
    pub users: UsersProjection,
    pub cylinders: CylindersProjection,
    pub orders: OrdersProjection,
    pub safety: SafetyRecordsProjection,
    pub announcements: AnnouncementsProjection,
}

impl ReadModels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one committed envelope to every projection (each filters by aggregate type).
    pub fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        self.users.apply_envelope(envelope)?;
        self.cylinders.apply_envelope(envelope)?;
        self.orders.apply_envelope(envelope)?;
        self.safety.apply_envelope(envelope)?;
        self.announcements.apply_envelope(envelope)?;
        Ok(())
    }

    pub fn apply_all<'a>(
        &self,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        for env in envelopes {
            self.apply(env)?;
        }
        Ok(())
    }

    /// Discard every read model and replay the given log.
    pub fn rebuild(&self, envelopes: Vec<EventEnvelope<JsonValue>>) -> Result<(), ProjectionError> {
        self.users.rebuild_from_scratch(envelopes.clone())?;
        self.cylinders.rebuild_from_scratch(envelopes.clone())?;
        self.orders.rebuild_from_scratch(envelopes.clone())?;
        self.safety.rebuild_from_scratch(envelopes.clone())?;
        self.announcements.rebuild_from_scratch(envelopes)?;
        Ok(())
    }
}
