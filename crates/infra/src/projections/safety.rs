use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use gasline_core::{AggregateId, UserId};
use gasline_events::EventEnvelope;
use gasline_safety::{HazardLevel, RectifyStatus, SafetyEvent, SafetyRecord, SafetyRecordId};

use super::{decode, ensure_same_stream, rebuild_order, ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq)]
pub struct SafetyRecordReadModel {
    pub id: SafetyRecordId,
    pub inspector_id: UserId,
    pub order_id: Option<AggregateId>,
    pub check_items: JsonValue,
    pub hazard_level: HazardLevel,
    pub hazard_description: Option<String>,
    pub photos: Vec<String>,
    pub rectify_status: Option<RectifyStatus>,
    pub rectify_photos: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SafetyRecordsProjection<S = InMemoryReadStore<SafetyRecordId, SafetyRecordReadModel>>
where
    S: ReadStore<SafetyRecordId, SafetyRecordReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> Default for SafetyRecordsProjection<S>
where
    S: ReadStore<SafetyRecordId, SafetyRecordReadModel> + Default,
{
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S> SafetyRecordsProjection<S>
where
    S: ReadStore<SafetyRecordId, SafetyRecordReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &SafetyRecordId) -> Option<SafetyRecordReadModel> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<SafetyRecordReadModel> {
        self.store.list()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(ev) = decode::<SafetyEvent>(envelope, SafetyRecord::AGGREGATE_TYPE, &self.cursors)?
        else {
            return Ok(());
        };

        match ev {
            SafetyEvent::InspectionFiled(e) => {
                ensure_same_stream(envelope, e.record_id.0)?;
                self.store.upsert(
                    e.record_id,
                    SafetyRecordReadModel {
                        id: e.record_id,
                        inspector_id: e.inspector_id,
                        order_id: e.order_id,
                        check_items: e.check_items,
                        hazard_level: e.hazard_level,
                        hazard_description: e.hazard_description,
                        photos: e.photos,
                        rectify_status: e.rectify_status,
                        rectify_photos: vec![],
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            SafetyEvent::RectificationUpdated(e) => {
                ensure_same_stream(envelope, e.record_id.0)?;
                if let Some(mut rm) = self.store.get(&e.record_id) {
                    rm.rectify_status = Some(e.status);
                    rm.rectify_photos.extend(e.added_photos);
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.record_id, rm);
                }
            }
        }

        self.cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();
        self.store.clear();
        self.cursors.clear();
        rebuild_order(&mut envs);
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gasline_safety::{InspectionFiled, RectificationUpdated};
    use serde_json::json;
    use uuid::Uuid;

    fn envelope(id: SafetyRecordId, seq: u64, ev: &SafetyEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            id.0,
            SafetyRecord::AGGREGATE_TYPE.to_string(),
            "test".to_string(),
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    #[test]
    fn rectification_photos_accumulate() {
        let p: SafetyRecordsProjection = SafetyRecordsProjection::default();
        let id = SafetyRecordId::new(AggregateId::new());
        p.apply_envelope(&envelope(
            id,
            1,
            &SafetyEvent::InspectionFiled(InspectionFiled {
                record_id: id,
                inspector_id: UserId::new(),
                order_id: None,
                check_items: json!({"valve": "leaking"}),
                hazard_level: HazardLevel::High,
                hazard_description: Some("valve leak".to_string()),
                photos: vec!["/uploads/a.jpg".to_string()],
                rectify_status: Some(RectifyStatus::Pending),
                occurred_at: Utc::now(),
            }),
        ))
        .unwrap();

        for (seq, (photo, status)) in [
            ("/uploads/b.jpg", RectifyStatus::Pending),
            ("/uploads/c.jpg", RectifyStatus::Completed),
        ]
        .into_iter()
        .enumerate()
        {
            p.apply_envelope(&envelope(
                id,
                seq as u64 + 2,
                &SafetyEvent::RectificationUpdated(RectificationUpdated {
                    record_id: id,
                    status,
                    added_photos: vec![photo.to_string()],
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        }

        let rm = p.get(&id).unwrap();
        assert_eq!(rm.rectify_status, Some(RectifyStatus::Completed));
        assert_eq!(rm.rectify_photos, vec!["/uploads/b.jpg", "/uploads/c.jpg"]);
        assert_eq!(rm.photos.len(), 1);
    }
}
