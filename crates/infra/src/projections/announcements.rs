use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use gasline_bulletin::{Announcement, AnnouncementEvent, AnnouncementId};
use gasline_core::UserId;
use gasline_events::EventEnvelope;

use super::{decode, ensure_same_stream, rebuild_order, ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementReadModel {
    pub id: AnnouncementId,
    pub author_id: UserId,
    pub title: String,
    pub content: String,
    pub pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct AnnouncementsProjection<S = InMemoryReadStore<AnnouncementId, AnnouncementReadModel>>
where
    S: ReadStore<AnnouncementId, AnnouncementReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> Default for AnnouncementsProjection<S>
where
    S: ReadStore<AnnouncementId, AnnouncementReadModel> + Default,
{
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S> AnnouncementsProjection<S>
where
    S: ReadStore<AnnouncementId, AnnouncementReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &AnnouncementId) -> Option<AnnouncementReadModel> {
        self.store.get(id)
    }

    /// Pinned first, then newest first.
    pub fn list(&self) -> Vec<AnnouncementReadModel> {
        let mut out = self.store.list();
        out.sort_by(|a, b| {
            b.pinned
                .cmp(&a.pinned)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        out
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(ev) =
            decode::<AnnouncementEvent>(envelope, Announcement::AGGREGATE_TYPE, &self.cursors)?
        else {
            return Ok(());
        };

        match ev {
            AnnouncementEvent::Published(e) => {
                ensure_same_stream(envelope, e.announcement_id.0)?;
                self.store.upsert(
                    e.announcement_id,
                    AnnouncementReadModel {
                        id: e.announcement_id,
                        author_id: e.author_id,
                        title: e.title,
                        content: e.content,
                        pinned: e.pinned,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            AnnouncementEvent::Edited(e) => {
                ensure_same_stream(envelope, e.announcement_id.0)?;
                if let Some(mut rm) = self.store.get(&e.announcement_id) {
                    if let Some(title) = e.title {
                        rm.title = title;
                    }
                    if let Some(content) = e.content {
                        rm.content = content;
                    }
                    if let Some(pinned) = e.pinned {
                        rm.pinned = pinned;
                    }
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.announcement_id, rm);
                }
            }
            AnnouncementEvent::Withdrawn(e) => {
                ensure_same_stream(envelope, e.announcement_id.0)?;
                self.store.remove(&e.announcement_id);
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
    use chrono::{Duration, Utc};
    use gasline_bulletin::AnnouncementPublished;
    use gasline_core::AggregateId;
    use uuid::Uuid;

    fn published(id: AnnouncementId, pinned: bool, minutes_ago: i64) -> EventEnvelope<JsonValue> {
        let ev = AnnouncementEvent::Published(AnnouncementPublished {
            announcement_id: id,
            author_id: UserId::new(),
            title: format!("notice {minutes_ago}"),
            content: "body".to_string(),
            pinned,
            occurred_at: Utc::now() - Duration::minutes(minutes_ago),
        });
        EventEnvelope::new(
            Uuid::now_v7(),
            id.0,
            Announcement::AGGREGATE_TYPE.to_string(),
            "test".to_string(),
            1,
            serde_json::to_value(&ev).unwrap(),
        )
    }

    #[test]
    fn list_puts_pinned_first_then_newest() {
        let p: AnnouncementsProjection = AnnouncementsProjection::default();
        let old_pinned = AnnouncementId::new(AggregateId::new());
        let newest = AnnouncementId::new(AggregateId::new());
        let older = AnnouncementId::new(AggregateId::new());
        p.apply_envelope(&published(older, false, 30)).unwrap();
        p.apply_envelope(&published(old_pinned, true, 60)).unwrap();
        p.apply_envelope(&published(newest, false, 1)).unwrap();

        let ids: Vec<_> = p.list().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![old_pinned, newest, older]);
    }
}
