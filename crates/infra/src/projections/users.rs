use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use gasline_auth::{Role, User, UserEvent};
use gasline_core::{PhoneNumber, UserId};
use gasline_events::EventEnvelope;

use super::{decode, ensure_same_stream, rebuild_order, ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserReadModel {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<PhoneNumber>,
    pub real_name: Option<String>,
    pub station_id: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Users by id. Removed users are dropped from the read model.
#[derive(Debug)]
pub struct UsersProjection<S = InMemoryReadStore<UserId, UserReadModel>>
where
    S: ReadStore<UserId, UserReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> Default for UsersProjection<S>
where
    S: ReadStore<UserId, UserReadModel> + Default,
{
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S> UsersProjection<S>
where
    S: ReadStore<UserId, UserReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &UserId) -> Option<UserReadModel> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<UserReadModel> {
        self.store.list()
    }

    pub fn find_by_username(&self, username: &str) -> Option<UserReadModel> {
        self.store.list().into_iter().find(|u| u.username == username)
    }

    pub fn count_by_role(&self, role: Role) -> usize {
        self.store.list().iter().filter(|u| u.role == role).count()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(ev) = decode::<UserEvent>(envelope, User::AGGREGATE_TYPE, &self.cursors)? else {
            return Ok(());
        };

        match ev {
            UserEvent::Registered(e) => {
                ensure_same_stream(envelope, e.user_id.into())?;
                self.store.upsert(
                    e.user_id,
                    UserReadModel {
                        id: e.user_id,
                        username: e.username,
                        password_hash: e.password_hash,
                        role: e.role,
                        phone: e.phone,
                        real_name: e.real_name,
                        station_id: e.station_id,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            UserEvent::ProfileUpdated(e) => {
                ensure_same_stream(envelope, e.user_id.into())?;
                if let Some(mut rm) = self.store.get(&e.user_id) {
                    if let Some(role) = e.role {
                        rm.role = role;
                    }
                    if e.phone.is_some() {
                        rm.phone = e.phone;
                    }
                    if e.real_name.is_some() {
                        rm.real_name = e.real_name;
                    }
                    if e.station_id.is_some() {
                        rm.station_id = e.station_id;
                    }
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.user_id, rm);
                }
            }
            UserEvent::PasswordChanged(e) => {
                ensure_same_stream(envelope, e.user_id.into())?;
                if let Some(mut rm) = self.store.get(&e.user_id) {
                    rm.password_hash = e.password_hash;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.user_id, rm);
                }
            }
            UserEvent::Removed(e) => {
                ensure_same_stream(envelope, e.user_id.into())?;
                self.store.remove(&e.user_id);
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
    use gasline_auth::{ProfileUpdated, UserRegistered, UserRemoved};
    use gasline_core::AggregateId;
    use uuid::Uuid;

    fn envelope(user_id: UserId, seq: u64, ev: &UserEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            AggregateId::from(user_id),
            User::AGGREGATE_TYPE.to_string(),
            "test".to_string(),
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn registered(user_id: UserId) -> UserEvent {
        UserEvent::Registered(UserRegistered {
            user_id,
            username: "zhang".to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
            phone: None,
            real_name: None,
            station_id: None,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn folds_registration_and_profile_updates() {
        let p: UsersProjection = UsersProjection::default();
        let id = UserId::new();
        p.apply_envelope(&envelope(id, 1, &registered(id))).unwrap();
        p.apply_envelope(&envelope(
            id,
            2,
            &UserEvent::ProfileUpdated(ProfileUpdated {
                user_id: id,
                role: Some(Role::Delivery),
                phone: None,
                real_name: Some("Zhang San".to_string()),
                station_id: None,
                occurred_at: Utc::now(),
            }),
        ))
        .unwrap();

        let rm = p.get(&id).unwrap();
        assert_eq!(rm.role, Role::Delivery);
        assert_eq!(rm.real_name.as_deref(), Some("Zhang San"));
        assert_eq!(p.find_by_username("zhang").map(|u| u.id), Some(id));
        assert_eq!(p.count_by_role(Role::Delivery), 1);
    }

    #[test]
    fn redelivery_is_idempotent_and_removal_drops_the_user() {
        let p: UsersProjection = UsersProjection::default();
        let id = UserId::new();
        let first = envelope(id, 1, &registered(id));
        p.apply_envelope(&first).unwrap();
        p.apply_envelope(&first).unwrap();
        assert_eq!(p.list().len(), 1);

        p.apply_envelope(&envelope(
            id,
            2,
            &UserEvent::Removed(UserRemoved {
                user_id: id,
                occurred_at: Utc::now(),
            }),
        ))
        .unwrap();
        assert!(p.get(&id).is_none());
    }

    #[test]
    fn rebuild_replays_out_of_order_input() {
        let p: UsersProjection = UsersProjection::default();
        let id = UserId::new();
        let removed = envelope(
            id,
            2,
            &UserEvent::Removed(UserRemoved {
                user_id: id,
                occurred_at: Utc::now(),
            }),
        );
        let other = UserId::new();
        p.rebuild_from_scratch(vec![
            removed,
            envelope(other, 1, &registered(other)),
            envelope(id, 1, &registered(id)),
        ])
        .unwrap();

        assert!(p.get(&id).is_none());
        assert!(p.get(&other).is_some());
    }
}
