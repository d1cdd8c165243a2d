//! Service wiring: event store, bus, dispatcher, read models, auth state.
//!
//! Every write goes through [`AppServices::dispatch`], which commits through the
//! dispatcher and then folds the committed events into the read models before
//! returning, so a handler can answer from the read side immediately.
//!
//! Checks that span several aggregates (unique usernames and serials, cylinder
//! allocation) run under the write gate, which serializes all writers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;

use gasline_auth::{Hs256Jwt, RevocationList};
use gasline_core::{Aggregate, AggregateId, DomainError};
use gasline_events::{EventBus, EventEnvelope, InMemoryEventBus};
use gasline_infra::command_dispatcher::CommandDispatcher;
use gasline_infra::event_store::{EventStore, InMemoryEventStore, JournaledEventStore, StoredEvent};
use gasline_infra::projections::ReadModels;

use crate::app::errors::ApiError;
use crate::config::ApiConfig;

mod announcements;
mod cylinders;
mod orders;
mod safety;
mod stats;
mod users;

pub use cylinders::{CylinderDetails, NewCylinder};
pub use orders::{NewOrder, StatusChange};
pub use safety::{NewInspection, PHOTO_EXTENSIONS, RectificationChange, photo_file_name};
pub use stats::MySummary;
pub use users::{NewUser, UserChanges};

pub type Bus = InMemoryEventBus<EventEnvelope<JsonValue>>;
type Dispatcher = CommandDispatcher<Arc<dyn EventStore>, Arc<Bus>>;

const REALTIME_CAPACITY: usize = 256;

/// Change notification fanned out to SSE clients.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeMessage {
    pub topic: String,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub sequence_number: u64,
}

impl RealtimeMessage {
    fn from_envelope(env: &EventEnvelope<JsonValue>) -> Self {
        Self {
            topic: env.event_type().to_string(),
            aggregate_type: env.aggregate_type().to_string(),
            aggregate_id: env.aggregate_id().to_string(),
            sequence_number: env.sequence_number(),
        }
    }
}

pub struct AppServices {
    dispatcher: Dispatcher,
    read_models: ReadModels,
    jwt: Hs256Jwt,
    revocations: RevocationList,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
    upload_dir: PathBuf,
    write_gate: Mutex<()>,
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("upload_dir", &self.upload_dir)
            .field("revoked_tokens", &self.revocations.len())
            .finish_non_exhaustive()
    }
}

/// Build services from configuration: pick the event store and replay it.
pub fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn EventStore> = match &config.journal_path {
        Some(path) => {
            let journaled = JournaledEventStore::open(path)
                .map_err(|e| anyhow::anyhow!("failed to open journal {}: {e}", path.display()))?;
            Arc::new(journaled)
        }
        None => {
            tracing::info!("no journal configured; events are kept in memory only");
            Arc::new(InMemoryEventStore::new())
        }
    };

    let jwt = Hs256Jwt::new(config.jwt_secret.as_bytes(), config.token_ttl);
    AppServices::new(store, jwt, config.upload_dir.clone())
        .map_err(|e| anyhow::anyhow!("failed to rebuild read models: {e}"))
}

impl AppServices {
    /// Wire services over an existing store and rebuild every read model from it.
    pub fn new(store: Arc<dyn EventStore>, jwt: Hs256Jwt, upload_dir: PathBuf) -> Result<Self, ApiError> {
        let history = store.load_all()?;
        let read_models = ReadModels::new();
        read_models.rebuild(history.iter().map(StoredEvent::to_envelope).collect())?;
        if !history.is_empty() {
            tracing::info!(events = history.len(), "read models rebuilt from event log");
        }

        let bus = Arc::new(Bus::new());
        let (realtime_tx, _) = broadcast::channel(REALTIME_CAPACITY);
        spawn_realtime_bridge(&bus, realtime_tx.clone())?;

        Ok(Self {
            dispatcher: CommandDispatcher::new(store, bus),
            read_models,
            jwt,
            revocations: RevocationList::new(),
            realtime_tx,
            upload_dir,
            write_gate: Mutex::new(()),
        })
    }

    pub fn read_models(&self) -> &ReadModels {
        &self.read_models
    }

    pub fn jwt(&self) -> &Hs256Jwt {
        &self.jwt
    }

    pub fn revocations(&self) -> &RevocationList {
        &self.revocations
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Total number of committed events.
    pub fn event_count(&self) -> Result<usize, ApiError> {
        Ok(self.dispatcher.store().load_all()?.len())
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    /// Serialize writers for the duration of a multi-step operation.
    pub(crate) fn write_gate(&self) -> Result<MutexGuard<'_, ()>, ApiError> {
        self.write_gate
            .lock()
            .map_err(|_| ApiError::internal("write gate poisoned"))
    }

    /// Dispatch a command and fold the committed events into the read models.
    pub(crate) fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, ApiError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: gasline_events::Event + Serialize + DeserializeOwned,
    {
        let committed =
            self.dispatcher
                .dispatch::<A>(aggregate_id, aggregate_type, command, make_aggregate)?;

        for stored in &committed {
            self.read_models.apply(&stored.to_envelope())?;
        }
        Ok(committed)
    }
}

/// Background subscriber: bus -> realtime channel.
///
/// The thread ends once the bus (and with it every sender) is dropped.
fn spawn_realtime_bridge(
    bus: &Bus,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
) -> Result<(), ApiError> {
    let sub = bus.subscribe();
    std::thread::Builder::new()
        .name("gasline-realtime".to_string())
        .spawn(move || {
            while let Ok(env) = sub.recv() {
                // Lossy: nobody listening is not an error.
                let _ = realtime_tx.send(RealtimeMessage::from_envelope(&env));
            }
            tracing::debug!("event bus closed; realtime bridge stopped");
        })
        .map_err(|e| ApiError::internal(format!("failed to start realtime bridge: {e}")))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use gasline_auth::{Principal, Role};
    use gasline_core::UserId;
    use uuid::Uuid;

    use crate::context::PrincipalContext;

    pub fn services() -> AppServices {
        AppServices::new(
            Arc::new(InMemoryEventStore::new()),
            Hs256Jwt::new(b"test-secret", chrono::Duration::minutes(10)),
            std::env::temp_dir(),
        )
        .unwrap()
    }

    pub fn ctx(user_id: UserId, role: Role) -> PrincipalContext {
        PrincipalContext::new(
            Principal::new(user_id, "tester", role),
            Uuid::new_v4(),
            chrono::Utc::now(),
        )
    }
}
