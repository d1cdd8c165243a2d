use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;

use gasline_events::EventEnvelope;
use gasline_inventory::{Cylinder, CylinderEvent, CylinderId, CylinderSpec, CylinderStatus};

use super::{decode, ensure_same_stream, rebuild_order, ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CylinderReadModel {
    pub id: CylinderId,
    pub serial_code: String,
    pub spec: CylinderSpec,
    pub status: CylinderStatus,
    pub manufacturer: Option<String>,
    pub manufacture_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub last_check_date: Option<NaiveDate>,
    pub station_id: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Live cylinders by id. Retired cylinders are dropped.
#[derive(Debug)]
pub struct CylindersProjection<S = InMemoryReadStore<CylinderId, CylinderReadModel>>
where
    S: ReadStore<CylinderId, CylinderReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> Default for CylindersProjection<S>
where
    S: ReadStore<CylinderId, CylinderReadModel> + Default,
{
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S> CylindersProjection<S>
where
    S: ReadStore<CylinderId, CylinderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &CylinderId) -> Option<CylinderReadModel> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<CylinderReadModel> {
        self.store.list()
    }

    pub fn find_by_serial(&self, serial_code: &str) -> Option<CylinderReadModel> {
        self.store
            .list()
            .into_iter()
            .find(|c| c.serial_code == serial_code)
    }

    /// In-stock cylinders of `spec`, earliest expiry first (undated last), then by serial.
    pub fn available(&self, spec: CylinderSpec) -> Vec<CylinderReadModel> {
        let mut out: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|c| c.spec == spec && c.status == CylinderStatus::InStock)
            .collect();
        out.sort_by(|a, b| {
            let ka = (a.expiry_date.is_none(), a.expiry_date, &a.serial_code);
            let kb = (b.expiry_date.is_none(), b.expiry_date, &b.serial_code);
            ka.cmp(&kb)
        });
        out
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(ev) = decode::<CylinderEvent>(envelope, Cylinder::AGGREGATE_TYPE, &self.cursors)?
        else {
            return Ok(());
        };

        match ev {
            CylinderEvent::Registered(e) => {
                ensure_same_stream(envelope, e.cylinder_id.0)?;
                self.store.upsert(
                    e.cylinder_id,
                    CylinderReadModel {
                        id: e.cylinder_id,
                        serial_code: e.serial_code,
                        spec: e.spec,
                        status: e.status,
                        manufacturer: e.manufacturer,
                        manufacture_date: e.manufacture_date,
                        expiry_date: e.expiry_date,
                        last_check_date: None,
                        station_id: e.station_id,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            CylinderEvent::DetailsUpdated(e) => {
                ensure_same_stream(envelope, e.cylinder_id.0)?;
                if let Some(mut rm) = self.store.get(&e.cylinder_id) {
                    if let Some(spec) = e.spec {
                        rm.spec = spec;
                    }
                    if e.manufacturer.is_some() {
                        rm.manufacturer = e.manufacturer;
                    }
                    if e.manufacture_date.is_some() {
                        rm.manufacture_date = e.manufacture_date;
                    }
                    if e.expiry_date.is_some() {
                        rm.expiry_date = e.expiry_date;
                    }
                    if e.last_check_date.is_some() {
                        rm.last_check_date = e.last_check_date;
                    }
                    if e.station_id.is_some() {
                        rm.station_id = e.station_id;
                    }
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.cylinder_id, rm);
                }
            }
            CylinderEvent::StatusChanged(e) => {
                ensure_same_stream(envelope, e.cylinder_id.0)?;
                if let Some(mut rm) = self.store.get(&e.cylinder_id) {
                    rm.status = e.to;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(e.cylinder_id, rm);
                }
            }
            CylinderEvent::Retired(e) => {
                ensure_same_stream(envelope, e.cylinder_id.0)?;
                self.store.remove(&e.cylinder_id);
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
