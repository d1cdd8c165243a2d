use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use gasline_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use gasline_events::Event;

use crate::{CylinderSpec, CylinderStatus};

/// Cylinder identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CylinderId(pub AggregateId);

impl CylinderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CylinderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Cylinder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cylinder {
    id: CylinderId,
    serial_code: String,
    spec: CylinderSpec,
    status: CylinderStatus,
    manufacturer: Option<String>,
    manufacture_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
    last_check_date: Option<NaiveDate>,
    station_id: Option<u32>,
    version: u64,
    created: bool,
    retired: bool,
}

impl Cylinder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: CylinderId) -> Self {
        Self {
            id,
            serial_code: String::new(),
            spec: CylinderSpec::Kg15,
            status: CylinderStatus::InStock,
            manufacturer: None,
            manufacture_date: None,
            expiry_date: None,
            last_check_date: None,
            station_id: None,
            version: 0,
            created: false,
            retired: false,
        }
    }

    pub fn serial_code(&self) -> &str {
        &self.serial_code
    }

    pub fn spec(&self) -> CylinderSpec {
        self.spec
    }

    pub fn status(&self) -> CylinderStatus {
        self.status
    }

    pub fn expiry_date(&self) -> Option<NaiveDate> {
        self.expiry_date
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }
}

impl Cylinder {
    pub const AGGREGATE_TYPE: &'static str = "inventory.cylinder";
}

impl AggregateRoot for Cylinder {
    type Id = CylinderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterCylinder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCylinder {
    pub cylinder_id: CylinderId,
    pub serial_code: String,
    pub spec: CylinderSpec,
    pub initial_status: CylinderStatus,
    pub manufacturer: Option<String>,
    pub manufacture_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub station_id: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateCylinderDetails. `None` leaves a field unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCylinderDetails {
    pub cylinder_id: CylinderId,
    pub spec: Option<CylinderSpec>,
    pub manufacturer: Option<String>,
    pub manufacture_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub last_check_date: Option<NaiveDate>,
    pub station_id: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeCylinderStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCylinderStatus {
    pub cylinder_id: CylinderId,
    pub to: CylinderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RetireCylinder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetireCylinder {
    pub cylinder_id: CylinderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CylinderCommand {
    Register(RegisterCylinder),
    UpdateDetails(UpdateCylinderDetails),
    ChangeStatus(ChangeCylinderStatus),
    Retire(RetireCylinder),
}

/// Event: CylinderRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CylinderRegistered {
    pub cylinder_id: CylinderId,
    pub serial_code: String,
    pub spec: CylinderSpec,
    pub status: CylinderStatus,
    pub manufacturer: Option<String>,
    pub manufacture_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub station_id: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CylinderDetailsUpdated. Carries only changed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CylinderDetailsUpdated {
    pub cylinder_id: CylinderId,
    pub spec: Option<CylinderSpec>,
    pub manufacturer: Option<String>,
    pub manufacture_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub last_check_date: Option<NaiveDate>,
    pub station_id: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CylinderStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CylinderStatusChanged {
    pub cylinder_id: CylinderId,
    pub from: CylinderStatus,
    pub to: CylinderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CylinderRetired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CylinderRetired {
    pub cylinder_id: CylinderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CylinderEvent {
    Registered(CylinderRegistered),
    DetailsUpdated(CylinderDetailsUpdated),
    StatusChanged(CylinderStatusChanged),
    Retired(CylinderRetired),
}

impl Event for CylinderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CylinderEvent::Registered(_) => "inventory.cylinder.registered",
            CylinderEvent::DetailsUpdated(_) => "inventory.cylinder.details_updated",
            CylinderEvent::StatusChanged(_) => "inventory.cylinder.status_changed",
            CylinderEvent::Retired(_) => "inventory.cylinder.retired",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CylinderEvent::Registered(e) => e.occurred_at,
            CylinderEvent::DetailsUpdated(e) => e.occurred_at,
            CylinderEvent::StatusChanged(e) => e.occurred_at,
            CylinderEvent::Retired(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Cylinder {
    type Command = CylinderCommand;
    type Event = CylinderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CylinderEvent::Registered(e) => {
                self.id = e.cylinder_id;
                self.serial_code = e.serial_code.clone();
                self.spec = e.spec;
                self.status = e.status;
                self.manufacturer = e.manufacturer.clone();
                self.manufacture_date = e.manufacture_date;
                self.expiry_date = e.expiry_date;
                self.station_id = e.station_id;
                self.created = true;
            }
            CylinderEvent::DetailsUpdated(e) => {
                if let Some(spec) = e.spec {
                    self.spec = spec;
                }
                if let Some(m) = &e.manufacturer {
                    self.manufacturer = Some(m.clone());
                }
                if e.manufacture_date.is_some() {
                    self.manufacture_date = e.manufacture_date;
                }
                if e.expiry_date.is_some() {
                    self.expiry_date = e.expiry_date;
                }
                if e.last_check_date.is_some() {
                    self.last_check_date = e.last_check_date;
                }
                if e.station_id.is_some() {
                    self.station_id = e.station_id;
                }
            }
            CylinderEvent::StatusChanged(e) => {
                self.status = e.to;
            }
            CylinderEvent::Retired(_) => {
                self.retired = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CylinderCommand::Register(cmd) => self.handle_register(cmd),
            CylinderCommand::UpdateDetails(cmd) => self.handle_update_details(cmd),
            CylinderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            CylinderCommand::Retire(cmd) => self.handle_retire(cmd),
        }
    }
}

impl Cylinder {
    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.retired {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_cylinder_id(&self, cylinder_id: CylinderId) -> Result<(), DomainError> {
        if self.id != cylinder_id {
            return Err(DomainError::invariant("cylinder_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterCylinder) -> Result<Vec<CylinderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("cylinder already exists"));
        }
        let serial_code = cmd.serial_code.trim();
        if serial_code.is_empty() {
            return Err(DomainError::validation("serial_code cannot be empty"));
        }
        ensure_dates_ordered(cmd.manufacture_date, cmd.expiry_date)?;

        Ok(vec![CylinderEvent::Registered(CylinderRegistered {
            cylinder_id: cmd.cylinder_id,
            serial_code: serial_code.to_string(),
            spec: cmd.spec,
            status: cmd.initial_status,
            manufacturer: non_blank(cmd.manufacturer.as_deref()),
            manufacture_date: cmd.manufacture_date,
            expiry_date: cmd.expiry_date,
            station_id: cmd.station_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// An update that changes nothing is accepted and emits no events.
    fn handle_update_details(
        &self,
        cmd: &UpdateCylinderDetails,
    ) -> Result<Vec<CylinderEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_cylinder_id(cmd.cylinder_id)?;

        let spec = cmd.spec.filter(|s| *s != self.spec);
        if spec.is_some() && self.status.is_in_circulation() {
            return Err(DomainError::invariant(format!(
                "cannot change spec while cylinder is {}",
                self.status
            )));
        }

        ensure_dates_ordered(
            cmd.manufacture_date.or(self.manufacture_date),
            cmd.expiry_date.or(self.expiry_date),
        )?;

        let manufacturer =
            non_blank(cmd.manufacturer.as_deref()).filter(|m| self.manufacturer.as_ref() != Some(m));
        let manufacture_date = cmd.manufacture_date.filter(|d| self.manufacture_date != Some(*d));
        let expiry_date = cmd.expiry_date.filter(|d| self.expiry_date != Some(*d));
        let last_check_date = cmd.last_check_date.filter(|d| self.last_check_date != Some(*d));
        let station_id = cmd.station_id.filter(|s| self.station_id != Some(*s));

        if spec.is_none()
            && manufacturer.is_none()
            && manufacture_date.is_none()
            && expiry_date.is_none()
            && last_check_date.is_none()
            && station_id.is_none()
        {
            return Ok(Vec::new());
        }

        Ok(vec![CylinderEvent::DetailsUpdated(CylinderDetailsUpdated {
            cylinder_id: cmd.cylinder_id,
            spec,
            manufacturer,
            manufacture_date,
            expiry_date,
            last_check_date,
            station_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(
        &self,
        cmd: &ChangeCylinderStatus,
    ) -> Result<Vec<CylinderEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_cylinder_id(cmd.cylinder_id)?;

        if !self.status.can_move_to(cmd.to) {
            return Err(DomainError::illegal_transition("cylinder", self.status, cmd.to));
        }

        Ok(vec![CylinderEvent::StatusChanged(CylinderStatusChanged {
            cylinder_id: cmd.cylinder_id,
            from: self.status,
            to: cmd.to,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_retire(&self, cmd: &RetireCylinder) -> Result<Vec<CylinderEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_cylinder_id(cmd.cylinder_id)?;

        if self.status.is_in_circulation() {
            return Err(DomainError::invariant("cylinder is in use and cannot be deleted"));
        }

        Ok(vec![CylinderEvent::Retired(CylinderRetired {
            cylinder_id: cmd.cylinder_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn ensure_dates_ordered(
    manufacture: Option<NaiveDate>,
    expiry: Option<NaiveDate>,
) -> Result<(), DomainError> {
    if let (Some(m), Some(e)) = (manufacture, expiry) {
        if e <= m {
            return Err(DomainError::validation(
                "expiry_date must be later than manufacture_date",
            ));
        }
    }
    Ok(())
}

fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
