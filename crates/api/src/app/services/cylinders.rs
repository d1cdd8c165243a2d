use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use gasline_core::{AggregateId, DomainError};
use gasline_infra::projections::CylinderReadModel;
use gasline_inventory::{
    ChangeCylinderStatus, Cylinder, CylinderCommand, CylinderId, CylinderSpec, CylinderStatus,
    RegisterCylinder, RetireCylinder, UpdateCylinderDetails,
};

use super::AppServices;
use crate::app::errors::ApiError;

#[derive(Debug, Clone)]
pub struct NewCylinder {
    pub serial_code: Option<String>,
    pub spec: CylinderSpec,
    pub status: CylinderStatus,
    pub manufacturer: Option<String>,
    pub manufacture_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub station_id: Option<u32>,
}

/// Details edit; `status` is routed through the transition table.
#[derive(Debug, Clone, Default)]
pub struct CylinderDetails {
    pub spec: Option<CylinderSpec>,
    pub status: Option<CylinderStatus>,
    pub manufacturer: Option<String>,
    pub manufacture_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub last_check_date: Option<NaiveDate>,
    pub station_id: Option<u32>,
}

/// `<prefix><YYYYmmddHHMMSS><4 upper hex>`, e.g. `CYL20250301120000A1B2`.
pub(crate) fn generate_code(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..4].to_uppercase();
    format!("{prefix}{}{suffix}", Utc::now().format("%Y%m%d%H%M%S"))
}

impl AppServices {
    pub fn cylinder(&self, id: CylinderId) -> Result<CylinderReadModel, ApiError> {
        self.read_models
            .cylinders
            .get(&id)
            .ok_or_else(|| ApiError::not_found("cylinder"))
    }

    /// Cylinders, newest first.
    pub fn list_cylinders(
        &self,
        status: Option<CylinderStatus>,
        spec: Option<CylinderSpec>,
    ) -> Vec<CylinderReadModel> {
        let mut out: Vec<_> = self
            .read_models
            .cylinders
            .list()
            .into_iter()
            .filter(|c| status.is_none_or(|s| c.status == s))
            .filter(|c| spec.is_none_or(|s| c.spec == s))
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.0.cmp(&a.id.0)));
        out
    }

    pub fn create_cylinder(&self, new: NewCylinder) -> Result<CylinderReadModel, ApiError> {
        let _gate = self.write_gate()?;

        let serial_code = match new.serial_code.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => generate_code("CYL"),
        };
        if self.read_models.cylinders.find_by_serial(&serial_code).is_some() {
            return Err(ApiError::conflict(format!(
                "serial code {serial_code} already exists"
            )));
        }

        let agg = AggregateId::new();
        let cylinder_id = CylinderId::new(agg);
        self.dispatch::<Cylinder>(
            agg,
            Cylinder::AGGREGATE_TYPE,
            CylinderCommand::Register(RegisterCylinder {
                cylinder_id,
                serial_code,
                spec: new.spec,
                initial_status: new.status,
                manufacturer: new.manufacturer,
                manufacture_date: new.manufacture_date,
                expiry_date: new.expiry_date,
                station_id: new.station_id,
                occurred_at: Utc::now(),
            }),
            |id| Cylinder::empty(CylinderId::new(id)),
        )?;

        let cylinder = self.cylinder(cylinder_id)?;
        tracing::info!(cylinder_id = %agg, serial = %cylinder.serial_code, "cylinder registered");
        Ok(cylinder)
    }

    pub fn update_cylinder(
        &self,
        id: CylinderId,
        details: CylinderDetails,
    ) -> Result<CylinderReadModel, ApiError> {
        let _gate = self.write_gate()?;
        let current = self.cylinder(id)?;

        // An unchanged status is not a transition. A refused one rejects the whole edit.
        let move_to = details.status.filter(|s| *s != current.status);
        if let Some(to) = move_to {
            if !current.status.can_move_to(to) {
                return Err(DomainError::illegal_transition("cylinder", current.status, to).into());
            }
        }

        self.dispatch::<Cylinder>(
            id.0,
            Cylinder::AGGREGATE_TYPE,
            CylinderCommand::UpdateDetails(UpdateCylinderDetails {
                cylinder_id: id,
                spec: details.spec,
                manufacturer: details.manufacturer,
                manufacture_date: details.manufacture_date,
                expiry_date: details.expiry_date,
                last_check_date: details.last_check_date,
                station_id: details.station_id,
                occurred_at: Utc::now(),
            }),
            |id| Cylinder::empty(CylinderId::new(id)),
        )?;

        if let Some(to) = move_to {
            self.move_cylinder(id, to)?;
        }

        self.cylinder(id)
    }

    pub fn change_cylinder_status(
        &self,
        id: CylinderId,
        to: CylinderStatus,
    ) -> Result<CylinderReadModel, ApiError> {
        let _gate = self.write_gate()?;
        self.cylinder(id)?;
        self.move_cylinder(id, to)?;
        self.cylinder(id)
    }

    pub fn retire_cylinder(&self, id: CylinderId) -> Result<(), ApiError> {
        let _gate = self.write_gate()?;
        let current = self.cylinder(id)?;
        self.dispatch::<Cylinder>(
            id.0,
            Cylinder::AGGREGATE_TYPE,
            CylinderCommand::Retire(RetireCylinder {
                cylinder_id: id,
                occurred_at: Utc::now(),
            }),
            |id| Cylinder::empty(CylinderId::new(id)),
        )?;
        tracing::info!(cylinder_id = %id.0, serial = %current.serial_code, "cylinder retired");
        Ok(())
    }

    /// Single transition; callers hold the write gate.
    pub(crate) fn move_cylinder(&self, id: CylinderId, to: CylinderStatus) -> Result<(), ApiError> {
        self.dispatch::<Cylinder>(
            id.0,
            Cylinder::AGGREGATE_TYPE,
            CylinderCommand::ChangeStatus(ChangeCylinderStatus {
                cylinder_id: id,
                to,
                occurred_at: Utc::now(),
            }),
            |id| Cylinder::empty(CylinderId::new(id)),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::test_support::services;

    fn new_cylinder(serial: Option<&str>) -> NewCylinder {
        NewCylinder {
            serial_code: serial.map(str::to_string),
            spec: CylinderSpec::Kg15,
            status: CylinderStatus::InStock,
            manufacturer: Some("Acme".to_string()),
            manufacture_date: NaiveDate::from_ymd_opt(2023, 1, 1),
            expiry_date: NaiveDate::from_ymd_opt(2033, 1, 1),
            station_id: Some(1),
        }
    }

    #[test]
    fn generated_codes_have_timestamp_and_suffix() {
        let code = generate_code("CYL");
        assert!(code.starts_with("CYL"));
        assert_eq!(code.len(), 3 + 14 + 4);
        assert!(code[17..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn serial_codes_are_unique() {
        let svc = services();
        svc.create_cylinder(new_cylinder(Some("CYL001"))).unwrap();
        let err = svc.create_cylinder(new_cylinder(Some("CYL001"))).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let generated = svc.create_cylinder(new_cylinder(None)).unwrap();
        assert!(generated.serial_code.starts_with("CYL"));
    }

    #[test]
    fn details_status_goes_through_transitions() {
        let svc = services();
        let cyl = svc.create_cylinder(new_cylinder(Some("CYL002"))).unwrap();

        let err = svc
            .update_cylinder(
                cyl.id,
                CylinderDetails {
                    status: Some(CylinderStatus::Empty),
                    ..CylinderDetails::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::Invariant(_)));

        let updated = svc
            .update_cylinder(
                cyl.id,
                CylinderDetails {
                    status: Some(CylinderStatus::Delivering),
                    manufacturer: Some("Other".to_string()),
                    ..CylinderDetails::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, CylinderStatus::Delivering);
        assert_eq!(updated.manufacturer.as_deref(), Some("Other"));
    }

    #[test]
    fn refused_status_keeps_the_details_unchanged() {
        let svc = services();
        let cyl = svc.create_cylinder(new_cylinder(Some("CYL004"))).unwrap();

        let err = svc
            .update_cylinder(
                cyl.id,
                CylinderDetails {
                    status: Some(CylinderStatus::Empty),
                    manufacturer: Some("Changed".to_string()),
                    ..CylinderDetails::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot move cylinder from in_stock to empty");

        let after = svc.cylinder(cyl.id).unwrap();
        assert_eq!(after.manufacturer.as_deref(), Some("Acme"));
        assert_eq!(after.status, CylinderStatus::InStock);
    }

    #[test]
    fn cylinders_in_circulation_cannot_be_retired() {
        let svc = services();
        let cyl = svc.create_cylinder(new_cylinder(Some("CYL003"))).unwrap();
        svc.change_cylinder_status(cyl.id, CylinderStatus::Delivering).unwrap();

        assert!(matches!(svc.retire_cylinder(cyl.id), Err(ApiError::Invariant(_))));

        svc.change_cylinder_status(cyl.id, CylinderStatus::InStock).unwrap();
        svc.retire_cylinder(cyl.id).unwrap();
        assert!(matches!(svc.cylinder(cyl.id), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn listing_filters_by_status_and_spec() {
        let svc = services();
        svc.create_cylinder(new_cylinder(Some("A"))).unwrap();
        svc.create_cylinder(NewCylinder {
            spec: CylinderSpec::Kg5,
            ..new_cylinder(Some("B"))
        })
        .unwrap();

        assert_eq!(svc.list_cylinders(None, None).len(), 2);
        assert_eq!(svc.list_cylinders(None, Some(CylinderSpec::Kg5)).len(), 1);
        assert!(svc.list_cylinders(Some(CylinderStatus::Empty), None).is_empty());
    }
}
