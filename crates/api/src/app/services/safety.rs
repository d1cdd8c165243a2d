use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use gasline_auth::Role;
use gasline_core::AggregateId;
use gasline_infra::projections::SafetyRecordReadModel;
use gasline_orders::OrderId;
use gasline_safety::{
    FileInspection, HazardLevel, RectifyStatus, SafetyCommand, SafetyRecord, SafetyRecordId,
    UpdateRectification,
};

use super::AppServices;
use crate::app::errors::ApiError;
use crate::authz::require;
use crate::context::PrincipalContext;

pub const PHOTO_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "heic"];

#[derive(Debug, Clone)]
pub struct NewInspection {
    pub order_id: Option<OrderId>,
    pub check_items: JsonValue,
    pub hazard_level: HazardLevel,
    pub hazard_description: Option<String>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RectificationChange {
    pub status: Option<RectifyStatus>,
    pub photos: Vec<String>,
}

/// Stored name for an uploaded photo: `<YYYYmmddHHMMSS>_<8 hex>.<ext>`.
///
/// Files without an extension are stored as `jpg`.
pub fn photo_file_name(original: &str) -> Result<String, ApiError> {
    let ext = match original.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => "jpg".to_string(),
    };
    if !PHOTO_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::validation(format!(
            "unsupported file type .{ext}; allowed: {}",
            PHOTO_EXTENSIONS.join(", ")
        )));
    }
    let token = &Uuid::new_v4().simple().to_string()[..8];
    Ok(format!("{}_{token}.{ext}", Utc::now().format("%Y%m%d%H%M%S")))
}

fn make_record(id: AggregateId) -> SafetyRecord {
    SafetyRecord::empty(SafetyRecordId::new(id))
}

impl AppServices {
    fn safety_record(&self, id: SafetyRecordId) -> Result<SafetyRecordReadModel, ApiError> {
        self.read_models
            .safety
            .get(&id)
            .ok_or_else(|| ApiError::not_found("safety record"))
    }

    fn can_see_record(&self, ctx: &PrincipalContext, record: &SafetyRecordReadModel) -> bool {
        match ctx.role() {
            Role::Admin | Role::Station => true,
            Role::Delivery => record.inspector_id == ctx.user_id(),
            Role::User => record
                .order_id
                .and_then(|id| self.read_models.orders.get(&OrderId::new(id)))
                .is_some_and(|o| o.customer_id == ctx.user_id()),
        }
    }

    /// Records visible to the caller, newest first.
    pub fn list_safety_records(
        &self,
        ctx: &PrincipalContext,
        hazard_level: Option<HazardLevel>,
        rectify_status: Option<RectifyStatus>,
    ) -> Vec<SafetyRecordReadModel> {
        let mut out: Vec<_> = self
            .read_models
            .safety
            .list()
            .into_iter()
            .filter(|r| hazard_level.is_none_or(|h| r.hazard_level == h))
            .filter(|r| rectify_status.is_none_or(|s| r.rectify_status == Some(s)))
            .filter(|r| self.can_see_record(ctx, r))
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.0.cmp(&a.id.0)));
        out
    }

    pub fn file_inspection(
        &self,
        ctx: &PrincipalContext,
        new: NewInspection,
    ) -> Result<SafetyRecordReadModel, ApiError> {
        let _gate = self.write_gate()?;

        // Couriers only see orders assigned to them.
        if let Some(order_id) = new.order_id {
            self.order_for(ctx, order_id)?;
        }

        let agg = AggregateId::new();
        let record_id = SafetyRecordId::new(agg);
        self.dispatch::<SafetyRecord>(
            agg,
            SafetyRecord::AGGREGATE_TYPE,
            SafetyCommand::File(FileInspection {
                record_id,
                inspector_id: ctx.user_id(),
                order_id: new.order_id.map(|o| o.0),
                check_items: new.check_items,
                hazard_level: new.hazard_level,
                hazard_description: new.hazard_description,
                photos: new.photos,
                occurred_at: Utc::now(),
            }),
            make_record,
        )?;

        let record = self.safety_record(record_id)?;
        if record.hazard_level.needs_rectification() {
            tracing::warn!(record_id = %record_id, hazard = %record.hazard_level, inspector = %ctx.username(), "hazard reported");
        } else {
            tracing::info!(record_id = %record_id, inspector = %ctx.username(), "inspection filed");
        }
        Ok(record)
    }

    /// Rectification update, allowed to staff with `safety.rectify` and to the inspector.
    pub fn update_rectification(
        &self,
        ctx: &PrincipalContext,
        id: SafetyRecordId,
        change: RectificationChange,
    ) -> Result<SafetyRecordReadModel, ApiError> {
        let _gate = self.write_gate()?;
        let record = self.safety_record(id)?;
        if record.inspector_id != ctx.user_id() {
            require(ctx, "safety.rectify")?;
        }

        self.dispatch::<SafetyRecord>(
            id.0,
            SafetyRecord::AGGREGATE_TYPE,
            SafetyCommand::UpdateRectification(UpdateRectification {
                record_id: id,
                status: change.status,
                photos: change.photos,
                occurred_at: Utc::now(),
            }),
            make_record,
        )?;

        let record = self.safety_record(id)?;
        if record.rectify_status == Some(RectifyStatus::Completed) {
            tracing::info!(record_id = %id, by = %ctx.username(), "rectification completed");
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::test_support::{ctx, services};
    use crate::app::services::{NewCylinder, NewOrder, NewUser};
    use gasline_inventory::{CylinderSpec, CylinderStatus};
    use serde_json::json;

    fn user(svc: &AppServices, name: &str, role: Role) -> PrincipalContext {
        let u = svc
            .create_user(NewUser {
                username: name.to_string(),
                password: "secret123".to_string(),
                role,
                phone: None,
                real_name: None,
                station_id: None,
            })
            .unwrap();
        ctx(u.id, role)
    }

    fn inspection(order_id: Option<OrderId>, hazard: HazardLevel) -> NewInspection {
        NewInspection {
            order_id,
            check_items: json!({"valve": true, "hose": false}),
            hazard_level: hazard,
            hazard_description: (hazard != HazardLevel::None).then(|| "hose cracked".to_string()),
            photos: vec!["/uploads/a.jpg".to_string()],
        }
    }

    #[test]
    fn photo_names_keep_allowed_extensions() {
        let name = photo_file_name("IMG_1.PNG").unwrap();
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), 14 + 1 + 8 + 4);
        assert!(photo_file_name("scan").unwrap().ends_with(".jpg"));
        assert!(matches!(photo_file_name("virus.exe"), Err(ApiError::Validation(_))));
    }

    #[test]
    fn couriers_file_only_against_their_orders() {
        let svc = services();
        let admin = user(&svc, "admin", Role::Admin);
        let courier = user(&svc, "courier", Role::Delivery);
        let stranger = user(&svc, "courier2", Role::Delivery);
        let customer = user(&svc, "customer", Role::User);
        svc.create_cylinder(NewCylinder {
            serial_code: Some("S1".into()),
            spec: CylinderSpec::Kg5,
            status: CylinderStatus::InStock,
            manufacturer: None,
            manufacture_date: None,
            expiry_date: None,
            station_id: None,
        })
        .unwrap();
        let order = svc
            .place_order(
                &customer,
                NewOrder {
                    spec: CylinderSpec::Kg5,
                    quantity: 1,
                    address: "2 Side St".into(),
                    contact_name: None,
                    contact_phone: None,
                    remark: None,
                },
            )
            .unwrap();
        svc.assign_order(order.id, courier.user_id()).unwrap();

        assert!(matches!(
            svc.file_inspection(&stranger, inspection(Some(order.id), HazardLevel::None)),
            Err(ApiError::Forbidden(_))
        ));
        let record = svc
            .file_inspection(&courier, inspection(Some(order.id), HazardLevel::High))
            .unwrap();
        assert_eq!(record.rectify_status, Some(RectifyStatus::Pending));

        assert_eq!(svc.list_safety_records(&customer, None, None).len(), 1);
        assert!(svc.list_safety_records(&stranger, None, None).is_empty());
        assert_eq!(svc.list_safety_records(&admin, Some(HazardLevel::High), None).len(), 1);
        assert!(svc
            .list_safety_records(&admin, None, Some(RectifyStatus::Completed))
            .is_empty());
    }

    #[test]
    fn rectification_needs_permission_or_authorship() {
        let svc = services();
        let station = user(&svc, "station", Role::Station);
        let courier = user(&svc, "courier", Role::Delivery);
        let other = user(&svc, "courier2", Role::Delivery);

        let record = svc.file_inspection(&courier, inspection(None, HazardLevel::Medium)).unwrap();

        let change = RectificationChange {
            status: Some(RectifyStatus::Completed),
            photos: vec!["/uploads/fixed.jpg".into()],
        };
        assert!(matches!(
            svc.update_rectification(&other, record.id, change.clone()),
            Err(ApiError::Forbidden(_))
        ));

        let done = svc.update_rectification(&station, record.id, change.clone()).unwrap();
        assert_eq!(done.rectify_status, Some(RectifyStatus::Completed));
        assert_eq!(done.rectify_photos, vec!["/uploads/fixed.jpg".to_string()]);

        assert!(matches!(
            svc.update_rectification(&courier, record.id, change),
            Err(ApiError::Invariant(_))
        ));
    }
}
