use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, put},
};
use serde_json::{Value as JsonValue, json};

use gasline_infra::stats::CylinderStats;
use gasline_inventory::{CylinderId, CylinderSpec, CylinderStatus};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::services::{AppServices, CylinderDetails, NewCylinder};
use crate::authz::{CmdAuth, authorize_command, require};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_cylinders).post(create_cylinder))
        .route("/stats", get(cylinder_stats))
        .route("/:id", put(update_cylinder).delete(retire_cylinder))
        .route("/:id/status", put(change_status))
}

fn parse_cylinder_id(raw: &str) -> Result<CylinderId, ApiError> {
    dto::parse_id(raw, "cylinder").map(CylinderId::new)
}

pub async fn list_cylinders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(q): ApiQuery<dto::CylindersQuery>,
) -> Result<Json<JsonValue>, ApiError> {
    require(&principal, "cylinders.read")?;
    let status = dto::parse_opt::<CylinderStatus>(q.status.as_deref())?;
    let spec = dto::parse_opt::<CylinderSpec>(q.specs.as_deref())?;
    let cylinders = services.list_cylinders(status, spec);
    Ok(Json(JsonValue::Array(cylinders.iter().map(dto::cylinder_to_json).collect())))
}

pub async fn cylinder_stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<CylinderStats>, ApiError> {
    require(&principal, "cylinders.read")?;
    Ok(Json(services.cylinder_stats()))
}

pub async fn create_cylinder(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<dto::CreateCylinderRequest>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let spec = dto::parse_opt::<CylinderSpec>(body.specs.as_deref())?
        .ok_or_else(|| ApiError::validation("specs is required"))?;
    let new = NewCylinder {
        serial_code: body.serial_code,
        spec,
        status: dto::parse_opt::<CylinderStatus>(body.status.as_deref())?
            .unwrap_or(CylinderStatus::InStock),
        manufacturer: body.manufacturer,
        manufacture_date: dto::parse_date(body.manufacture_date.as_deref(), "manufacture_date")?,
        expiry_date: dto::parse_date(body.expiry_date.as_deref(), "expiry_date")?,
        station_id: body.station_id,
    };

    let cmd = CmdAuth::new(new, "cylinders.write");
    authorize_command(&principal, &cmd)?;

    let cylinder = services.create_cylinder(cmd.inner)?;
    Ok((StatusCode::CREATED, Json(dto::cylinder_to_json(&cylinder))))
}

pub async fn update_cylinder(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::UpdateCylinderRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let id = parse_cylinder_id(&id)?;
    let details = CylinderDetails {
        spec: dto::parse_opt::<CylinderSpec>(body.specs.as_deref())?,
        status: dto::parse_opt::<CylinderStatus>(body.status.as_deref())?,
        manufacturer: body.manufacturer,
        manufacture_date: dto::parse_date(body.manufacture_date.as_deref(), "manufacture_date")?,
        expiry_date: dto::parse_date(body.expiry_date.as_deref(), "expiry_date")?,
        last_check_date: dto::parse_date(body.last_check_date.as_deref(), "last_check_date")?,
        station_id: body.station_id,
    };

    let cmd = CmdAuth::new(details, "cylinders.write");
    authorize_command(&principal, &cmd)?;

    let cylinder = services.update_cylinder(id, cmd.inner)?;
    Ok(Json(dto::cylinder_to_json(&cylinder)))
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::StatusRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let id = parse_cylinder_id(&id)?;
    let to = dto::parse_opt::<CylinderStatus>(body.status.as_deref())?
        .ok_or_else(|| ApiError::validation("status is required"))?;

    let cmd = CmdAuth::new(to, "cylinders.write");
    authorize_command(&principal, &cmd)?;

    let cylinder = services.change_cylinder_status(id, cmd.inner)?;
    Ok(Json(dto::cylinder_to_json(&cylinder)))
}

pub async fn retire_cylinder(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    require(&principal, "cylinders.write")?;
    let id = parse_cylinder_id(&id)?;
    services.retire_cylinder(id)?;
    Ok(Json(json!({ "message": "deleted" })))
}
