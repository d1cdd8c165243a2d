use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Extension, Multipart, Path},
    http::StatusCode,
    routing::{get, post, put},
};
use serde_json::{Value as JsonValue, json};

use gasline_safety::{HazardLevel, RectifyStatus, SafetyRecordId};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::routes::orders::parse_order_id;
use crate::app::services::{
    AppServices, NewInspection, RectificationChange, photo_file_name,
};
use crate::authz::{CmdAuth, authorize_command, require};
use crate::context::PrincipalContext;

const MAX_PHOTO_BYTES: usize = 16 * 1024 * 1024;

pub fn router() -> Router {
    Router::new()
        .route("/records", get(list_records).post(file_record))
        .route("/records/:id", put(update_record))
        .route(
            "/upload",
            post(upload_photo).layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES)),
        )
}

pub async fn list_records(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(q): ApiQuery<dto::SafetyQuery>,
) -> Result<Json<JsonValue>, ApiError> {
    require(&principal, "safety.read")?;
    let hazard = dto::parse_opt::<HazardLevel>(q.hazard_level.as_deref())?;
    let rectify = dto::parse_opt::<RectifyStatus>(q.rectify_status.as_deref())?;
    let records = services.list_safety_records(&principal, hazard, rectify);
    Ok(Json(JsonValue::Array(
        records
            .iter()
            .map(|r| dto::safety_record_to_json(&services, r))
            .collect(),
    )))
}

pub async fn file_record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<dto::CreateSafetyRecordRequest>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let order_id = body
        .order_id
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_order_id)
        .transpose()?;
    let new = NewInspection {
        order_id,
        check_items: body.check_items.unwrap_or(JsonValue::Null),
        hazard_level: dto::parse_opt::<HazardLevel>(body.hazard_level.as_deref())?
            .unwrap_or(HazardLevel::None),
        hazard_description: body.hazard_description,
        photos: body.photos,
    };

    let cmd = CmdAuth::new(new, "safety.write");
    authorize_command(&principal, &cmd)?;

    let record = services.file_inspection(&principal, cmd.inner)?;
    Ok((
        StatusCode::CREATED,
        Json(dto::safety_record_to_json(&services, &record)),
    ))
}

/// Staff with `safety.rectify` or the record's inspector may update it.
pub async fn update_record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::UpdateSafetyRecordRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let id = SafetyRecordId::new(dto::parse_id(&id, "safety record")?);
    let change = RectificationChange {
        status: dto::parse_opt::<RectifyStatus>(body.rectify_status.as_deref())?,
        photos: body.rectify_photos,
    };

    let record = services.update_rectification(&principal, id, change)?;
    Ok(Json(dto::safety_record_to_json(&services, &record)))
}

pub async fn upload_photo(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    mut multipart: Multipart,
) -> Result<Json<JsonValue>, ApiError> {
    require(&principal, "safety.write")?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("malformed upload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original = field.file_name().unwrap_or_default().to_string();
        if original.trim().is_empty() {
            return Err(ApiError::validation("no file selected"));
        }
        let filename = photo_file_name(&original)?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("malformed upload: {e}")))?;

        let dir = services.upload_dir();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ApiError::internal(format!("cannot create upload dir: {e}")))?;
        tokio::fs::write(dir.join(&filename), &bytes)
            .await
            .map_err(|e| ApiError::internal(format!("cannot store upload: {e}")))?;

        tracing::info!(file = %filename, bytes = bytes.len(), by = %principal.username(), "photo uploaded");
        return Ok(Json(json!({
            "filename": filename,
            "url": format!("/uploads/{filename}"),
        })));
    }

    Err(ApiError::validation("no file uploaded"))
}
