use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, put},
};
use serde_json::{Value as JsonValue, json};

use gasline_bulletin::AnnouncementId;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::ApiJson;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_announcements).post(publish))
        .route("/:id", put(edit).delete(withdraw))
}

fn parse_announcement_id(raw: &str) -> Result<AnnouncementId, ApiError> {
    dto::parse_id(raw, "announcement").map(AnnouncementId::new)
}

pub async fn list_announcements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<JsonValue>, ApiError> {
    require(&principal, "announcements.read")?;
    let list = services.list_announcements();
    Ok(Json(JsonValue::Array(
        list.iter().map(|a| dto::announcement_to_json(&services, a)).collect(),
    )))
}

pub async fn publish(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<dto::AnnouncementRequest>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    require(&principal, "announcements.write")?;
    let title = dto::required(body.title, "title")?;
    let content = dto::required(body.content, "content")?;

    let announcement =
        services.publish_announcement(&principal, title, content, body.is_top.unwrap_or(false))?;
    Ok((
        StatusCode::CREATED,
        Json(dto::announcement_to_json(&services, &announcement)),
    ))
}

pub async fn edit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::AnnouncementRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    require(&principal, "announcements.write")?;
    let id = parse_announcement_id(&id)?;
    let announcement = services.edit_announcement(id, body.title, body.content, body.is_top)?;
    Ok(Json(dto::announcement_to_json(&services, &announcement)))
}

pub async fn withdraw(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    require(&principal, "announcements.write")?;
    services.withdraw_announcement(parse_announcement_id(&id)?)?;
    Ok(Json(json!({ "message": "deleted" })))
}
