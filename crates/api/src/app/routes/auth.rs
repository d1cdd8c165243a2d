use std::sync::Arc;

use axum::{Json, extract::Extension};
use chrono::Utc;
use serde_json::{Value as JsonValue, json};

use crate::app::errors::ApiError;
use crate::app::extract::ApiJson;
use crate::app::services::AppServices;
use crate::app::dto;
use crate::context::PrincipalContext;

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::LoginRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let (Some(username), Some(password)) = (body.username, body.password) else {
        return Err(ApiError::validation("username and password are required"));
    };

    let user = services.authenticate(&username, &password)?;
    let (token, claims) = services.jwt().issue(user.id, &user.username, user.role, Utc::now())?;
    tracing::info!(user_id = %user.id, username = %user.username, "login");

    Ok(Json(json!({
        "message": "login successful",
        "token": token,
        "expires_at": claims.expires_at,
        "user": dto::user_to_json(&user),
    })))
}

pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Json<JsonValue> {
    services
        .revocations()
        .revoke(principal.token_id(), principal.token_expires_at(), Utc::now());
    tracing::info!(user_id = %principal.user_id(), "logout");
    Json(json!({ "message": "logged out" }))
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<JsonValue>, ApiError> {
    let user = services.user(principal.user_id())?;
    Ok(Json(dto::user_to_json(&user)))
}
