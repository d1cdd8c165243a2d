use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, put},
};
use serde_json::{Value as JsonValue, json};

use gasline_auth::Role;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::services::{AppServices, NewUser, UserChanges};
use crate::authz::{CmdAuth, authorize_command, require};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", put(update_user).delete(delete_user))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(q): ApiQuery<dto::UsersQuery>,
) -> Result<Json<JsonValue>, ApiError> {
    require(&principal, "users.read")?;
    let role = dto::parse_opt::<Role>(q.role.as_deref())?;
    let users = services.list_users(role);
    Ok(Json(JsonValue::Array(users.iter().map(dto::user_to_json).collect())))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<dto::CreateUserRequest>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let new = NewUser {
        username: dto::required(body.username, "username")?,
        password: dto::required(body.password, "password")?,
        role: dto::parse_opt::<Role>(body.role.as_deref())?.unwrap_or(Role::User),
        phone: body.phone,
        real_name: body.real_name,
        station_id: body.station_id,
    };

    let cmd = CmdAuth::new(new, "users.write");
    authorize_command(&principal, &cmd)?;

    let user = services.create_user(cmd.inner)?;
    Ok((StatusCode::CREATED, Json(dto::user_to_json(&user))))
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::UpdateUserRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let id = dto::parse_user_id(&id)?;
    let changes = UserChanges {
        role: dto::parse_opt::<Role>(body.role.as_deref())?,
        phone: body.phone,
        real_name: body.real_name,
        station_id: body.station_id,
        password: body.password,
    };

    let cmd = CmdAuth::new(changes, "users.write");
    authorize_command(&principal, &cmd)?;

    let user = services.update_user(id, cmd.inner)?;
    Ok(Json(dto::user_to_json(&user)))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    require(&principal, "users.write")?;
    let id = dto::parse_user_id(&id)?;
    services.delete_user(&principal, id)?;
    Ok(Json(json!({ "message": "deleted" })))
}
