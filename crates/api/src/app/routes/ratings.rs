use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    routing::get,
};
use serde_json::Value as JsonValue;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::routes::orders::parse_order_id;
use crate::app::services::AppServices;
use crate::authz::{CmdAuth, authorize_command, require};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_ratings).post(create_rating))
}

pub async fn list_ratings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(q): ApiQuery<dto::RatingsQuery>,
) -> Result<Json<JsonValue>, ApiError> {
    require(&principal, "ratings.read")?;
    let order_id = q
        .order_id
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_order_id)
        .transpose()?;
    let ratings = services.list_ratings(&principal, order_id);
    Ok(Json(JsonValue::Array(ratings.iter().map(dto::rating_to_json).collect())))
}

pub async fn create_rating(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<dto::CreateRatingRequest>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let order_id = parse_order_id(&dto::required(body.order_id, "order_id")?)?;
    let score = u8::try_from(body.score.unwrap_or(5))
        .map_err(|_| ApiError::validation("score must be between 1 and 5"))?;

    let cmd = CmdAuth::new((order_id, score, body.comment), "ratings.write");
    authorize_command(&principal, &cmd)?;

    let (order_id, score, comment) = cmd.inner;
    let rating = services.rate_order(&principal, order_id, score, comment)?;
    Ok((StatusCode::CREATED, Json(dto::rating_to_json(&rating))))
}
