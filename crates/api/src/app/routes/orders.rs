use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, put},
};
use serde_json::Value as JsonValue;

use gasline_inventory::CylinderSpec;
use gasline_orders::{OrderId, OrderStatus};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::services::{AppServices, NewOrder, StatusChange};
use crate::authz::{CmdAuth, authorize_command, require};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(place_order))
        .route("/:id", get(get_order))
        .route("/:id/assign", put(assign_order))
        .route("/:id/status", put(change_status))
        .route("/:id/rating", get(get_rating))
}

pub(crate) fn parse_order_id(raw: &str) -> Result<OrderId, ApiError> {
    dto::parse_id(raw, "order").map(OrderId::new)
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(q): ApiQuery<dto::OrdersQuery>,
) -> Result<Json<JsonValue>, ApiError> {
    require(&principal, "orders.read")?;
    let status = dto::parse_opt::<OrderStatus>(q.status.as_deref())?;
    let orders = services.list_orders(&principal, status);
    Ok(Json(JsonValue::Array(
        orders.iter().map(|o| dto::order_to_json(&services, o)).collect(),
    )))
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    require(&principal, "orders.read")?;
    let order = services.order_for(&principal, parse_order_id(&id)?)?;
    Ok(Json(dto::order_to_json(&services, &order)))
}

pub async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<dto::CreateOrderRequest>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let spec = dto::parse_opt::<CylinderSpec>(body.specs.as_deref())?
        .ok_or_else(|| ApiError::validation("specs is required"))?;
    let address = dto::required(body.address, "address")?;
    let quantity = body.quantity.unwrap_or(1);
    let quantity = u32::try_from(quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or_else(|| ApiError::validation("quantity must be a positive integer"))?;

    let new = NewOrder {
        spec,
        quantity,
        address,
        contact_name: body.contact_name,
        contact_phone: body.contact_phone,
        remark: body.remark,
    };
    let cmd = CmdAuth::new(new, "orders.create");
    authorize_command(&principal, &cmd)?;

    let order = services.place_order(&principal, cmd.inner)?;
    Ok((StatusCode::CREATED, Json(dto::order_to_json(&services, &order))))
}

pub async fn assign_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::AssignOrderRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let id = parse_order_id(&id)?;
    let courier = dto::required(body.delivery_id, "delivery_id")?;
    let courier_id = dto::parse_user_id(&courier)?;

    let cmd = CmdAuth::new(courier_id, "orders.assign");
    authorize_command(&principal, &cmd)?;

    let order = services.assign_order(id, cmd.inner)?;
    Ok(Json(dto::order_to_json(&services, &order)))
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::StatusRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let id = parse_order_id(&id)?;
    let status = dto::parse_opt::<OrderStatus>(body.status.as_deref())?
        .ok_or_else(|| ApiError::validation("status is required"))?;

    let cmd = CmdAuth::new(
        StatusChange {
            status,
            reason: body.reason,
        },
        "orders.transition",
    );
    authorize_command(&principal, &cmd)?;

    let order = services.change_order_status(&principal, id, cmd.inner)?;
    Ok(Json(dto::order_to_json(&services, &order)))
}

pub async fn get_rating(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    require(&principal, "ratings.read")?;
    let rating = services.order_rating(&principal, parse_order_id(&id)?)?;
    Ok(Json(dto::rating_to_json(&rating)))
}
