use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use gasline_core::{AggregateId, DomainError, UserId};
use gasline_infra::projections::{
    AnnouncementReadModel, CylinderReadModel, OrderReadModel, RatingReadModel,
    SafetyRecordReadModel, UserReadModel,
};
use gasline_orders::OrderId;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub real_name: Option<String>,
    pub station_id: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub role: Option<String>,
    pub phone: Option<String>,
    pub real_name: Option<String>,
    pub station_id: Option<u32>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCylinderRequest {
    pub serial_code: Option<String>,
    pub specs: Option<String>,
    pub status: Option<String>,
    pub manufacturer: Option<String>,
    pub manufacture_date: Option<String>,
    pub expiry_date: Option<String>,
    pub station_id: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCylinderRequest {
    pub specs: Option<String>,
    pub status: Option<String>,
    pub manufacturer: Option<String>,
    pub manufacture_date: Option<String>,
    pub expiry_date: Option<String>,
    pub last_check_date: Option<String>,
    pub station_id: Option<u32>,
}

/// Body of both status endpoints; `reason` only matters for order cancellation.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub specs: Option<String>,
    pub quantity: Option<i64>,
    pub address: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignOrderRequest {
    pub delivery_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSafetyRecordRequest {
    pub order_id: Option<String>,
    pub check_items: Option<JsonValue>,
    pub hazard_level: Option<String>,
    pub hazard_description: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSafetyRecordRequest {
    pub rectify_status: Option<String>,
    #[serde(default)]
    pub rectify_photos: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnnouncementRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_top: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRatingRequest {
    pub order_id: Option<String>,
    pub score: Option<i64>,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UsersQuery {
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CylindersQuery {
    pub status: Option<String>,
    pub specs: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SafetyQuery {
    pub hazard_level: Option<String>,
    pub rectify_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RatingsQuery {
    pub order_id: Option<String>,
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::validation(format!("{field} is required")))
}

/// Parse an enum-like field; empty strings count as absent (query strings send `?status=`).
pub fn parse_opt<T>(raw: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: core::str::FromStr<Err = DomainError>,
{
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>().map_err(ApiError::from))
        .transpose()
}

pub fn parse_id(raw: &str, what: &str) -> Result<AggregateId, ApiError> {
    raw.trim()
        .parse::<AggregateId>()
        .map_err(|_| ApiError::validation(format!("invalid {what} id")))
}

pub fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    parse_id(raw, "user").map(UserId::from)
}

pub fn parse_date(raw: Option<&str>, field: &str) -> Result<Option<NaiveDate>, ApiError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| ApiError::validation(format!("{field} must be formatted YYYY-MM-DD")))
        })
        .transpose()
}

// -------------------------
// Response mapping
// -------------------------

fn username_of(services: &AppServices, id: UserId) -> Option<String> {
    services.read_models().users.get(&id).map(|u| u.username)
}

pub fn user_to_json(rm: &UserReadModel) -> JsonValue {
    json!({
        "id": rm.id.to_string(),
        "username": rm.username,
        "role": rm.role.as_str(),
        "phone": rm.phone.as_ref().map(|p| p.as_str()),
        "real_name": rm.real_name,
        "station_id": rm.station_id,
        "created_at": rm.created_at,
    })
}

pub fn cylinder_to_json(rm: &CylinderReadModel) -> JsonValue {
    json!({
        "id": rm.id.to_string(),
        "serial_code": rm.serial_code,
        "specs": rm.spec.as_str(),
        "status": rm.status.as_str(),
        "manufacturer": rm.manufacturer,
        "manufacture_date": rm.manufacture_date,
        "expiry_date": rm.expiry_date,
        "last_check_date": rm.last_check_date,
        "station_id": rm.station_id,
        "created_at": rm.created_at,
        "updated_at": rm.updated_at,
    })
}

pub fn order_to_json(services: &AppServices, rm: &OrderReadModel) -> JsonValue {
    json!({
        "id": rm.id.to_string(),
        "order_no": rm.order_no,
        "user_id": rm.customer_id.to_string(),
        "user_name": username_of(services, rm.customer_id),
        "delivery_id": rm.courier_id.map(|id| id.to_string()),
        "delivery_name": rm.courier_id.and_then(|id| username_of(services, id)),
        "status": rm.status.as_str(),
        "specs": rm.spec.as_str(),
        "quantity": rm.quantity,
        "unit_price": rm.unit_price.as_yuan_f64(),
        "total_amount": rm.total.as_yuan_f64(),
        "address": rm.address,
        "contact_name": rm.contact_name,
        "contact_phone": rm.contact_phone.as_ref().map(|p| p.as_str()),
        "remark": rm.remark,
        "cylinder_ids": rm.cylinder_ids.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
        "cancel_reason": rm.cancel_reason,
        "created_at": rm.created_at,
        "assigned_at": rm.assigned_at,
        "delivery_started_at": rm.delivery_started_at,
        "completed_at": rm.completed_at,
        "cancelled_at": rm.cancelled_at,
        "rated": rm.rating.is_some(),
    })
}

pub fn safety_record_to_json(services: &AppServices, rm: &SafetyRecordReadModel) -> JsonValue {
    let order_no = rm
        .order_id
        .and_then(|id| services.read_models().orders.get(&OrderId::new(id)))
        .map(|o| o.order_no);
    json!({
        "id": rm.id.to_string(),
        "order_id": rm.order_id.map(|id| id.to_string()),
        "order_no": order_no,
        "inspector_id": rm.inspector_id.to_string(),
        "inspector_name": username_of(services, rm.inspector_id),
        "check_items": rm.check_items,
        "hazard_level": rm.hazard_level.as_str(),
        "hazard_description": rm.hazard_description,
        "photos": rm.photos,
        "rectify_status": rm.rectify_status.map(|s| s.as_str()),
        "rectify_photos": rm.rectify_photos,
        "created_at": rm.created_at,
        "updated_at": rm.updated_at,
    })
}

pub fn announcement_to_json(services: &AppServices, rm: &AnnouncementReadModel) -> JsonValue {
    json!({
        "id": rm.id.to_string(),
        "title": rm.title,
        "content": rm.content,
        "author_id": rm.author_id.to_string(),
        "author_name": username_of(services, rm.author_id),
        "is_top": rm.pinned,
        "created_at": rm.created_at,
        "updated_at": rm.updated_at,
    })
}

/// A rating shares its order's id.
pub fn rating_to_json(rm: &RatingReadModel) -> JsonValue {
    json!({
        "id": rm.order_id.to_string(),
        "order_id": rm.order_id.to_string(),
        "user_id": rm.user_id.to_string(),
        "score": rm.score,
        "comment": rm.comment,
        "created_at": rm.created_at,
    })
}
