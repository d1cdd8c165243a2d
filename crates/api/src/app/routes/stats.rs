use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    routing::get,
};

use gasline_infra::stats::{DashboardStats, RankingEntry, TrendPoint};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::ApiQuery;
use crate::app::services::{AppServices, MySummary};
use crate::authz::require;
use crate::context::PrincipalContext;

const DEFAULT_TREND_DAYS: u32 = 7;

pub fn router() -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/orders/trend", get(order_trend))
        .route("/delivery/ranking", get(delivery_ranking))
        .route("/me", get(my_summary))
}

pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<DashboardStats>, ApiError> {
    require(&principal, "stats.read")?;
    Ok(Json(services.dashboard()))
}

pub async fn order_trend(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(q): ApiQuery<dto::TrendQuery>,
) -> Result<Json<Vec<TrendPoint>>, ApiError> {
    require(&principal, "stats.read")?;
    Ok(Json(services.order_trend(q.days.unwrap_or(DEFAULT_TREND_DAYS))))
}

pub async fn delivery_ranking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<Vec<RankingEntry>>, ApiError> {
    require(&principal, "stats.read")?;
    Ok(Json(services.delivery_ranking()))
}

pub async fn my_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Json<MySummary> {
    Json(services.my_summary(&principal))
}
