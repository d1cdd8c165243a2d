//! Dashboard aggregation over the read models.
//!
//! Pure functions: callers pass in read-model snapshots and the reference date,
//! so every figure is reproducible in tests. Money figures are yuan.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use gasline_auth::Role;
use gasline_core::{Money, UserId};
use gasline_inventory::CylinderStatus;
use gasline_orders::OrderStatus;

use crate::projections::{CylinderReadModel, OrderReadModel, SafetyRecordReadModel, UserReadModel};

pub const MAX_TREND_DAYS: u32 = 90;
pub const EXPIRY_WARNING_DAYS: i64 = 30;
pub const RANKING_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_orders: usize,
    pub pending_orders: usize,
    pub completed_orders: usize,
    pub total_cylinders: usize,
    pub in_stock: usize,
    pub total_users: usize,
    pub total_delivery: usize,
    pub today_orders: usize,
    pub today_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CylinderStats {
    pub in_stock: usize,
    pub delivering: usize,
    pub in_use: usize,
    pub empty: usize,
    pub expiring_soon: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankingEntry {
    #[serde(rename = "id")]
    pub user_id: UserId,
    pub username: String,
    pub real_name: Option<String>,
    pub order_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourierSummary {
    pub assigned: usize,
    pub delivering: usize,
    pub completed_today: usize,
    pub completed_total: usize,
    pub inspections_filed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSummary {
    pub orders_total: usize,
    pub orders_open: usize,
    pub orders_completed: usize,
    pub total_spent: f64,
}

fn sum_totals<'a>(orders: impl Iterator<Item = &'a OrderReadModel>) -> Money {
    orders.map(|o| o.total).sum()
}

fn completed_on(order: &OrderReadModel, day: NaiveDate) -> bool {
    order.status == OrderStatus::Completed
        && order.completed_at.map(|t| t.date_naive()) == Some(day)
}

pub fn dashboard(
    orders: &[OrderReadModel],
    cylinders: &[CylinderReadModel],
    users: &[UserReadModel],
    today: NaiveDate,
) -> DashboardStats {
    let count_orders = |s: OrderStatus| orders.iter().filter(|o| o.status == s).count();
    let count_users = |r: Role| users.iter().filter(|u| u.role == r).count();

    DashboardStats {
        total_orders: orders.len(),
        pending_orders: count_orders(OrderStatus::Pending),
        completed_orders: count_orders(OrderStatus::Completed),
        total_cylinders: cylinders.len(),
        in_stock: cylinders
            .iter()
            .filter(|c| c.status == CylinderStatus::InStock)
            .count(),
        total_users: count_users(Role::User),
        total_delivery: count_users(Role::Delivery),
        today_orders: orders
            .iter()
            .filter(|o| o.created_at.date_naive() == today)
            .count(),
        today_revenue: sum_totals(orders.iter().filter(|o| completed_on(o, today))).as_yuan_f64(),
    }
}

pub fn cylinder_stats(cylinders: &[CylinderReadModel], today: NaiveDate) -> CylinderStats {
    let count = |s: CylinderStatus| cylinders.iter().filter(|c| c.status == s).count();
    let horizon = today + Duration::days(EXPIRY_WARNING_DAYS);

    CylinderStats {
        in_stock: count(CylinderStatus::InStock),
        delivering: count(CylinderStatus::Delivering),
        in_use: count(CylinderStatus::InUse),
        empty: count(CylinderStatus::Empty),
        expiring_soon: cylinders
            .iter()
            .filter(|c| matches!(c.expiry_date, Some(d) if d >= today && d <= horizon))
            .count(),
        total: cylinders.len(),
    }
}

/// Orders created per day over the last `days` days (clamped to 1..=90), oldest first.
pub fn order_trend(orders: &[OrderReadModel], days: u32, today: NaiveDate) -> Vec<TrendPoint> {
    let days = days.clamp(1, MAX_TREND_DAYS);
    let start = today - Duration::days(i64::from(days) - 1);

    (0..days)
        .map(|offset| {
            let date = start + Duration::days(i64::from(offset));
            let count = orders
                .iter()
                .filter(|o| o.created_at.date_naive() == date)
                .count();
            TrendPoint { date, count }
        })
        .collect()
}

/// Top couriers by completed orders; ties broken by username.
pub fn delivery_ranking(orders: &[OrderReadModel], users: &[UserReadModel]) -> Vec<RankingEntry> {
    let mut entries: Vec<RankingEntry> = users
        .iter()
        .filter_map(|u| {
            let order_count = orders
                .iter()
                .filter(|o| o.status == OrderStatus::Completed && o.courier_id == Some(u.id))
                .count();
            (order_count > 0).then(|| RankingEntry {
                user_id: u.id,
                username: u.username.clone(),
                real_name: u.real_name.clone(),
                order_count,
            })
        })
        .collect();

    entries.sort_by(|a, b| {
        b.order_count
            .cmp(&a.order_count)
            .then_with(|| a.username.cmp(&b.username))
    });
    entries.truncate(RANKING_SIZE);
    entries
}

pub fn courier_summary(
    courier_id: UserId,
    orders: &[OrderReadModel],
    records: &[SafetyRecordReadModel],
    today: NaiveDate,
) -> CourierSummary {
    let mine: Vec<_> = orders
        .iter()
        .filter(|o| o.courier_id == Some(courier_id))
        .collect();
    let count = |s: OrderStatus| mine.iter().filter(|o| o.status == s).count();

    CourierSummary {
        assigned: count(OrderStatus::Assigned),
        delivering: count(OrderStatus::Delivering),
        completed_today: mine.iter().filter(|o| completed_on(o, today)).count(),
        completed_total: count(OrderStatus::Completed),
        inspections_filed: records
            .iter()
            .filter(|r| r.inspector_id == courier_id)
            .count(),
    }
}

pub fn customer_summary(customer_id: UserId, orders: &[OrderReadModel]) -> CustomerSummary {
    let mine: Vec<_> = orders
        .iter()
        .filter(|o| o.customer_id == customer_id)
        .collect();

    CustomerSummary {
        orders_total: mine.len(),
        orders_open: mine.iter().filter(|o| o.status.is_open()).count(),
        orders_completed: mine
            .iter()
            .filter(|o| o.status == OrderStatus::Completed)
            .count(),
        total_spent: sum_totals(
            mine.iter()
                .copied()
                .filter(|o| o.status == OrderStatus::Completed),
        )
        .as_yuan_f64(),
    }
}
