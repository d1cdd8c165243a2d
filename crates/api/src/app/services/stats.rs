use chrono::{NaiveDate, Utc};
use serde::Serialize;

use gasline_auth::Role;
use gasline_infra::stats::{
    self, CourierSummary, CustomerSummary, CylinderStats, DashboardStats, RankingEntry, TrendPoint,
};

use super::AppServices;
use crate::context::PrincipalContext;

/// Role-specific dashboard returned by `/api/stats/me`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MySummary {
    Staff(DashboardStats),
    Courier(CourierSummary),
    Customer(CustomerSummary),
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

impl AppServices {
    pub fn dashboard(&self) -> DashboardStats {
        let rm = &self.read_models;
        stats::dashboard(&rm.orders.list(), &rm.cylinders.list(), &rm.users.list(), today())
    }

    pub fn cylinder_stats(&self) -> CylinderStats {
        stats::cylinder_stats(&self.read_models.cylinders.list(), today())
    }

    pub fn order_trend(&self, days: u32) -> Vec<TrendPoint> {
        stats::order_trend(&self.read_models.orders.list(), days, today())
    }

    pub fn delivery_ranking(&self) -> Vec<RankingEntry> {
        let rm = &self.read_models;
        stats::delivery_ranking(&rm.orders.list(), &rm.users.list())
    }

    pub fn my_summary(&self, ctx: &PrincipalContext) -> MySummary {
        let rm = &self.read_models;
        match ctx.role() {
            Role::Admin | Role::Station => MySummary::Staff(self.dashboard()),
            Role::Delivery => MySummary::Courier(stats::courier_summary(
                ctx.user_id(),
                &rm.orders.list(),
                &rm.safety.list(),
                today(),
            )),
            Role::User => {
                MySummary::Customer(stats::customer_summary(ctx.user_id(), &rm.orders.list()))
            }
        }
    }
}
