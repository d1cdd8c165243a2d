//! Order placement, courier assignment and fulfilment.
//!
//! Fulfilment moves cylinders together with the order: starting delivery
//! allocates in-stock cylinders of the ordered spec (earliest expiry first) and
//! marks them delivering; completing the order puts them in use.

use chrono::Utc;

use gasline_auth::Role;
use gasline_core::{AggregateId, UserId};
use gasline_infra::projections::{OrderReadModel, RatingReadModel};
use gasline_inventory::{CylinderSpec, CylinderStatus};
use gasline_orders::{
    AssignCourier, CancelOrder, CompleteOrder, Order, OrderCommand, OrderId, OrderStatus,
    PlaceOrder, RateOrder, StartDelivery, unit_price,
};

use super::AppServices;
use super::cylinders::generate_code;
use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub spec: CylinderSpec,
    pub quantity: u32,
    pub address: String,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub remark: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub reason: Option<String>,
}

fn can_see(ctx: &PrincipalContext, order: &OrderReadModel) -> bool {
    match ctx.role() {
        Role::Admin | Role::Station => true,
        Role::Delivery => order.courier_id == Some(ctx.user_id()),
        Role::User => order.customer_id == ctx.user_id(),
    }
}

fn make_order(id: AggregateId) -> Order {
    Order::empty(OrderId::new(id))
}

fn insufficient_stock(spec: CylinderSpec, available: usize) -> ApiError {
    ApiError::validation(format!("{spec} stock is insufficient, available: {available}"))
}

impl AppServices {
    fn order(&self, id: OrderId) -> Result<OrderReadModel, ApiError> {
        self.read_models
            .orders
            .get(&id)
            .ok_or_else(|| ApiError::not_found("order"))
    }

    /// Load an order the caller is allowed to see (404, then 403).
    pub fn order_for(&self, ctx: &PrincipalContext, id: OrderId) -> Result<OrderReadModel, ApiError> {
        let order = self.order(id)?;
        if !can_see(ctx, &order) {
            return Err(ApiError::forbidden("not allowed to access this order"));
        }
        Ok(order)
    }

    /// Orders visible to the caller, newest first.
    pub fn list_orders(
        &self,
        ctx: &PrincipalContext,
        status: Option<OrderStatus>,
    ) -> Vec<OrderReadModel> {
        let mut out: Vec<_> = self
            .read_models
            .orders
            .list()
            .into_iter()
            .filter(|o| can_see(ctx, o))
            .filter(|o| status.is_none_or(|s| o.status == s))
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.0.cmp(&a.id.0)));
        out
    }

    pub fn place_order(&self, ctx: &PrincipalContext, new: NewOrder) -> Result<OrderReadModel, ApiError> {
        let _gate = self.write_gate()?;

        let available = self.read_models.cylinders.available(new.spec).len();
        if available < new.quantity as usize {
            tracing::warn!(spec = %new.spec, quantity = new.quantity, available, "order refused: stock");
            return Err(insufficient_stock(new.spec, available));
        }

        let customer = self.user(ctx.user_id())?;
        let contact_phone = new
            .contact_phone
            .filter(|p| !p.trim().is_empty())
            .or_else(|| customer.phone.map(String::from));
        let contact_name = new
            .contact_name
            .filter(|n| !n.trim().is_empty())
            .or(customer.real_name);

        let agg = AggregateId::new();
        let order_id = OrderId::new(agg);
        self.dispatch::<Order>(
            agg,
            Order::AGGREGATE_TYPE,
            OrderCommand::Place(PlaceOrder {
                order_id,
                order_no: generate_code("ORD"),
                customer_id: ctx.user_id(),
                spec: new.spec,
                quantity: new.quantity,
                unit_price: unit_price(new.spec),
                address: new.address,
                contact_name,
                contact_phone,
                remark: new.remark,
                occurred_at: Utc::now(),
            }),
            make_order,
        )?;

        let order = self.order(order_id)?;
        tracing::info!(order_no = %order.order_no, customer = %ctx.username(), total = %order.total, "order placed");
        Ok(order)
    }

    pub fn assign_order(&self, id: OrderId, courier_id: UserId) -> Result<OrderReadModel, ApiError> {
        let _gate = self.write_gate()?;
        let order = self.order(id)?;

        let is_courier = self
            .read_models
            .users
            .get(&courier_id)
            .is_some_and(|u| u.role == Role::Delivery);
        if !is_courier {
            return Err(ApiError::validation("courier does not exist"));
        }

        self.dispatch::<Order>(
            id.0,
            Order::AGGREGATE_TYPE,
            OrderCommand::AssignCourier(AssignCourier {
                order_id: id,
                courier_id,
                occurred_at: Utc::now(),
            }),
            make_order,
        )?;
        tracing::info!(order_no = %order.order_no, courier_id = %courier_id, "courier assigned");
        self.order(id)
    }

    /// Generic status endpoint: cancel, start delivery, complete.
    pub fn change_order_status(
        &self,
        ctx: &PrincipalContext,
        id: OrderId,
        change: StatusChange,
    ) -> Result<OrderReadModel, ApiError> {
        let _gate = self.write_gate()?;
        let order = self.order_for(ctx, id)?;

        match change.status {
            OrderStatus::Assigned => {
                return Err(ApiError::validation(
                    "couriers are assigned through the assign endpoint",
                ));
            }
            OrderStatus::Pending => {
                return Err(ApiError::invariant(format!(
                    "cannot move order from {} to {}",
                    order.status,
                    OrderStatus::Pending
                )));
            }
            OrderStatus::Cancelled => {
                if ctx.role() == Role::Delivery {
                    return Err(ApiError::forbidden("couriers cannot cancel orders"));
                }
                self.dispatch::<Order>(
                    id.0,
                    Order::AGGREGATE_TYPE,
                    OrderCommand::Cancel(CancelOrder {
                        order_id: id,
                        reason: change.reason,
                        occurred_at: Utc::now(),
                    }),
                    make_order,
                )?;
                tracing::info!(order_no = %order.order_no, by = %ctx.username(), "order cancelled");
            }
            OrderStatus::Delivering => {
                if ctx.role() == Role::User {
                    return Err(ApiError::forbidden("customers cannot start delivery"));
                }
                self.start_delivery(&order)?;
            }
            OrderStatus::Completed => {
                if ctx.role() == Role::User {
                    return Err(ApiError::forbidden("customers cannot complete orders"));
                }
                self.complete_order(&order)?;
            }
        }

        self.order(id)
    }

    fn start_delivery(&self, order: &OrderReadModel) -> Result<(), ApiError> {
        if !order.status.can_move_to(OrderStatus::Delivering) {
            return Err(ApiError::invariant(format!(
                "cannot move order from {} to {}",
                order.status,
                OrderStatus::Delivering
            )));
        }

        let available = self.read_models.cylinders.available(order.spec);
        if available.len() < order.quantity as usize {
            tracing::warn!(order_no = %order.order_no, available = available.len(), "delivery refused: stock");
            return Err(insufficient_stock(order.spec, available.len()));
        }
        let cylinder_ids: Vec<_> = available
            .into_iter()
            .take(order.quantity as usize)
            .map(|c| c.id)
            .collect();

        self.dispatch::<Order>(
            order.id.0,
            Order::AGGREGATE_TYPE,
            OrderCommand::StartDelivery(StartDelivery {
                order_id: order.id,
                cylinder_ids: cylinder_ids.clone(),
                occurred_at: Utc::now(),
            }),
            make_order,
        )?;

        for cylinder_id in cylinder_ids {
            self.move_cylinder(cylinder_id, CylinderStatus::Delivering)?;
        }
        tracing::info!(order_no = %order.order_no, cylinders = order.quantity, "delivery started");
        Ok(())
    }

    fn complete_order(&self, order: &OrderReadModel) -> Result<(), ApiError> {
        self.dispatch::<Order>(
            order.id.0,
            Order::AGGREGATE_TYPE,
            OrderCommand::Complete(CompleteOrder {
                order_id: order.id,
                occurred_at: Utc::now(),
            }),
            make_order,
        )?;

        // The order is done even if a cylinder was moved by hand in the meantime.
        for cylinder_id in &order.cylinder_ids {
            if let Err(e) = self.move_cylinder(*cylinder_id, CylinderStatus::InUse) {
                tracing::warn!(order_no = %order.order_no, cylinder_id = %cylinder_id.0, error = %e, "cylinder not moved to in_use");
            }
        }
        tracing::info!(order_no = %order.order_no, "order completed");
        Ok(())
    }

    pub fn rate_order(
        &self,
        ctx: &PrincipalContext,
        id: OrderId,
        score: u8,
        comment: Option<String>,
    ) -> Result<RatingReadModel, ApiError> {
        let _gate = self.write_gate()?;
        let order = self.order(id)?;
        if order.customer_id != ctx.user_id() {
            return Err(ApiError::forbidden("only the customer can rate this order"));
        }

        self.dispatch::<Order>(
            id.0,
            Order::AGGREGATE_TYPE,
            OrderCommand::Rate(RateOrder {
                order_id: id,
                rater_id: ctx.user_id(),
                score,
                comment,
                occurred_at: Utc::now(),
            }),
            make_order,
        )?;

        self.order(id)?
            .rating
            .ok_or_else(|| ApiError::internal("rating missing after commit"))
    }

    pub fn order_rating(&self, ctx: &PrincipalContext, id: OrderId) -> Result<RatingReadModel, ApiError> {
        self.order_for(ctx, id)?
            .rating
            .ok_or_else(|| ApiError::not_found("rating"))
    }

    /// Ratings on orders visible to the caller, newest first.
    pub fn list_ratings(&self, ctx: &PrincipalContext, order_id: Option<OrderId>) -> Vec<RatingReadModel> {
        let mut out: Vec<_> = self
            .read_models
            .orders
            .list()
            .into_iter()
            .filter(|o| order_id.is_none_or(|id| o.id == id) && can_see(ctx, o))
            .filter_map(|o| o.rating)
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }
}
