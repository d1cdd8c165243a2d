use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use gasline_core::{Money, PhoneNumber, UserId};
use gasline_events::EventEnvelope;
use gasline_inventory::{CylinderId, CylinderSpec};
use gasline_orders::{Order, OrderEvent, OrderId, OrderStatus};

use super::{decode, ensure_same_stream, rebuild_order, ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingReadModel {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub score: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReadModel {
    pub id: OrderId,
    pub order_no: String,
    pub customer_id: UserId,
    pub courier_id: Option<UserId>,
    pub spec: CylinderSpec,
    pub quantity: u32,
    pub unit_price: Money,
    pub total: Money,
    pub address: String,
    pub contact_name: Option<String>,
    pub contact_phone: Option<PhoneNumber>,
    pub remark: Option<String>,
    pub status: OrderStatus,
    pub cylinder_ids: Vec<CylinderId>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub delivery_started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub rating: Option<RatingReadModel>,
}

#[derive(Debug)]
pub struct OrdersProjection<S = InMemoryReadStore<OrderId, OrderReadModel>>
where
    S: ReadStore<OrderId, OrderReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> Default for OrdersProjection<S>
where
    S: ReadStore<OrderId, OrderReadModel> + Default,
{
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S> OrdersProjection<S>
where
    S: ReadStore<OrderId, OrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &OrderId) -> Option<OrderReadModel> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<OrderReadModel> {
        self.store.list()
    }

    fn update(&self, id: OrderId, f: impl FnOnce(&mut OrderReadModel)) {
        if let Some(mut rm) = self.store.get(&id) {
            f(&mut rm);
            self.store.upsert(id, rm);
        }
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(ev) = decode::<OrderEvent>(envelope, Order::AGGREGATE_TYPE, &self.cursors)? else {
            return Ok(());
        };

        match ev {
            OrderEvent::Placed(e) => {
                ensure_same_stream(envelope, e.order_id.0)?;
                self.store.upsert(
                    e.order_id,
                    OrderReadModel {
                        id: e.order_id,
                        order_no: e.order_no,
                        customer_id: e.customer_id,
                        courier_id: None,
                        spec: e.spec,
                        quantity: e.quantity,
                        unit_price: e.unit_price,
                        total: e.total,
                        address: e.address,
                        contact_name: e.contact_name,
                        contact_phone: e.contact_phone,
                        remark: e.remark,
                        status: OrderStatus::Pending,
                        cylinder_ids: vec![],
                        cancel_reason: None,
                        created_at: e.occurred_at,
                        assigned_at: None,
                        delivery_started_at: None,
                        completed_at: None,
                        cancelled_at: None,
                        rating: None,
                    },
                );
            }
            OrderEvent::CourierAssigned(e) => {
                ensure_same_stream(envelope, e.order_id.0)?;
                self.update(e.order_id, |rm| {
                    rm.courier_id = Some(e.courier_id);
                    rm.status = OrderStatus::Assigned;
                    rm.assigned_at = Some(e.occurred_at);
                });
            }
            OrderEvent::DeliveryStarted(e) => {
                ensure_same_stream(envelope, e.order_id.0)?;
                self.update(e.order_id, |rm| {
                    rm.cylinder_ids = e.cylinder_ids;
                    rm.status = OrderStatus::Delivering;
                    rm.delivery_started_at = Some(e.occurred_at);
                });
            }
            OrderEvent::Completed(e) => {
                ensure_same_stream(envelope, e.order_id.0)?;
                self.update(e.order_id, |rm| {
                    rm.status = OrderStatus::Completed;
                    rm.completed_at = Some(e.occurred_at);
                });
            }
            OrderEvent::Cancelled(e) => {
                ensure_same_stream(envelope, e.order_id.0)?;
                self.update(e.order_id, |rm| {
                    rm.status = OrderStatus::Cancelled;
                    rm.cancel_reason = e.reason;
                    rm.cancelled_at = Some(e.occurred_at);
                });
            }
            OrderEvent::Rated(e) => {
                ensure_same_stream(envelope, e.order_id.0)?;
                self.update(e.order_id, |rm| {
                    rm.rating = Some(RatingReadModel {
                        order_id: e.order_id,
                        user_id: e.rater_id,
                        score: e.score,
                        comment: e.comment,
                        created_at: e.occurred_at,
                    });
                });
            }
        }

        self.cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();
        self.store.clear();
        self.cursors.clear();
        rebuild_order(&mut envs);
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
