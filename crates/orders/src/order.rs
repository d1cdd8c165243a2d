use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gasline_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, PhoneNumber, UserId};
use gasline_events::Event;
use gasline_inventory::{CylinderId, CylinderSpec};

use crate::pricing::{MAX_QUANTITY, order_total};

/// Order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Assigned,
    Delivering,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Assigned,
        OrderStatus::Delivering,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Assigned => "assigned",
            OrderStatus::Delivering => "delivering",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn successors(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Assigned, OrderStatus::Cancelled],
            OrderStatus::Assigned => &[OrderStatus::Delivering, OrderStatus::Cancelled],
            OrderStatus::Delivering => &[OrderStatus::Completed],
            OrderStatus::Completed | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_move_to(&self, to: OrderStatus) -> bool {
        self.successors().contains(&to)
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    /// Still waiting on the station or a courier.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Assigned | OrderStatus::Delivering
        )
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s.trim())
            .ok_or_else(|| DomainError::validation(format!("invalid order status: {s}")))
    }
}

/// A customer's rating of a completed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRating {
    pub rater_id: UserId,
    pub score: u8,
    pub comment: Option<String>,
    pub rated_at: DateTime<Utc>,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    order_no: String,
    customer_id: Option<UserId>,
    courier_id: Option<UserId>,
    status: OrderStatus,
    spec: CylinderSpec,
    quantity: u32,
    unit_price: Money,
    total: Money,
    cylinder_ids: Vec<CylinderId>,
    rating: Option<OrderRating>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            order_no: String::new(),
            customer_id: None,
            courier_id: None,
            status: OrderStatus::Pending,
            spec: CylinderSpec::Kg15,
            quantity: 0,
            unit_price: Money::ZERO,
            total: Money::ZERO,
            cylinder_ids: Vec::new(),
            rating: None,
            version: 0,
            created: false,
        }
    }

    pub fn order_no(&self) -> &str {
        &self.order_no
    }

    pub fn customer_id(&self) -> Option<UserId> {
        self.customer_id
    }

    pub fn courier_id(&self) -> Option<UserId> {
        self.courier_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn spec(&self) -> CylinderSpec {
        self.spec
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn total(&self) -> Money {
        self.total
    }

    /// Cylinders handed to the courier when delivery started.
    pub fn cylinder_ids(&self) -> &[CylinderId] {
        &self.cylinder_ids
    }

    pub fn rating(&self) -> Option<&OrderRating> {
        self.rating.as_ref()
    }
}

impl Order {
    pub const AGGREGATE_TYPE: &'static str = "orders.order";
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
///
/// Stock availability is a cross-aggregate rule checked before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub order_no: String,
    pub customer_id: UserId,
    pub spec: CylinderSpec,
    pub quantity: u32,
    pub unit_price: Money,
    pub address: String,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub remark: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignCourier. The caller has verified the courier's role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignCourier {
    pub order_id: OrderId,
    pub courier_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartDelivery with the cylinders allocated to this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartDelivery {
    pub order_id: OrderId,
    pub cylinder_ids: Vec<CylinderId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RateOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateOrder {
    pub order_id: OrderId,
    pub rater_id: UserId,
    pub score: u8,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    Place(PlaceOrder),
    AssignCourier(AssignCourier),
    StartDelivery(StartDelivery),
    Complete(CompleteOrder),
    Cancel(CancelOrder),
    Rate(RateOrder),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub order_no: String,
    pub customer_id: UserId,
    pub spec: CylinderSpec,
    pub quantity: u32,
    pub unit_price: Money,
    pub total: Money,
    pub address: String,
    pub contact_name: Option<String>,
    pub contact_phone: Option<PhoneNumber>,
    pub remark: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CourierAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourierAssigned {
    pub order_id: OrderId,
    pub courier_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStarted {
    pub order_id: OrderId,
    pub cylinder_ids: Vec<CylinderId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompleted {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderRated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRated {
    pub order_id: OrderId,
    pub rater_id: UserId,
    pub score: u8,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    Placed(OrderPlaced),
    CourierAssigned(CourierAssigned),
    DeliveryStarted(DeliveryStarted),
    Completed(OrderCompleted),
    Cancelled(OrderCancelled),
    Rated(OrderRated),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Placed(_) => "orders.order.placed",
            OrderEvent::CourierAssigned(_) => "orders.order.courier_assigned",
            OrderEvent::DeliveryStarted(_) => "orders.order.delivery_started",
            OrderEvent::Completed(_) => "orders.order.completed",
            OrderEvent::Cancelled(_) => "orders.order.cancelled",
            OrderEvent::Rated(_) => "orders.order.rated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Placed(e) => e.occurred_at,
            OrderEvent::CourierAssigned(e) => e.occurred_at,
            OrderEvent::DeliveryStarted(e) => e.occurred_at,
            OrderEvent::Completed(e) => e.occurred_at,
            OrderEvent::Cancelled(e) => e.occurred_at,
            OrderEvent::Rated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::Placed(e) => {
                self.id = e.order_id;
                self.order_no = e.order_no.clone();
                self.customer_id = Some(e.customer_id);
                self.status = OrderStatus::Pending;
                self.spec = e.spec;
                self.quantity = e.quantity;
                self.unit_price = e.unit_price;
                self.total = e.total;
                self.created = true;
            }
            OrderEvent::CourierAssigned(e) => {
                self.courier_id = Some(e.courier_id);
                self.status = OrderStatus::Assigned;
            }
            OrderEvent::DeliveryStarted(e) => {
                self.cylinder_ids = e.cylinder_ids.clone();
                self.status = OrderStatus::Delivering;
            }
            OrderEvent::Completed(_) => {
                self.status = OrderStatus::Completed;
            }
            OrderEvent::Cancelled(_) => {
                self.status = OrderStatus::Cancelled;
            }
            OrderEvent::Rated(e) => {
                self.rating = Some(OrderRating {
                    rater_id: e.rater_id,
                    score: e.score,
                    comment: e.comment.clone(),
                    rated_at: e.occurred_at,
                });
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::Place(cmd) => self.handle_place(cmd),
            OrderCommand::AssignCourier(cmd) => self.handle_assign(cmd),
            OrderCommand::StartDelivery(cmd) => self.handle_start_delivery(cmd),
            OrderCommand::Complete(cmd) => self.handle_complete(cmd),
            OrderCommand::Cancel(cmd) => self.handle_cancel(cmd),
            OrderCommand::Rate(cmd) => self.handle_rate(cmd),
        }
    }
}

impl Order {
    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_transition(&self, to: OrderStatus) -> Result<(), DomainError> {
        if !self.status.can_move_to(to) {
            return Err(DomainError::illegal_transition("order", self.status, to));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        if cmd.order_no.trim().is_empty() {
            return Err(DomainError::validation("order_no cannot be empty"));
        }
        if !(1..=MAX_QUANTITY).contains(&cmd.quantity) {
            return Err(DomainError::validation(format!(
                "quantity must be between 1 and {MAX_QUANTITY}"
            )));
        }
        let address = cmd.address.trim();
        if address.is_empty() {
            return Err(DomainError::validation("address cannot be empty"));
        }
        let contact_phone = match cmd.contact_phone.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => Some(PhoneNumber::parse(p)?),
            _ => None,
        };
        let total = order_total(cmd.unit_price, cmd.quantity)?;

        Ok(vec![OrderEvent::Placed(OrderPlaced {
            order_id: cmd.order_id,
            order_no: cmd.order_no.trim().to_string(),
            customer_id: cmd.customer_id,
            spec: cmd.spec,
            quantity: cmd.quantity,
            unit_price: cmd.unit_price,
            total,
            address: address.to_string(),
            contact_name: non_blank(cmd.contact_name.as_deref()),
            contact_phone,
            remark: non_blank(cmd.remark.as_deref()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign(&self, cmd: &AssignCourier) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(OrderStatus::Assigned)?;

        Ok(vec![OrderEvent::CourierAssigned(CourierAssigned {
            order_id: cmd.order_id,
            courier_id: cmd.courier_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start_delivery(&self, cmd: &StartDelivery) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(OrderStatus::Delivering)?;

        let distinct: HashSet<&CylinderId> = cmd.cylinder_ids.iter().collect();
        if distinct.len() != cmd.cylinder_ids.len() {
            return Err(DomainError::validation("allocated cylinders must be distinct"));
        }
        if cmd.cylinder_ids.len() != self.quantity as usize {
            return Err(DomainError::validation(format!(
                "order needs {} cylinders, {} allocated",
                self.quantity,
                cmd.cylinder_ids.len()
            )));
        }

        Ok(vec![OrderEvent::DeliveryStarted(DeliveryStarted {
            order_id: cmd.order_id,
            cylinder_ids: cmd.cylinder_ids.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(OrderStatus::Completed)?;

        Ok(vec![OrderEvent::Completed(OrderCompleted {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(OrderStatus::Cancelled)?;

        Ok(vec![OrderEvent::Cancelled(OrderCancelled {
            order_id: cmd.order_id,
            from: self.status,
            reason: non_blank(cmd.reason.as_deref()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_rate(&self, cmd: &RateOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_order_id(cmd.order_id)?;

        if self.customer_id != Some(cmd.rater_id) {
            return Err(DomainError::Unauthorized);
        }
        if self.status != OrderStatus::Completed {
            return Err(DomainError::invariant("only completed orders can be rated"));
        }
        if self.rating.is_some() {
            return Err(DomainError::conflict("order has already been rated"));
        }
        if !(1..=5).contains(&cmd.score) {
            return Err(DomainError::validation("score must be between 1 and 5"));
        }

        Ok(vec![OrderEvent::Rated(OrderRated {
            order_id: cmd.order_id,
            rater_id: cmd.rater_id,
            score: cmd.score,
            comment: non_blank(cmd.comment.as_deref()),
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit_price;
    use proptest::prelude::*;

    fn test_order_id() -> OrderId {
        OrderId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn place_cmd(order_id: OrderId, customer_id: UserId, quantity: u32) -> PlaceOrder {
        PlaceOrder {
            order_id,
            order_no: "ORD20250101120000ABCD".to_string(),
            customer_id,
            spec: CylinderSpec::Kg15,
            quantity,
            unit_price: unit_price(CylinderSpec::Kg15),
            address: "12 Harbour Rd".to_string(),
            contact_name: Some("Wang".to_string()),
            contact_phone: Some("13912345678".to_string()),
            remark: None,
            occurred_at: test_time(),
        }
    }

    fn execute(order: &mut Order, cmd: OrderCommand) -> Result<(), DomainError> {
        let events = order.handle(&cmd)?;
        for ev in &events {
            order.apply(ev);
        }
        Ok(())
    }

    fn placed(quantity: u32) -> (Order, UserId) {
        let id = test_order_id();
        let customer = UserId::new();
        let mut order = Order::empty(id);
        execute(&mut order, OrderCommand::Place(place_cmd(id, customer, quantity))).unwrap();
        (order, customer)
    }

    fn cylinders(n: usize) -> Vec<CylinderId> {
        (0..n).map(|_| CylinderId::new(AggregateId::new())).collect()
    }

    fn assign(order: &mut Order) -> Result<(), DomainError> {
        let id = *order.id();
        execute(
            order,
            OrderCommand::AssignCourier(AssignCourier {
                order_id: id,
                courier_id: UserId::new(),
                occurred_at: test_time(),
            }),
        )
    }

    fn start(order: &mut Order, ids: Vec<CylinderId>) -> Result<(), DomainError> {
        let id = *order.id();
        execute(
            order,
            OrderCommand::StartDelivery(StartDelivery {
                order_id: id,
                cylinder_ids: ids,
                occurred_at: test_time(),
            }),
        )
    }

    fn complete(order: &mut Order) -> Result<(), DomainError> {
        let id = *order.id();
        execute(
            order,
            OrderCommand::Complete(CompleteOrder {
                order_id: id,
                occurred_at: test_time(),
            }),
        )
    }

    fn cancel(order: &mut Order) -> Result<(), DomainError> {
        let id = *order.id();
        execute(
            order,
            OrderCommand::Cancel(CancelOrder {
                order_id: id,
                reason: Some("changed my mind".to_string()),
                occurred_at: test_time(),
            }),
        )
    }

    fn rate(order: &mut Order, rater: UserId, score: u8) -> Result<(), DomainError> {
        let id = *order.id();
        execute(
            order,
            OrderCommand::Rate(RateOrder {
                order_id: id,
                rater_id: rater,
                score,
                comment: Some("fast".to_string()),
                occurred_at: test_time(),
            }),
        )
    }

    #[test]
    fn place_order_computes_total() {
        let (order, customer) = placed(3);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.customer_id(), Some(customer));
        assert_eq!(order.total().fen(), 36_000);
        assert_eq!(order.version(), 1);
    }

    #[test]
    fn place_order_validates_input() {
        let id = test_order_id();
        let order = Order::empty(id);
        for q in [0, MAX_QUANTITY + 1] {
            let err = order
                .handle(&OrderCommand::Place(place_cmd(id, UserId::new(), q)))
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }

        let mut cmd = place_cmd(id, UserId::new(), 1);
        cmd.address = "   ".to_string();
        assert!(matches!(
            order.handle(&OrderCommand::Place(cmd)),
            Err(DomainError::Validation(_))
        ));

        let mut cmd = place_cmd(id, UserId::new(), 1);
        cmd.contact_phone = Some("555-1234".to_string());
        assert!(matches!(
            order.handle(&OrderCommand::Place(cmd)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn full_lifecycle_records_allocated_cylinders() {
        let (mut order, _) = placed(2);
        assign(&mut order).unwrap();
        assert_eq!(order.status(), OrderStatus::Assigned);
        assert!(order.courier_id().is_some());

        let ids = cylinders(2);
        start(&mut order, ids.clone()).unwrap();
        assert_eq!(order.status(), OrderStatus::Delivering);
        assert_eq!(order.cylinder_ids(), ids.as_slice());

        complete(&mut order).unwrap();
        assert_eq!(order.status(), OrderStatus::Completed);
        assert_eq!(order.version(), 4);
    }

    #[test]
    fn start_requires_exact_distinct_allocation() {
        let (mut order, _) = placed(2);
        assign(&mut order).unwrap();

        assert!(matches!(
            start(&mut order, cylinders(1)),
            Err(DomainError::Validation(_))
        ));

        let one = cylinders(1);
        assert!(matches!(
            start(&mut order, vec![one[0], one[0]]),
            Err(DomainError::Validation(_))
        ));
        assert_eq!(order.status(), OrderStatus::Assigned);
    }

    #[test]
    fn cannot_skip_assignment() {
        let (mut order, _) = placed(1);
        let err = start(&mut order, cylinders(1)).unwrap_err();
        assert_eq!(
            err,
            DomainError::invariant("cannot move order from pending to delivering")
        );
        assert!(complete(&mut order).is_err());
    }

    #[test]
    fn cancel_only_before_delivery() {
        let (mut order, _) = placed(1);
        cancel(&mut order).unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert!(assign(&mut order).is_err());

        let (mut order, _) = placed(1);
        assign(&mut order).unwrap();
        start(&mut order, cylinders(1)).unwrap();
        let err = cancel(&mut order).unwrap_err();
        assert_eq!(
            err,
            DomainError::invariant("cannot move order from delivering to cancelled")
        );
    }

    #[test]
    fn rating_rules() {
        let (mut order, customer) = placed(1);
        assert!(matches!(
            rate(&mut order, customer, 5),
            Err(DomainError::InvariantViolation(_))
        ));

        assign(&mut order).unwrap();
        start(&mut order, cylinders(1)).unwrap();
        complete(&mut order).unwrap();

        assert_eq!(rate(&mut order, UserId::new(), 5), Err(DomainError::Unauthorized));
        assert!(matches!(
            rate(&mut order, customer, 6),
            Err(DomainError::Validation(_))
        ));

        rate(&mut order, customer, 4).unwrap();
        assert_eq!(order.rating().map(|r| r.score), Some(4));
        assert!(matches!(
            rate(&mut order, customer, 5),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let (order, _) = placed(1);
        let before = order.clone();
        let _ = order.handle(&OrderCommand::Cancel(CancelOrder {
            order_id: *order.id(),
            reason: None,
            occurred_at: test_time(),
        }));
        assert_eq!(order, before);
    }

    #[test]
    fn apply_is_deterministic() {
        let (mut a, _) = placed(1);
        let mut b = a.clone();
        let ev = OrderEvent::CourierAssigned(CourierAssigned {
            order_id: *a.id(),
            courier_id: UserId::new(),
            occurred_at: test_time(),
        });
        a.apply(&ev);
        b.apply(&ev);
        assert_eq!(a, b);
    }

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Assign,
        Start,
        Complete,
        Cancel,
    }

    fn any_step() -> impl Strategy<Value = Step> {
        prop_oneof![
            Just(Step::Assign),
            Just(Step::Start),
            Just(Step::Complete),
            Just(Step::Cancel),
        ]
    }

    fn target(step: Step) -> OrderStatus {
        match step {
            Step::Assign => OrderStatus::Assigned,
            Step::Start => OrderStatus::Delivering,
            Step::Complete => OrderStatus::Completed,
            Step::Cancel => OrderStatus::Cancelled,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        #[test]
        fn status_never_leaves_transition_graph(steps in prop::collection::vec(any_step(), 0..24)) {
            let (mut order, _) = placed(1);
            for step in steps {
                let before = order.status();
                let version = order.version();
                let result = match step {
                    Step::Assign => assign(&mut order),
                    Step::Start => start(&mut order, cylinders(1)),
                    Step::Complete => complete(&mut order),
                    Step::Cancel => cancel(&mut order),
                };
                let to = target(step);
                if before.can_move_to(to) {
                    prop_assert!(result.is_ok());
                    prop_assert_eq!(order.status(), to);
                    prop_assert_eq!(order.version(), version + 1);
                } else {
                    prop_assert!(result.is_err());
                    prop_assert_eq!(order.status(), before);
                    prop_assert_eq!(order.version(), version);
                }
            }
        }
    }
}
