//! Order domain module (event-sourced).
//!
//! Covers the delivery lifecycle of a customer order, courier assignment, the
//! cylinders handed over on delivery, and the customer's rating.

pub mod order;
pub mod pricing;

pub use order::{
    AssignCourier, CancelOrder, CompleteOrder, CourierAssigned, DeliveryStarted, Order,
    OrderCancelled, OrderCommand, OrderCompleted, OrderEvent, OrderId, OrderPlaced, OrderRated,
    OrderRating, OrderStatus, PlaceOrder, RateOrder, StartDelivery,
};
pub use pricing::{MAX_QUANTITY, order_total, unit_price};
