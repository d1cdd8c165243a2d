use chrono::{DateTime, Utc};

/// A fact recorded by one of the aggregates (a cylinder moved, an order was rated).
///
/// The event type string is what the journal stores and what SSE clients see
/// as the topic, so renaming one is a breaking change for both.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted `<context>.<aggregate>.<fact>` name, e.g. `"orders.order.courier_assigned"`.
    fn event_type(&self) -> &'static str;

    /// Payload schema version; bump when the serialized shape changes.
    fn version(&self) -> u32;

    /// Business time of the fact, as supplied by the command.
    fn occurred_at(&self) -> DateTime<Utc>;
}
