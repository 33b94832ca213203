use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Domain Models
// ============================================================================

/// Lifecycle states an order moves through. This service only ever writes
/// `Pending`; downstream consumers own the later transitions, so decoding
/// must accept all of them.
#[derive(Serialize, Deserialize, sqlx::Type, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "order_status", rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

/// A persisted order. `id` is assigned by the database and doubles as the
/// newest-first ordering key for listings.
#[derive(Serialize, Deserialize, sqlx::FromRow, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub product_id: String,
    pub quantity: i32,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Incoming creation payload. Both fields are optional so validation can
/// report exactly which one is missing instead of a generic decode error.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<i32>,
}

/// The slice of the catalog's product document this service cares about.
/// Unknown catalog fields are ignored on decode.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub author: String,
}

/// Tag carried in every order-created event payload.
pub const ORDER_CREATED: &str = "order.created";

/// Published once per successful creation. Never persisted; ownership
/// passes to the broker.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedEvent {
    pub event: String,
    pub order_id: i64,
    pub product: Product,
    pub quantity: i32,
}

impl OrderCreatedEvent {
    pub fn new(order: &Order, product: Product) -> Self {
        Self {
            event: ORDER_CREATED.to_string(),
            order_id: order.id,
            product,
            quantity: order.quantity,
        }
    }
}
