//! Order models.

use chrono::{DateTime, Utc};
use portal_sete_core::{OrderId, OrderItemId, OrderStatus, Price, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// A purchase attempt record, one per checkout submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Equals the sum of the line items' price-at-purchase at creation time.
    pub total: Price,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// A line item belonging to exactly one order. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    /// Captured at order-creation time, decoupled from the product's live
    /// price so historical orders stay accurate.
    pub price_at_purchase: Price,
}

/// Insert payload for an order item, created atomically with the order's
/// pending row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub price_at_purchase: Price,
}
