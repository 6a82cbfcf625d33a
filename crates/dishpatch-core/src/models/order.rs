use crate::types::{DriverId, MenuItemId, OrderId, RestaurantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order progression.
///
/// `Placed → Accepted → Preparing → OutForDelivery → Delivered`, with
/// `Cancelled` reachable from the first three steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Submitted by the customer
    Placed,
    /// Accepted by the restaurant
    Accepted,
    /// Being prepared
    Preparing,
    /// Picked up by a driver
    OutForDelivery,
    /// Handed to the customer
    Delivered,
    /// Cancelled before pickup
    Cancelled,
}

impl OrderStatus {
    /// Wire name stored in documents.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Placed => "placed",
            Self::Accepted => "accepted",
            Self::Preparing => "preparing",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// The next step of the progression, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Placed => Some(Self::Accepted),
            Self::Accepted => Some(Self::Preparing),
            Self::Preparing => Some(Self::OutForDelivery),
            Self::OutForDelivery => Some(Self::Delivered),
            Self::Delivered | Self::Cancelled => None,
        }
    }

    /// Statuses an order may be cancelled from.
    #[must_use]
    pub fn cancellable() -> &'static [OrderStatus] {
        &[Self::Placed, Self::Accepted, Self::Preparing]
    }

    /// Statuses in which the order can still be (re)assigned to a driver.
    #[must_use]
    pub fn assignable() -> &'static [OrderStatus] {
        &[Self::Placed, Self::Accepted, Self::Preparing]
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of an order, priced at the time it was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Menu item ordered
    pub menu_item_id: MenuItemId,
    /// Item name at order time
    pub name: String,
    /// Unit price at order time
    pub unit_price_cents: i64,
    /// Quantity, at least 1
    pub quantity: u32,
}

impl OrderLine {
    /// Price of the line, `None` if it overflows.
    #[must_use]
    pub fn line_total_cents(&self) -> Option<i64> {
        self.unit_price_cents.checked_mul(i64::from(self.quantity))
    }
}

/// A customer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Document ID
    pub id: OrderId,
    /// Ordering customer
    pub customer_id: UserId,
    /// Restaurant fulfilling the order
    pub restaurant_id: RestaurantId,
    /// Assigned driver
    #[serde(default)]
    pub driver_id: Option<DriverId>,
    /// Ordered lines
    pub items: Vec<OrderLine>,
    /// Sum of the lines
    pub subtotal_cents: i64,
    /// Delivery fee
    #[serde(default)]
    pub delivery_fee_cents: i64,
    /// Amount charged
    pub total_cents: i64,
    /// Current status
    pub status: OrderStatus,
    /// Why the order was cancelled
    #[serde(default)]
    pub cancel_reason: Option<String>,
    /// Delivery address
    #[serde(default)]
    pub delivery_address: Option<String>,
    /// Server time of creation
    pub created_at: DateTime<Utc>,
    /// Server time of the last write
    pub updated_at: DateTime<Utc>,
}

/// Sum a set of order lines, `None` if the sum overflows.
#[must_use]
pub fn subtotal_cents(lines: &[OrderLine]) -> Option<i64> {
    lines
        .iter()
        .try_fold(0_i64, |sum, line| sum.checked_add(line.line_total_cents()?))
}

impl Order {
    /// Recompute the subtotal from the lines.
    #[must_use]
    pub fn computed_subtotal_cents(&self) -> Option<i64> {
        subtotal_cents(&self.items)
    }
}
