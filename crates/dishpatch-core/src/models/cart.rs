use crate::types::{CartItemId, MenuItemId, RestaurantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line in a customer's cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Document ID
    pub id: CartItemId,
    /// Owning customer
    pub customer_id: UserId,
    /// Restaurant the dish belongs to
    pub restaurant_id: RestaurantId,
    /// Dish added
    pub menu_item_id: MenuItemId,
    /// Dish name when added
    pub name: String,
    /// Unit price when added
    pub unit_price_cents: i64,
    /// Quantity, at least 1
    pub quantity: u32,
    /// Server time of creation
    pub created_at: DateTime<Utc>,
    /// Server time of the last write
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    /// Price of the line, `None` if it overflows.
    #[must_use]
    pub fn line_total_cents(&self) -> Option<i64> {
        self.unit_price_cents.checked_mul(i64::from(self.quantity))
    }
}
