use crate::types::{MenuItemId, RestaurantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dish on a restaurant's menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    /// Document ID
    pub id: MenuItemId,
    /// Owning restaurant
    pub restaurant_id: RestaurantId,
    /// Dish name
    pub name: String,
    /// Menu description
    #[serde(default)]
    pub description: Option<String>,
    /// Price in cents
    pub price_cents: i64,
    /// Menu section, e.g. "mains"
    pub category: String,
    /// Whether the dish can be ordered right now
    pub available: bool,
    /// Server time of creation
    pub created_at: DateTime<Utc>,
    /// Server time of the last write
    pub updated_at: DateTime<Utc>,
}
