use crate::plans::PlanId;
use crate::types::{RestaurantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A plan change recorded in the `subscriptions` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantSubscription {
    /// Document ID
    pub id: String,
    /// Restaurant whose plan changed
    pub restaurant_id: RestaurantId,
    /// Plan now in effect
    pub plan: PlanId,
    /// Plan before the change
    #[serde(default)]
    pub previous_plan: Option<PlanId>,
    /// Who made the change
    pub changed_by: UserId,
    /// Server time of the change
    pub created_at: DateTime<Utc>,
    /// Server time of the last write
    pub updated_at: DateTime<Utc>,
}
