//! Typed audit actions.

use dishpatch_core::{DriverId, Feature, OrderId, PlanId, RestaurantId, Role, UserId};
use serde::{Deserialize, Serialize};

/// An administrative action worth recording.
///
/// Serialized as `{"action": "<name>", "details": {...}}`, so each action
/// has a fixed details schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "details", rename_all = "snake_case")]
pub enum AuditAction {
    /// A pending restaurant was approved
    ApproveRestaurant {
        /// Restaurant approved
        restaurant_id: RestaurantId,
    },
    /// A restaurant was suspended
    SuspendRestaurant {
        /// Restaurant suspended
        restaurant_id: RestaurantId,
        /// Reason given
        reason: String,
    },
    /// A suspended restaurant was reactivated
    ReactivateRestaurant {
        /// Restaurant reactivated
        restaurant_id: RestaurantId,
    },
    /// A restaurant was soft-deleted
    DeleteRestaurant {
        /// Restaurant deleted
        restaurant_id: RestaurantId,
        /// Reason given, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// A restaurant moved to another subscription plan
    ChangeRestaurantPlan {
        /// Restaurant changed
        restaurant_id: RestaurantId,
        /// Plan before
        from: PlanId,
        /// Plan after
        to: PlanId,
    },
    /// A restaurant's enabled features were replaced
    UpdateRestaurantFeatures {
        /// Restaurant changed
        restaurant_id: RestaurantId,
        /// Features now enabled
        features: Vec<Feature>,
    },
    /// A user account was suspended
    SuspendUser {
        /// User suspended
        user_id: UserId,
        /// Reason given
        reason: String,
    },
    /// A suspended user account was reactivated
    ReactivateUser {
        /// User reactivated
        user_id: UserId,
    },
    /// A user's role changed
    ChangeUserRole {
        /// User changed
        user_id: UserId,
        /// Role before
        from: Role,
        /// Role after
        to: Role,
    },
    /// A driver application was approved
    ApproveDriver {
        /// Driver approved
        driver_id: DriverId,
    },
    /// A driver application was rejected
    RejectDriver {
        /// Driver rejected
        driver_id: DriverId,
        /// Reason given
        reason: String,
    },
    /// An approved driver was suspended
    SuspendDriver {
        /// Driver suspended
        driver_id: DriverId,
        /// Reason given
        reason: String,
    },
    /// An order was cancelled by the platform
    CancelOrder {
        /// Order cancelled
        order_id: OrderId,
        /// Reason given
        reason: String,
    },
    /// An order was handed to a different driver
    ReassignOrderDriver {
        /// Order reassigned
        order_id: OrderId,
        /// Driver before, if one was assigned
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<DriverId>,
        /// Driver after
        to: DriverId,
    },
}

impl AuditAction {
    /// Wire name of the action, e.g. `approve_restaurant`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ApproveRestaurant { .. } => "approve_restaurant",
            Self::SuspendRestaurant { .. } => "suspend_restaurant",
            Self::ReactivateRestaurant { .. } => "reactivate_restaurant",
            Self::DeleteRestaurant { .. } => "delete_restaurant",
            Self::ChangeRestaurantPlan { .. } => "change_restaurant_plan",
            Self::UpdateRestaurantFeatures { .. } => "update_restaurant_features",
            Self::SuspendUser { .. } => "suspend_user",
            Self::ReactivateUser { .. } => "reactivate_user",
            Self::ChangeUserRole { .. } => "change_user_role",
            Self::ApproveDriver { .. } => "approve_driver",
            Self::RejectDriver { .. } => "reject_driver",
            Self::SuspendDriver { .. } => "suspend_driver",
            Self::CancelOrder { .. } => "cancel_order",
            Self::ReassignOrderDriver { .. } => "reassign_order_driver",
        }
    }

    /// ID of the entity the action was applied to.
    #[must_use]
    pub fn target_id(&self) -> &str {
        match self {
            Self::ApproveRestaurant { restaurant_id }
            | Self::SuspendRestaurant { restaurant_id, .. }
            | Self::ReactivateRestaurant { restaurant_id }
            | Self::DeleteRestaurant { restaurant_id, .. }
            | Self::ChangeRestaurantPlan { restaurant_id, .. }
            | Self::UpdateRestaurantFeatures { restaurant_id, .. } => restaurant_id.as_str(),
            Self::SuspendUser { user_id, .. }
            | Self::ReactivateUser { user_id }
            | Self::ChangeUserRole { user_id, .. } => user_id.as_str(),
            Self::ApproveDriver { driver_id }
            | Self::RejectDriver { driver_id, .. }
            | Self::SuspendDriver { driver_id, .. } => driver_id.as_str(),
            Self::CancelOrder { order_id, .. } | Self::ReassignOrderDriver { order_id, .. } => {
                order_id.as_str()
            }
        }
    }

    /// Human-readable summary for admin screens.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::ApproveRestaurant { restaurant_id } => {
                format!("Approved restaurant {restaurant_id}")
            }
            Self::SuspendRestaurant {
                restaurant_id,
                reason,
            } => format!("Suspended restaurant {restaurant_id}: {reason}"),
            Self::ReactivateRestaurant { restaurant_id } => {
                format!("Reactivated restaurant {restaurant_id}")
            }
            Self::DeleteRestaurant {
                restaurant_id,
                reason,
            } => match reason {
                Some(reason) => format!("Deleted restaurant {restaurant_id}: {reason}"),
                None => format!("Deleted restaurant {restaurant_id}"),
            },
            Self::ChangeRestaurantPlan {
                restaurant_id,
                from,
                to,
            } => format!("Changed plan of restaurant {restaurant_id} from {from} to {to}"),
            Self::UpdateRestaurantFeatures {
                restaurant_id,
                features,
            } => {
                let names: Vec<&str> = features.iter().map(Feature::display_name).collect();
                format!(
                    "Set features of restaurant {restaurant_id} to [{}]",
                    names.join(", ")
                )
            }
            Self::SuspendUser { user_id, reason } => format!("Suspended user {user_id}: {reason}"),
            Self::ReactivateUser { user_id } => format!("Reactivated user {user_id}"),
            Self::ChangeUserRole { user_id, from, to } => {
                format!("Changed role of user {user_id} from {from} to {to}")
            }
            Self::ApproveDriver { driver_id } => format!("Approved driver {driver_id}"),
            Self::RejectDriver { driver_id, reason } => {
                format!("Rejected driver {driver_id}: {reason}")
            }
            Self::SuspendDriver { driver_id, reason } => {
                format!("Suspended driver {driver_id}: {reason}")
            }
            Self::CancelOrder { order_id, reason } => format!("Cancelled order {order_id}: {reason}"),
            Self::ReassignOrderDriver { order_id, from, to } => match from {
                Some(from) => format!("Reassigned order {order_id} from driver {from} to {to}"),
                None => format!("Assigned order {order_id} to driver {to}"),
            },
        }
    }
}
