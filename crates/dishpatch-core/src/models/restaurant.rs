use crate::plans::{Feature, PlanId};
use crate::types::{RestaurantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Lifecycle status of a restaurant tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestaurantStatus {
    /// Signed up, awaiting platform approval
    Pending,
    /// Live on the platform
    Approved,
    /// Temporarily blocked by the platform
    Suspended,
    /// Soft-deleted; kept for the audit trail
    Deleted,
}

impl RestaurantStatus {
    /// Wire name stored in documents.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Suspended => "suspended",
            Self::Deleted => "deleted",
        }
    }

    /// Statuses a restaurant may move to `target` from.
    ///
    /// Re-applying the current status is not a transition.
    #[must_use]
    pub fn sources_for(target: Self) -> &'static [RestaurantStatus] {
        match target {
            Self::Pending => &[],
            Self::Approved => &[Self::Pending, Self::Suspended],
            Self::Suspended => &[Self::Approved],
            Self::Deleted => &[Self::Pending, Self::Approved, Self::Suspended],
        }
    }

    /// Whether moving from `self` to `target` is allowed.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        Self::sources_for(target).contains(&self)
    }

    /// Statuses shown by list queries that do not filter by status.
    #[must_use]
    pub fn listed_by_default() -> &'static [RestaurantStatus] {
        &[Self::Pending, Self::Approved]
    }
}

impl fmt::Display for RestaurantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A restaurant tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    /// Document ID
    pub id: RestaurantId,
    /// Display name
    pub name: String,
    /// Owning user
    pub owner_id: UserId,
    /// Lifecycle status
    pub status: RestaurantStatus,
    /// Subscription plan
    #[serde(default)]
    pub plan: PlanId,
    /// Enabled features, always a subset of the plan's features
    #[serde(default)]
    pub features: BTreeSet<Feature>,
    /// Street address
    #[serde(default)]
    pub address: Option<String>,
    /// Cuisine tag shown in listings
    #[serde(default)]
    pub cuisine: Option<String>,
    /// Reason given for the last suspension or deletion
    #[serde(default)]
    pub status_reason: Option<String>,
    /// Server time of creation
    pub created_at: DateTime<Utc>,
    /// Server time of the last write
    pub updated_at: DateTime<Utc>,
}

impl Restaurant {
    /// Whether customers can order from this restaurant.
    #[must_use]
    pub fn is_accepting_orders(&self) -> bool {
        self.status == RestaurantStatus::Approved && self.features.contains(&Feature::OnlineOrdering)
    }
}
