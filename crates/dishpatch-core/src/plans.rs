//! Platform-wide subscription plan catalog.
//!
//! Plans are constants: a restaurant references one by [`PlanId`] and the
//! plan decides which [`Feature`]s the restaurant may switch on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Features a restaurant can have enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Accept orders through the customer apps
    OnlineOrdering,
    /// Edit menu items and availability
    MenuManagement,
    /// Live driver tracking for customers
    DeliveryTracking,
    /// Revenue and order analytics
    Analytics,
    /// Custom colours and logo in the customer apps
    CustomBranding,
    /// More than one location under one owner
    MultiLocation,
    /// Priority support queue
    PrioritySupport,
    /// Programmatic access
    ApiAccess,
}

impl Feature {
    /// Get a human-readable name for this feature.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OnlineOrdering => "Online Ordering",
            Self::MenuManagement => "Menu Management",
            Self::DeliveryTracking => "Delivery Tracking",
            Self::Analytics => "Analytics",
            Self::CustomBranding => "Custom Branding",
            Self::MultiLocation => "Multiple Locations",
            Self::PrioritySupport => "Priority Support",
            Self::ApiAccess => "API Access",
        }
    }
}

/// Identifier of a subscription plan.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PlanId {
    /// Entry plan
    #[default]
    Starter,
    /// Growing restaurants
    Growth,
    /// Full feature set
    Pro,
    /// Custom contract pricing
    Enterprise,
}

impl PlanId {
    /// Wire name of the plan.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Growth => "growth",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    /// Parse a plan from its wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "starter" => Some(Self::Starter),
            "growth" => Some(Self::Growth),
            "pro" => Some(Self::Pro),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plan in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubscriptionPlan {
    /// Plan identifier
    pub id: PlanId,
    /// Display name
    pub name: &'static str,
    /// Monthly price in cents; `None` means custom pricing
    pub monthly_price_cents: Option<i64>,
    /// Features the plan enables
    pub features: &'static [Feature],
}

impl SubscriptionPlan {
    /// Whether the plan includes a feature.
    #[must_use]
    pub fn includes(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    /// Whether the plan is priced per contract.
    #[must_use]
    pub fn is_custom_priced(&self) -> bool {
        self.monthly_price_cents.is_none()
    }
}

const STARTER_FEATURES: &[Feature] = &[Feature::OnlineOrdering, Feature::MenuManagement];

const GROWTH_FEATURES: &[Feature] = &[
    Feature::OnlineOrdering,
    Feature::MenuManagement,
    Feature::DeliveryTracking,
    Feature::Analytics,
];

const PRO_FEATURES: &[Feature] = &[
    Feature::OnlineOrdering,
    Feature::MenuManagement,
    Feature::DeliveryTracking,
    Feature::Analytics,
    Feature::CustomBranding,
    Feature::PrioritySupport,
];

const ENTERPRISE_FEATURES: &[Feature] = &[
    Feature::OnlineOrdering,
    Feature::MenuManagement,
    Feature::DeliveryTracking,
    Feature::Analytics,
    Feature::CustomBranding,
    Feature::MultiLocation,
    Feature::PrioritySupport,
    Feature::ApiAccess,
];

static PLANS: [SubscriptionPlan; 4] = [
    SubscriptionPlan {
        id: PlanId::Starter,
        name: "Starter",
        monthly_price_cents: Some(2_900),
        features: STARTER_FEATURES,
    },
    SubscriptionPlan {
        id: PlanId::Growth,
        name: "Growth",
        monthly_price_cents: Some(7_900),
        features: GROWTH_FEATURES,
    },
    SubscriptionPlan {
        id: PlanId::Pro,
        name: "Pro",
        monthly_price_cents: Some(14_900),
        features: PRO_FEATURES,
    },
    SubscriptionPlan {
        id: PlanId::Enterprise,
        name: "Enterprise",
        monthly_price_cents: None,
        features: ENTERPRISE_FEATURES,
    },
];

/// Look up a plan in the catalog.
#[must_use]
pub fn plan(id: PlanId) -> &'static SubscriptionPlan {
    match id {
        PlanId::Starter => &PLANS[0],
        PlanId::Growth => &PLANS[1],
        PlanId::Pro => &PLANS[2],
        PlanId::Enterprise => &PLANS[3],
    }
}

/// All plans, cheapest first.
#[must_use]
pub fn all_plans() -> &'static [SubscriptionPlan] {
    &PLANS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_lookup_matches_id() {
        for p in all_plans() {
            assert_eq!(plan(p.id).id, p.id);
        }
    }

    #[test]
    fn test_enterprise_is_custom_priced() {
        assert!(plan(PlanId::Enterprise).is_custom_priced());
        assert_eq!(plan(PlanId::Enterprise).monthly_price_cents, None);
        assert!(!plan(PlanId::Starter).is_custom_priced());
    }

    #[test]
    fn test_plan_features() {
        assert!(plan(PlanId::Starter).includes(Feature::OnlineOrdering));
        assert!(!plan(PlanId::Starter).includes(Feature::Analytics));
        assert!(plan(PlanId::Growth).includes(Feature::Analytics));
        assert!(plan(PlanId::Enterprise).includes(Feature::ApiAccess));
    }

    #[test]
    fn test_higher_plans_are_supersets() {
        let plans = all_plans();
        for pair in plans.windows(2) {
            for feature in pair[0].features {
                assert!(
                    pair[1].includes(*feature),
                    "{} should include {}",
                    pair[1].name,
                    feature.display_name()
                );
            }
        }
    }

    #[test]
    fn test_plan_id_parse() {
        assert_eq!(PlanId::parse("pro"), Some(PlanId::Pro));
        assert_eq!(PlanId::parse("platinum"), None);
        assert_eq!(PlanId::default(), PlanId::Starter);
        assert_eq!(PlanId::Growth.to_string(), "growth");
    }
}
