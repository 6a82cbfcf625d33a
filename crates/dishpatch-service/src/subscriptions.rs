//! Subscription plans and plan history.

use crate::access::{DataAccess, ListPage, PageRequest};
use dishpatch_core::models::RestaurantSubscription;
use dishpatch_core::{plans, Collection, PlanId, RestaurantId, SubscriptionPlan};
use dishpatch_store::{Caller, Query, Result};

impl DataAccess {
    /// The plan catalog, cheapest first.
    #[must_use]
    pub fn get_plans(&self) -> &'static [SubscriptionPlan] {
        plans::all_plans()
    }

    /// One plan of the catalog.
    #[must_use]
    pub fn get_plan(&self, id: PlanId) -> &'static SubscriptionPlan {
        plans::plan(id)
    }

    /// The plan a restaurant is on; `None` if the restaurant does not exist.
    pub async fn get_restaurant_plan(
        &self,
        caller: &Caller,
        restaurant_id: &RestaurantId,
    ) -> Result<Option<&'static SubscriptionPlan>> {
        let restaurant = self.get_restaurant(caller, restaurant_id).await?;
        Ok(restaurant.map(|r| plans::plan(r.plan)))
    }

    /// Plan changes of a restaurant, newest first.
    pub async fn get_subscription_history(
        &self,
        caller: &Caller,
        restaurant_id: &RestaurantId,
        page: PageRequest,
    ) -> Result<ListPage<RestaurantSubscription>> {
        let query =
            Query::new(Collection::Subscriptions).where_eq("restaurant_id", restaurant_id.as_str());
        self.list(caller, query, page).await
    }
}
