//! Restaurant listing, registration and platform moderation.

use crate::access::{body, caller, require_text, DataAccess, ListPage, PageRequest};
use dishpatch_audit::AuditAction;
use dishpatch_core::models::{Restaurant, RestaurantStatus};
use dishpatch_core::{plans, Actor, Collection, Feature, PlanId, RestaurantId, Role, UserId};
use dishpatch_store::{
    Caller, FieldPath, FilterOp, Precondition, Query, Result, StoreError, Subscription,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Filter for [`DataAccess::get_restaurants`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestaurantFilter {
    /// Only this status. Without it, suspended and deleted restaurants are hidden.
    pub status: Option<RestaurantStatus>,
    /// Only this cuisine
    pub cuisine: Option<String>,
}

impl RestaurantFilter {
    /// Only restaurants with `status`.
    #[must_use]
    pub fn with_status(status: RestaurantStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Sign-up details of a restaurant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRestaurant {
    /// Display name
    pub name: String,
    /// Street address
    pub address: Option<String>,
    /// Cuisine label
    pub cuisine: Option<String>,
}

impl NewRestaurant {
    /// A restaurant with only a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            cuisine: None,
        }
    }
}

/// Profile fields an owner may edit; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestaurantProfileUpdate {
    /// New display name
    pub name: Option<String>,
    /// New street address
    pub address: Option<String>,
    /// New cuisine label
    pub cuisine: Option<String>,
}

impl RestaurantProfileUpdate {
    fn into_patch(self) -> Result<Map<String, Value>> {
        let mut patch = Map::new();
        if let Some(name) = self.name {
            require_text("name", &name)?;
            patch.insert("name".to_string(), Value::String(name));
        }
        if let Some(address) = self.address {
            patch.insert("address".to_string(), Value::String(address));
        }
        if let Some(cuisine) = self.cuisine {
            patch.insert("cuisine".to_string(), Value::String(cuisine));
        }
        if patch.is_empty() {
            return Err(StoreError::InvalidArgument(
                "profile update has no fields".to_string(),
            ));
        }
        Ok(patch)
    }
}

fn status_values(statuses: &[RestaurantStatus]) -> Vec<&'static str> {
    statuses.iter().map(RestaurantStatus::as_str).collect()
}

impl DataAccess {
    /// List restaurants, newest first.
    ///
    /// Suspended and deleted restaurants are only returned when the filter
    /// asks for that status explicitly.
    pub async fn get_restaurants(
        &self,
        caller: &Caller,
        filter: RestaurantFilter,
        page: PageRequest,
    ) -> Result<ListPage<Restaurant>> {
        let mut query = Query::new(Collection::Restaurants);
        query = match filter.status {
            Some(status) => query.where_eq("status", status.as_str()),
            None => query.where_in("status", status_values(RestaurantStatus::listed_by_default())),
        };
        if let Some(cuisine) = filter.cuisine {
            query = query.where_eq("cuisine", cuisine);
        }
        self.list(caller, query, page).await
    }

    /// List approved restaurants, the ones customers can browse.
    pub async fn get_active_restaurants(
        &self,
        caller: &Caller,
        page: PageRequest,
    ) -> Result<ListPage<Restaurant>> {
        self.get_restaurants(
            caller,
            RestaurantFilter::with_status(RestaurantStatus::Approved),
            page,
        )
        .await
    }

    /// Read one restaurant.
    pub async fn get_restaurant(
        &self,
        caller: &Caller,
        id: &RestaurantId,
    ) -> Result<Option<Restaurant>> {
        self.fetch(caller, Collection::Restaurants, id.as_str()).await
    }

    /// List an owner's restaurants that are not deleted, newest first.
    pub async fn get_restaurants_by_owner(
        &self,
        caller: &Caller,
        owner_id: &UserId,
        page: PageRequest,
    ) -> Result<ListPage<Restaurant>> {
        let query = Query::new(Collection::Restaurants)
            .where_eq("owner_id", owner_id.as_str())
            .where_in(
                "status",
                status_values(&[
                    RestaurantStatus::Pending,
                    RestaurantStatus::Approved,
                    RestaurantStatus::Suspended,
                ]),
            );
        self.list(caller, query, page).await
    }

    /// Sign up a restaurant owned by `actor`.
    ///
    /// The restaurant starts pending on the starter plan with the plan's
    /// features enabled.
    pub async fn register_restaurant(
        &self,
        actor: &Actor,
        restaurant: NewRestaurant,
    ) -> Result<Restaurant> {
        require_text("name", &restaurant.name)?;
        let owner_id = actor.user_id()?;
        let starter = plans::plan(PlanId::Starter);

        let data = body(json!({
            "name": restaurant.name,
            "owner_id": owner_id,
            "status": RestaurantStatus::Pending,
            "plan": starter.id,
            "features": starter.features,
            "address": restaurant.address,
            "cuisine": restaurant.cuisine,
        }))?;

        let doc = self
            .store()
            .add(&caller(actor), Collection::Restaurants, data)
            .await?;
        info!(restaurant = %doc.id, owner = %owner_id, "restaurant registered");
        doc.decode()
    }

    /// Edit the public profile of a restaurant.
    pub async fn update_restaurant_profile(
        &self,
        actor: &Actor,
        id: &RestaurantId,
        update: RestaurantProfileUpdate,
    ) -> Result<Restaurant> {
        let patch = update.into_patch()?;
        let doc = self
            .store()
            .update(&caller(actor), Collection::Restaurants, id.as_str(), patch, None)
            .await?;
        info!(restaurant = %id, "restaurant profile updated");
        doc.decode()
    }

    /// Approve a pending restaurant.
    pub async fn approve_restaurant(&self, actor: &Actor, id: &RestaurantId) -> Result<Restaurant> {
        let restaurant = self
            .set_restaurant_status(
                actor,
                id,
                &[RestaurantStatus::Pending],
                RestaurantStatus::Approved,
                None,
            )
            .await?;
        self.record(
            actor,
            AuditAction::ApproveRestaurant {
                restaurant_id: id.clone(),
            },
        )
        .await;
        Ok(restaurant)
    }

    /// Suspend an approved restaurant.
    pub async fn suspend_restaurant(
        &self,
        actor: &Actor,
        id: &RestaurantId,
        reason: &str,
    ) -> Result<Restaurant> {
        let restaurant = self
            .set_restaurant_status(
                actor,
                id,
                RestaurantStatus::sources_for(RestaurantStatus::Suspended),
                RestaurantStatus::Suspended,
                Some(reason),
            )
            .await?;
        self.record(
            actor,
            AuditAction::SuspendRestaurant {
                restaurant_id: id.clone(),
                reason: reason.to_string(),
            },
        )
        .await;
        Ok(restaurant)
    }

    /// Return a suspended restaurant to approved.
    pub async fn reactivate_restaurant(
        &self,
        actor: &Actor,
        id: &RestaurantId,
    ) -> Result<Restaurant> {
        let restaurant = self
            .set_restaurant_status(
                actor,
                id,
                &[RestaurantStatus::Suspended],
                RestaurantStatus::Approved,
                None,
            )
            .await?;
        self.record(
            actor,
            AuditAction::ReactivateRestaurant {
                restaurant_id: id.clone(),
            },
        )
        .await;
        Ok(restaurant)
    }

    /// Soft-delete a restaurant. The document stays for the audit trail.
    pub async fn delete_restaurant(
        &self,
        actor: &Actor,
        id: &RestaurantId,
        reason: Option<&str>,
    ) -> Result<Restaurant> {
        let restaurant = self
            .set_restaurant_status(
                actor,
                id,
                RestaurantStatus::sources_for(RestaurantStatus::Deleted),
                RestaurantStatus::Deleted,
                reason,
            )
            .await?;
        self.record(
            actor,
            AuditAction::DeleteRestaurant {
                restaurant_id: id.clone(),
                reason: reason.map(str::to_string),
            },
        )
        .await;
        Ok(restaurant)
    }

    /// Move a restaurant to another plan.
    ///
    /// Enabled features are reset to the new plan's set and the change is
    /// appended to the subscription history.
    pub async fn change_restaurant_plan(
        &self,
        actor: &Actor,
        id: &RestaurantId,
        plan: PlanId,
    ) -> Result<Restaurant> {
        let caller = caller(actor);
        let current: Restaurant = self
            .require(&caller, Collection::Restaurants, id.as_str())
            .await?;
        if current.plan == plan {
            return Err(StoreError::FailedPrecondition(format!(
                "{}/{id} is already on the {plan} plan",
                Collection::Restaurants
            )));
        }

        let target = plans::plan(plan);
        let patch = body(json!({ "plan": target.id, "features": target.features }))?;
        let precondition = Precondition::field_eq("plan", current.plan.as_str()).and_in(
            "status",
            status_values(RestaurantStatus::sources_for(RestaurantStatus::Deleted)),
        );
        let doc = self
            .store()
            .update(&caller, Collection::Restaurants, id.as_str(), patch, Some(&precondition))
            .await?;

        let history = body(json!({
            "restaurant_id": id,
            "plan": plan,
            "previous_plan": current.plan,
            "changed_by": actor.user_id()?,
        }))?;
        self.store()
            .add(&caller, Collection::Subscriptions, history)
            .await?;

        info!(restaurant = %id, from = %current.plan, to = %plan, "restaurant plan changed");
        self.record(
            actor,
            AuditAction::ChangeRestaurantPlan {
                restaurant_id: id.clone(),
                from: current.plan,
                to: plan,
            },
        )
        .await;
        doc.decode()
    }

    /// Replace the enabled features of a restaurant.
    ///
    /// # Errors
    /// `StoreError::InvalidArgument` if a feature is not part of the
    /// restaurant's plan.
    pub async fn update_restaurant_features(
        &self,
        actor: &Actor,
        id: &RestaurantId,
        features: BTreeSet<Feature>,
    ) -> Result<Restaurant> {
        let caller = caller(actor);
        let current: Restaurant = self
            .require(&caller, Collection::Restaurants, id.as_str())
            .await?;

        let plan = plans::plan(current.plan);
        if let Some(extra) = features.iter().find(|f| !plan.includes(**f)) {
            return Err(StoreError::InvalidArgument(format!(
                "{} is not included in the {} plan",
                extra.display_name(),
                plan.name
            )));
        }

        let patch = body(json!({ "features": features }))?;
        let precondition = Precondition::field_eq("plan", current.plan.as_str());
        let doc = self
            .store()
            .update(&caller, Collection::Restaurants, id.as_str(), patch, Some(&precondition))
            .await?;

        info!(restaurant = %id, count = features.len(), "restaurant features updated");
        self.record(
            actor,
            AuditAction::UpdateRestaurantFeatures {
                restaurant_id: id.clone(),
                features: features.into_iter().collect(),
            },
        )
        .await;
        doc.decode()
    }

    /// Watch one restaurant document.
    pub async fn watch_restaurant(&self, caller: &Caller, id: &RestaurantId) -> Result<Subscription> {
        let query = Query::new(Collection::Restaurants).filter(
            FieldPath::DocumentId,
            FilterOp::Eq,
            id.as_str(),
        );
        self.store().watch(caller, query).await
    }

    /// Load a restaurant the actor is about to act on.
    ///
    /// Owners may only touch their own restaurants; other roles are left to
    /// the store's rules.
    pub(crate) async fn managed_restaurant(
        &self,
        actor: &Actor,
        id: &RestaurantId,
    ) -> Result<Restaurant> {
        let restaurant: Restaurant = self
            .require(&caller(actor), Collection::Restaurants, id.as_str())
            .await?;
        if actor.has_role(Role::RestaurantOwner) && restaurant.owner_id.as_str() != actor.uid {
            warn!(actor = %actor.uid, restaurant = %id, "not the restaurant owner");
            return Err(StoreError::PermissionDenied(format!(
                "{} does not manage {}/{id}",
                actor.uid,
                Collection::Restaurants
            )));
        }
        Ok(restaurant)
    }

    async fn set_restaurant_status(
        &self,
        actor: &Actor,
        id: &RestaurantId,
        from: &[RestaurantStatus],
        to: RestaurantStatus,
        reason: Option<&str>,
    ) -> Result<Restaurant> {
        let patch = body(json!({ "status": to, "status_reason": reason }))?;
        let precondition = Precondition::field_in("status", status_values(from));
        let doc = self
            .store()
            .update(
                &caller(actor),
                Collection::Restaurants,
                id.as_str(),
                patch,
                Some(&precondition),
            )
            .await?;
        info!(restaurant = %id, status = %to, actor = %actor.uid, "restaurant status changed");
        doc.decode()
    }
}
