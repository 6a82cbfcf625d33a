use crate::access::{DataAccess, ListPage, PageRequest};
use crate::analytics::{PlatformStats, RevenueStats, TimeWindow};
use crate::drivers::DriverFilter;
use crate::orders::OrderFilter;
use crate::restaurants::RestaurantFilter;
use crate::users::UserFilter;
use dishpatch_audit::AuditPage;
use dishpatch_core::models::{Driver, Order, Restaurant, UserProfile};
use dishpatch_core::{Actor, DriverId, Feature, OrderId, PlanId, RestaurantId, Role, UserId};
use dishpatch_store::{Caller, Cursor, Result, StoreError, Subscription};
use std::collections::BTreeSet;

/// The platform operator console.
///
/// Only super admins can open it. Every moderation call it makes is
/// written to the audit trail.
#[derive(Debug, Clone)]
pub struct SuperAdminConsole {
    access: DataAccess,
    actor: Actor,
}

impl SuperAdminConsole {
    /// Open the console for a signed-in super admin.
    ///
    /// # Errors
    /// `StoreError::PermissionDenied` for any other role.
    pub fn new(access: DataAccess, actor: Actor) -> Result<Self> {
        if !actor.has_role(Role::SuperAdmin) {
            return Err(StoreError::PermissionDenied(format!(
                "{} ({}) cannot open the admin console",
                actor.uid, actor.role
            )));
        }
        Ok(Self { access, actor })
    }

    fn caller(&self) -> Caller {
        Caller::Authenticated(self.actor.clone())
    }

    /// Restaurants matching `filter`.
    pub async fn restaurants(&self, filter: RestaurantFilter, page: PageRequest) -> Result<ListPage<Restaurant>> {
        self.access.get_restaurants(&self.caller(), filter, page).await
    }

    /// Approve a pending restaurant.
    pub async fn approve_restaurant(&self, id: &RestaurantId) -> Result<Restaurant> {
        self.access.approve_restaurant(&self.actor, id).await
    }

    /// Take a restaurant off the platform for now.
    pub async fn suspend_restaurant(&self, id: &RestaurantId, reason: &str) -> Result<Restaurant> {
        self.access.suspend_restaurant(&self.actor, id, reason).await
    }

    /// Bring a suspended restaurant back.
    pub async fn reactivate_restaurant(&self, id: &RestaurantId) -> Result<Restaurant> {
        self.access.reactivate_restaurant(&self.actor, id).await
    }

    /// Soft-delete a restaurant.
    pub async fn delete_restaurant(&self, id: &RestaurantId, reason: Option<&str>) -> Result<Restaurant> {
        self.access.delete_restaurant(&self.actor, id, reason).await
    }

    /// Move a restaurant to another plan.
    pub async fn change_plan(&self, id: &RestaurantId, plan: PlanId) -> Result<Restaurant> {
        self.access.change_restaurant_plan(&self.actor, id, plan).await
    }

    /// Set the features a restaurant has switched on.
    pub async fn update_features(&self, id: &RestaurantId, features: BTreeSet<Feature>) -> Result<Restaurant> {
        self.access
            .update_restaurant_features(&self.actor, id, features)
            .await
    }

    /// User accounts matching `filter`.
    pub async fn users(&self, filter: UserFilter, page: PageRequest) -> Result<ListPage<UserProfile>> {
        self.access.get_users(&self.caller(), filter, page).await
    }

    /// Lock a user out.
    pub async fn suspend_user(&self, id: &UserId, reason: &str) -> Result<UserProfile> {
        self.access.suspend_user(&self.actor, id, reason).await
    }

    /// Restore a suspended user.
    pub async fn reactivate_user(&self, id: &UserId) -> Result<UserProfile> {
        self.access.reactivate_user(&self.actor, id).await
    }

    /// Change what a user is.
    pub async fn change_user_role(&self, id: &UserId, role: Role) -> Result<UserProfile> {
        self.access.change_user_role(&self.actor, id, role).await
    }

    /// Drivers matching `filter`.
    pub async fn drivers(&self, filter: DriverFilter, page: PageRequest) -> Result<ListPage<Driver>> {
        self.access.get_drivers(&self.caller(), filter, page).await
    }

    /// Approve a driver application.
    pub async fn approve_driver(&self, id: &DriverId) -> Result<Driver> {
        self.access.approve_driver(&self.actor, id).await
    }

    /// Turn down a driver application.
    pub async fn reject_driver(&self, id: &DriverId, reason: &str) -> Result<Driver> {
        self.access.reject_driver(&self.actor, id, reason).await
    }

    /// Stop an approved driver from delivering.
    pub async fn suspend_driver(&self, id: &DriverId, reason: &str) -> Result<Driver> {
        self.access.suspend_driver(&self.actor, id, reason).await
    }

    /// Live view of online drivers.
    pub async fn online_drivers(&self) -> Result<Subscription> {
        self.access.watch_online_drivers(&self.caller()).await
    }

    /// Orders matching `filter`.
    pub async fn orders(&self, filter: OrderFilter, page: PageRequest) -> Result<ListPage<Order>> {
        self.access.get_orders(&self.caller(), filter, page).await
    }

    /// Cancel any order that has not left the kitchen.
    pub async fn cancel_order(&self, id: &OrderId, reason: &str) -> Result<Order> {
        self.access.cancel_order(&self.actor, id, reason).await
    }

    /// Move an order to another driver.
    pub async fn reassign_driver(&self, id: &OrderId, driver_id: &DriverId) -> Result<Order> {
        self.access
            .reassign_order_driver(&self.actor, id, driver_id)
            .await
    }

    /// Platform-wide counts.
    pub async fn platform_stats(&self) -> Result<PlatformStats> {
        self.access.platform_stats(&self.caller()).await
    }

    /// Platform-wide revenue.
    pub async fn revenue(&self, window: TimeWindow) -> Result<RevenueStats> {
        self.access.revenue_stats(&self.caller(), window).await
    }

    /// The audit trail, newest first.
    pub async fn audit_logs(&self, max_rows: u32, cursor: Option<Cursor>) -> Result<AuditPage> {
        self.access.get_audit_logs(&self.actor, max_rows, cursor).await
    }
}
