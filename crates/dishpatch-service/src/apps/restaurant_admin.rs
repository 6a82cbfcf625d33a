use crate::access::{DataAccess, ListPage, PageRequest};
use crate::analytics::{RevenueStats, TimeWindow};
use crate::drivers::DriverFilter;
use crate::menu::{MenuItemUpdate, NewMenuItem};
use crate::orders::OrderFilter;
use crate::restaurants::{NewRestaurant, RestaurantProfileUpdate};
use dishpatch_core::models::{Driver, DriverApproval, MenuItem, Order, OrderStatus, Restaurant};
use dishpatch_core::{Actor, DriverId, MenuItemId, OrderId, RestaurantId, SubscriptionPlan};
use dishpatch_store::{Caller, Result, Subscription};

/// The restaurant owner's dashboard.
///
/// Reads scoped to one restaurant check that the signed-in owner manages
/// it before touching its orders or revenue.
#[derive(Debug, Clone)]
pub struct RestaurantAdmin {
    access: DataAccess,
    actor: Actor,
}

impl RestaurantAdmin {
    /// Bind the dashboard to a signed-in owner.
    #[must_use]
    pub fn new(access: DataAccess, actor: Actor) -> Self {
        Self { access, actor }
    }

    fn caller(&self) -> Caller {
        Caller::Authenticated(self.actor.clone())
    }

    /// Restaurants owned by the signed-in owner, deleted ones excluded.
    pub async fn my_restaurants(&self, page: PageRequest) -> Result<ListPage<Restaurant>> {
        let owner = self.actor.user_id()?;
        self.access
            .get_restaurants_by_owner(&self.caller(), &owner, page)
            .await
    }

    /// Submit a new restaurant for review.
    pub async fn register(&self, restaurant: NewRestaurant) -> Result<Restaurant> {
        self.access.register_restaurant(&self.actor, restaurant).await
    }

    /// Edit name, address or cuisine.
    pub async fn update_profile(&self, id: &RestaurantId, update: RestaurantProfileUpdate) -> Result<Restaurant> {
        self.access
            .update_restaurant_profile(&self.actor, id, update)
            .await
    }

    /// The plan the restaurant is on.
    pub async fn plan(&self, id: &RestaurantId) -> Result<&'static SubscriptionPlan> {
        let restaurant = self.access.managed_restaurant(&self.actor, id).await?;
        Ok(self.access.get_plan(restaurant.plan))
    }

    /// The full menu, sold-out items included.
    pub async fn menu(&self, id: &RestaurantId) -> Result<Vec<MenuItem>> {
        self.access.get_menu_items(&self.caller(), id, None, false).await
    }

    /// Add a dish.
    pub async fn add_menu_item(&self, item: NewMenuItem) -> Result<MenuItem> {
        self.access.add_menu_item(&self.actor, item).await
    }

    /// Edit a dish.
    pub async fn update_menu_item(&self, id: &MenuItemId, update: MenuItemUpdate) -> Result<MenuItem> {
        self.access.update_menu_item(&self.actor, id, update).await
    }

    /// Mark a dish sold out or back in stock.
    pub async fn set_availability(&self, id: &MenuItemId, available: bool) -> Result<MenuItem> {
        self.access
            .set_menu_item_availability(&self.actor, id, available)
            .await
    }

    /// Remove a dish.
    pub async fn delete_menu_item(&self, id: &MenuItemId) -> Result<()> {
        self.access.delete_menu_item(&self.actor, id).await
    }

    /// Live view of the restaurant's open orders.
    pub async fn incoming_orders(&self, id: &RestaurantId) -> Result<Subscription> {
        self.access.managed_restaurant(&self.actor, id).await?;
        self.access.watch_restaurant_orders(&self.caller(), id).await
    }

    /// Order history of the restaurant, newest first.
    pub async fn orders(
        &self,
        id: &RestaurantId,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<ListPage<Order>> {
        self.access.managed_restaurant(&self.actor, id).await?;
        let filter = OrderFilter {
            status,
            restaurant_id: Some(id.clone()),
            ..OrderFilter::default()
        };
        self.access.get_orders(&self.caller(), filter, page).await
    }

    /// Move an order one step along its lifecycle.
    pub async fn advance_order(&self, id: &OrderId) -> Result<Order> {
        self.access.advance_order_status(&self.actor, id).await
    }

    /// Cancel an order.
    pub async fn cancel_order(&self, id: &OrderId, reason: &str) -> Result<Order> {
        self.access.cancel_order(&self.actor, id, reason).await
    }

    /// Approved drivers who are online now.
    pub async fn available_drivers(&self, page: PageRequest) -> Result<ListPage<Driver>> {
        let filter = DriverFilter {
            approval: Some(DriverApproval::Approved),
            online: Some(true),
        };
        self.access.get_drivers(&self.caller(), filter, page).await
    }

    /// Hand an order to a driver.
    pub async fn assign_driver(&self, id: &OrderId, driver_id: &DriverId) -> Result<Order> {
        self.access.assign_driver(&self.actor, id, driver_id).await
    }

    /// Revenue of the restaurant over its recent delivered orders.
    pub async fn revenue(&self, id: &RestaurantId, window: TimeWindow) -> Result<RevenueStats> {
        self.access.managed_restaurant(&self.actor, id).await?;
        self.access
            .restaurant_revenue_stats(&self.caller(), id, window)
            .await
    }
}
