use crate::access::{DataAccess, ListPage, PageRequest};
use crate::orders::OrderFilter;
use crate::users::{NewUserProfile, UserProfileUpdate};
use dishpatch_core::models::{CartItem, MenuItem, Order, Restaurant, UserProfile};
use dishpatch_core::{Actor, CartItemId, MenuItemId, OrderId, RestaurantId};
use dishpatch_store::{Caller, Result, StoreError, Subscription};

/// The customer web and mobile apps.
///
/// Browsing works signed out; carts, orders and the profile need a
/// signed-in customer.
#[derive(Debug, Clone)]
pub struct CustomerApp {
    access: DataAccess,
    actor: Option<Actor>,
}

impl CustomerApp {
    /// Bind the app to a customer, or to nobody when signed out.
    #[must_use]
    pub fn new(access: DataAccess, actor: Option<Actor>) -> Self {
        Self { access, actor }
    }

    fn caller(&self) -> Caller {
        Caller::from_actor(self.actor.as_ref())
    }

    fn signed_in(&self) -> Result<&Actor> {
        self.actor
            .as_ref()
            .ok_or_else(|| StoreError::PermissionDenied("sign in required".to_string()))
    }

    /// Approved restaurants, newest first.
    pub async fn browse_restaurants(&self, page: PageRequest) -> Result<ListPage<Restaurant>> {
        self.access.get_active_restaurants(&self.caller(), page).await
    }

    /// One restaurant.
    pub async fn restaurant(&self, id: &RestaurantId) -> Result<Option<Restaurant>> {
        self.access.get_restaurant(&self.caller(), id).await
    }

    /// The orderable part of a restaurant's menu.
    pub async fn menu(&self, restaurant_id: &RestaurantId, category: Option<&str>) -> Result<Vec<MenuItem>> {
        self.access
            .get_menu_items(&self.caller(), restaurant_id, category, true)
            .await
    }

    /// Create the signed-in user's profile.
    pub async fn sign_up(&self, profile: NewUserProfile) -> Result<UserProfile> {
        self.access.create_user_profile(self.signed_in()?, profile).await
    }

    /// The signed-in user's profile.
    pub async fn profile(&self) -> Result<Option<UserProfile>> {
        let actor = self.signed_in()?;
        self.access.get_user(&self.caller(), &actor.user_id()?).await
    }

    /// Edit the signed-in user's profile.
    pub async fn update_profile(&self, update: UserProfileUpdate) -> Result<UserProfile> {
        let actor = self.signed_in()?;
        self.access
            .update_user_profile(actor, &actor.user_id()?, update)
            .await
    }

    /// The cart.
    pub async fn cart(&self) -> Result<Vec<CartItem>> {
        self.access.get_cart(self.signed_in()?).await
    }

    /// Add to the cart.
    pub async fn add_to_cart(&self, item: &MenuItemId, quantity: u32) -> Result<CartItem> {
        self.access.add_to_cart(self.signed_in()?, item, quantity).await
    }

    /// Change a cart line; zero removes it.
    pub async fn update_cart_quantity(&self, line: &CartItemId, quantity: u32) -> Result<Option<CartItem>> {
        self.access
            .update_cart_quantity(self.signed_in()?, line, quantity)
            .await
    }

    /// Remove a cart line.
    pub async fn remove_from_cart(&self, line: &CartItemId) -> Result<()> {
        self.access.remove_from_cart(self.signed_in()?, line).await
    }

    /// Cart total in cents.
    pub async fn cart_total_cents(&self) -> Result<i64> {
        self.access.cart_total_cents(self.signed_in()?).await
    }

    /// Order everything in the cart.
    pub async fn checkout(&self, delivery_address: Option<String>, delivery_fee_cents: i64) -> Result<Order> {
        self.access
            .checkout_cart(self.signed_in()?, delivery_address, delivery_fee_cents)
            .await
    }

    /// The customer's orders, newest first.
    pub async fn my_orders(&self, page: PageRequest) -> Result<ListPage<Order>> {
        let actor = self.signed_in()?;
        let filter = OrderFilter {
            customer_id: Some(actor.user_id()?),
            ..OrderFilter::default()
        };
        self.access.get_orders(&self.caller(), filter, page).await
    }

    /// Live tracking of one order.
    pub async fn track_order(&self, id: &OrderId) -> Result<Subscription> {
        self.signed_in()?;
        self.access.watch_order(&self.caller(), id).await
    }

    /// Cancel an order before it leaves the kitchen.
    pub async fn cancel_order(&self, id: &OrderId, reason: &str) -> Result<Order> {
        self.access.cancel_order(self.signed_in()?, id, reason).await
    }
}
