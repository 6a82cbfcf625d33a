//! Customer carts.
//!
//! A cart is the set of `cartItems` documents owned by one customer. It
//! holds items from a single restaurant at a time.

use crate::access::{body, caller, DataAccess};
use crate::orders::{LineRequest, NewOrder};
use dishpatch_core::models::{CartItem, MenuItem, Order};
use dishpatch_core::{Actor, CartItemId, Collection, MenuItemId};
use dishpatch_store::{Direction, FieldPath, Precondition, Query, Result, StoreError};
use serde_json::json;
use tracing::info;

impl DataAccess {
    /// The actor's cart, oldest line first.
    pub async fn get_cart(&self, actor: &Actor) -> Result<Vec<CartItem>> {
        let query = Query::new(Collection::CartItems)
            .where_eq("customer_id", actor.uid.as_str())
            .order_by(FieldPath::CreateTime, Direction::Ascending);
        self.list_all(&caller(actor), &query).await
    }

    /// Put `quantity` of a menu item in the cart.
    ///
    /// Adding an item already in the cart raises its quantity.
    ///
    /// # Errors
    /// `StoreError::FailedPrecondition` if the item is sold out or the cart
    /// holds items from another restaurant.
    pub async fn add_to_cart(
        &self,
        actor: &Actor,
        menu_item_id: &MenuItemId,
        quantity: u32,
    ) -> Result<CartItem> {
        if quantity == 0 {
            return Err(StoreError::InvalidArgument(
                "quantity must be at least 1".to_string(),
            ));
        }

        let caller = caller(actor);
        let item: MenuItem = self
            .require(&caller, Collection::MenuItems, menu_item_id.as_str())
            .await?;
        if !item.available {
            return Err(StoreError::FailedPrecondition(format!(
                "{} is not available",
                item.name
            )));
        }

        let cart = self.get_cart(actor).await?;
        if let Some(other) = cart.iter().find(|line| line.restaurant_id != item.restaurant_id) {
            return Err(StoreError::FailedPrecondition(format!(
                "cart holds items from restaurant {}; clear it first",
                other.restaurant_id
            )));
        }

        if let Some(line) = cart.iter().find(|line| line.menu_item_id == item.id) {
            let merged = line.quantity.saturating_add(quantity);
            let patch = body(json!({ "quantity": merged }))?;
            let precondition = Precondition::field_eq("quantity", line.quantity);
            let doc = self
                .store()
                .update(&caller, Collection::CartItems, line.id.as_str(), patch, Some(&precondition))
                .await?;
            info!(line = %line.id, quantity = merged, "cart quantity merged");
            return doc.decode();
        }

        let data = body(json!({
            "customer_id": actor.user_id()?,
            "restaurant_id": item.restaurant_id,
            "menu_item_id": item.id,
            "name": item.name,
            "unit_price_cents": item.price_cents,
            "quantity": quantity,
        }))?;
        let doc = self.store().add(&caller, Collection::CartItems, data).await?;
        info!(line = %doc.id, item = %menu_item_id, quantity, "added to cart");
        doc.decode()
    }

    /// Set the quantity of a cart line. Zero removes it and returns `None`.
    pub async fn update_cart_quantity(
        &self,
        actor: &Actor,
        id: &CartItemId,
        quantity: u32,
    ) -> Result<Option<CartItem>> {
        if quantity == 0 {
            self.remove_from_cart(actor, id).await?;
            return Ok(None);
        }

        let patch = body(json!({ "quantity": quantity }))?;
        let doc = self
            .store()
            .update(&caller(actor), Collection::CartItems, id.as_str(), patch, None)
            .await?;
        info!(line = %id, quantity, "cart quantity changed");
        doc.decode().map(Some)
    }

    /// Remove one cart line. Removing a missing line succeeds.
    pub async fn remove_from_cart(&self, actor: &Actor, id: &CartItemId) -> Result<()> {
        self.store()
            .delete(&caller(actor), Collection::CartItems, id.as_str())
            .await?;
        info!(line = %id, "removed from cart");
        Ok(())
    }

    /// Empty the actor's cart, returning how many lines were removed.
    pub async fn clear_cart(&self, actor: &Actor) -> Result<usize> {
        let cart = self.get_cart(actor).await?;
        for line in &cart {
            self.remove_from_cart(actor, &line.id).await?;
        }
        Ok(cart.len())
    }

    /// Sum of the cart lines at the prices they were added at.
    ///
    /// # Errors
    /// `StoreError::InvalidArgument` if the sum overflows.
    pub async fn cart_total_cents(&self, actor: &Actor) -> Result<i64> {
        let cart = self.get_cart(actor).await?;
        cart.iter()
            .try_fold(0_i64, |sum, line| sum.checked_add(line.line_total_cents()?))
            .ok_or_else(|| StoreError::InvalidArgument("cart total out of range".to_string()))
    }

    /// Place an order from the cart and empty it.
    ///
    /// The order is priced from the current menu. If emptying the cart fails
    /// after the order was placed, the order stands and the error is returned.
    pub async fn checkout_cart(
        &self,
        actor: &Actor,
        delivery_address: Option<String>,
        delivery_fee_cents: i64,
    ) -> Result<Order> {
        let cart = self.get_cart(actor).await?;
        let Some(first) = cart.first() else {
            return Err(StoreError::FailedPrecondition("cart is empty".to_string()));
        };

        let order = NewOrder {
            restaurant_id: first.restaurant_id.clone(),
            lines: cart
                .iter()
                .map(|line| LineRequest {
                    menu_item_id: line.menu_item_id.clone(),
                    quantity: line.quantity,
                })
                .collect(),
            delivery_fee_cents,
            delivery_address,
        };
        let order = self.place_order(actor, order).await?;

        for line in &cart {
            self.remove_from_cart(actor, &line.id).await?;
        }
        info!(order = %order.id, lines = cart.len(), "cart checked out");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::NewMenuItem;
    use crate::testing::{approved_restaurant, customer, owner, setup_access};
    use dishpatch_core::models::OrderStatus;

    async fn menu_item(access: &DataAccess, owner_uid: &str, name: &str, price: i64) -> MenuItemId {
        let owner = owner(owner_uid);
        let restaurant = approved_restaurant(access, &owner, &format!("{name} House")).await;
        access
            .add_menu_item(&owner, NewMenuItem::new(restaurant.id, name, price, "mains"))
            .await
            .expect("add menu item")
            .id
    }

    #[tokio::test]
    async fn test_add_merges_quantity() {
        let access = setup_access().await;
        let kim = customer("kim");
        let ramen = menu_item(&access, "owner-1", "Ramen", 1_250).await;

        access.add_to_cart(&kim, &ramen, 1).await.expect("add");
        let merged = access.add_to_cart(&kim, &ramen, 2).await.expect("add again");
        assert_eq!(merged.quantity, 3);

        let cart = access.get_cart(&kim).await.expect("cart");
        assert_eq!(cart.len(), 1);
        assert_eq!(access.cart_total_cents(&kim).await.expect("total"), 3_750);
    }

    #[tokio::test]
    async fn test_cart_total_out_of_range() {
        let access = setup_access().await;
        let kim = customer("kim");
        let caviar = menu_item(&access, "owner-1", "Caviar", 10_000_000_000_000).await;

        access.add_to_cart(&kim, &caviar, 1_000_000).await.expect("add");
        let err = access.cart_total_cents(&kim).await.expect_err("total overflows");
        assert!(matches!(err, StoreError::InvalidArgument(_)));

        let err = access
            .checkout_cart(&kim, None, 0)
            .await
            .expect_err("order total overflows");
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert_eq!(access.get_cart(&kim).await.expect("cart").len(), 1);
    }

    #[tokio::test]
    async fn test_cart_holds_one_restaurant() {
        let access = setup_access().await;
        let kim = customer("kim");
        let ramen = menu_item(&access, "owner-1", "Ramen", 1_250).await;
        let pizza = menu_item(&access, "owner-2", "Pizza", 1_500).await;

        access.add_to_cart(&kim, &ramen, 1).await.expect("add");
        let err = access
            .add_to_cart(&kim, &pizza, 1)
            .await
            .expect_err("different restaurant");
        assert!(matches!(err, StoreError::FailedPrecondition(_)));

        assert_eq!(access.clear_cart(&kim).await.expect("clear"), 1);
        access
            .add_to_cart(&kim, &pizza, 1)
            .await
            .expect("empty cart takes any restaurant");
    }

    #[tokio::test]
    async fn test_zero_quantity_removes_line() {
        let access = setup_access().await;
        let kim = customer("kim");
        let ramen = menu_item(&access, "owner-1", "Ramen", 1_250).await;
        let line = access.add_to_cart(&kim, &ramen, 2).await.expect("add");

        let updated = access
            .update_cart_quantity(&kim, &line.id, 5)
            .await
            .expect("update")
            .expect("line kept");
        assert_eq!(updated.quantity, 5);

        let removed = access
            .update_cart_quantity(&kim, &line.id, 0)
            .await
            .expect("remove");
        assert!(removed.is_none());
        assert!(access.get_cart(&kim).await.expect("cart").is_empty());
    }

    #[tokio::test]
    async fn test_carts_are_private() {
        let access = setup_access().await;
        let kim = customer("kim");
        let lee = customer("lee");
        let ramen = menu_item(&access, "owner-1", "Ramen", 1_250).await;
        let line = access.add_to_cart(&kim, &ramen, 1).await.expect("add");

        let err = access
            .update_cart_quantity(&lee, &line.id, 9)
            .await
            .expect_err("someone else's cart");
        assert!(matches!(err, StoreError::PermissionDenied(_)));
        assert!(access.get_cart(&lee).await.expect("own cart").is_empty());
    }

    #[tokio::test]
    async fn test_checkout_places_order_and_empties_cart() {
        let access = setup_access().await;
        let kim = customer("kim");
        let ramen = menu_item(&access, "owner-1", "Ramen", 1_250).await;

        let err = access
            .checkout_cart(&kim, None, 0)
            .await
            .expect_err("empty cart");
        assert!(matches!(err, StoreError::FailedPrecondition(_)));

        access.add_to_cart(&kim, &ramen, 2).await.expect("add");
        let order = access
            .checkout_cart(&kim, Some("1 Main St".to_string()), 300)
            .await
            .expect("checkout");
        assert_eq!(order.status, OrderStatus::Placed);
        assert_eq!(order.total_cents, 2_800);
        assert!(access.get_cart(&kim).await.expect("cart").is_empty());
    }
}
