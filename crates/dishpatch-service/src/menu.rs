//! Restaurant menus.

use crate::access::{body, caller, require_text, DataAccess};
use dishpatch_core::models::MenuItem;
use dishpatch_core::{Actor, Collection, MenuItemId, RestaurantId};
use dishpatch_store::{Caller, Direction, FieldPath, Query, Result, StoreError};
use serde_json::{json, Map, Value};
use tracing::info;

/// A menu item about to be added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMenuItem {
    /// Restaurant whose menu it joins
    pub restaurant_id: RestaurantId,
    /// Display name
    pub name: String,
    /// Longer description
    pub description: Option<String>,
    /// Price in cents
    pub price_cents: i64,
    /// Menu section, e.g. "mains"
    pub category: String,
    /// Orderable right away
    pub available: bool,
}

impl NewMenuItem {
    /// An available item without a description.
    #[must_use]
    pub fn new(
        restaurant_id: RestaurantId,
        name: impl Into<String>,
        price_cents: i64,
        category: impl Into<String>,
    ) -> Self {
        Self {
            restaurant_id,
            name: name.into(),
            description: None,
            price_cents,
            category: category.into(),
            available: true,
        }
    }
}

/// Menu item fields to change; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuItemUpdate {
    /// New display name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New price in cents
    pub price_cents: Option<i64>,
    /// New menu section
    pub category: Option<String>,
}

impl MenuItemUpdate {
    fn into_patch(self) -> Result<Map<String, Value>> {
        let mut patch = Map::new();
        if let Some(name) = self.name {
            require_text("name", &name)?;
            patch.insert("name".to_string(), Value::String(name));
        }
        if let Some(description) = self.description {
            patch.insert("description".to_string(), Value::String(description));
        }
        if let Some(price) = self.price_cents {
            check_price(price)?;
            patch.insert("price_cents".to_string(), price.into());
        }
        if let Some(category) = self.category {
            require_text("category", &category)?;
            patch.insert("category".to_string(), Value::String(category));
        }
        if patch.is_empty() {
            return Err(StoreError::InvalidArgument(
                "menu item update has no fields".to_string(),
            ));
        }
        Ok(patch)
    }
}

fn check_price(price_cents: i64) -> Result<()> {
    if price_cents < 0 {
        return Err(StoreError::InvalidArgument(format!(
            "price cannot be negative, got {price_cents}"
        )));
    }
    Ok(())
}

impl DataAccess {
    /// List a restaurant's menu by category, then name.
    pub async fn get_menu_items(
        &self,
        caller: &Caller,
        restaurant_id: &RestaurantId,
        category: Option<&str>,
        available_only: bool,
    ) -> Result<Vec<MenuItem>> {
        let mut query = Query::new(Collection::MenuItems)
            .where_eq("restaurant_id", restaurant_id.as_str())
            .order_by(FieldPath::field("name"), Direction::Ascending);
        if let Some(category) = category {
            query = query.where_eq("category", category);
        }
        if available_only {
            query = query.where_eq("available", true);
        }

        let mut items: Vec<MenuItem> = self.list_all(caller, &query).await?;
        items.sort_by(|a, b| a.category.cmp(&b.category));
        Ok(items)
    }

    /// Read one menu item.
    pub async fn get_menu_item(&self, caller: &Caller, id: &MenuItemId) -> Result<Option<MenuItem>> {
        self.fetch(caller, Collection::MenuItems, id.as_str()).await
    }

    /// Add an item to a restaurant's menu. The restaurant must exist.
    pub async fn add_menu_item(&self, actor: &Actor, item: NewMenuItem) -> Result<MenuItem> {
        require_text("name", &item.name)?;
        require_text("category", &item.category)?;
        check_price(item.price_cents)?;
        self.managed_restaurant(actor, &item.restaurant_id).await?;

        let data = body(json!({
            "restaurant_id": item.restaurant_id,
            "name": item.name,
            "description": item.description,
            "price_cents": item.price_cents,
            "category": item.category,
            "available": item.available,
        }))?;
        let doc = self
            .store()
            .add(&caller(actor), Collection::MenuItems, data)
            .await?;
        info!(item = %doc.id, restaurant = %item.restaurant_id, "menu item added");
        doc.decode()
    }

    /// Edit a menu item.
    pub async fn update_menu_item(
        &self,
        actor: &Actor,
        id: &MenuItemId,
        update: MenuItemUpdate,
    ) -> Result<MenuItem> {
        let patch = update.into_patch()?;
        self.managed_menu_item(actor, id).await?;
        let doc = self
            .store()
            .update(&caller(actor), Collection::MenuItems, id.as_str(), patch, None)
            .await?;
        info!(item = %id, "menu item updated");
        doc.decode()
    }

    /// Mark a menu item as orderable or sold out.
    pub async fn set_menu_item_availability(
        &self,
        actor: &Actor,
        id: &MenuItemId,
        available: bool,
    ) -> Result<MenuItem> {
        self.managed_menu_item(actor, id).await?;
        let patch = body(json!({ "available": available }))?;
        let doc = self
            .store()
            .update(&caller(actor), Collection::MenuItems, id.as_str(), patch, None)
            .await?;
        info!(item = %id, available, "menu item availability changed");
        doc.decode()
    }

    /// Remove a menu item. Removing a missing item succeeds.
    pub async fn delete_menu_item(&self, actor: &Actor, id: &MenuItemId) -> Result<()> {
        match self.managed_menu_item(actor, id).await {
            Ok(_) | Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.store()
            .delete(&caller(actor), Collection::MenuItems, id.as_str())
            .await?;
        info!(item = %id, "menu item deleted");
        Ok(())
    }

    async fn managed_menu_item(&self, actor: &Actor, id: &MenuItemId) -> Result<MenuItem> {
        let item: MenuItem = self
            .require(&caller(actor), Collection::MenuItems, id.as_str())
            .await?;
        match self.managed_restaurant(actor, &item.restaurant_id).await {
            // An orphaned item can still be cleaned up by its editors.
            Ok(_) | Err(StoreError::NotFound(_)) => Ok(item),
            Err(e) => Err(e),
        }
    }
}
