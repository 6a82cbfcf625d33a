//! Order placement, progression and tracking.

use crate::access::{body, caller, DataAccess, ListPage, PageRequest};
use chrono::{DateTime, Utc};
use dishpatch_audit::AuditAction;
use dishpatch_core::models::{subtotal_cents, Driver, DriverApproval, MenuItem, Order, OrderLine, OrderStatus};
use dishpatch_core::{Actor, Collection, DriverId, MenuItemId, OrderId, RestaurantId, Role, UserId};
use dishpatch_store::document::timestamp_value;
use dishpatch_store::{
    Caller, FieldPath, FilterOp, Precondition, Query, Result, StoreError, Subscription,
};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Orders still moving through the kitchen or on the road.
const ACTIVE: [OrderStatus; 4] = [
    OrderStatus::Placed,
    OrderStatus::Accepted,
    OrderStatus::Preparing,
    OrderStatus::OutForDelivery,
];

fn total_out_of_range() -> StoreError {
    StoreError::InvalidArgument("order total out of range".to_string())
}

fn status_values(statuses: &[OrderStatus]) -> Vec<&'static str> {
    statuses.iter().map(OrderStatus::as_str).collect()
}

/// Filter for [`DataAccess::get_orders`].
///
/// Customers must filter on their own `customer_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    /// Only this status
    pub status: Option<OrderStatus>,
    /// Only orders from this restaurant
    pub restaurant_id: Option<RestaurantId>,
    /// Only orders placed by this customer
    pub customer_id: Option<UserId>,
    /// Only orders assigned to this driver
    pub driver_id: Option<DriverId>,
    /// Placed at or after this time
    pub created_after: Option<DateTime<Utc>>,
    /// Placed before this time
    pub created_before: Option<DateTime<Utc>>,
}

/// One line of an order request; price and name come from the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRequest {
    /// Menu item ordered
    pub menu_item_id: MenuItemId,
    /// How many
    pub quantity: u32,
}

/// An order about to be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    /// Restaurant ordered from
    pub restaurant_id: RestaurantId,
    /// Lines ordered
    pub lines: Vec<LineRequest>,
    /// Delivery fee in cents
    pub delivery_fee_cents: i64,
    /// Where to deliver
    pub delivery_address: Option<String>,
}

impl DataAccess {
    /// Place an order for `actor`.
    ///
    /// Every line is priced from the current menu. The restaurant must be
    /// approved and taking online orders, and every item must be on its menu
    /// and available.
    pub async fn place_order(&self, actor: &Actor, order: NewOrder) -> Result<Order> {
        if order.lines.is_empty() {
            return Err(StoreError::InvalidArgument("order has no lines".to_string()));
        }
        if order.delivery_fee_cents < 0 {
            return Err(StoreError::InvalidArgument(
                "delivery fee cannot be negative".to_string(),
            ));
        }
        if let Some(line) = order.lines.iter().find(|line| line.quantity == 0) {
            return Err(StoreError::InvalidArgument(format!(
                "quantity of {} must be at least 1",
                line.menu_item_id
            )));
        }

        let caller = caller(actor);
        let restaurant = self
            .get_restaurant(&caller, &order.restaurant_id)
            .await?
            .ok_or_else(|| StoreError::not_found(Collection::Restaurants, order.restaurant_id.as_str()))?;
        if !restaurant.is_accepting_orders() {
            return Err(StoreError::FailedPrecondition(format!(
                "{}/{} is not accepting orders",
                Collection::Restaurants,
                restaurant.id
            )));
        }

        let mut items = Vec::with_capacity(order.lines.len());
        for line in &order.lines {
            let item: MenuItem = self
                .require(&caller, Collection::MenuItems, line.menu_item_id.as_str())
                .await?;
            if item.restaurant_id != restaurant.id {
                return Err(StoreError::InvalidArgument(format!(
                    "{} is not on the menu of {}",
                    item.id, restaurant.id
                )));
            }
            if !item.available {
                return Err(StoreError::FailedPrecondition(format!(
                    "{} is not available",
                    item.name
                )));
            }
            items.push(OrderLine {
                menu_item_id: item.id,
                name: item.name,
                unit_price_cents: item.price_cents,
                quantity: line.quantity,
            });
        }

        let subtotal = subtotal_cents(&items).ok_or_else(total_out_of_range)?;
        let total = subtotal
            .checked_add(order.delivery_fee_cents)
            .ok_or_else(total_out_of_range)?;
        let data = body(json!({
            "customer_id": actor.user_id()?,
            "restaurant_id": restaurant.id,
            "driver_id": Value::Null,
            "items": items,
            "subtotal_cents": subtotal,
            "delivery_fee_cents": order.delivery_fee_cents,
            "total_cents": total,
            "status": OrderStatus::Placed,
            "delivery_address": order.delivery_address,
        }))?;

        let doc = self.store().add(&caller, Collection::Orders, data).await?;
        info!(order = %doc.id, restaurant = %restaurant.id, total, "order placed");
        doc.decode()
    }

    /// List orders, newest first.
    ///
    /// Owners must filter on a restaurant they manage and drivers on their
    /// own `driver_id`.
    pub async fn get_orders(
        &self,
        caller: &Caller,
        filter: OrderFilter,
        page: PageRequest,
    ) -> Result<ListPage<Order>> {
        self.check_order_scope(caller, filter.restaurant_id.as_ref(), filter.driver_id.as_ref())
            .await?;
        let mut query = Query::new(Collection::Orders);
        if let Some(status) = filter.status {
            query = query.where_eq("status", status.as_str());
        }
        if let Some(restaurant_id) = filter.restaurant_id {
            query = query.where_eq("restaurant_id", restaurant_id.as_str());
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.where_eq("customer_id", customer_id.as_str());
        }
        if let Some(driver_id) = filter.driver_id {
            query = query.where_eq("driver_id", driver_id.as_str());
        }
        if let Some(after) = filter.created_after {
            query = query.filter(FieldPath::CreateTime, FilterOp::Gte, timestamp_value(after));
        }
        if let Some(before) = filter.created_before {
            query = query.filter(FieldPath::CreateTime, FilterOp::Lt, timestamp_value(before));
        }
        self.list(caller, query, page).await
    }

    /// Read one order.
    pub async fn get_order(&self, caller: &Caller, id: &OrderId) -> Result<Option<Order>> {
        self.fetch(caller, Collection::Orders, id.as_str()).await
    }

    /// Move an order one step along placed, accepted, preparing,
    /// out for delivery, delivered.
    ///
    /// Owners advance orders of their own restaurants; drivers advance
    /// orders assigned to them.
    pub async fn advance_order_status(&self, actor: &Actor, id: &OrderId) -> Result<Order> {
        let current = self.order_for_staff(actor, id).await?;
        let Some(next) = current.status.next() else {
            return Err(StoreError::FailedPrecondition(format!(
                "{}/{id} is already {}",
                Collection::Orders,
                current.status
            )));
        };

        let patch = body(json!({ "status": next }))?;
        let precondition = Precondition::field_eq("status", current.status.as_str());
        let doc = self
            .store()
            .update(&caller(actor), Collection::Orders, id.as_str(), patch, Some(&precondition))
            .await?;
        info!(order = %id, from = %current.status, to = %next, "order advanced");
        doc.decode()
    }

    /// Hand an unassigned order to an approved driver.
    pub async fn assign_driver(&self, actor: &Actor, id: &OrderId, driver_id: &DriverId) -> Result<Order> {
        self.order_for_staff(actor, id).await?;
        self.approved_driver(actor, driver_id).await?;

        let patch = body(json!({ "driver_id": driver_id }))?;
        let precondition = Precondition::field_in("status", status_values(OrderStatus::assignable()))
            .and_eq("driver_id", Value::Null);
        let doc = self
            .store()
            .update(&caller(actor), Collection::Orders, id.as_str(), patch, Some(&precondition))
            .await?;
        info!(order = %id, driver = %driver_id, "driver assigned");
        doc.decode()
    }

    /// Cancel an order that has not left the kitchen.
    ///
    /// Customers cancel their own orders and owners cancel orders of their
    /// restaurants; only cancellations by a super admin are audited.
    pub async fn cancel_order(&self, actor: &Actor, id: &OrderId, reason: &str) -> Result<Order> {
        match actor.role {
            Role::RestaurantOwner => {
                self.order_for_staff(actor, id).await?;
            }
            Role::Driver => {
                warn!(actor = %actor.uid, order = %id, "drivers cannot cancel orders");
                return Err(StoreError::PermissionDenied(format!(
                    "{} may not cancel {}/{id}",
                    actor.uid,
                    Collection::Orders
                )));
            }
            Role::Customer | Role::SuperAdmin => {}
        }

        let patch = body(json!({ "status": OrderStatus::Cancelled, "cancel_reason": reason }))?;
        let precondition =
            Precondition::field_in("status", status_values(OrderStatus::cancellable()));
        let doc = self
            .store()
            .update(&caller(actor), Collection::Orders, id.as_str(), patch, Some(&precondition))
            .await?;
        info!(order = %id, actor = %actor.uid, "order cancelled");

        if actor.has_role(Role::SuperAdmin) {
            self.record(
                actor,
                AuditAction::CancelOrder {
                    order_id: id.clone(),
                    reason: reason.to_string(),
                },
            )
            .await;
        }
        doc.decode()
    }

    /// Move an order to another driver.
    pub async fn reassign_order_driver(
        &self,
        actor: &Actor,
        id: &OrderId,
        driver_id: &DriverId,
    ) -> Result<Order> {
        let caller = caller(actor);
        let current: Order = self.require(&caller, Collection::Orders, id.as_str()).await?;
        if current.driver_id.as_ref() == Some(driver_id) {
            return Err(StoreError::FailedPrecondition(format!(
                "{}/{id} is already assigned to {driver_id}",
                Collection::Orders
            )));
        }
        self.approved_driver(actor, driver_id).await?;

        let previous = current
            .driver_id
            .as_ref()
            .map_or(Value::Null, |d| Value::String(d.to_string()));
        let patch = body(json!({ "driver_id": driver_id }))?;
        let precondition = Precondition::field_in("status", status_values(OrderStatus::assignable()))
            .and_eq("driver_id", previous);
        let doc = self
            .store()
            .update(&caller, Collection::Orders, id.as_str(), patch, Some(&precondition))
            .await?;

        info!(order = %id, to = %driver_id, "order reassigned");
        self.record(
            actor,
            AuditAction::ReassignOrderDriver {
                order_id: id.clone(),
                from: current.driver_id,
                to: driver_id.clone(),
            },
        )
        .await;
        doc.decode()
    }

    /// Watch one order. Customers can only watch their own.
    pub async fn watch_order(&self, caller: &Caller, id: &OrderId) -> Result<Subscription> {
        let mut query =
            Query::new(Collection::Orders).filter(FieldPath::DocumentId, FilterOp::Eq, id.as_str());
        if let Some(actor) = caller.actor().filter(|a| a.has_role(Role::Customer)) {
            query = query.where_eq("customer_id", actor.uid.as_str());
        }
        self.store().watch(caller, query).await
    }

    /// Watch the active orders of a restaurant. Owners can only watch
    /// restaurants they manage.
    pub async fn watch_restaurant_orders(
        &self,
        caller: &Caller,
        restaurant_id: &RestaurantId,
    ) -> Result<Subscription> {
        self.check_order_scope(caller, Some(restaurant_id), None).await?;
        let query = Query::new(Collection::Orders)
            .where_eq("restaurant_id", restaurant_id.as_str())
            .where_in("status", status_values(&ACTIVE));
        self.store().watch(caller, query).await
    }

    /// Watch the active orders assigned to a driver. Drivers can only watch
    /// their own.
    pub async fn watch_driver_orders(&self, caller: &Caller, driver_id: &DriverId) -> Result<Subscription> {
        self.check_order_scope(caller, None, Some(driver_id)).await?;
        let query = Query::new(Collection::Orders)
            .where_eq("driver_id", driver_id.as_str())
            .where_in("status", status_values(&ACTIVE));
        self.store().watch(caller, query).await
    }

    /// Reject order reads outside the caller's reach: owners are limited to
    /// restaurants they manage, drivers to orders assigned to them.
    pub(crate) async fn check_order_scope(
        &self,
        caller: &Caller,
        restaurant_id: Option<&RestaurantId>,
        driver_id: Option<&DriverId>,
    ) -> Result<()> {
        let Some(actor) = caller.actor() else {
            return Ok(());
        };
        match actor.role {
            Role::RestaurantOwner => {
                let Some(restaurant_id) = restaurant_id else {
                    warn!(actor = %actor.uid, "owner order read without a restaurant");
                    return Err(StoreError::PermissionDenied(format!(
                        "{} must name a restaurant to read {}",
                        actor.uid,
                        Collection::Orders
                    )));
                };
                self.managed_restaurant(actor, restaurant_id).await?;
            }
            Role::Driver if driver_id.map(DriverId::as_str) != Some(actor.uid.as_str()) => {
                warn!(actor = %actor.uid, "driver order read outside own deliveries");
                return Err(StoreError::PermissionDenied(format!(
                    "{} may only read {} assigned to them",
                    actor.uid,
                    Collection::Orders
                )));
            }
            _ => {}
        }
        Ok(())
    }

    // Owners must own the restaurant, drivers must hold the order.
    async fn order_for_staff(&self, actor: &Actor, id: &OrderId) -> Result<Order> {
        let order: Order = self
            .require(&caller(actor), Collection::Orders, id.as_str())
            .await?;
        match actor.role {
            Role::RestaurantOwner => {
                self.managed_restaurant(actor, &order.restaurant_id).await?;
            }
            Role::Driver if order.driver_id.as_ref().map(DriverId::as_str) != Some(actor.uid.as_str()) => {
                warn!(actor = %actor.uid, order = %id, "order not assigned to driver");
                return Err(StoreError::PermissionDenied(format!(
                    "{}/{id} is not assigned to {}",
                    Collection::Orders,
                    actor.uid
                )));
            }
            _ => {}
        }
        Ok(order)
    }

    async fn approved_driver(&self, actor: &Actor, id: &DriverId) -> Result<Driver> {
        let driver: Driver = self
            .require(&caller(actor), Collection::Drivers, id.as_str())
            .await?;
        if driver.approval_status != DriverApproval::Approved {
            return Err(StoreError::FailedPrecondition(format!(
                "{}/{id} is {}",
                Collection::Drivers,
                driver.approval_status
            )));
        }
        Ok(driver)
    }
}
