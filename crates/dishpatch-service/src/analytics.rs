//! Platform and revenue statistics.
//!
//! Counts come from the store's count primitive; revenue is folded over a
//! bounded window of recent delivered orders. Nothing is precomputed.

use crate::access::DataAccess;
use chrono::{DateTime, Utc};
use dishpatch_core::models::{AccountStatus, DriverApproval, Order, OrderStatus, RestaurantStatus};
use dishpatch_core::{Collection, RestaurantId, Role};
use dishpatch_store::document::timestamp_value;
use dishpatch_store::{Caller, FieldPath, FilterOp, Query, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Time range of a statistics request; open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    /// Include orders placed at or after this time
    pub since: Option<DateTime<Utc>>,
    /// Include orders placed before this time
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Everything.
    #[must_use]
    pub fn all_time() -> Self {
        Self::default()
    }

    /// Orders placed at or after `since`.
    #[must_use]
    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            until: None,
        }
    }

    fn apply(self, mut query: Query) -> Query {
        if let Some(since) = self.since {
            query = query.filter(FieldPath::CreateTime, FilterOp::Gte, timestamp_value(since));
        }
        if let Some(until) = self.until {
            query = query.filter(FieldPath::CreateTime, FilterOp::Lt, timestamp_value(until));
        }
        query
    }
}

/// Document counts across the platform, keyed by status or role name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlatformStats {
    /// Restaurants per status
    pub restaurants: BTreeMap<String, u64>,
    /// Active user accounts per role
    pub users: BTreeMap<String, u64>,
    /// Suspended user accounts
    pub suspended_users: u64,
    /// Drivers per approval status
    pub drivers: BTreeMap<String, u64>,
    /// Approved drivers currently online
    pub online_drivers: u64,
    /// Orders per status
    pub orders: BTreeMap<String, u64>,
}

impl PlatformStats {
    /// Restaurants in any status.
    #[must_use]
    pub fn total_restaurants(&self) -> u64 {
        self.restaurants.values().sum()
    }

    /// Orders in any status.
    #[must_use]
    pub fn total_orders(&self) -> u64 {
        self.orders.values().sum()
    }
}

/// Revenue folded from delivered orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevenueStats {
    /// Delivered orders counted
    pub delivered_orders: u64,
    /// Sum of order totals, delivery fees included, saturating at `i64::MAX`
    pub gross_cents: i64,
    /// Sum of delivery fees
    pub delivery_fees_cents: i64,
    /// Mean order total; zero without orders
    pub average_order_cents: i64,
    /// Gross per restaurant
    pub by_restaurant: BTreeMap<String, i64>,
    /// More delivered orders matched than the analytics window holds
    pub truncated: bool,
}

impl RevenueStats {
    fn fold(orders: &[Order], truncated: bool) -> Self {
        let mut stats = Self {
            truncated,
            ..Self::default()
        };
        for order in orders {
            stats.delivered_orders += 1;
            stats.gross_cents = stats.gross_cents.saturating_add(order.total_cents);
            stats.delivery_fees_cents = stats
                .delivery_fees_cents
                .saturating_add(order.delivery_fee_cents);
            let gross = stats
                .by_restaurant
                .entry(order.restaurant_id.to_string())
                .or_default();
            *gross = gross.saturating_add(order.total_cents);
        }
        if let Ok(count) = i64::try_from(stats.delivered_orders) {
            if count > 0 {
                stats.average_order_cents = stats.gross_cents / count;
            }
        }
        stats
    }
}

impl DataAccess {
    /// Count restaurants, users, drivers and orders by status.
    pub async fn platform_stats(&self, caller: &Caller) -> Result<PlatformStats> {
        let store = self.store();
        let mut stats = PlatformStats::default();

        for status in [
            RestaurantStatus::Pending,
            RestaurantStatus::Approved,
            RestaurantStatus::Suspended,
            RestaurantStatus::Deleted,
        ] {
            let query = Query::new(Collection::Restaurants).where_eq("status", status.as_str());
            stats
                .restaurants
                .insert(status.to_string(), store.count(caller, &query).await?);
        }

        for role in [Role::Customer, Role::RestaurantOwner, Role::Driver, Role::SuperAdmin] {
            let query = Query::new(Collection::Users)
                .where_eq("role", role.as_str())
                .where_eq("status", AccountStatus::Active.as_str());
            stats
                .users
                .insert(role.to_string(), store.count(caller, &query).await?);
        }
        let suspended =
            Query::new(Collection::Users).where_eq("status", AccountStatus::Suspended.as_str());
        stats.suspended_users = store.count(caller, &suspended).await?;

        for approval in [
            DriverApproval::Pending,
            DriverApproval::Approved,
            DriverApproval::Rejected,
            DriverApproval::Suspended,
        ] {
            let query =
                Query::new(Collection::Drivers).where_eq("approval_status", approval.as_str());
            stats
                .drivers
                .insert(approval.to_string(), store.count(caller, &query).await?);
        }
        let online = Query::new(Collection::Drivers)
            .where_eq("online", true)
            .where_eq("approval_status", DriverApproval::Approved.as_str());
        stats.online_drivers = store.count(caller, &online).await?;

        for status in [
            OrderStatus::Placed,
            OrderStatus::Accepted,
            OrderStatus::Preparing,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let query = Query::new(Collection::Orders).where_eq("status", status.as_str());
            stats
                .orders
                .insert(status.to_string(), store.count(caller, &query).await?);
        }

        debug!(
            restaurants = stats.total_restaurants(),
            orders = stats.total_orders(),
            "platform stats computed"
        );
        Ok(stats)
    }

    /// Revenue over the platform's most recent delivered orders.
    pub async fn revenue_stats(&self, caller: &Caller, window: TimeWindow) -> Result<RevenueStats> {
        let query = Query::new(Collection::Orders).where_eq("status", OrderStatus::Delivered.as_str());
        self.fold_revenue(caller, window.apply(query)).await
    }

    /// Revenue of one restaurant over its most recent delivered orders.
    pub async fn restaurant_revenue_stats(
        &self,
        caller: &Caller,
        restaurant_id: &RestaurantId,
        window: TimeWindow,
    ) -> Result<RevenueStats> {
        self.check_order_scope(caller, Some(restaurant_id), None).await?;
        let query = Query::new(Collection::Orders)
            .where_eq("restaurant_id", restaurant_id.as_str())
            .where_eq("status", OrderStatus::Delivered.as_str());
        self.fold_revenue(caller, window.apply(query)).await
    }

    async fn fold_revenue(&self, caller: &Caller, query: Query) -> Result<RevenueStats> {
        let query = query.limit(self.query_config().analytics_window.max(1));
        let page = self.store().query(caller, &query).await?;
        let orders: Vec<Order> = page.decode()?;

        let stats = RevenueStats::fold(&orders, page.next_cursor.is_some());
        debug!(
            orders = stats.delivered_orders,
            gross = stats.gross_cents,
            truncated = stats.truncated,
            "revenue folded"
        );
        Ok(stats)
    }
}
