//! Dishpatch Service - the data access layer of the ordering platform.
//!
//! [`DataAccess`] wraps a [`DocumentStore`](dishpatch_store::DocumentStore)
//! and an [`AuditRecorder`](dishpatch_audit::AuditRecorder) and exposes the
//! platform's operations, grouped by domain:
//!
//! - restaurants: listing, registration, moderation, plans and features
//! - users, drivers and orders
//! - menus and carts
//! - subscription plans, analytics and the audit trail
//!
//! Reads take a [`Caller`]; mutations take the signed-in
//! [`Actor`](dishpatch_core::Actor). Store errors pass through unchanged.
//! Administrative mutations are audited after they succeed.
//!
//! The [`apps`] module binds an actor to the operations each client app
//! uses.
//!
//! # Example
//!
//! ```rust,no_run
//! use dishpatch_core::{Actor, AppConfig, Role};
//! use dishpatch_service::{DataAccess, NewRestaurant, PageRequest};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let access = DataAccess::open(&AppConfig::load()?).await?;
//!
//! let owner = Actor::new("owner-1", None, Role::RestaurantOwner);
//! let admin = Actor::new("admin-1", None, Role::SuperAdmin);
//!
//! let restaurant = access
//!     .register_restaurant(&owner, NewRestaurant::named("Blue Fig"))
//!     .await?;
//! access.approve_restaurant(&admin, &restaurant.id).await?;
//!
//! let listed = access
//!     .get_active_restaurants(&dishpatch_service::Caller::Anonymous, PageRequest::first())
//!     .await?;
//! assert_eq!(listed.items.len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod access;
pub mod analytics;
pub mod apps;
pub mod audit;
pub mod cart;
pub mod drivers;
pub mod menu;
pub mod orders;
pub mod restaurants;
pub mod subscriptions;
pub mod users;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use access::{DataAccess, ListPage, PageRequest};
pub use analytics::{PlatformStats, RevenueStats, TimeWindow};
pub use apps::{CustomerApp, DeliveryApp, RestaurantAdmin, SuperAdminConsole};
pub use drivers::{DriverFilter, NewDriver};
pub use menu::{MenuItemUpdate, NewMenuItem};
pub use orders::{LineRequest, NewOrder, OrderFilter};
pub use restaurants::{NewRestaurant, RestaurantFilter, RestaurantProfileUpdate};
pub use users::{NewUserProfile, UserFilter, UserProfileUpdate};

pub use dishpatch_store::{Caller, Cursor, Result, StoreError, Subscription};
