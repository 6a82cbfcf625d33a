//! Dishpatch Core - shared foundation for the Dishpatch data access layer.
//!
//! This crate provides the collection schema, identifier newtypes, the
//! explicit actor context, document models, the subscription plan catalog,
//! configuration, and tracing setup that the store, audit, and service
//! crates build on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Identifier newtypes, `Role`, `Actor`, `Collection`
//! - [`models`] - Document shapes for every collection
//! - [`plans`] - Subscription plan catalog
//! - [`logging`] - Tracing subscriber initialisation
//!
//! # Example
//!
//! ```rust
//! use dishpatch_core::{plans, Actor, AppConfig, Feature, PlanId, Role};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.query.default_page_size, 20);
//!
//! let admin = Actor::new("uid-1", Some("ops@example.com".to_string()), Role::SuperAdmin);
//! assert!(admin.has_role(Role::SuperAdmin));
//!
//! assert!(plans::plan(PlanId::Growth).includes(Feature::Analytics));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod plans;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, AuditConfig, LoggingConfig, QueryConfig, StoreConfig};
pub use error::{ConfigError, ConfigResult, DishpatchError, Result};
pub use plans::{Feature, PlanId, SubscriptionPlan};
pub use types::{
    Actor, CartItemId, Collection, DriverId, MenuItemId, OrderId, RestaurantId, Role, UserId,
};
