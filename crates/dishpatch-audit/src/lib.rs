//! Dishpatch Audit - append-only trail of administrative actions.
//!
//! Every privileged mutation (approving a restaurant, suspending a user,
//! cancelling an order on a customer's behalf) is described by a typed
//! [`AuditAction`] and appended to the `auditLogs` collection together with
//! the acting user's identity and the store's server time.
//!
//! Recording is best-effort: [`AuditRecorder::record`] never returns an
//! error, so a failed audit write cannot abort the action it describes.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dishpatch_audit::{AuditAction, AuditRecorder};
//! use dishpatch_core::{Actor, AuditConfig, RestaurantId, Role};
//! use dishpatch_store::{AccessRules, SqliteDocumentStore};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteDocumentStore::in_memory(AccessRules::platform()).await?;
//! let recorder = AuditRecorder::new(Arc::new(store), AuditConfig::default());
//!
//! let admin = Actor::new("admin-1", None, Role::SuperAdmin);
//! let action = AuditAction::ApproveRestaurant {
//!     restaurant_id: RestaurantId::new("R42")?,
//! };
//! recorder.record(Some(&admin), action).await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod action;
mod audit;

pub use action::AuditAction;
pub use audit::{AuditEntry, AuditOutcome, AuditPage, AuditRecorder};
