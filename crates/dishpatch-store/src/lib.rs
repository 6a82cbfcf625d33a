//! Dishpatch Document Store
//!
//! A schemaless document database over `SQLite`: named collections of JSON
//! documents, server-assigned timestamps, access rules evaluated against an
//! explicit caller, cursor-paginated queries and live subscriptions.
//!
//! # Architecture
//!
//! - **Storage**: one `documents` table keyed by `(collection, id)`, created
//!   by embedded `SQLx` migrations
//! - **Queries**: filters compile to `json_extract` expressions with bound
//!   parameters; the document ID breaks ordering ties so cursors are stable
//! - **Access rules**: every request is checked against [`AccessRules`];
//!   audit logs have no update or delete rule, so they are append-only
//! - **Subscriptions**: [`Subscription`] is a cancellable stream of snapshots
//!   driven by a broadcast feed of committed writes
//!
//! # Example
//!
//! ```rust,no_run
//! use dishpatch_store::{AccessRules, Caller, DocumentStore, Query, SqliteDocumentStore};
//! use dishpatch_core::Collection;
//!
//! # async fn example() -> dishpatch_store::Result<()> {
//! let store = SqliteDocumentStore::in_memory(AccessRules::platform()).await?;
//! let query = Query::new(Collection::Restaurants).where_eq("status", "approved").limit(20);
//! let page = store.query(&Caller::Anonymous, &query).await?;
//! println!("{} restaurants", page.documents.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod document;
pub mod error;
pub mod migrations;
pub mod query;
pub mod rules;
pub mod sqlite;
pub mod store;
pub mod watch;

// Re-export commonly used types
pub use connection::StorePool;
pub use document::{to_data, Document, Precondition, ServerClock};
pub use error::{ErrorKind, Result, StoreError};
pub use query::{Cursor, Direction, FieldPath, Filter, FilterOp, OrderBy, Page, Query};
pub use rules::{AccessRules, Allow, Caller, Operation, OwnerField, Resource};
pub use sqlite::SqliteDocumentStore;
pub use store::DocumentStore;
pub use watch::{CancelHandle, ChangeEvent, ChangeKind, QuerySnapshot, Subscription};
