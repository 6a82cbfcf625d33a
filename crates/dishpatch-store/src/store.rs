//! The document store interface.

use crate::document::{Document, Precondition};
use crate::error::Result;
use crate::query::{Page, Query};
use crate::rules::Caller;
use crate::watch::Subscription;
use async_trait::async_trait;
use dishpatch_core::Collection;
use serde_json::{Map, Value};

/// A schemaless document store with access rules and live queries.
///
/// Every request carries the [`Caller`] it is made for; the store enforces
/// its access rules against it. Implementations must be thread-safe.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document. A missing document is `Ok(None)`, not an error.
    async fn get(&self, caller: &Caller, collection: Collection, id: &str)
        -> Result<Option<Document>>;

    /// Run a query. `next_cursor` is set only when more documents follow.
    async fn query(&self, caller: &Caller, query: &Query) -> Result<Page>;

    /// Count the documents matching the query's filters.
    ///
    /// Ordering, limit and cursor are ignored.
    async fn count(&self, caller: &Caller, query: &Query) -> Result<u64>;

    /// Create a document with a generated ID.
    async fn add(
        &self,
        caller: &Caller,
        collection: Collection,
        data: Map<String, Value>,
    ) -> Result<Document>;

    /// Create a document with the given ID.
    ///
    /// # Errors
    /// `StoreError::FailedPrecondition` if the document already exists.
    async fn create(
        &self,
        caller: &Caller,
        collection: Collection,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<Document>;

    /// Shallow-merge `patch` into an existing document.
    ///
    /// The precondition, if any, is evaluated against the current document
    /// in the same transaction as the write.
    ///
    /// # Errors
    /// `StoreError::NotFound` if the document does not exist,
    /// `StoreError::FailedPrecondition` if the precondition does not hold.
    async fn update(
        &self,
        caller: &Caller,
        collection: Collection,
        id: &str,
        patch: Map<String, Value>,
        precondition: Option<&Precondition>,
    ) -> Result<Document>;

    /// Delete a document. Deleting a missing document succeeds.
    async fn delete(&self, caller: &Caller, collection: Collection, id: &str) -> Result<()>;

    /// Subscribe to a query's result set.
    ///
    /// Access is checked once, when subscribing.
    async fn watch(&self, caller: &Caller, query: Query) -> Result<Subscription>;
}
