//! The data access handle shared by every domain module.

use dishpatch_audit::{AuditAction, AuditOutcome, AuditRecorder};
use dishpatch_core::{Actor, AppConfig, Collection, QueryConfig};
use dishpatch_store::{
    to_data, AccessRules, Caller, Cursor, DocumentStore, Query, Result, SqliteDocumentStore,
    StoreError,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Page size and continuation point of a list request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRequest {
    /// Requested page size; the configured default when `None`
    pub size: Option<u32>,
    /// Continue after this position; `None` for the first page
    pub cursor: Option<Cursor>,
}

impl PageRequest {
    /// First page at the default size.
    #[must_use]
    pub fn first() -> Self {
        Self::default()
    }

    /// First page of the given size.
    #[must_use]
    pub fn of_size(size: u32) -> Self {
        Self {
            size: Some(size),
            cursor: None,
        }
    }

    /// Continue after `cursor`, keeping the page size.
    #[must_use]
    pub fn after(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }
}

/// A page of decoded entities.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage<T> {
    /// Entities in query order
    pub items: Vec<T>,
    /// Cursor for the next page; `None` on the last page
    pub next_cursor: Option<Cursor>,
}

impl<T> ListPage<T> {
    /// Whether more entities follow this page.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// Entry point of the data access layer.
///
/// Holds the document store, the audit recorder and the list settings.
/// Every operation is an independent async method, grouped by collection
/// in the sibling modules. Cloning is cheap; clones share the store.
#[derive(Clone)]
pub struct DataAccess {
    store: Arc<dyn DocumentStore>,
    audit: AuditRecorder,
    config: QueryConfig,
}

impl fmt::Debug for DataAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataAccess")
            .field("audit", &self.audit)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DataAccess {
    /// Build the layer over an existing store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, config: &AppConfig) -> Self {
        let audit = AuditRecorder::new(store.clone(), config.audit.clone());
        Self {
            store,
            audit,
            config: config.query.clone(),
        }
    }

    /// Open the `SQLite` store described by `config` with the platform rules.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn open(config: &AppConfig) -> Result<Self> {
        let store = SqliteDocumentStore::open(config, AccessRules::platform()).await?;
        info!("data access layer ready");
        Ok(Self::new(Arc::new(store), config))
    }

    /// The underlying document store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// The audit recorder.
    #[must_use]
    pub fn audit(&self) -> &AuditRecorder {
        &self.audit
    }

    /// List and analytics settings.
    #[must_use]
    pub fn query_config(&self) -> &QueryConfig {
        &self.config
    }

    /// Clamp a requested page size to `[1, max_page_size]`.
    pub(crate) fn page_size(&self, page: &PageRequest) -> u32 {
        let max = self.config.max_page_size.max(1);
        page.size
            .unwrap_or(self.config.default_page_size)
            .clamp(1, max)
    }

    /// Run `query` as one page of `T`.
    pub(crate) async fn list<T: DeserializeOwned>(
        &self,
        caller: &Caller,
        query: Query,
        page: PageRequest,
    ) -> Result<ListPage<T>> {
        let query = query.limit(self.page_size(&page)).start_after(page.cursor);
        let page = self.store.query(caller, &query).await?;
        Ok(ListPage {
            items: page.decode()?,
            next_cursor: page.next_cursor,
        })
    }

    /// Run `query` without a page bound.
    pub(crate) async fn list_all<T: DeserializeOwned>(
        &self,
        caller: &Caller,
        query: &Query,
    ) -> Result<Vec<T>> {
        self.store.query(caller, query).await?.decode()
    }

    /// Read one entity; absence is `Ok(None)`.
    pub(crate) async fn fetch<T: DeserializeOwned>(
        &self,
        caller: &Caller,
        collection: Collection,
        id: &str,
    ) -> Result<Option<T>> {
        let doc = self.store.get(caller, collection, id).await?;
        debug!(%collection, id, found = doc.is_some(), "entity read");
        doc.map(|doc| doc.decode()).transpose()
    }

    /// Read one entity that must exist.
    pub(crate) async fn require<T: DeserializeOwned>(
        &self,
        caller: &Caller,
        collection: Collection,
        id: &str,
    ) -> Result<T> {
        self.fetch(caller, collection, id)
            .await?
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    /// Record an admin action; never fails.
    pub(crate) async fn record(&self, actor: &Actor, action: AuditAction) -> AuditOutcome {
        self.audit.record(Some(actor), action).await
    }
}

/// The caller an actor's requests are made as.
pub(crate) fn caller(actor: &Actor) -> Caller {
    Caller::Authenticated(actor.clone())
}

/// Turn a `json!` object into a document body.
pub(crate) fn body(value: Value) -> Result<Map<String, Value>> {
    to_data(&value)
}

/// Reject a blank required text field.
pub(crate) fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StoreError::InvalidArgument(format!("{field} cannot be empty")));
    }
    Ok(())
}
