//! `SQLite`-backed document store.

use crate::connection::{StorePool, IN_MEMORY};
use crate::document::{
    check_body, format_timestamp, parse_timestamp, Document, Precondition, ServerClock,
};
use crate::error::{Result, StoreError};
use crate::migrations::run_migrations;
use crate::query::{Cursor, Page, Query};
use crate::rules::{AccessRules, Caller, Operation, Resource};
use crate::store::DocumentStore;
use crate::watch::{subscribe, ChangeEvent, ChangeKind, Subscription};
use async_trait::async_trait;
use dishpatch_core::{AppConfig, Collection};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite, SqliteConnection};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Document store over a single `documents` table.
///
/// Cloning is cheap; clones share the pool, the rules, the clock and the
/// change feed.
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    pool: Pool<Sqlite>,
    rules: Arc<AccessRules>,
    changes: broadcast::Sender<ChangeEvent>,
    clock: Arc<ServerClock>,
}

impl SqliteDocumentStore {
    /// Wrap a migrated pool.
    #[must_use]
    pub fn new(pool: StorePool, rules: AccessRules, change_buffer: usize) -> Self {
        let (changes, _) = broadcast::channel(change_buffer.max(1));
        Self {
            pool: pool.pool().clone(),
            rules: Arc::new(rules),
            changes,
            clock: Arc::new(ServerClock::default()),
        }
    }

    /// Open the configured database, run migrations, and enforce `rules`.
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the database cannot be opened,
    /// `StoreError::Migration` if the schema cannot be brought up to date.
    pub async fn open(config: &AppConfig, rules: AccessRules) -> Result<Self> {
        let path = config
            .database_path()
            .map_err(|e| StoreError::Unavailable(format!("no database location: {e}")))?;

        if path.to_str() != Some(IN_MEMORY) {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StoreError::Unavailable(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        let pool = StorePool::open(&path, config.store.max_connections).await?;
        run_migrations(pool.pool()).await?;

        let store = Self::new(pool, rules, config.store.change_buffer);
        store.resume_clock().await?;

        info!(path = %path.display(), "Document store ready");
        Ok(store)
    }

    /// A fresh in-memory store.
    ///
    /// # Errors
    /// Returns `StoreError` if the database cannot be created.
    pub async fn in_memory(rules: AccessRules) -> Result<Self> {
        let pool = StorePool::open(IN_MEMORY, 1).await?;
        run_migrations(pool.pool()).await?;
        Ok(Self::new(pool, rules, 256))
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// The rules this store enforces.
    #[must_use]
    pub fn rules(&self) -> &AccessRules {
        &self.rules
    }

    /// Close the pool. Open subscriptions end on their next re-query.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // Keep server time moving forward across restarts.
    async fn resume_clock(&self) -> Result<()> {
        let latest: Option<String> = sqlx::query_scalar("SELECT MAX(update_time) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        if let Some(latest) = latest {
            self.clock.observe(parse_timestamp(&latest)?);
        }
        Ok(())
    }

    fn notify(&self, collection: Collection, id: &str, kind: ChangeKind) {
        // No receivers is fine.
        let _ = self.changes.send(ChangeEvent {
            collection,
            id: id.to_string(),
            kind,
        });
    }

    async fn fetch(
        pool: &Pool<Sqlite>,
        query: &Query,
        fetch: Option<i64>,
    ) -> Result<Vec<Document>> {
        let rows = query.select_sql(fetch).build().fetch_all(pool).await?;
        rows.iter().map(document_from_row).collect()
    }

    async fn insert(
        &self,
        caller: &Caller,
        collection: Collection,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<Document> {
        check_body(&data)?;
        self.rules.check(
            caller,
            collection,
            Operation::Create,
            &Resource::New { id, data: &data },
        )?;

        let now = self.clock.now();
        let stamp = format_timestamp(now);
        let body = serde_json::to_string(&data)?;

        sqlx::query(
            "INSERT INTO documents (collection, id, data, create_time, update_time)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(&body)
        .bind(&stamp)
        .bind(&stamp)
        .execute(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::FailedPrecondition(_) => {
                StoreError::FailedPrecondition(format!("{collection}/{id} already exists"))
            }
            other => other,
        })?;

        info!(%collection, id, "document created");
        self.notify(collection, id, ChangeKind::Added);

        Ok(Document {
            collection,
            id: id.to_string(),
            data,
            create_time: now,
            update_time: now,
        })
    }
}

async fn load(
    conn: &mut SqliteConnection,
    collection: Collection,
    id: &str,
) -> Result<Option<Document>> {
    let row = sqlx::query(
        "SELECT collection, id, data, create_time, update_time
         FROM documents WHERE collection = ? AND id = ?",
    )
    .bind(collection.as_str())
    .bind(id)
    .fetch_optional(conn)
    .await?;

    row.as_ref().map(document_from_row).transpose()
}

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    let collection: String = row.try_get("collection")?;
    let collection = Collection::parse(&collection)
        .ok_or_else(|| StoreError::Internal(format!("unknown collection '{collection}'")))?;

    let raw: String = row.try_get("data")?;
    let data = match serde_json::from_str::<Value>(&raw)? {
        Value::Object(map) => map,
        other => {
            return Err(StoreError::Internal(format!(
                "document body is not an object: {other}"
            )))
        }
    };

    let create_time: String = row.try_get("create_time")?;
    let update_time: String = row.try_get("update_time")?;

    Ok(Document {
        collection,
        id: row.try_get("id")?,
        data,
        create_time: parse_timestamp(&create_time)?,
        update_time: parse_timestamp(&update_time)?,
    })
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(
        &self,
        caller: &Caller,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>> {
        let mut conn = self.pool.acquire().await?;
        let doc = load(&mut *conn, collection, id).await?;

        self.rules.check(
            caller,
            collection,
            Operation::Get,
            &Resource::Existing {
                id,
                data: doc.as_ref().map(|d| &d.data),
            },
        )?;

        debug!(%collection, id, found = doc.is_some(), "document read");
        Ok(doc)
    }

    async fn query(&self, caller: &Caller, query: &Query) -> Result<Page> {
        query.validate()?;
        self.rules
            .check(caller, query.collection, Operation::List, &Resource::Query(query))?;

        let fetch = query.limit.map(|limit| i64::from(limit) + 1);
        let mut documents = Self::fetch(&self.pool, query, fetch).await?;

        let has_more = query
            .limit
            .is_some_and(|limit| documents.len() > limit as usize);
        if let Some(limit) = query.limit {
            documents.truncate(limit as usize);
        }

        let next_cursor = if has_more {
            documents
                .last()
                .map(|doc| Cursor::after(doc, &query.order_by))
        } else {
            None
        };

        debug!(
            collection = %query.collection,
            returned = documents.len(),
            has_more,
            "query executed"
        );
        Ok(Page {
            documents,
            next_cursor,
        })
    }

    async fn count(&self, caller: &Caller, query: &Query) -> Result<u64> {
        query.validate()?;
        self.rules
            .check(caller, query.collection, Operation::List, &Resource::Query(query))?;

        let count: i64 = query
            .count_sql()
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn add(
        &self,
        caller: &Caller,
        collection: Collection,
        data: Map<String, Value>,
    ) -> Result<Document> {
        let id = uuid::Uuid::new_v4().to_string();
        self.insert(caller, collection, &id, data).await
    }

    async fn create(
        &self,
        caller: &Caller,
        collection: Collection,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<Document> {
        dishpatch_core::types::validate_document_id("document", id)?;
        self.insert(caller, collection, id, data).await
    }

    async fn update(
        &self,
        caller: &Caller,
        collection: Collection,
        id: &str,
        patch: Map<String, Value>,
        precondition: Option<&Precondition>,
    ) -> Result<Document> {
        check_body(&patch)?;

        let mut tx = self.pool.begin().await?;
        let Some(existing) = load(&mut *tx, collection, id).await? else {
            self.rules.check(
                caller,
                collection,
                Operation::Update,
                &Resource::Existing { id, data: None },
            )?;
            return Err(StoreError::not_found(collection, id));
        };

        self.rules.check(
            caller,
            collection,
            Operation::Update,
            &Resource::Update {
                id,
                existing: &existing.data,
                patch: &patch,
            },
        )?;

        if let Some(precondition) = precondition {
            precondition.check(collection, id, &existing.data)?;
        }

        let mut data = existing.data;
        data.extend(patch);

        let now = self.clock.now();
        sqlx::query(
            "UPDATE documents SET data = ?, update_time = ?
             WHERE collection = ? AND id = ?",
        )
        .bind(serde_json::to_string(&data)?)
        .bind(format_timestamp(now))
        .bind(collection.as_str())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(%collection, id, "document updated");
        self.notify(collection, id, ChangeKind::Modified);

        Ok(Document {
            collection,
            id: id.to_string(),
            data,
            create_time: existing.create_time,
            update_time: now,
        })
    }

    async fn delete(&self, caller: &Caller, collection: Collection, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let existing = load(&mut *tx, collection, id).await?;

        self.rules.check(
            caller,
            collection,
            Operation::Delete,
            &Resource::Existing {
                id,
                data: existing.as_ref().map(|d| &d.data),
            },
        )?;

        if existing.is_none() {
            return Ok(());
        }

        sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(%collection, id, "document deleted");
        self.notify(collection, id, ChangeKind::Removed);
        Ok(())
    }

    async fn watch(&self, caller: &Caller, query: Query) -> Result<Subscription> {
        query.validate()?;
        self.rules
            .check(caller, query.collection, Operation::List, &Resource::Query(&query))?;

        let receiver = self.changes.subscribe();
        let pool = self.pool.clone();
        let fetch_rows = query.limit.map(i64::from);

        debug!(collection = %query.collection, "subscription opened");
        Ok(subscribe(query, receiver, move |query: Query| {
            let pool = pool.clone();
            async move { Self::fetch(&pool, &query, fetch_rows).await }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Direction, FieldPath, FilterOp};
    use dishpatch_core::{Actor, Role};
    use futures::StreamExt;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    async fn setup_test_store() -> SqliteDocumentStore {
        SqliteDocumentStore::in_memory(AccessRules::platform())
            .await
            .expect("create in-memory store")
    }

    fn admin() -> Caller {
        Caller::Authenticated(Actor::new("admin-1", None, Role::SuperAdmin))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = setup_test_store().await;

        let created = store
            .create(&Caller::System, Collection::Restaurants, "R42", object(json!({ "name": "Blue Fig", "status": "pending" })))
            .await
            .expect("create restaurant");
        assert_eq!(created.create_time, created.update_time);

        let doc = store
            .get(&Caller::Anonymous, Collection::Restaurants, "R42")
            .await
            .expect("get restaurant")
            .expect("restaurant exists");
        assert_eq!(doc.str_field("name"), Some("Blue Fig"));
        assert_eq!(doc.create_time, created.create_time);

        let missing = store
            .get(&Caller::Anonymous, Collection::Restaurants, "nope")
            .await
            .expect("get missing");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let store = setup_test_store().await;
        let body = object(json!({ "name": "A" }));

        store
            .create(&Caller::System, Collection::MenuItems, "m1", body.clone())
            .await
            .expect("first create");
        let err = store
            .create(&Caller::System, Collection::MenuItems, "m1", body)
            .await
            .expect_err("duplicate id");
        assert!(matches!(err, StoreError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn test_reserved_fields_rejected() {
        let store = setup_test_store().await;
        let err = store
            .add(&Caller::System, Collection::Orders, object(json!({ "created_at": "x" })))
            .await
            .expect_err("created_at is reserved");
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_update_merges_and_checks_precondition() {
        let store = setup_test_store().await;
        let created = store
            .create(&Caller::System, Collection::Restaurants, "R1", object(json!({ "name": "A", "status": "pending" })))
            .await
            .expect("create");

        let pending = Precondition::field_eq("status", "pending");
        let updated = store
            .update(&admin(), Collection::Restaurants, "R1", object(json!({ "status": "approved" })), Some(&pending))
            .await
            .expect("approve");
        assert_eq!(updated.str_field("name"), Some("A"));
        assert_eq!(updated.str_field("status"), Some("approved"));
        assert!(updated.update_time > created.update_time);

        let err = store
            .update(&admin(), Collection::Restaurants, "R1", object(json!({ "status": "approved" })), Some(&pending))
            .await
            .expect_err("already approved");
        assert!(matches!(err, StoreError::FailedPrecondition(_)));

        let err = store
            .update(&admin(), Collection::Restaurants, "R404", object(json!({ "status": "approved" })), None)
            .await
            .expect_err("missing");
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = setup_test_store().await;
        store
            .create(&Caller::System, Collection::MenuItems, "m1", object(json!({ "name": "Soup" })))
            .await
            .expect("create");

        let owner = Caller::Authenticated(Actor::new("o1", None, Role::RestaurantOwner));
        store.delete(&owner, Collection::MenuItems, "m1").await.expect("delete");
        store.delete(&owner, Collection::MenuItems, "m1").await.expect("delete again");
        assert!(store
            .get(&owner, Collection::MenuItems, "m1")
            .await
            .expect("get")
            .is_none());
    }

    #[tokio::test]
    async fn test_audit_logs_reject_mutation() {
        let store = setup_test_store().await;
        let entry = store
            .add(&admin(), Collection::AuditLogs, object(json!({ "actor_id": "admin-1", "action": "approve_restaurant" })))
            .await
            .expect("append entry");

        let err = store
            .update(&admin(), Collection::AuditLogs, &entry.id, object(json!({ "action": "x" })), None)
            .await
            .expect_err("audit log is append-only");
        assert!(matches!(err, StoreError::PermissionDenied(_)));

        let err = store
            .delete(&admin(), Collection::AuditLogs, &entry.id)
            .await
            .expect_err("audit log is append-only");
        assert!(matches!(err, StoreError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_pagination_never_repeats() {
        let store = setup_test_store().await;
        for i in 0..7 {
            store
                .add(&Caller::System, Collection::MenuItems, object(json!({ "name": format!("item {i}"), "price_cents": i * 100 })))
                .await
                .expect("add item");
        }

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let query = Query::new(Collection::MenuItems).limit(3).start_after(cursor);
            let page = store.query(&Caller::Anonymous, &query).await.expect("query page");
            seen.extend(page.documents.iter().map(|d| d.id.clone()));

            // A write between pages must not shift the next page.
            store
                .add(&Caller::System, Collection::MenuItems, object(json!({ "name": "late" })))
                .await
                .expect("concurrent add");

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), seen.len());
        assert_eq!(seen.len(), 7);
    }

    #[tokio::test]
    async fn test_next_cursor_only_when_more() {
        let store = setup_test_store().await;
        for i in 0..3 {
            store
                .add(&Caller::System, Collection::MenuItems, object(json!({ "name": format!("item {i}") })))
                .await
                .expect("add item");
        }

        let exact = Query::new(Collection::MenuItems).limit(3);
        let page = store.query(&Caller::Anonymous, &exact).await.expect("query");
        assert_eq!(page.documents.len(), 3);
        assert!(page.next_cursor.is_none());

        let smaller = Query::new(Collection::MenuItems).limit(2);
        let page = store.query(&Caller::Anonymous, &smaller).await.expect("query");
        assert!(page.next_cursor.is_some());
    }

    #[tokio::test]
    async fn test_filters_and_order() {
        let store = setup_test_store().await;
        for (name, price, available) in [("Soup", 500, true), ("Salad", 700, false), ("Stew", 900, true)] {
            store
                .add(&Caller::System, Collection::MenuItems, object(json!({ "name": name, "price_cents": price, "available": available })))
                .await
                .expect("add item");
        }

        let query = Query::new(Collection::MenuItems)
            .where_eq("available", true)
            .order_by(FieldPath::field("price_cents"), Direction::Ascending);
        let page = store.query(&Caller::Anonymous, &query).await.expect("query");
        let names: Vec<_> = page.documents.iter().filter_map(|d| d.str_field("name")).collect();
        assert_eq!(names, vec!["Soup", "Stew"]);

        let cheap = Query::new(Collection::MenuItems).filter(FieldPath::field("price_cents"), FilterOp::Lt, 800);
        assert_eq!(store.count(&Caller::Anonymous, &cheap).await.expect("count"), 2);

        let either = Query::new(Collection::MenuItems).where_in("name", ["Soup", "Salad"]);
        assert_eq!(store.count(&Caller::Anonymous, &either).await.expect("count"), 2);
    }

    #[tokio::test]
    async fn test_permission_denied_on_query() {
        let store = setup_test_store().await;
        let customer = Caller::Authenticated(Actor::new("u1", None, Role::Customer));
        let err = store
            .query(&customer, &Query::new(Collection::Users))
            .await
            .expect_err("customers cannot list users");
        assert!(matches!(err, StoreError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_watch_sees_writes() {
        let store = setup_test_store().await;
        let mut sub = store
            .watch(&Caller::Anonymous, Query::new(Collection::MenuItems))
            .await
            .expect("watch");

        let first = sub.next().await.expect("initial").expect("snapshot");
        assert!(first.documents.is_empty());

        store
            .add(&Caller::System, Collection::MenuItems, object(json!({ "name": "Soup" })))
            .await
            .expect("add item");

        let second = sub.next().await.expect("update").expect("snapshot");
        assert_eq!(second.documents.len(), 1);

        sub.cancel();
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_open_file_store_resumes_clock() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut config = AppConfig::default();
        config.store.database_path = Some(dir.path().join("nested").join("store.db"));

        let first = SqliteDocumentStore::open(&config, AccessRules::allow_all())
            .await
            .expect("open store");
        let doc = first
            .add(&Caller::System, Collection::Orders, object(json!({ "status": "placed" })))
            .await
            .expect("add order");
        first.close().await;

        let second = SqliteDocumentStore::open(&config, AccessRules::allow_all())
            .await
            .expect("reopen store");
        let later = second
            .add(&Caller::System, Collection::Orders, object(json!({ "status": "placed" })))
            .await
            .expect("add order");
        assert!(later.create_time > doc.create_time);
    }
}
