//! Recording and reading the audit trail.

use crate::action::AuditAction;
use chrono::{DateTime, Utc};
use dishpatch_core::{Actor, AuditConfig, Collection};
use dishpatch_store::{
    Caller, Cursor, Document, DocumentStore, FieldPath, Direction, Query, Result, StoreError,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A stored audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Document ID
    pub id: String,
    /// What was done, with its details
    pub action: AuditAction,
    /// Who did it
    pub actor_id: String,
    /// Actor's email at the time, if known
    pub actor_email: Option<String>,
    /// Server time of the write
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    fn from_document(doc: &Document) -> Result<Self> {
        #[derive(Deserialize)]
        struct Stored {
            action: String,
            #[serde(default)]
            details: Value,
            actor_id: String,
            #[serde(default)]
            actor_email: Option<String>,
        }

        let stored: Stored = serde_json::from_value(Value::Object(doc.data.clone()))?;
        let action = serde_json::from_value(json!({
            "action": stored.action,
            "details": stored.details,
        }))?;

        Ok(Self {
            id: doc.id.clone(),
            action,
            actor_id: stored.actor_id,
            actor_email: stored.actor_email,
            timestamp: doc.create_time,
        })
    }
}

/// What happened to a [`AuditRecorder::record`] call.
///
/// Informational only; callers are never expected to act on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    /// Entry written with this ID
    Recorded(String),
    /// Nothing written: no actor, or auditing is disabled
    Skipped,
    /// The write failed and was logged
    Failed(String),
}

/// One page of the audit trail, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditPage {
    /// Entries, newest first
    pub entries: Vec<AuditEntry>,
    /// Cursor for older entries; `None` at the end of the trail
    pub next_cursor: Option<Cursor>,
}

/// Appends audit entries to the `auditLogs` collection.
///
/// Recording is best-effort: a failed write is logged and swallowed so it
/// can never fail or undo the action it describes.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn DocumentStore>,
    config: AuditConfig,
}

impl fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditRecorder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AuditRecorder {
    /// Create a recorder writing to `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, config: AuditConfig) -> Self {
        Self { store, config }
    }

    /// Whether entries are being written.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Record `action` as performed by `actor`.
    ///
    /// Without an actor nothing is written. Errors are logged, never returned.
    pub async fn record(&self, actor: Option<&Actor>, action: AuditAction) -> AuditOutcome {
        let Some(actor) = actor else {
            debug!(action = action.name(), "no actor, audit entry skipped");
            return AuditOutcome::Skipped;
        };
        if !self.config.enabled {
            return AuditOutcome::Skipped;
        }

        let data = match entry_body(actor, &action) {
            Ok(data) => data,
            Err(e) => {
                warn!(action = action.name(), "failed to encode audit entry: {}", e);
                return AuditOutcome::Failed(e.to_string());
            }
        };

        let caller = Caller::Authenticated(actor.clone());
        match self.store.add(&caller, Collection::AuditLogs, data).await {
            Ok(doc) => {
                info!(
                    action = action.name(),
                    target = action.target_id(),
                    actor = %actor.uid,
                    "audit entry recorded"
                );
                AuditOutcome::Recorded(doc.id)
            }
            Err(e) => {
                warn!(
                    action = action.name(),
                    target = action.target_id(),
                    actor = %actor.uid,
                    "failed to record audit entry: {}",
                    e
                );
                AuditOutcome::Failed(e.to_string())
            }
        }
    }

    /// Read up to `max_rows` entries, newest first, continuing after `cursor`.
    ///
    /// `max_rows` is clamped to `[1, max_read_rows]`.
    ///
    /// # Errors
    /// Returns the store's error, e.g. `PermissionDenied` for non-admins.
    pub async fn recent(
        &self,
        caller: &Caller,
        max_rows: u32,
        cursor: Option<Cursor>,
    ) -> Result<AuditPage> {
        let limit = max_rows.clamp(1, self.config.max_read_rows.max(1));
        let query = Query::new(Collection::AuditLogs)
            .order_by(FieldPath::CreateTime, Direction::Descending)
            .limit(limit)
            .start_after(cursor);

        let page = self.store.query(caller, &query).await?;
        let entries = page
            .documents
            .iter()
            .map(AuditEntry::from_document)
            .collect::<Result<Vec<_>>>()?;

        debug!(returned = entries.len(), "audit entries read");
        Ok(AuditPage {
            entries,
            next_cursor: page.next_cursor,
        })
    }
}

fn entry_body(actor: &Actor, action: &AuditAction) -> Result<Map<String, Value>> {
    let mut data = match serde_json::to_value(action)? {
        Value::Object(map) => map,
        other => {
            return Err(StoreError::Internal(format!(
                "audit action did not serialize to an object: {other}"
            )))
        }
    };
    data.insert("actor_id".to_string(), Value::String(actor.uid.clone()));
    data.insert(
        "actor_email".to_string(),
        actor.email.clone().map_or(Value::Null, Value::String),
    );
    data.insert(
        "target_id".to_string(),
        Value::String(action.target_id().to_string()),
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dishpatch_core::{RestaurantId, Role, UserId};
    use dishpatch_store::{
        AccessRules, Page, Precondition, SqliteDocumentStore, Subscription,
    };

    async fn setup_recorder(config: AuditConfig) -> (AuditRecorder, Arc<dyn DocumentStore>) {
        let store: Arc<dyn DocumentStore> = Arc::new(
            SqliteDocumentStore::in_memory(AccessRules::platform())
                .await
                .expect("create store"),
        );
        (AuditRecorder::new(store.clone(), config), store)
    }

    fn admin() -> Actor {
        Actor::new("admin-1", Some("ops@example.com".to_string()), Role::SuperAdmin)
    }

    fn approve(id: &str) -> AuditAction {
        AuditAction::ApproveRestaurant {
            restaurant_id: RestaurantId::new(id).expect("valid id"),
        }
    }

    #[tokio::test]
    async fn test_record_and_read_back() {
        let (recorder, _) = setup_recorder(AuditConfig::default()).await;
        let admin = admin();

        let outcome = recorder.record(Some(&admin), approve("R42")).await;
        assert!(matches!(outcome, AuditOutcome::Recorded(_)));

        let page = recorder
            .recent(&Caller::Authenticated(admin), 10, None)
            .await
            .expect("read audit log");
        assert_eq!(page.entries.len(), 1);

        let entry = &page.entries[0];
        assert_eq!(entry.action, approve("R42"));
        assert_eq!(entry.actor_id, "admin-1");
        assert_eq!(entry.actor_email.as_deref(), Some("ops@example.com"));
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_no_actor_is_skipped() {
        let (recorder, store) = setup_recorder(AuditConfig::default()).await;
        assert_eq!(recorder.record(None, approve("R1")).await, AuditOutcome::Skipped);

        let count = store
            .count(&Caller::System, &Query::new(Collection::AuditLogs))
            .await
            .expect("count");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_disabled_is_skipped() {
        let config = AuditConfig {
            enabled: false,
            ..AuditConfig::default()
        };
        let (recorder, _) = setup_recorder(config).await;
        assert!(!recorder.is_enabled());
        assert_eq!(
            recorder.record(Some(&admin()), approve("R1")).await,
            AuditOutcome::Skipped
        );
    }

    #[tokio::test]
    async fn test_recent_is_newest_first_and_paged() {
        let (recorder, _) = setup_recorder(AuditConfig::default()).await;
        let admin = admin();
        for i in 0..5 {
            recorder.record(Some(&admin), approve(&format!("R{i}"))).await;
        }

        let caller = Caller::Authenticated(admin);
        let first = recorder.recent(&caller, 3, None).await.expect("page 1");
        assert_eq!(first.entries.len(), 3);
        assert_eq!(first.entries[0].action, approve("R4"));
        assert!(first
            .entries
            .windows(2)
            .all(|w| w[0].timestamp >= w[1].timestamp));

        let second = recorder
            .recent(&caller, 3, first.next_cursor)
            .await
            .expect("page 2");
        assert_eq!(second.entries.len(), 2);
        assert_eq!(second.entries[1].action, approve("R0"));
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_recent_clamps_row_count() {
        let config = AuditConfig {
            max_read_rows: 2,
            ..AuditConfig::default()
        };
        let (recorder, _) = setup_recorder(config).await;
        let admin = admin();
        for i in 0..4 {
            recorder.record(Some(&admin), approve(&format!("R{i}"))).await;
        }

        let caller = Caller::Authenticated(admin);
        let page = recorder.recent(&caller, 50, None).await.expect("read");
        assert_eq!(page.entries.len(), 2);

        let page = recorder.recent(&caller, 0, None).await.expect("read");
        assert_eq!(page.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_non_admin_cannot_read() {
        let (recorder, _) = setup_recorder(AuditConfig::default()).await;
        let customer = Actor::new("u1", None, Role::Customer);
        let err = recorder
            .recent(&Caller::Authenticated(customer), 10, None)
            .await
            .expect_err("customers cannot read the audit log");
        assert!(matches!(err, StoreError::PermissionDenied(_)));
    }

    /// Store whose writes always fail.
    struct OfflineStore;

    #[async_trait]
    impl DocumentStore for OfflineStore {
        async fn get(&self, _: &Caller, _: Collection, _: &str) -> Result<Option<Document>> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
        async fn query(&self, _: &Caller, _: &Query) -> Result<Page> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
        async fn count(&self, _: &Caller, _: &Query) -> Result<u64> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
        async fn add(&self, _: &Caller, _: Collection, _: Map<String, Value>) -> Result<Document> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
        async fn create(
            &self,
            _: &Caller,
            _: Collection,
            _: &str,
            _: Map<String, Value>,
        ) -> Result<Document> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
        async fn update(
            &self,
            _: &Caller,
            _: Collection,
            _: &str,
            _: Map<String, Value>,
            _: Option<&Precondition>,
        ) -> Result<Document> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
        async fn delete(&self, _: &Caller, _: Collection, _: &str) -> Result<()> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
        async fn watch(&self, _: &Caller, _: Query) -> Result<Subscription> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let recorder = AuditRecorder::new(Arc::new(OfflineStore), AuditConfig::default());
        let outcome = recorder
            .record(
                Some(&admin()),
                AuditAction::SuspendUser {
                    user_id: UserId::new("u1").expect("valid id"),
                    reason: "fraud".to_string(),
                },
            )
            .await;
        assert!(matches!(outcome, AuditOutcome::Failed(msg) if msg.contains("offline")));
    }
}
