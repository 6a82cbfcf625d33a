//! Integration tests for the data access layer
//!
//! Exercises the public API end to end: read-after-write, moderation and
//! its audit trail, pagination, visibility of suspended restaurants and
//! failure handling of the audit write.

use async_trait::async_trait;
use dishpatch_audit::AuditAction;
use dishpatch_core::models::{OrderStatus, RestaurantStatus};
use dishpatch_core::{Actor, AppConfig, Collection, DriverId, RestaurantId, Role, StoreConfig};
use dishpatch_service::{
    Caller, DataAccess, LineRequest, NewDriver, NewMenuItem, NewOrder, NewRestaurant, PageRequest,
    RestaurantFilter, StoreError,
};
use dishpatch_store::{
    to_data, AccessRules, Document, DocumentStore, Page, Precondition, Query,
    SqliteDocumentStore, Subscription,
};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

fn admin() -> Actor {
    Actor::new("admin-1", Some("ops@example.com".to_string()), Role::SuperAdmin)
}

fn owner(uid: &str) -> Actor {
    Actor::new(uid, Some(format!("{uid}@example.com")), Role::RestaurantOwner)
}

/// Create a data access layer over a fresh in-memory store
async fn create_test_access() -> DataAccess {
    let store = SqliteDocumentStore::in_memory(AccessRules::platform())
        .await
        .expect("create test store");
    DataAccess::new(Arc::new(store), &AppConfig::default())
}

/// Store that refuses every audit log write.
struct FlakyAuditStore {
    inner: SqliteDocumentStore,
}

#[async_trait]
impl DocumentStore for FlakyAuditStore {
    async fn get(
        &self,
        caller: &Caller,
        collection: Collection,
        id: &str,
    ) -> dishpatch_store::Result<Option<Document>> {
        self.inner.get(caller, collection, id).await
    }

    async fn query(&self, caller: &Caller, query: &Query) -> dishpatch_store::Result<Page> {
        self.inner.query(caller, query).await
    }

    async fn count(&self, caller: &Caller, query: &Query) -> dishpatch_store::Result<u64> {
        self.inner.count(caller, query).await
    }

    async fn add(
        &self,
        caller: &Caller,
        collection: Collection,
        data: Map<String, Value>,
    ) -> dishpatch_store::Result<Document> {
        if collection == Collection::AuditLogs {
            return Err(StoreError::Unavailable("audit shard offline".to_string()));
        }
        self.inner.add(caller, collection, data).await
    }

    async fn create(
        &self,
        caller: &Caller,
        collection: Collection,
        id: &str,
        data: Map<String, Value>,
    ) -> dishpatch_store::Result<Document> {
        self.inner.create(caller, collection, id, data).await
    }

    async fn update(
        &self,
        caller: &Caller,
        collection: Collection,
        id: &str,
        patch: Map<String, Value>,
        precondition: Option<&Precondition>,
    ) -> dishpatch_store::Result<Document> {
        self.inner
            .update(caller, collection, id, patch, precondition)
            .await
    }

    async fn delete(
        &self,
        caller: &Caller,
        collection: Collection,
        id: &str,
    ) -> dishpatch_store::Result<()> {
        self.inner.delete(caller, collection, id).await
    }

    async fn watch(&self, caller: &Caller, query: Query) -> dishpatch_store::Result<Subscription> {
        self.inner.watch(caller, query).await
    }
}

#[tokio::test]
async fn test_read_after_write() {
    let access = create_test_access().await;
    let owner = owner("owner-1");

    let registered = access
        .register_restaurant(&owner, NewRestaurant::named("Blue Fig"))
        .await
        .expect("register");

    let read = access
        .get_restaurant(&Caller::Anonymous, &registered.id)
        .await
        .expect("read")
        .expect("restaurant exists");
    assert_eq!(read, registered);
    assert_eq!(read.status, RestaurantStatus::Pending);

    let approved = access
        .approve_restaurant(&admin(), &registered.id)
        .await
        .expect("approve");
    let read = access
        .get_restaurant(&Caller::Anonymous, &registered.id)
        .await
        .expect("read")
        .expect("restaurant exists");
    assert_eq!(read.status, RestaurantStatus::Approved);
    assert_eq!(read, approved);
}

#[tokio::test]
async fn test_repeated_approval_is_rejected_and_audited_once() {
    let access = create_test_access().await;
    let admin = admin();

    let data = to_data(&json!({
        "name": "Harbour Grill",
        "owner_id": "owner-1",
        "status": "pending",
        "plan": "starter",
        "features": [],
    }))
    .expect("document body");
    access
        .store()
        .create(&Caller::System, Collection::Restaurants, "R42", data)
        .await
        .expect("seed R42");

    let r42 = RestaurantId::new("R42").expect("valid id");
    access
        .approve_restaurant(&admin, &r42)
        .await
        .expect("first approval");
    let err = access
        .approve_restaurant(&admin, &r42)
        .await
        .expect_err("second approval");
    assert!(matches!(err, StoreError::FailedPrecondition(_)));

    let page = access
        .store()
        .query(&Caller::Authenticated(admin.clone()), &Query::new(Collection::AuditLogs))
        .await
        .expect("read raw audit log");
    assert_eq!(page.documents.len(), 1);
    let stored = &page.documents[0].data;
    assert_eq!(stored["action"], "approve_restaurant");
    assert_eq!(stored["details"]["restaurant_id"], "R42");
    assert_eq!(stored["actor_id"], "admin-1");
}

#[tokio::test]
async fn test_audit_trail_is_append_only_and_newest_first() {
    let access = create_test_access().await;
    let admin = admin();
    let owner = owner("owner-1");

    let mut ids = Vec::new();
    for name in ["A", "B", "C", "D"] {
        let restaurant = access
            .register_restaurant(&owner, NewRestaurant::named(name))
            .await
            .expect("register");
        access
            .approve_restaurant(&admin, &restaurant.id)
            .await
            .expect("approve");
        ids.push(restaurant.id);
    }
    access
        .suspend_restaurant(&admin, &ids[0], "late deliveries")
        .await
        .expect("suspend");

    let page = access.get_audit_logs(&admin, 50, None).await.expect("audit logs");
    assert_eq!(page.entries.len(), 5);
    assert!(matches!(page.entries[0].action, AuditAction::SuspendRestaurant { .. }));
    assert!(page
        .entries
        .windows(2)
        .all(|pair| pair[0].timestamp >= pair[1].timestamp));

    // Audit entries cannot be edited or removed, even by a super admin.
    let entry_id = page.entries[0].id.clone();
    let mut patch = Map::new();
    patch.insert("actor_id".to_string(), json!("someone-else"));
    let err = access
        .store()
        .update(
            &Caller::Authenticated(admin.clone()),
            Collection::AuditLogs,
            &entry_id,
            patch,
            None,
        )
        .await
        .expect_err("audit entries are immutable");
    assert!(matches!(err, StoreError::PermissionDenied(_)));

    let err = access
        .store()
        .delete(&Caller::Authenticated(admin.clone()), Collection::AuditLogs, &entry_id)
        .await
        .expect_err("audit entries are permanent");
    assert!(matches!(err, StoreError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_failed_audit_write_does_not_fail_the_action() {
    let inner = SqliteDocumentStore::in_memory(AccessRules::platform())
        .await
        .expect("create test store");
    let access = DataAccess::new(Arc::new(FlakyAuditStore { inner }), &AppConfig::default());
    let admin = admin();

    let restaurant = access
        .register_restaurant(&owner("owner-1"), NewRestaurant::named("Blue Fig"))
        .await
        .expect("register");
    access
        .approve_restaurant(&admin, &restaurant.id)
        .await
        .expect("approve despite audit outage");
    let suspended = access
        .suspend_restaurant(&admin, &restaurant.id, "health inspection")
        .await
        .expect("suspend despite audit outage");
    assert_eq!(suspended.status, RestaurantStatus::Suspended);

    let page = access.get_audit_logs(&admin, 10, None).await.expect("audit logs");
    assert!(page.entries.is_empty());
}

#[tokio::test]
async fn test_pagination_is_stable_under_appends() {
    let access = create_test_access().await;
    let admin = admin();
    let owner = owner("owner-1");

    for i in 0..5 {
        let restaurant = access
            .register_restaurant(&owner, NewRestaurant::named(format!("Site {i}")))
            .await
            .expect("register");
        access
            .approve_restaurant(&admin, &restaurant.id)
            .await
            .expect("approve");
    }

    let first = access
        .get_active_restaurants(&Caller::Anonymous, PageRequest::of_size(2))
        .await
        .expect("page 1");
    assert_eq!(first.items.len(), 2);
    assert!(first.has_more());

    // Newer restaurants sort ahead of the cursor and must not leak into later pages.
    for i in 5..8 {
        let restaurant = access
            .register_restaurant(&owner, NewRestaurant::named(format!("Site {i}")))
            .await
            .expect("register");
        access
            .approve_restaurant(&admin, &restaurant.id)
            .await
            .expect("approve");
    }

    let mut seen: HashSet<String> = first.items.iter().map(|r| r.id.to_string()).collect();
    let mut cursor = first.next_cursor;
    while let Some(next) = cursor {
        let page = access
            .get_active_restaurants(&Caller::Anonymous, PageRequest::of_size(2).after(next))
            .await
            .expect("next page");
        for restaurant in &page.items {
            assert!(seen.insert(restaurant.id.to_string()), "duplicate {}", restaurant.id);
        }
        cursor = page.next_cursor;
    }
    assert_eq!(seen.len(), 5);
}

#[tokio::test]
async fn test_suspended_and_deleted_restaurants_need_an_explicit_filter() {
    let access = create_test_access().await;
    let admin = admin();
    let owner = owner("owner-1");

    let mut ids = Vec::new();
    for name in ["Open", "Paused", "Gone"] {
        let restaurant = access
            .register_restaurant(&owner, NewRestaurant::named(name))
            .await
            .expect("register");
        access
            .approve_restaurant(&admin, &restaurant.id)
            .await
            .expect("approve");
        ids.push(restaurant.id);
    }
    access
        .suspend_restaurant(&admin, &ids[1], "paperwork")
        .await
        .expect("suspend");
    access
        .delete_restaurant(&admin, &ids[2], Some("closed for good"))
        .await
        .expect("delete");

    let caller = Caller::Authenticated(admin.clone());
    let listed = access
        .get_restaurants(&caller, RestaurantFilter::default(), PageRequest::first())
        .await
        .expect("default listing");
    let names: Vec<_> = listed.items.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Open"]);

    for (status, name) in [
        (RestaurantStatus::Suspended, "Paused"),
        (RestaurantStatus::Deleted, "Gone"),
    ] {
        let listed = access
            .get_restaurants(&caller, RestaurantFilter::with_status(status), PageRequest::first())
            .await
            .expect("explicit status");
        assert_eq!(listed.items.len(), 1);
        assert_eq!(listed.items[0].name, name);
    }

    let err = access
        .reactivate_restaurant(&admin, &ids[2])
        .await
        .expect_err("deleted restaurants stay deleted");
    assert!(matches!(err, StoreError::FailedPrecondition(_)));
}

#[tokio::test]
async fn test_moderation_requires_super_admin() {
    let access = create_test_access().await;
    let owner = owner("owner-1");
    let restaurant = access
        .register_restaurant(&owner, NewRestaurant::named("Blue Fig"))
        .await
        .expect("register");

    let err = access
        .approve_restaurant(&owner, &restaurant.id)
        .await
        .expect_err("owners cannot approve themselves");
    assert!(matches!(err, StoreError::PermissionDenied(_)));

    let customer = Actor::new("kim", None, Role::Customer);
    let err = access
        .get_audit_logs(&customer, 10, None)
        .await
        .expect_err("customers cannot read the audit trail");
    assert!(matches!(err, StoreError::PermissionDenied(_)));

    let read = access
        .get_restaurant(&Caller::Anonymous, &restaurant.id)
        .await
        .expect("read")
        .expect("restaurant exists");
    assert_eq!(read.status, RestaurantStatus::Pending);
}

#[tokio::test]
async fn test_order_lifecycle_end_to_end() {
    let access = create_test_access().await;
    let admin = admin();
    let owner = owner("owner-1");
    let customer = Actor::new("kim", Some("kim@example.com".to_string()), Role::Customer);
    let driver = Actor::new("dee", None, Role::Driver);

    let restaurant = access
        .register_restaurant(&owner, NewRestaurant::named("Blue Fig"))
        .await
        .expect("register");
    access
        .approve_restaurant(&admin, &restaurant.id)
        .await
        .expect("approve");
    let soup = access
        .add_menu_item(&owner, NewMenuItem::new(restaurant.id.clone(), "Soup", 650, "starters"))
        .await
        .expect("add menu item");

    let registered = access
        .register_driver(
            &driver,
            NewDriver {
                name: "Dee".to_string(),
                phone: None,
                vehicle: Some("scooter".to_string()),
            },
        )
        .await
        .expect("register driver");
    access
        .approve_driver(&admin, &registered.id)
        .await
        .expect("approve driver");
    access
        .set_driver_online(&driver, true)
        .await
        .expect("go online");

    let order = access
        .place_order(
            &customer,
            NewOrder {
                restaurant_id: restaurant.id.clone(),
                lines: vec![LineRequest {
                    menu_item_id: soup.id.clone(),
                    quantity: 2,
                }],
                delivery_fee_cents: 250,
                delivery_address: Some("1 Main St".to_string()),
            },
        )
        .await
        .expect("place order");
    assert_eq!(order.total_cents, 1_550);

    let driver_id = DriverId::from(driver.user_id().expect("uid"));
    access
        .assign_driver(&owner, &order.id, &driver_id)
        .await
        .expect("assign");
    access
        .advance_order_status(&owner, &order.id)
        .await
        .expect("accept");
    access
        .advance_order_status(&owner, &order.id)
        .await
        .expect("prepare");
    access
        .advance_order_status(&driver, &order.id)
        .await
        .expect("pick up");
    let delivered = access
        .advance_order_status(&driver, &order.id)
        .await
        .expect("deliver");
    assert_eq!(delivered.status, OrderStatus::Delivered);

    let err = access
        .cancel_order(&customer, &order.id, "too late")
        .await
        .expect_err("delivered orders cannot be cancelled");
    assert!(matches!(err, StoreError::FailedPrecondition(_)));
}

#[tokio::test]
async fn test_open_on_disk_store() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = AppConfig {
        store: StoreConfig {
            database_path: Some(dir.path().join("dishpatch.db")),
            ..StoreConfig::default()
        },
        ..AppConfig::default()
    };

    let restaurant_id = {
        let access = DataAccess::open(&config).await.expect("open store");
        access
            .register_restaurant(&owner("owner-1"), NewRestaurant::named("Blue Fig"))
            .await
            .expect("register")
            .id
    };

    let reopened = DataAccess::open(&config).await.expect("reopen store");
    let read = reopened
        .get_restaurant(&Caller::Anonymous, &restaurant_id)
        .await
        .expect("read")
        .expect("persisted");
    assert_eq!(read.name, "Blue Fig");
}
