//! Fixtures shared by the unit tests.

use crate::access::DataAccess;
use crate::restaurants::NewRestaurant;
use dishpatch_audit::AuditAction;
use dishpatch_core::models::Restaurant;
use dishpatch_core::{Actor, AppConfig, Role};
use dishpatch_store::{AccessRules, Caller, SqliteDocumentStore};
use std::sync::Arc;

pub(crate) async fn setup_access() -> DataAccess {
    let store = SqliteDocumentStore::in_memory(AccessRules::platform())
        .await
        .expect("create store");
    DataAccess::new(Arc::new(store), &AppConfig::default())
}

pub(crate) fn admin() -> Actor {
    Actor::new("admin-1", Some("ops@example.com".to_string()), Role::SuperAdmin)
}

pub(crate) fn owner(uid: &str) -> Actor {
    Actor::new(uid, Some(format!("{uid}@example.com")), Role::RestaurantOwner)
}

pub(crate) fn customer(uid: &str) -> Actor {
    Actor::new(uid, Some(format!("{uid}@example.com")), Role::Customer)
}

pub(crate) fn driver(uid: &str) -> Actor {
    Actor::new(uid, None, Role::Driver)
}

pub(crate) async fn approved_restaurant(access: &DataAccess, owner: &Actor, name: &str) -> Restaurant {
    let restaurant = access
        .register_restaurant(owner, NewRestaurant::named(name))
        .await
        .expect("register restaurant");
    access
        .approve_restaurant(&admin(), &restaurant.id)
        .await
        .expect("approve restaurant")
}

pub(crate) async fn audit_actions(access: &DataAccess) -> Vec<AuditAction> {
    access
        .audit()
        .recent(&Caller::Authenticated(admin()), 200, None)
        .await
        .expect("read audit log")
        .entries
        .into_iter()
        .map(|entry| entry.action)
        .collect()
}
