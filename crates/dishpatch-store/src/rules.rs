//! Access rules enforced by the store.
//!
//! Each collection carries an allow list per operation. A request passes if
//! any entry allows it; an operation with no entries is always rejected
//! (except for [`Caller::System`]).

use crate::error::{Result, StoreError};
use crate::query::{FieldPath, Query};
use dishpatch_core::{Actor, Collection, Role};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Identity presented with a store request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// No signed-in user
    Anonymous,
    /// A signed-in user
    Authenticated(Actor),
    /// Trusted server-side code; bypasses access rules
    System,
}

impl Caller {
    /// Caller for an optional actor.
    #[must_use]
    pub fn from_actor(actor: Option<&Actor>) -> Self {
        actor.map_or(Self::Anonymous, |a| Self::Authenticated(a.clone()))
    }

    /// The signed-in actor, if any.
    #[must_use]
    pub fn actor(&self) -> Option<&Actor> {
        match self {
            Self::Authenticated(actor) => Some(actor),
            _ => None,
        }
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("anonymous"),
            Self::Authenticated(actor) => write!(f, "{} ({})", actor.uid, actor.role),
            Self::System => f.write_str("system"),
        }
    }
}

/// Kind of store request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Read one document
    Get,
    /// Query or watch
    List,
    /// Add or create
    Create,
    /// Merge into an existing document
    Update,
    /// Remove a document
    Delete,
}

impl Operation {
    /// Every operation.
    pub const ALL: [Operation; 5] = [
        Self::Get,
        Self::List,
        Self::Create,
        Self::Update,
        Self::Delete,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Where the owner's uid lives in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerField {
    /// The document ID is the owner's uid
    DocumentId,
    /// A body field holds the owner's uid
    Field(&'static str),
}

impl OwnerField {
    fn path(self) -> FieldPath {
        match self {
            Self::DocumentId => FieldPath::DocumentId,
            Self::Field(name) => FieldPath::field(name),
        }
    }

    fn matches(self, uid: &str, id: &str, data: &Map<String, Value>) -> bool {
        match self {
            Self::DocumentId => id == uid,
            Self::Field(name) => data.get(name).and_then(Value::as_str) == Some(uid),
        }
    }
}

/// One entry of an allow list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allow {
    /// Everyone, signed in or not
    Anyone,
    /// Any signed-in user
    Authenticated,
    /// Signed-in users holding one of these roles
    Roles(&'static [Role]),
    /// The document's owner
    Owner(OwnerField),
    /// The owner, as long as the write leaves `protected` fields untouched
    OwnerExcept {
        /// Owner location
        owner: OwnerField,
        /// Fields the owner may not write
        protected: &'static [&'static str],
    },
    /// The owner, as long as the resulting document has `field` in `values`
    OwnerWith {
        /// Owner location
        owner: OwnerField,
        /// Field constrained
        field: &'static str,
        /// Values the owner may leave in `field`
        values: &'static [&'static str],
    },
}

/// What a request touches, as seen by the rules.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    /// An existing document (get, delete); `data` is `None` if it is absent
    Existing {
        /// Document ID
        id: &'a str,
        /// Current body
        data: Option<&'a Map<String, Value>>,
    },
    /// A document about to be created
    New {
        /// Document ID
        id: &'a str,
        /// Body to write
        data: &'a Map<String, Value>,
    },
    /// A merge into an existing document
    Update {
        /// Document ID
        id: &'a str,
        /// Current body
        existing: &'a Map<String, Value>,
        /// Fields written
        patch: &'a Map<String, Value>,
    },
    /// A query or subscription
    Query(&'a Query),
}

impl Allow {
    fn permits(&self, actor: Option<&Actor>, resource: &Resource<'_>) -> bool {
        match self {
            Self::Anyone => true,
            Self::Authenticated => actor.is_some(),
            Self::Roles(roles) => actor.is_some_and(|a| roles.contains(&a.role)),
            Self::Owner(owner) => actor.is_some_and(|a| owns(*owner, &a.uid, resource)),
            Self::OwnerExcept { owner, protected } => actor.is_some_and(|a| {
                owns(*owner, &a.uid, resource)
                    && match resource {
                        Resource::New { data, .. } => !protected.iter().any(|f| data.contains_key(*f)),
                        Resource::Update { patch, .. } => {
                            !protected.iter().any(|f| patch.contains_key(*f))
                        }
                        _ => true,
                    }
            }),
            Self::OwnerWith {
                owner,
                field,
                values,
            } => actor.is_some_and(|a| {
                owns(*owner, &a.uid, resource)
                    && match resource {
                        Resource::New { data, .. } => field_in(data.get(*field), values),
                        Resource::Update {
                            existing, patch, ..
                        } => field_in(patch.get(*field).or_else(|| existing.get(*field)), values),
                        _ => true,
                    }
            }),
        }
    }
}

fn field_in(value: Option<&Value>, values: &[&str]) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|v| values.contains(&v))
}

fn owns(owner: OwnerField, uid: &str, resource: &Resource<'_>) -> bool {
    match resource {
        // A missing document reveals nothing; let the read report absence.
        Resource::Existing { data: None, .. } => true,
        Resource::Existing {
            id,
            data: Some(data),
        } => owner.matches(uid, id, data),
        Resource::New { id, data } => owner.matches(uid, id, data),
        Resource::Update {
            id,
            existing,
            patch,
        } => {
            owner.matches(uid, id, existing)
                && match owner {
                    OwnerField::Field(name) => patch
                        .get(name)
                        .map_or(true, |v| v.as_str() == Some(uid)),
                    OwnerField::DocumentId => true,
                }
        }
        Resource::Query(query) => query
            .equality_on(&owner.path())
            .and_then(Value::as_str)
            .is_some_and(|v| v == uid),
    }
}

/// Allow lists for every collection and operation.
#[derive(Debug, Clone, Default)]
pub struct AccessRules {
    rules: HashMap<(Collection, Operation), Vec<Allow>>,
}

impl AccessRules {
    /// Rules that reject everything not made by [`Caller::System`].
    #[must_use]
    pub fn deny_all() -> Self {
        Self::default()
    }

    /// Rules that let anyone do anything.
    #[must_use]
    pub fn allow_all() -> Self {
        let mut rules = Self::default();
        for collection in Collection::ALL {
            for op in Operation::ALL {
                rules.allow(collection, &[op], Allow::Anyone);
            }
        }
        rules
    }

    /// Add an allow entry for the given operations of a collection.
    pub fn allow(&mut self, collection: Collection, ops: &[Operation], allow: Allow) -> &mut Self {
        for op in ops {
            self.rules.entry((collection, *op)).or_default().push(allow);
        }
        self
    }

    /// Whether the rules define any entry for `(collection, op)`.
    #[must_use]
    pub fn has_rule(&self, collection: Collection, op: Operation) -> bool {
        self.rules
            .get(&(collection, op))
            .is_some_and(|entries| !entries.is_empty())
    }

    /// Check a request.
    ///
    /// # Errors
    /// Returns `StoreError::PermissionDenied` if no entry allows it.
    pub fn check(
        &self,
        caller: &Caller,
        collection: Collection,
        op: Operation,
        resource: &Resource<'_>,
    ) -> Result<()> {
        if *caller == Caller::System {
            return Ok(());
        }

        let actor = caller.actor();
        let allowed = self
            .rules
            .get(&(collection, op))
            .is_some_and(|entries| entries.iter().any(|a| a.permits(actor, resource)));

        if allowed {
            Ok(())
        } else {
            warn!(%caller, %collection, op = op.as_str(), "access denied");
            Err(StoreError::PermissionDenied(format!(
                "{caller} may not {} {collection}",
                op.as_str()
            )))
        }
    }

    /// The platform's production rules.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn platform() -> Self {
        use Operation::{Create, Delete, Get, List, Update};

        const ADMIN: &[Role] = &[Role::SuperAdmin];
        const ORDER_STAFF: &[Role] = &[Role::SuperAdmin, Role::RestaurantOwner, Role::Driver];
        const MENU_EDITORS: &[Role] = &[Role::RestaurantOwner, Role::SuperAdmin];
        const PLAN_READERS: &[Role] = &[Role::SuperAdmin, Role::RestaurantOwner];

        let mut rules = Self::default();

        rules
            .allow(Collection::Restaurants, &[Get, List], Allow::Anyone)
            .allow(Collection::Restaurants, &[Create, Update, Delete], Allow::Roles(ADMIN))
            .allow(
                Collection::Restaurants,
                &[Create],
                Allow::OwnerWith {
                    owner: OwnerField::Field("owner_id"),
                    field: "status",
                    values: &["pending"],
                },
            )
            .allow(
                Collection::Restaurants,
                &[Update],
                Allow::OwnerExcept {
                    owner: OwnerField::Field("owner_id"),
                    protected: &["status", "plan", "owner_id", "status_reason", "features"],
                },
            );

        rules
            .allow(Collection::Users, &[Get, List, Create, Update, Delete], Allow::Roles(ADMIN))
            .allow(Collection::Users, &[Get], Allow::Owner(OwnerField::DocumentId))
            .allow(
                Collection::Users,
                &[Create],
                Allow::OwnerWith {
                    owner: OwnerField::DocumentId,
                    field: "role",
                    values: &["customer", "restaurant_owner", "driver"],
                },
            )
            .allow(
                Collection::Users,
                &[Update],
                Allow::OwnerExcept {
                    owner: OwnerField::DocumentId,
                    protected: &["role", "status", "status_reason", "email"],
                },
            );

        rules
            .allow(Collection::Drivers, &[Get, List], Allow::Authenticated)
            .allow(Collection::Drivers, &[Update, Delete], Allow::Roles(ADMIN))
            .allow(
                Collection::Drivers,
                &[Create],
                Allow::OwnerWith {
                    owner: OwnerField::DocumentId,
                    field: "approval_status",
                    values: &["pending"],
                },
            )
            .allow(
                Collection::Drivers,
                &[Update],
                Allow::OwnerExcept {
                    owner: OwnerField::DocumentId,
                    protected: &["approval_status"],
                },
            );

        let customer = OwnerField::Field("customer_id");
        rules
            .allow(Collection::Orders, &[Get, List, Update], Allow::Roles(ORDER_STAFF))
            .allow(Collection::Orders, &[Get, List], Allow::Owner(customer))
            .allow(
                Collection::Orders,
                &[Create],
                Allow::OwnerWith {
                    owner: customer,
                    field: "status",
                    values: &["placed"],
                },
            )
            .allow(
                Collection::Orders,
                &[Update],
                Allow::OwnerWith {
                    owner: customer,
                    field: "status",
                    values: &["cancelled"],
                },
            )
            .allow(Collection::Orders, &[Delete], Allow::Roles(ADMIN));

        rules
            .allow(Collection::MenuItems, &[Get, List], Allow::Anyone)
            .allow(
                Collection::MenuItems,
                &[Create, Update, Delete],
                Allow::Roles(MENU_EDITORS),
            );

        rules.allow(
            Collection::CartItems,
            &[Get, List, Create, Update, Delete],
            Allow::Owner(customer),
        );

        rules
            .allow(Collection::Subscriptions, &[Get, List], Allow::Roles(PLAN_READERS))
            .allow(Collection::Subscriptions, &[Create], Allow::Roles(ADMIN));

        // No update or delete entries: the audit trail is append-only.
        rules
            .allow(Collection::AuditLogs, &[Get, List], Allow::Roles(ADMIN))
            .allow(
                Collection::AuditLogs,
                &[Create],
                Allow::Owner(OwnerField::Field("actor_id")),
            );

        rules
    }
}
