//! Shared types used across Dishpatch.
//!
//! Identifier newtypes, caller roles, the explicit actor context, and the
//! names of the logical collections in the document store.

use crate::error::DishpatchError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Validate a document identifier: 1-128 characters of `[A-Za-z0-9_-]`.
///
/// `kind` names the identifier in the error message.
///
/// # Errors
/// Returns `DishpatchError::Validation` if the identifier is malformed.
pub fn validate_document_id(kind: &str, id: &str) -> Result<(), DishpatchError> {
    static ID_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = ID_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("valid regex"));

    if regex.is_match(id) {
        Ok(())
    } else {
        Err(DishpatchError::Validation(format!(
            "invalid {kind} ID: must be 1-128 characters of letters, digits, '-' or '_', got '{id}'"
        )))
    }
}

macro_rules! document_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from a string, validating its format.
            ///
            /// # Errors
            /// Returns `DishpatchError::Validation` if the ID is empty, too long,
            /// or contains characters outside `[A-Za-z0-9_-]`.
            pub fn new(id: impl Into<String>) -> Result<Self, DishpatchError> {
                let id = id.into();
                validate_document_id($kind, &id)?;
                Ok(Self(id))
            }

            /// Create a new random identifier using UUID v4.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Get the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

document_id!(
    /// Identifier of a restaurant document.
    RestaurantId,
    "restaurant"
);
document_id!(
    /// Identifier of a user profile (matches the auth provider's uid).
    UserId,
    "user"
);
document_id!(
    /// Identifier of a driver document (matches the driver's uid).
    DriverId,
    "driver"
);
document_id!(
    /// Identifier of an order document.
    OrderId,
    "order"
);
document_id!(
    /// Identifier of a menu item document.
    MenuItemId,
    "menu item"
);
document_id!(
    /// Identifier of a cart item document.
    CartItemId,
    "cart item"
);

impl From<DriverId> for UserId {
    fn from(id: DriverId) -> Self {
        Self(id.0)
    }
}

impl From<UserId> for DriverId {
    fn from(id: UserId) -> Self {
        Self(id.0)
    }
}

/// Role of an authenticated account.
///
/// The role decides which mutations the store's access rules permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Orders food from restaurants
    Customer,
    /// Manages one or more restaurants
    RestaurantOwner,
    /// Delivers orders
    Driver,
    /// Operates the whole platform
    SuperAdmin,
}

impl Role {
    /// Wire name of the role as stored in documents.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::RestaurantOwner => "restaurant_owner",
            Self::Driver => "driver",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Roles a user may pick for themselves at sign-up.
    #[must_use]
    pub fn self_assignable() -> &'static [Role] {
        &[Self::Customer, Self::RestaurantOwner, Self::Driver]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated identity performing an operation.
///
/// Every privileged call receives the actor explicitly; nothing in the
/// data access layer looks up a "current user".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Auth provider uid
    pub uid: String,
    /// Email address, if the provider exposes one
    pub email: Option<String>,
    /// Role claim
    pub role: Role,
}

impl Actor {
    /// Create an actor context.
    #[must_use]
    pub fn new(uid: impl Into<String>, email: Option<String>, role: Role) -> Self {
        Self {
            uid: uid.into(),
            email,
            role,
        }
    }

    /// Whether the actor holds the given role.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    /// The actor's uid as a user identifier.
    ///
    /// # Errors
    /// Returns `DishpatchError::Validation` if the uid is not a valid document ID.
    pub fn user_id(&self) -> Result<UserId, DishpatchError> {
        UserId::new(self.uid.clone())
    }
}

/// Named logical collections in the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Collection {
    /// Restaurant tenants
    #[serde(rename = "restaurants")]
    Restaurants,
    /// User profiles
    #[serde(rename = "users")]
    Users,
    /// Delivery drivers
    #[serde(rename = "drivers")]
    Drivers,
    /// Customer orders
    #[serde(rename = "orders")]
    Orders,
    /// Append-only audit trail of administrative actions
    #[serde(rename = "auditLogs")]
    AuditLogs,
    /// Restaurant subscription plan history
    #[serde(rename = "subscriptions")]
    Subscriptions,
    /// Menu items, each owned by one restaurant
    #[serde(rename = "menuItems")]
    MenuItems,
    /// Per-customer cart lines
    #[serde(rename = "cartItems")]
    CartItems,
}

impl Collection {
    /// Every collection known to the schema.
    pub const ALL: [Collection; 8] = [
        Self::Restaurants,
        Self::Users,
        Self::Drivers,
        Self::Orders,
        Self::AuditLogs,
        Self::Subscriptions,
        Self::MenuItems,
        Self::CartItems,
    ];

    /// Collection name as used by the store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restaurants => "restaurants",
            Self::Users => "users",
            Self::Drivers => "drivers",
            Self::Orders => "orders",
            Self::AuditLogs => "auditLogs",
            Self::Subscriptions => "subscriptions",
            Self::MenuItems => "menuItems",
            Self::CartItems => "cartItems",
        }
    }

    /// Parse a collection from its store name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
