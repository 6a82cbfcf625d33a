//! Document shapes for each collection.
//!
//! Models carry the store-assigned `created_at`/`updated_at` metadata so
//! callers can render and sort them without a second lookup.

mod cart;
mod driver;
mod menu;
mod order;
mod restaurant;
mod subscription;
mod user;

pub use cart::CartItem;
pub use driver::{Driver, DriverApproval};
pub use menu::MenuItem;
pub use order::{subtotal_cents, Order, OrderLine, OrderStatus};
pub use restaurant::{Restaurant, RestaurantStatus};
pub use subscription::RestaurantSubscription;
pub use user::{AccountStatus, UserProfile};
