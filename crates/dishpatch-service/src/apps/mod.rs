//! Per-app views of the data access layer.
//!
//! Each facade binds the signed-in actor (or nobody) to a [`DataAccess`]
//! and exposes only what that app uses. Access rules still apply to every
//! call; the facades only decide which calls exist.
//!
//! [`DataAccess`]: crate::DataAccess

mod customer;
mod delivery;
mod restaurant_admin;
mod super_admin;

pub use customer::CustomerApp;
pub use delivery::DeliveryApp;
pub use restaurant_admin::RestaurantAdmin;
pub use super_admin::SuperAdminConsole;
