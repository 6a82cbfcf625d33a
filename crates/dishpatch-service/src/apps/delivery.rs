use crate::access::{DataAccess, ListPage, PageRequest};
use crate::drivers::NewDriver;
use crate::orders::OrderFilter;
use dishpatch_core::models::{Driver, Order};
use dishpatch_core::{Actor, DriverId, OrderId};
use dishpatch_store::{Caller, Result, Subscription};

/// The delivery driver app.
#[derive(Debug, Clone)]
pub struct DeliveryApp {
    access: DataAccess,
    actor: Actor,
}

impl DeliveryApp {
    /// Bind the app to a signed-in driver.
    #[must_use]
    pub fn new(access: DataAccess, actor: Actor) -> Self {
        Self { access, actor }
    }

    fn caller(&self) -> Caller {
        Caller::Authenticated(self.actor.clone())
    }

    fn driver_id(&self) -> Result<DriverId> {
        Ok(DriverId::from(self.actor.user_id()?))
    }

    /// Apply to drive; the application starts pending review.
    pub async fn register(&self, driver: NewDriver) -> Result<Driver> {
        self.access.register_driver(&self.actor, driver).await
    }

    /// The driver's own record.
    pub async fn profile(&self) -> Result<Option<Driver>> {
        self.access.get_driver(&self.caller(), &self.driver_id()?).await
    }

    /// Start taking deliveries. Only approved drivers can go online.
    pub async fn go_online(&self) -> Result<Driver> {
        self.access.set_driver_online(&self.actor, true).await
    }

    /// Stop taking deliveries.
    pub async fn go_offline(&self) -> Result<Driver> {
        self.access.set_driver_online(&self.actor, false).await
    }

    /// Live view of the orders assigned to this driver that are still open.
    pub async fn assigned_orders(&self) -> Result<Subscription> {
        self.access
            .watch_driver_orders(&self.caller(), &self.driver_id()?)
            .await
    }

    /// Every order this driver has carried, newest first.
    pub async fn delivery_history(&self, page: PageRequest) -> Result<ListPage<Order>> {
        let filter = OrderFilter {
            driver_id: Some(self.driver_id()?),
            ..OrderFilter::default()
        };
        self.access.get_orders(&self.caller(), filter, page).await
    }

    /// Mark pickup or delivery of an assigned order.
    pub async fn advance(&self, order_id: &OrderId) -> Result<Order> {
        self.access.advance_order_status(&self.actor, order_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{admin, driver, setup_access};
    use dishpatch_core::models::DriverApproval;
    use dishpatch_store::StoreError;

    #[tokio::test]
    async fn test_driver_goes_online_after_approval() {
        let access = setup_access().await;
        let app = DeliveryApp::new(access.clone(), driver("dee"));

        let registered = app
            .register(NewDriver {
                name: "Dee".to_string(),
                phone: None,
                vehicle: Some("bike".to_string()),
            })
            .await
            .expect("register");
        assert_eq!(registered.approval_status, DriverApproval::Pending);

        let err = app.go_online().await.expect_err("pending drivers stay offline");
        assert!(matches!(err, StoreError::FailedPrecondition(_)));

        access
            .approve_driver(&admin(), &registered.id)
            .await
            .expect("approve");
        assert!(app.go_online().await.expect("online").online);
        assert!(!app.go_offline().await.expect("offline").online);

        let history = app
            .delivery_history(PageRequest::first())
            .await
            .expect("history");
        assert!(history.items.is_empty());
    }
}
