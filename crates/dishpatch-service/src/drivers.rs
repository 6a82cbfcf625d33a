//! Driver applications, approval and presence.

use crate::access::{body, caller, require_text, DataAccess, ListPage, PageRequest};
use chrono::Utc;
use dishpatch_audit::AuditAction;
use dishpatch_core::models::{Driver, DriverApproval};
use dishpatch_core::{Actor, Collection, DriverId};
use dishpatch_store::{Caller, Precondition, Query, Result, Subscription};
use serde_json::json;
use tracing::info;

/// Filter for [`DataAccess::get_drivers`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverFilter {
    /// Only this approval status
    pub approval: Option<DriverApproval>,
    /// Only online (or offline) drivers
    pub online: Option<bool>,
}

/// Application details of a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDriver {
    /// Full name
    pub name: String,
    /// Contact phone number
    pub phone: Option<String>,
    /// Vehicle description
    pub vehicle: Option<String>,
}

impl DataAccess {
    /// List drivers, newest first.
    pub async fn get_drivers(
        &self,
        caller: &Caller,
        filter: DriverFilter,
        page: PageRequest,
    ) -> Result<ListPage<Driver>> {
        let mut query = Query::new(Collection::Drivers);
        if let Some(approval) = filter.approval {
            query = query.where_eq("approval_status", approval.as_str());
        }
        if let Some(online) = filter.online {
            query = query.where_eq("online", online);
        }
        self.list(caller, query, page).await
    }

    /// Read one driver.
    pub async fn get_driver(&self, caller: &Caller, id: &DriverId) -> Result<Option<Driver>> {
        self.fetch(caller, Collection::Drivers, id.as_str()).await
    }

    /// Apply to drive. The driver document is keyed by the actor's uid.
    pub async fn register_driver(&self, actor: &Actor, driver: NewDriver) -> Result<Driver> {
        require_text("name", &driver.name)?;
        let id = DriverId::from(actor.user_id()?);
        let data = body(json!({
            "name": driver.name,
            "phone": driver.phone,
            "vehicle": driver.vehicle,
            "approval_status": DriverApproval::Pending,
            "online": false,
        }))?;

        let doc = self
            .store()
            .create(&caller(actor), Collection::Drivers, id.as_str(), data)
            .await?;
        info!(driver = %id, "driver registered");
        doc.decode()
    }

    /// Approve a pending or suspended driver.
    pub async fn approve_driver(&self, actor: &Actor, id: &DriverId) -> Result<Driver> {
        let driver = self
            .set_approval(actor, id, DriverApproval::Approved, None)
            .await?;
        self.record(actor, AuditAction::ApproveDriver { driver_id: id.clone() })
            .await;
        Ok(driver)
    }

    /// Reject a pending application.
    pub async fn reject_driver(&self, actor: &Actor, id: &DriverId, reason: &str) -> Result<Driver> {
        let driver = self
            .set_approval(actor, id, DriverApproval::Rejected, Some(reason))
            .await?;
        self.record(
            actor,
            AuditAction::RejectDriver {
                driver_id: id.clone(),
                reason: reason.to_string(),
            },
        )
        .await;
        Ok(driver)
    }

    /// Suspend an approved driver and take them offline.
    pub async fn suspend_driver(&self, actor: &Actor, id: &DriverId, reason: &str) -> Result<Driver> {
        let driver = self
            .set_approval(actor, id, DriverApproval::Suspended, Some(reason))
            .await?;
        self.record(
            actor,
            AuditAction::SuspendDriver {
                driver_id: id.clone(),
                reason: reason.to_string(),
            },
        )
        .await;
        Ok(driver)
    }

    /// Set the signed-in driver's presence.
    ///
    /// Only approved drivers can go online; going offline always works.
    pub async fn set_driver_online(&self, actor: &Actor, online: bool) -> Result<Driver> {
        let id = DriverId::from(actor.user_id()?);
        let patch = body(json!({ "online": online, "last_seen_at": Utc::now() }))?;
        let precondition = online.then(|| {
            Precondition::field_eq("approval_status", DriverApproval::Approved.as_str())
        });

        let doc = self
            .store()
            .update(
                &caller(actor),
                Collection::Drivers,
                id.as_str(),
                patch,
                precondition.as_ref(),
            )
            .await?;
        info!(driver = %id, online, "driver presence changed");
        doc.decode()
    }

    /// Watch approved drivers that are online.
    pub async fn watch_online_drivers(&self, caller: &Caller) -> Result<Subscription> {
        let query = Query::new(Collection::Drivers)
            .where_eq("online", true)
            .where_eq("approval_status", DriverApproval::Approved.as_str());
        self.store().watch(caller, query).await
    }

    async fn set_approval(
        &self,
        actor: &Actor,
        id: &DriverId,
        to: DriverApproval,
        reason: Option<&str>,
    ) -> Result<Driver> {
        let mut patch = body(json!({ "approval_status": to, "status_reason": reason }))?;
        if to != DriverApproval::Approved {
            patch.insert("online".to_string(), false.into());
        }
        let from: Vec<&str> = DriverApproval::sources_for(to)
            .iter()
            .map(DriverApproval::as_str)
            .collect();
        let precondition = Precondition::field_in("approval_status", from);

        let doc = self
            .store()
            .update(&caller(actor), Collection::Drivers, id.as_str(), patch, Some(&precondition))
            .await?;
        info!(driver = %id, approval = %to, actor = %actor.uid, "driver approval changed");
        doc.decode()
    }
}
