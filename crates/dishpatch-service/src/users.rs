//! User profiles and account moderation.

use crate::access::{body, caller, DataAccess, ListPage, PageRequest};
use dishpatch_audit::AuditAction;
use dishpatch_core::models::{AccountStatus, UserProfile};
use dishpatch_core::{Actor, Collection, Role, UserId};
use dishpatch_store::{Caller, Precondition, Query, Result, StoreError};
use serde_json::{json, Map, Value};
use tracing::info;

/// Filter for [`DataAccess::get_users`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserFilter {
    /// Only this role
    pub role: Option<Role>,
    /// Only this account status; active accounts when `None`
    pub status: Option<AccountStatus>,
}

/// Sign-up details of a user profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserProfile {
    /// Contact email
    pub email: String,
    /// Name shown in the apps
    pub display_name: Option<String>,
    /// Contact phone number
    pub phone: Option<String>,
    /// Role picked at sign-up
    pub role: Role,
}

/// Profile fields a user may edit; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfileUpdate {
    /// New display name
    pub display_name: Option<String>,
    /// New phone number
    pub phone: Option<String>,
}

impl DataAccess {
    /// List user profiles, newest first. Defaults to active accounts.
    pub async fn get_users(
        &self,
        caller: &Caller,
        filter: UserFilter,
        page: PageRequest,
    ) -> Result<ListPage<UserProfile>> {
        let status = filter.status.unwrap_or(AccountStatus::Active);
        let mut query = Query::new(Collection::Users).where_eq("status", status.as_str());
        if let Some(role) = filter.role {
            query = query.where_eq("role", role.as_str());
        }
        self.list(caller, query, page).await
    }

    /// Read one user profile.
    pub async fn get_user(&self, caller: &Caller, id: &UserId) -> Result<Option<UserProfile>> {
        self.fetch(caller, Collection::Users, id.as_str()).await
    }

    /// Create the profile of the signed-in `actor`.
    ///
    /// # Errors
    /// `StoreError::InvalidArgument` for a role users cannot pick themselves,
    /// `StoreError::FailedPrecondition` if the profile already exists.
    pub async fn create_user_profile(
        &self,
        actor: &Actor,
        profile: NewUserProfile,
    ) -> Result<UserProfile> {
        if !Role::self_assignable().contains(&profile.role) {
            return Err(StoreError::InvalidArgument(format!(
                "role '{}' cannot be chosen at sign-up",
                profile.role
            )));
        }
        if !profile.email.contains('@') {
            return Err(StoreError::InvalidArgument(format!(
                "invalid email address '{}'",
                profile.email
            )));
        }

        let id = actor.user_id()?;
        let data = body(json!({
            "email": profile.email,
            "display_name": profile.display_name,
            "phone": profile.phone,
            "role": profile.role,
            "status": AccountStatus::Active,
        }))?;
        let doc = self
            .store()
            .create(&caller(actor), Collection::Users, id.as_str(), data)
            .await?;
        info!(user = %id, role = %profile.role, "user profile created");
        doc.decode()
    }

    /// Edit a user's own profile fields.
    pub async fn update_user_profile(
        &self,
        actor: &Actor,
        id: &UserId,
        update: UserProfileUpdate,
    ) -> Result<UserProfile> {
        let mut patch = Map::new();
        if let Some(name) = update.display_name {
            patch.insert("display_name".to_string(), Value::String(name));
        }
        if let Some(phone) = update.phone {
            patch.insert("phone".to_string(), Value::String(phone));
        }
        if patch.is_empty() {
            return Err(StoreError::InvalidArgument(
                "profile update has no fields".to_string(),
            ));
        }

        let doc = self
            .store()
            .update(&caller(actor), Collection::Users, id.as_str(), patch, None)
            .await?;
        info!(user = %id, "user profile updated");
        doc.decode()
    }

    /// Suspend an active account.
    pub async fn suspend_user(&self, actor: &Actor, id: &UserId, reason: &str) -> Result<UserProfile> {
        let user = self
            .set_account_status(actor, id, AccountStatus::Suspended, Some(reason))
            .await?;
        self.record(
            actor,
            AuditAction::SuspendUser {
                user_id: id.clone(),
                reason: reason.to_string(),
            },
        )
        .await;
        Ok(user)
    }

    /// Reactivate a suspended account.
    pub async fn reactivate_user(&self, actor: &Actor, id: &UserId) -> Result<UserProfile> {
        let user = self
            .set_account_status(actor, id, AccountStatus::Active, None)
            .await?;
        self.record(actor, AuditAction::ReactivateUser { user_id: id.clone() })
            .await;
        Ok(user)
    }

    /// Give a user another role.
    pub async fn change_user_role(&self, actor: &Actor, id: &UserId, role: Role) -> Result<UserProfile> {
        let caller = caller(actor);
        let current: UserProfile = self.require(&caller, Collection::Users, id.as_str()).await?;
        if current.role == role {
            return Err(StoreError::FailedPrecondition(format!(
                "{}/{id} already has role {role}",
                Collection::Users
            )));
        }

        let patch = body(json!({ "role": role }))?;
        let precondition = Precondition::field_eq("role", current.role.as_str());
        let doc = self
            .store()
            .update(&caller, Collection::Users, id.as_str(), patch, Some(&precondition))
            .await?;

        info!(user = %id, from = %current.role, to = %role, "user role changed");
        self.record(
            actor,
            AuditAction::ChangeUserRole {
                user_id: id.clone(),
                from: current.role,
                to: role,
            },
        )
        .await;
        doc.decode()
    }

    async fn set_account_status(
        &self,
        actor: &Actor,
        id: &UserId,
        to: AccountStatus,
        reason: Option<&str>,
    ) -> Result<UserProfile> {
        let patch = body(json!({ "status": to, "status_reason": reason }))?;
        let from: Vec<&str> = AccountStatus::sources_for(to)
            .iter()
            .map(AccountStatus::as_str)
            .collect();
        let precondition = Precondition::field_in("status", from);
        let doc = self
            .store()
            .update(&caller(actor), Collection::Users, id.as_str(), patch, Some(&precondition))
            .await?;
        info!(user = %id, status = %to, actor = %actor.uid, "account status changed");
        doc.decode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{admin, audit_actions, customer, setup_access};

    fn sign_up(role: Role) -> NewUserProfile {
        NewUserProfile {
            email: "kim@example.com".to_string(),
            display_name: Some("Kim".to_string()),
            phone: None,
            role,
        }
    }

    #[tokio::test]
    async fn test_create_profile_uses_actor_uid() {
        let access = setup_access().await;
        let kim = customer("kim");

        let profile = access
            .create_user_profile(&kim, sign_up(Role::Customer))
            .await
            .expect("create profile");
        assert_eq!(profile.id.as_str(), "kim");
        assert_eq!(profile.status, AccountStatus::Active);

        let err = access
            .create_user_profile(&kim, sign_up(Role::Customer))
            .await
            .expect_err("profile exists");
        assert!(matches!(err, StoreError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn test_cannot_sign_up_as_admin() {
        let access = setup_access().await;
        let err = access
            .create_user_profile(&customer("kim"), sign_up(Role::SuperAdmin))
            .await
            .expect_err("admin is not self-assignable");
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_user_edits_own_profile_only() {
        let access = setup_access().await;
        let kim = customer("kim");
        let lee = customer("lee");
        access
            .create_user_profile(&kim, sign_up(Role::Customer))
            .await
            .expect("create profile");

        let update = UserProfileUpdate {
            phone: Some("555-0100".to_string()),
            ..UserProfileUpdate::default()
        };
        let kim_id = kim.user_id().expect("uid");
        let updated = access
            .update_user_profile(&kim, &kim_id, update.clone())
            .await
            .expect("update own profile");
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));

        let err = access
            .update_user_profile(&lee, &kim_id, update)
            .await
            .expect_err("someone else's profile");
        assert!(matches!(err, StoreError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_suspend_and_reactivate() {
        let access = setup_access().await;
        let admin = admin();
        let kim = customer("kim");
        access
            .create_user_profile(&kim, sign_up(Role::Customer))
            .await
            .expect("create profile");
        let kim_id = kim.user_id().expect("uid");

        let suspended = access
            .suspend_user(&admin, &kim_id, "chargebacks")
            .await
            .expect("suspend");
        assert_eq!(suspended.status, AccountStatus::Suspended);

        let err = access
            .suspend_user(&admin, &kim_id, "again")
            .await
            .expect_err("already suspended");
        assert!(matches!(err, StoreError::FailedPrecondition(_)));

        let admin_caller = Caller::Authenticated(admin.clone());
        let active = access
            .get_users(&admin_caller, UserFilter::default(), PageRequest::first())
            .await
            .expect("list active");
        assert!(active.items.is_empty());
        let hidden = access
            .get_users(
                &admin_caller,
                UserFilter {
                    status: Some(AccountStatus::Suspended),
                    ..UserFilter::default()
                },
                PageRequest::first(),
            )
            .await
            .expect("list suspended");
        assert_eq!(hidden.items.len(), 1);

        access
            .reactivate_user(&admin, &kim_id)
            .await
            .expect("reactivate");
        assert_eq!(audit_actions(&access).await.len(), 2);
    }

    #[tokio::test]
    async fn test_change_role() {
        let access = setup_access().await;
        let admin = admin();
        let kim = customer("kim");
        access
            .create_user_profile(&kim, sign_up(Role::Customer))
            .await
            .expect("create profile");
        let kim_id = kim.user_id().expect("uid");

        let changed = access
            .change_user_role(&admin, &kim_id, Role::Driver)
            .await
            .expect("change role");
        assert_eq!(changed.role, Role::Driver);

        let err = access
            .change_user_role(&admin, &kim_id, Role::Driver)
            .await
            .expect_err("same role");
        assert!(matches!(err, StoreError::FailedPrecondition(_)));

        let err = access
            .change_user_role(&kim, &kim_id, Role::SuperAdmin)
            .await
            .expect_err("role is protected from its owner");
        assert!(matches!(err, StoreError::PermissionDenied(_)));

        assert_eq!(
            audit_actions(&access).await,
            vec![AuditAction::ChangeUserRole {
                user_id: kim_id,
                from: Role::Customer,
                to: Role::Driver,
            }]
        );
    }
}
