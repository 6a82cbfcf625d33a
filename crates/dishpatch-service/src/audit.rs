//! Reading the audit trail.

use crate::access::{caller, DataAccess};
use dishpatch_audit::AuditPage;
use dishpatch_core::Actor;
use dishpatch_store::{Cursor, Result};

impl DataAccess {
    /// Read up to `max_rows` audit entries, newest first.
    ///
    /// Pass the previous page's `next_cursor` to continue.
    pub async fn get_audit_logs(
        &self,
        actor: &Actor,
        max_rows: u32,
        cursor: Option<Cursor>,
    ) -> Result<AuditPage> {
        self.audit().recent(&caller(actor), max_rows, cursor).await
    }
}

#[cfg(test)]
mod tests {
    use crate::restaurants::NewRestaurant;
    use crate::testing::{admin, owner, setup_access};
    use dishpatch_store::StoreError;

    #[tokio::test]
    async fn test_audit_logs_page_newest_first() {
        let access = setup_access().await;
        let admin = admin();
        let owner = owner("owner-1");

        let mut ids = Vec::new();
        for name in ["A", "B", "C"] {
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

        let first = access.get_audit_logs(&admin, 2, None).await.expect("page 1");
        assert_eq!(first.entries.len(), 2);
        assert_eq!(first.entries[0].action.target_id(), ids[2].as_str());
        assert_eq!(first.entries[0].actor_email.as_deref(), Some("ops@example.com"));

        let second = access
            .get_audit_logs(&admin, 2, first.next_cursor)
            .await
            .expect("page 2");
        assert_eq!(second.entries.len(), 1);
        assert_eq!(second.entries[0].action.target_id(), ids[0].as_str());
        assert!(second.next_cursor.is_none());

        let err = access
            .get_audit_logs(&owner, 10, None)
            .await
            .expect_err("owners cannot read the audit trail");
        assert!(matches!(err, StoreError::PermissionDenied(_)));
    }
}
