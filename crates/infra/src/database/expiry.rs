//! Expired-membership removal
//!
//! Expiry is a system event rather than a user-initiated removal, so no
//! history rows are written here.

use async_trait::async_trait;
use segmentify_core::MembershipReaper;
use segmentify_domain::Result;

use super::{map_storage_error, PostgresStorage};

#[async_trait]
impl MembershipReaper for PostgresStorage {
    async fn reap_expired_memberships(&self) -> Result<u64> {
        const OP: &str = "storage.postgres.reap_expired_memberships";

        let result = sqlx::query(
            "DELETE FROM users_segments WHERE expire_at IS NOT NULL AND expire_at < now()",
        )
        .execute(&self.pool)
        .await
        .map_err(|err| map_storage_error(OP, err))?;

        Ok(result.rows_affected())
    }
}
