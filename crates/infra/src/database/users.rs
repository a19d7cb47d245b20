//! User population and membership engine
//!
//! The combined add/remove batch is the operation the audit trail hangs
//! off: every membership transition it commits is paired with exactly one
//! history row, written through the same transaction handle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use segmentify_core::{MembershipStore, UserDirectory};
use segmentify_domain::{
    AuditEntry, AuditOperation, MembershipChange, Period, Result, SegmentifyError,
};
use sqlx::{Postgres, Transaction};
use tracing::info;

use super::{
    insert_audit_row, insert_membership, is_unique_violation, map_storage_error,
    segment_exists_in_tx, PostgresStorage,
};

#[async_trait]
impl UserDirectory for PostgresStorage {
    async fn create_user(&self) -> Result<i64> {
        const OP: &str = "storage.postgres.create_user";

        let id: i64 = sqlx::query_scalar("INSERT INTO users DEFAULT VALUES RETURNING id")
            .fetch_one(&self.pool)
            .await
            .map_err(|err| map_storage_error(OP, err))?;

        info!(id, "user created");
        Ok(id)
    }

    async fn get_user(&self, id: i64) -> Result<i64> {
        const OP: &str = "storage.postgres.get_user";

        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| map_storage_error(OP, err))?;

        found.ok_or(SegmentifyError::UserNotFound { id })
    }
}

#[async_trait]
impl MembershipStore for PostgresStorage {
    async fn update_user_segments(
        &self,
        user_id: i64,
        to_add: &[MembershipChange],
        to_remove: &[String],
    ) -> Result<()> {
        const OP: &str = "storage.postgres.update_user_segments";

        let mut tx = self.pool.begin().await.map_err(|err| map_storage_error(OP, err))?;

        user_exists_in_tx(&mut tx, user_id, OP).await?;

        // Adds first, then removes; each list in the client's order. The
        // first failure returns early and the dropped transaction rolls
        // everything back.
        for change in to_add {
            segment_exists_in_tx(&mut tx, &change.slug, OP).await?;

            insert_membership(&mut tx, user_id, &change.slug, change.expire_at).await.map_err(
                |err| {
                    if is_unique_violation(&err) {
                        SegmentifyError::UserSegmentExists { slug: change.slug.clone() }
                    } else {
                        map_storage_error(OP, err)
                    }
                },
            )?;

            insert_audit_row(&mut tx, user_id, &change.slug, AuditOperation::Add)
                .await
                .map_err(|err| map_storage_error(OP, err))?;
        }

        for slug in to_remove {
            segment_exists_in_tx(&mut tx, slug, OP).await?;

            let affected =
                sqlx::query("DELETE FROM users_segments WHERE user_id = $1 AND segment_slug = $2")
                    .bind(user_id)
                    .bind(slug)
                    .execute(&mut *tx)
                    .await
                    .map_err(|err| map_storage_error(OP, err))?
                    .rows_affected();

            if affected == 0 {
                return Err(SegmentifyError::UserSegmentNotFound { slug: slug.clone() });
            }

            insert_audit_row(&mut tx, user_id, slug, AuditOperation::Remove)
                .await
                .map_err(|err| map_storage_error(OP, err))?;
        }

        tx.commit().await.map_err(|err| map_storage_error(OP, err))?;

        info!(user_id, added = to_add.len(), removed = to_remove.len(), "user segments updated");
        Ok(())
    }

    async fn get_user_segments(&self, user_id: i64) -> Result<Vec<String>> {
        const OP: &str = "storage.postgres.get_user_segments";

        self.get_user(user_id).await?;

        // Active-only filter is evaluated by the store so it stays
        // consistent with a concurrently running reap.
        sqlx::query_scalar(
            "SELECT segment_slug FROM users_segments \
             WHERE user_id = $1 AND (expire_at IS NULL OR expire_at > now())",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| map_storage_error(OP, err))
    }

    async fn get_user_segments_history(
        &self,
        user_id: i64,
        period: Period,
    ) -> Result<Vec<AuditEntry>> {
        const OP: &str = "storage.postgres.get_user_segments_history";

        self.get_user(user_id).await?;

        let rows: Vec<(i64, String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT user_id, segment_slug, operation, created_at \
             FROM users_segments_history \
             WHERE user_id = $1 \
               AND EXTRACT(YEAR FROM created_at)::int = $2 \
               AND EXTRACT(MONTH FROM created_at)::int = $3 \
             ORDER BY created_at",
        )
        .bind(user_id)
        .bind(period.year)
        .bind(i32::try_from(period.month).unwrap_or(0))
        .fetch_all(&self.pool)
        .await
        .map_err(|err| map_storage_error(OP, err))?;

        rows.into_iter()
            .map(|(user_id, segment_slug, operation, created_at)| {
                let operation: AuditOperation = operation
                    .parse()
                    .map_err(|_| SegmentifyError::Internal(format!(
                        "{OP}: unknown operation {operation:?} in history"
                    )))?;
                Ok(AuditEntry { user_id, segment_slug, operation, created_at })
            })
            .collect()
    }
}

async fn user_exists_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    operation: &str,
) -> Result<()> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|err| map_storage_error(operation, err))?;

    found.map(|_| ()).ok_or(SegmentifyError::UserNotFound { id: user_id })
}
