//! Segment catalog operations, including the percentage rollout
//!
//! `create_segment` is the one catalog operation with cross-row effects:
//! when `percent > 0` the segment insert, the sampled memberships and the
//! audit rows all commit together or not at all.

use async_trait::async_trait;
use segmentify_core::{rollout_size, SegmentCatalog};
use segmentify_domain::{AuditOperation, Result, Segment, SegmentifyError};
use sqlx::{Postgres, Transaction};
use tracing::info;

use super::{
    insert_audit_row, insert_membership, is_unique_violation, map_storage_error, PostgresStorage,
};

#[async_trait]
impl SegmentCatalog for PostgresStorage {
    async fn create_segment(&self, segment: Segment) -> Result<Segment> {
        const OP: &str = "storage.postgres.create_segment";

        let mut tx = self.pool.begin().await.map_err(|err| map_storage_error(OP, err))?;

        let stored: (String, i32) = sqlx::query_as(
            "INSERT INTO segments (slug, percent) VALUES ($1, $2) RETURNING slug, percent",
        )
        .bind(&segment.slug)
        .bind(i32::from(segment.percent))
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                SegmentifyError::SegmentExists { slug: segment.slug.clone() }
            } else {
                map_storage_error(OP, err)
            }
        })?;

        let enrolled = if segment.percent > 0 {
            roll_out_segment(&mut tx, &segment.slug, segment.percent).await?
        } else {
            0
        };

        tx.commit().await.map_err(|err| map_storage_error(OP, err))?;

        info!(slug = %stored.0, percent = stored.1, enrolled, "segment created");
        Ok(Segment { slug: stored.0, percent: stored.1 as i16 })
    }

    async fn get_segment(&self, slug: &str) -> Result<Segment> {
        const OP: &str = "storage.postgres.get_segment";

        let row: Option<(String, i32)> =
            sqlx::query_as("SELECT slug, percent FROM segments WHERE slug = $1")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await
                .map_err(|err| map_storage_error(OP, err))?;

        row.map(|(slug, percent)| Segment { slug, percent: percent as i16 })
            .ok_or_else(|| SegmentifyError::SegmentNotFound { slug: slug.to_string() })
    }

    async fn delete_segment(&self, slug: &str) -> Result<()> {
        const OP: &str = "storage.postgres.delete_segment";

        let result = sqlx::query("DELETE FROM segments WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await
            .map_err(|err| map_storage_error(OP, err))?;

        if result.rows_affected() == 0 {
            return Err(SegmentifyError::SegmentNotFound { slug: slug.to_string() });
        }

        info!(slug, "segment deleted");
        Ok(())
    }
}

/// Enroll a uniform random `floor(population * percent / 100)` sample of
/// the existing users, with a matching `add` audit row each. Runs on the
/// caller's transaction; any mismatch between requested and written rows
/// fails the whole creation.
async fn roll_out_segment(
    tx: &mut Transaction<'_, Postgres>,
    slug: &str,
    percent: i16,
) -> Result<u64> {
    const OP: &str = "storage.postgres.roll_out_segment";

    let population: i64 = sqlx::query_scalar("SELECT count(*) FROM users")
        .fetch_one(&mut **tx)
        .await
        .map_err(|err| map_storage_error(OP, err))?;

    let sample = rollout_size(u64::try_from(population).unwrap_or(0), percent);
    if sample == 0 {
        return Ok(0);
    }

    let user_ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM users ORDER BY random() LIMIT $1")
        .bind(i64::try_from(sample).unwrap_or(i64::MAX))
        .fetch_all(&mut **tx)
        .await
        .map_err(|err| map_storage_error(OP, err))?;

    if user_ids.len() as u64 != sample {
        return Err(SegmentifyError::Internal(format!(
            "{OP}: sampled {} users, expected {sample}",
            user_ids.len()
        )));
    }

    for user_id in &user_ids {
        let affected = insert_membership(tx, *user_id, slug, None)
            .await
            .map_err(|err| map_storage_error(OP, err))?;
        if affected != 1 {
            return Err(SegmentifyError::Internal(format!(
                "{OP}: membership insert affected {affected} rows for user {user_id}"
            )));
        }

        insert_audit_row(tx, *user_id, slug, AuditOperation::Add)
            .await
            .map_err(|err| map_storage_error(OP, err))?;
    }

    Ok(sample)
}
