//! PostgreSQL-backed segmentation storage engine
//!
//! `PostgresStorage` owns the bounded connection pool and implements every
//! storage port defined in `segmentify-core`. Multi-step operations
//! (segment creation with rollout, combined membership updates) run inside
//! a single `sqlx` transaction; dropping the transaction before commit
//! rolls it back, which is also how request cancellation is realized.

mod catalog;
mod expiry;
mod schema;
mod users;

use std::time::Duration;

use chrono::{DateTime, Utc};
use segmentify_domain::{AuditOperation, DatabaseConfig, Result, SegmentifyError};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::{debug, info, warn};

pub use schema::SCHEMA_SQL;

/// Shared handle to the PostgreSQL backend.
///
/// Cheap to clone; all clones share the same pool.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Build the pool and verify liveness.
    ///
    /// The pool is created lazily; the initial ping is retried up to
    /// `config.ping_retries` times at one-second intervals so the service
    /// can start alongside a database that is still coming up.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        const OP: &str = "storage.postgres.connect";

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy(&config.uri)
            .map_err(|err| map_storage_error(OP, err))?;

        let storage = Self { pool };
        storage.ping_with_retry(config.ping_retries).await?;

        info!(max_connections = config.max_connections, "connected to postgres");
        Ok(storage)
    }

    /// Apply the idempotent schema bootstrap
    pub async fn init_schema(&self) -> Result<()> {
        const OP: &str = "storage.postgres.init_schema";

        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(|err| map_storage_error(OP, err))?;

        debug!("schema bootstrap applied");
        Ok(())
    }

    /// Close the pool, waiting for in-flight connections to finish
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Direct pool access, used by integration tests
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ping_with_retry(&self, retries: u32) -> Result<()> {
        const OP: &str = "storage.postgres.ping";

        let attempts = retries.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match sqlx::query("SELECT 1").execute(&self.pool).await {
                Ok(_) => return Ok(()),
                Err(err) => {
                    warn!(attempt, error = %err, "postgres ping failed");
                    last_error = err.to_string();
                }
            }
            if attempt < attempts {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }

        Err(SegmentifyError::Internal(format!(
            "{OP}: backend unreachable after {attempts} attempts: {last_error}"
        )))
    }
}

/// Wrap an unexpected backend failure with its operation tag.
///
/// Only taxonomy errors (uniqueness, absence) escape as typed variants;
/// everything else is `Internal` and never reaches clients verbatim.
pub(crate) fn map_storage_error(operation: &str, err: sqlx::Error) -> SegmentifyError {
    SegmentifyError::Internal(format!("{operation}: {err}"))
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Existence probe for a segment inside the current transaction
pub(crate) async fn segment_exists_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    slug: &str,
    operation: &str,
) -> Result<()> {
    let found: Option<String> = sqlx::query_scalar("SELECT slug FROM segments WHERE slug = $1")
        .bind(slug)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|err| map_storage_error(operation, err))?;

    found
        .map(|_| ())
        .ok_or_else(|| SegmentifyError::SegmentNotFound { slug: slug.to_string() })
}

/// Insert one membership row; returns the affected-row count so callers can
/// verify the write landed.
pub(crate) async fn insert_membership(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    slug: &str,
    expire_at: Option<DateTime<Utc>>,
) -> sqlx::Result<u64> {
    let result =
        sqlx::query("INSERT INTO users_segments (user_id, segment_slug, expire_at) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(slug)
            .bind(expire_at)
            .execute(&mut **tx)
            .await?;
    Ok(result.rows_affected())
}

/// Append one audit row; `created_at` is assigned by the store
pub(crate) async fn insert_audit_row(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    slug: &str,
    operation: AuditOperation,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO users_segments_history (user_id, segment_slug, operation) VALUES ($1, $2, $3)",
    )
    .bind(user_id)
    .bind(slug)
    .bind(operation.as_str())
    .execute(&mut **tx)
    .await?;
    Ok(())
}
