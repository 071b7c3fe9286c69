//! Database operations for the `pipeline_runs` ledger.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `pipeline_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PipelineRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub trigger_source: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_processed: i32,
    pub summary: Option<Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

const RUN_COLUMNS: &str = "id, public_id, trigger_source, status, started_at, completed_at, \
                           records_processed, summary, error_message, created_at";

/// Creates a new run in `running` status with `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_pipeline_run(
    pool: &PgPool,
    trigger_source: &str,
) -> Result<PipelineRunRow, DbError> {
    let row = sqlx::query_as::<_, PipelineRunRow>(&format!(
        "INSERT INTO pipeline_runs (public_id, trigger_source, status) \
         VALUES ($1, $2, 'running') \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Moves a `running` run to its terminal `status` and records the summary.
///
/// `status` is one of `succeeded`, `completed_with_warnings` or `failed`.
///
/// # Errors
///
/// Returns [`DbError::InvalidPipelineRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn finish_pipeline_run(
    pool: &PgPool,
    id: i64,
    status: &str,
    records_processed: i32,
    summary: Value,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE pipeline_runs \
         SET status = $1, completed_at = NOW(), records_processed = $2, \
             summary = $3, error_message = $4 \
         WHERE id = $5 AND status = 'running'",
    )
    .bind(status)
    .bind(records_processed)
    .bind(summary)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidPipelineRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_pipeline_run(pool: &PgPool, id: i64) -> Result<PipelineRunRow, DbError> {
    let row = sqlx::query_as::<_, PipelineRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM pipeline_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pipeline_runs(pool: &PgPool, limit: i64) -> Result<Vec<PipelineRunRow>, DbError> {
    let rows = sqlx::query_as::<_, PipelineRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM pipeline_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
