//! Database operations for the `search_runs` table.
//!
//! Runs are append-only: one insert per completed probing pass, never
//! updated. The `(request_id, level)` unique constraint makes a double
//! commit of the same pass fail loudly instead of corrupting the history.

use chrono::{DateTime, Utc};
use proploc_core::model::{CandidateFingerprint, NewSearchRun, SearchRunSummary};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `search_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SearchRunRow {
    pub id: i64,
    pub request_id: Uuid,
    pub level: i32,
    pub fingerprints: serde_json::Value,
    pub excluded_count: i32,
    pub created_at: DateTime<Utc>,
}

impl SearchRunRow {
    /// Deserialize the stored fingerprint list.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] when the stored JSON no longer
    /// matches the fingerprint shape.
    pub fn fingerprints(&self) -> Result<Vec<CandidateFingerprint>, DbError> {
        Ok(serde_json::from_value(self.fingerprints.clone())?)
    }
}

/// Appends one completed run for a request.
///
/// # Errors
///
/// Returns [`DbError::Serialization`] if the fingerprints cannot be
/// serialized, or [`DbError::Sqlx`] if the insert fails (including a unique
/// violation when the run level was already committed).
pub async fn append_search_run(
    pool: &PgPool,
    request_id: Uuid,
    run: &NewSearchRun,
) -> Result<SearchRunRow, DbError> {
    let fingerprints = serde_json::to_value(&run.fingerprints)?;

    let row = sqlx::query_as::<_, SearchRunRow>(
        "INSERT INTO search_runs (request_id, level, fingerprints, excluded_count) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, request_id, level, fingerprints, excluded_count, created_at",
    )
    .bind(request_id)
    .bind(run.level)
    .bind(fingerprints)
    .bind(run.excluded_count)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Number of runs committed for a request.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_search_runs(pool: &PgPool, request_id: Uuid) -> Result<u32, DbError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM search_runs WHERE request_id = $1")
            .bind(request_id)
            .fetch_one(pool)
            .await?;
    Ok(u32::try_from(count).unwrap_or(0))
}

/// Per-run summaries for a request, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_search_runs(
    pool: &PgPool,
    request_id: Uuid,
) -> Result<Vec<SearchRunSummary>, DbError> {
    #[derive(sqlx::FromRow)]
    struct SummaryRow {
        level: i32,
        candidate_count: i32,
        excluded_count: i32,
        created_at: DateTime<Utc>,
    }

    let rows = sqlx::query_as::<_, SummaryRow>(
        "SELECT level, jsonb_array_length(fingerprints)::int AS candidate_count, \
                excluded_count, created_at \
         FROM search_runs WHERE request_id = $1 ORDER BY level ASC",
    )
    .bind(request_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| SearchRunSummary {
            level: r.level,
            candidate_count: r.candidate_count,
            excluded_count: r.excluded_count,
            created_at: r.created_at,
        })
        .collect())
}

/// Every fingerprint from every committed run for a request, oldest run
/// first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure, or [`DbError::Serialization`]
/// if a stored fingerprint list no longer deserializes.
pub async fn load_fingerprint_history(
    pool: &PgPool,
    request_id: Uuid,
) -> Result<Vec<CandidateFingerprint>, DbError> {
    let rows = sqlx::query_as::<_, SearchRunRow>(
        "SELECT id, request_id, level, fingerprints, excluded_count, created_at \
         FROM search_runs WHERE request_id = $1 ORDER BY level ASC",
    )
    .bind(request_id)
    .fetch_all(pool)
    .await?;

    let mut history = Vec::new();
    for row in rows {
        history.extend(row.fingerprints()?);
    }
    Ok(history)
}
