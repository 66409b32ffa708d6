//! Database operations for the `localisation_requests` table.

use chrono::{DateTime, Utc};
use proploc_core::model::{GeoPoint, RequestStatus, SearchZone, VisualSignature};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `localisation_requests` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LocalisationRequestRow {
    pub id: Uuid,
    pub center_lat: f64,
    pub center_lng: f64,
    pub radius_m: f64,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub signature: serde_json::Value,
    pub user_hints: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LocalisationRequestRow {
    /// The search zone the request was created with.
    #[must_use]
    pub fn zone(&self) -> SearchZone {
        SearchZone {
            center: GeoPoint {
                lat: self.center_lat,
                lng: self.center_lng,
            },
            radius_m: self.radius_m,
            postal_code: self.postal_code.clone(),
            city: self.city.clone(),
        }
    }

    /// Deserialize the stored visual signature.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] when the stored JSON no longer
    /// matches the signature shape.
    pub fn signature(&self) -> Result<VisualSignature, DbError> {
        Ok(serde_json::from_value(self.signature.clone())?)
    }

    #[must_use]
    pub fn status(&self) -> RequestStatus {
        RequestStatus::from_str_lossy(&self.status)
    }
}

/// Inserts a new request in `active` status and returns the full row.
///
/// The id is generated in Rust so callers can log it before the insert
/// commits.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, or
/// [`DbError::Serialization`] if the signature cannot be serialized.
pub async fn create_localisation_request(
    pool: &PgPool,
    zone: &SearchZone,
    signature: &VisualSignature,
    user_hints: Option<&str>,
) -> Result<LocalisationRequestRow, DbError> {
    let id = Uuid::new_v4();
    let signature_json = serde_json::to_value(signature)?;

    let row = sqlx::query_as::<_, LocalisationRequestRow>(
        "INSERT INTO localisation_requests \
             (id, center_lat, center_lng, radius_m, postal_code, city, signature, user_hints) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING id, center_lat, center_lng, radius_m, postal_code, city, signature, \
                   user_hints, status, created_at, updated_at",
    )
    .bind(id)
    .bind(zone.center.lat)
    .bind(zone.center.lng)
    .bind(zone.radius_m)
    .bind(zone.postal_code.as_deref())
    .bind(zone.city.as_deref())
    .bind(signature_json)
    .bind(user_hints)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches one request by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_localisation_request(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<LocalisationRequestRow>, DbError> {
    let row = sqlx::query_as::<_, LocalisationRequestRow>(
        "SELECT id, center_lat, center_lng, radius_m, postal_code, city, signature, \
                user_hints, status, created_at, updated_at \
         FROM localisation_requests WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Marks a request as `exhausted`. Idempotent for already-exhausted requests.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown id, or [`DbError::Sqlx`] if
/// the update fails.
pub async fn mark_request_exhausted(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE localisation_requests \
         SET status = $2, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(RequestStatus::Exhausted.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
