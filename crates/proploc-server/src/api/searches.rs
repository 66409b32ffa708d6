//! Handlers for the localisation search endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use proploc_core::model::{Candidate, GeoPoint, SearchRunSummary, SearchZone, VisualSignature};
use proploc_engine::{BatchOutcome, MoreOutcome, SearchBatch};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{map_db_error, map_engine_error, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub(super) struct CreateSearchRequest {
    zone: ZoneBody,
    signature: VisualSignature,
    #[serde(default)]
    user_hints: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct ZoneBody {
    lat: f64,
    lng: f64,
    radius_m: f64,
    #[serde(default)]
    postal_code: Option<String>,
    #[serde(default)]
    city: Option<String>,
}

impl ZoneBody {
    fn into_zone(self) -> SearchZone {
        SearchZone {
            center: GeoPoint {
                lat: self.lat,
                lng: self.lng,
            },
            radius_m: self.radius_m,
            postal_code: self.postal_code,
            city: self.city,
        }
    }

    fn from_zone(zone: &SearchZone) -> Self {
        Self {
            lat: zone.center.lat,
            lng: zone.center.lng,
            radius_m: zone.radius_m,
            postal_code: zone.postal_code.clone(),
            city: zone.city.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct BatchBody {
    request_id: Uuid,
    level: i32,
    outcome: &'static str,
    excluded_count: usize,
    candidates: Vec<Candidate>,
}

impl BatchBody {
    fn from_batch(batch: SearchBatch) -> Self {
        let outcome = match batch.outcome {
            BatchOutcome::Matches => "matches",
            BatchOutcome::FallbackOnly => "fallback_only",
            BatchOutcome::Empty => "empty",
        };
        Self {
            request_id: batch.request_id,
            level: batch.level,
            outcome,
            excluded_count: batch.excluded_count,
            candidates: batch.candidates,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct MoreBody {
    request_id: Uuid,
    exhausted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    batch: Option<BatchBody>,
}

#[derive(Debug, Serialize)]
pub(super) struct SearchDetail {
    id: Uuid,
    zone: ZoneBody,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_hints: Option<String>,
    created_at: DateTime<Utc>,
    runs: Vec<SearchRunSummary>,
}

/// `POST /api/v1/searches` — create a request and run its first pass.
pub(super) async fn create_search(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateSearchRequest>,
) -> impl IntoResponse {
    let zone = body.zone.into_zone();
    match state
        .engine
        .start_search(&zone, &body.signature, body.user_hints.as_deref())
        .await
    {
        Ok(batch) => (
            StatusCode::CREATED,
            Json(ApiResponse {
                data: BatchBody::from_batch(batch),
                meta: ResponseMeta::new(req_id.0),
            }),
        )
            .into_response(),
        Err(e) => map_engine_error(req_id.0, &e).into_response(),
    }
}

/// `POST /api/v1/searches/{id}/more` — run the next relance.
pub(super) async fn request_more(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.engine.request_more(id).await {
        Ok(MoreOutcome::Batch(batch)) => Json(ApiResponse {
            data: MoreBody {
                request_id: id,
                exhausted: false,
                batch: Some(BatchBody::from_batch(batch)),
            },
            meta: ResponseMeta::new(req_id.0),
        })
        .into_response(),
        Ok(MoreOutcome::Exhausted) => Json(ApiResponse {
            data: MoreBody {
                request_id: id,
                exhausted: true,
                batch: None,
            },
            meta: ResponseMeta::new(req_id.0),
        })
        .into_response(),
        Err(e) => map_engine_error(req_id.0, &e).into_response(),
    }
}

/// `GET /api/v1/searches/{id}` — request status and per-run summaries.
pub(super) async fn get_search(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let row = match proploc_db::get_localisation_request(&state.pool, id).await {
        Ok(Some(row)) => row,
        Ok(None) => {
            return super::ApiError::new(
                req_id.0,
                "not_found",
                format!("localisation request {id} not found"),
            )
            .into_response()
        }
        Err(e) => return map_db_error(req_id.0, &e).into_response(),
    };

    let runs = match proploc_db::list_search_runs(&state.pool, id).await {
        Ok(runs) => runs,
        Err(e) => return map_db_error(req_id.0, &e).into_response(),
    };

    Json(ApiResponse {
        data: SearchDetail {
            id: row.id,
            zone: ZoneBody::from_zone(&row.zone()),
            status: row.status.clone(),
            user_hints: row.user_hints.clone(),
            created_at: row.created_at,
            runs,
        },
        meta: ResponseMeta::new(req_id.0),
    })
    .into_response()
}
