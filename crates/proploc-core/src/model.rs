//! Domain model for the localisation engine.
//!
//! These types cross every crate boundary: the engine produces them, the
//! providers resolve them, the database persists the fingerprint projection,
//! and the server serializes them to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo;

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// The zone one probing pass samples: a centre, a radius, and optional
/// administrative hints. Immutable per pass — the expansion controller derives
/// a fresh zone for each relance level instead of mutating the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchZone {
    pub center: GeoPoint,
    pub radius_m: f64,
    pub postal_code: Option<String>,
    pub city: Option<String>,
}

impl SearchZone {
    /// Returns the reason this zone cannot be probed, if any.
    ///
    /// A zone is degenerate when its radius is not strictly positive or its
    /// centre is off the globe.
    #[must_use]
    pub fn degenerate_reason(&self) -> Option<String> {
        if !self.radius_m.is_finite() || self.radius_m <= 0.0 {
            return Some(format!("radius must be positive, got {}", self.radius_m));
        }
        if !(-90.0..=90.0).contains(&self.center.lat)
            || !(-180.0..=180.0).contains(&self.center.lng)
        {
            return Some(format!(
                "center ({}, {}) is outside valid coordinates",
                self.center.lat, self.center.lng
            ));
        }
        None
    }
}

/// Structured description of the target property, produced once per request
/// by the external image-understanding collaborator. Read-only input to
/// scoring and fingerprinting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualSignature {
    pub has_pool: bool,
    #[serde(default)]
    pub pool_shape: Option<String>,
    #[serde(default)]
    pub pool_size_m2: Option<f64>,
    #[serde(default)]
    pub pool_color: Option<String>,
    #[serde(default)]
    pub pool_position: Option<String>,
    #[serde(default)]
    pub roof_material: Option<String>,
    #[serde(default)]
    pub roof_color: Option<String>,
    #[serde(default)]
    pub roof_shape: Option<String>,
    #[serde(default)]
    pub facade_color: Option<String>,
    #[serde(default)]
    pub facade_material: Option<String>,
    #[serde(default)]
    pub vegetation: Vec<String>,
    #[serde(default)]
    pub notable_features: Vec<String>,
    /// Extractor-reported confidence in the signature as a whole, 0–100.
    pub confidence: u8,
}

impl VisualSignature {
    /// Whether candidates must show a visible pool to survive probing.
    #[must_use]
    pub fn requires_pool(&self) -> bool {
        self.has_pool
    }

    /// True when any roof attribute was extracted.
    #[must_use]
    pub fn has_roof_details(&self) -> bool {
        self.roof_material.is_some() || self.roof_color.is_some() || self.roof_shape.is_some()
    }
}

/// A street-level address resolved from a sampled coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    /// Full display label, e.g. `"8 Rue des Lilas 75019 Paris"`.
    pub label: String,
    pub postal_code: String,
    pub city: String,
    /// Coordinates of the resolved address, which may differ slightly from
    /// the sampled point.
    pub coords: GeoPoint,
}

/// Best-effort answer from the aerial pool detector for one point.
///
/// The trait fields are optional: older detector deployments report only
/// visibility. When present they feed the candidate's pool fingerprint hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolObservation {
    pub pool_visible: bool,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f32,
    #[serde(default)]
    pub shape: Option<String>,
    #[serde(default)]
    pub area_m2: Option<f64>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl PoolObservation {
    /// True when the detector reported any distinguishing pool trait.
    #[must_use]
    pub fn has_traits(&self) -> bool {
        self.shape.is_some()
            || self.area_m2.is_some()
            || self.position.is_some()
            || self.color.is_some()
    }
}

/// Imagery references used to enrich presented candidates. Never consumed by
/// scoring or exclusion logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualAssets {
    pub satellite_url: Option<String>,
    pub street_view_url: Option<String>,
    pub cadastre_url: Option<String>,
    pub parcel_id: Option<String>,
}

/// Per-signal sub-scores, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub architecture: u8,
    pub pool: u8,
    pub vegetation: u8,
    pub parcel: u8,
    pub orientation: u8,
    pub context: u8,
}

/// A ranked candidate address. Created during a probing pass and never
/// mutated afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub coords: GeoPoint,
    /// Global confidence, 0–100.
    pub score: u8,
    pub breakdown: ScoreBreakdown,
    /// Human-readable summary of the signals behind the score. Descriptive
    /// metadata only.
    pub explanation: String,
    #[serde(default)]
    pub assets: Option<VisualAssets>,
    /// True for padding addresses added when too few genuine matches survive
    /// exclusion.
    #[serde(default)]
    pub is_fallback: bool,
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    /// A box extending `half_size_m` metres from `center` in each direction.
    #[must_use]
    pub fn around(center: GeoPoint, half_size_m: f64) -> Self {
        let dlat = geo::meters_to_lat_degrees(half_size_m);
        let dlng = geo::meters_to_lng_degrees(half_size_m, center.lat);
        Self {
            north: center.lat + dlat,
            south: center.lat - dlat,
            east: center.lng + dlng,
            west: center.lng - dlng,
        }
    }
}

/// Compact, comparable projection of a surfaced candidate, written once per
/// candidate and read back to exclude repeats on later passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFingerprint {
    pub coords: GeoPoint,
    pub bbox: BoundingBox,
    pub score: u8,
    #[serde(default)]
    pub pool_hash: Option<String>,
    #[serde(default)]
    pub roof_hash: Option<String>,
    #[serde(default)]
    pub parcel_id: Option<String>,
}

/// One completed probing pass, ready to append to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSearchRun {
    /// 0 for the original search, incremented once per relance.
    pub level: i32,
    pub fingerprints: Vec<CandidateFingerprint>,
    pub excluded_count: i32,
}

/// Persisted summary of a search run, for request inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRunSummary {
    pub level: i32,
    pub candidate_count: i32,
    pub excluded_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a localisation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Active,
    Exhausted,
}

impl RequestStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Active => "active",
            RequestStatus::Exhausted => "exhausted",
        }
    }

    /// Parse the database representation. Unknown values map to `Active` so
    /// a forward-migrated status never bricks reads.
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "exhausted" => RequestStatus::Exhausted,
            _ => RequestStatus::Active,
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
