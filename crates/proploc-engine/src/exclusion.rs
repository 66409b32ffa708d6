//! Exclusion filter: keeps relances from re-surfacing candidates.
//!
//! Five equivalence rules, applied in order; any one is sufficient to treat a
//! new candidate as a repeat of something already surfaced for the request.
//! The filter is a pure function of its inputs — persisting the fingerprints
//! of a completed run is a separate, explicit append performed by the
//! orchestrator.

use proploc_core::model::{Candidate, CandidateFingerprint, GeoPoint, PoolObservation};
use sha2::{Digest, Sha256};

/// Same-point threshold: 0.0001° on both axes is roughly 11 m.
const COORD_EPSILON_DEG: f64 = 0.0001;

/// Bounding-box edge threshold: 0.00045° is roughly 50 m.
const BBOX_EPSILON_DEG: f64 = 0.000_45;

/// Half-size of the synthetic bounding box recorded around a candidate whose
/// parcel footprint is unknown.
const DEFAULT_BBOX_HALF_M: f64 = 25.0;

/// Which equivalence rule matched, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionRule {
    CoordinateProximity,
    ParcelId,
    PoolHash,
    RoofHash,
    BboxSimilarity,
}

impl ExclusionRule {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExclusionRule::CoordinateProximity => "coordinate_proximity",
            ExclusionRule::ParcelId => "parcel_id",
            ExclusionRule::PoolHash => "pool_hash",
            ExclusionRule::RoofHash => "roof_hash",
            ExclusionRule::BboxSimilarity => "bbox_similarity",
        }
    }
}

/// One dropped candidate, for observability and tests.
#[derive(Debug, Clone)]
pub struct ExclusionEntry {
    pub address: String,
    pub coords: GeoPoint,
    pub rule: ExclusionRule,
}

/// Survivors plus a structured log of what was dropped and why.
#[derive(Debug)]
pub struct FilterOutcome {
    pub survivors: Vec<Candidate>,
    pub log: Vec<ExclusionEntry>,
}

impl FilterOutcome {
    #[must_use]
    pub fn excluded_count(&self) -> usize {
        self.log.len()
    }
}

/// Check one candidate fingerprint against the request history.
///
/// Returns the first rule that matches, in the documented order, or `None`
/// when the candidate is genuinely new.
#[must_use]
pub fn should_exclude(
    fp: &CandidateFingerprint,
    history: &[CandidateFingerprint],
) -> Option<ExclusionRule> {
    for prior in history {
        if coords_match(fp.coords, prior.coords) {
            return Some(ExclusionRule::CoordinateProximity);
        }
        if both_equal(&fp.parcel_id, &prior.parcel_id) {
            return Some(ExclusionRule::ParcelId);
        }
        if both_equal(&fp.pool_hash, &prior.pool_hash) {
            return Some(ExclusionRule::PoolHash);
        }
        if both_equal(&fp.roof_hash, &prior.roof_hash) {
            return Some(ExclusionRule::RoofHash);
        }
        if bboxes_match(fp, prior) {
            return Some(ExclusionRule::BboxSimilarity);
        }
    }
    None
}

/// Apply [`should_exclude`] to every candidate. Side-effect free: the caller
/// appends the surviving fingerprints after the run completes.
///
/// Each survivor's fingerprint joins the working history before the next
/// candidate is checked, so the rules also hold within a single batch: two
/// addresses on the same parcel probed in the same pass collapse to one.
#[must_use]
pub fn filter_candidates(
    candidates: Vec<Candidate>,
    pools: &[Option<PoolObservation>],
    history: &[CandidateFingerprint],
) -> FilterOutcome {
    debug_assert_eq!(candidates.len(), pools.len());

    let mut survivors = Vec::with_capacity(candidates.len());
    let mut kept: Vec<CandidateFingerprint> = Vec::new();
    let mut log = Vec::new();

    for (candidate, pool) in candidates.into_iter().zip(pools) {
        let fp = fingerprint(&candidate, pool.as_ref());
        match should_exclude(&fp, history).or_else(|| should_exclude(&fp, &kept)) {
            Some(rule) => {
                tracing::debug!(
                    address = %candidate.address,
                    rule = rule.as_str(),
                    "candidate excluded as already surfaced"
                );
                log.push(ExclusionEntry {
                    address: candidate.address,
                    coords: candidate.coords,
                    rule,
                });
            }
            None => {
                kept.push(fp);
                survivors.push(candidate);
            }
        }
    }

    FilterOutcome { survivors, log }
}

/// Build the durable fingerprint for a surfaced candidate.
///
/// The pool hash derives from the detector's observed traits (shape, surface,
/// position, color) when any were reported; a visibility-only observation
/// carries no hash. The roof hash is reserved for fingerprints recorded by
/// richer aerial analysis — the current detector does not report roof traits,
/// so new fingerprints leave it empty while the rule still honors history
/// rows that carry one.
#[must_use]
pub fn fingerprint(
    candidate: &Candidate,
    pool: Option<&PoolObservation>,
) -> CandidateFingerprint {
    CandidateFingerprint {
        coords: candidate.coords,
        bbox: proploc_core::model::BoundingBox::around(candidate.coords, DEFAULT_BBOX_HALF_M),
        score: candidate.score,
        pool_hash: pool.and_then(pool_observation_hash),
        roof_hash: None,
        parcel_id: candidate
            .assets
            .as_ref()
            .and_then(|a| a.parcel_id.clone()),
    }
}

/// SHA-256 over the normalized, `|`-joined observed pool traits.
#[must_use]
pub fn pool_observation_hash(obs: &PoolObservation) -> Option<String> {
    if !obs.has_traits() {
        return None;
    }
    let mut hasher = Sha256::new();
    hasher.update(normalize(obs.shape.as_deref()));
    hasher.update(b"|");
    hasher.update(obs.area_m2.map_or_else(String::new, |a| format!("{a:.1}")));
    hasher.update(b"|");
    hasher.update(normalize(obs.position.as_deref()));
    hasher.update(b"|");
    hasher.update(normalize(obs.color.as_deref()));
    Some(format!("{:x}", hasher.finalize()))
}

fn normalize(field: Option<&str>) -> String {
    field.map_or_else(String::new, |s| s.trim().to_lowercase())
}

fn coords_match(a: GeoPoint, b: GeoPoint) -> bool {
    (a.lat - b.lat).abs() < COORD_EPSILON_DEG && (a.lng - b.lng).abs() < COORD_EPSILON_DEG
}

fn both_equal(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}

fn bboxes_match(a: &CandidateFingerprint, b: &CandidateFingerprint) -> bool {
    (a.bbox.north - b.bbox.north).abs() < BBOX_EPSILON_DEG
        && (a.bbox.south - b.bbox.south).abs() < BBOX_EPSILON_DEG
        && (a.bbox.east - b.bbox.east).abs() < BBOX_EPSILON_DEG
        && (a.bbox.west - b.bbox.west).abs() < BBOX_EPSILON_DEG
}
