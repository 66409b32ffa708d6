//! Centralized search policy.
//!
//! Every tuning constant of the localisation engine lives here: expansion
//! radii, sampling densities, result-set bounds, and prober limits. The
//! expansion controller and ranking stage consume this structure instead of
//! scattering magic numbers inline.

const DEFAULT_MAX_RESULTS: usize = 10;
const DEFAULT_MIN_GENUINE_RESULTS: usize = 3;
const DEFAULT_MAX_RELANCES: u32 = 3;

const DEFAULT_LEVEL1_RADIUS_INCREMENT_M: f64 = 150.0;
const DEFAULT_LEVEL2_RADIUS_M: f64 = 2_000.0;
const DEFAULT_LEVEL3_RADIUS_M: f64 = 5_000.0;

const DEFAULT_BASE_POINT_TARGET: usize = 40;
const DEFAULT_LEVEL1_POINT_TARGET: usize = 60;
const DEFAULT_LEVEL2_POINT_TARGET: usize = 90;
const DEFAULT_LEVEL3_POINT_TARGET: usize = 120;

const DEFAULT_PROBE_CONCURRENCY: usize = 8;
const DEFAULT_MAX_PROBED_CANDIDATES: usize = 25;

/// Tuning knobs for probing passes and result selection.
///
/// Defaults implement the documented escalation policy: a first pass at the
/// requested radius, +150 m on the first relance, 2 km on the second, 5 km on
/// the third and any beyond, capped at 3 relances total.
#[derive(Debug, Clone, Copy)]
pub struct SearchPolicy {
    /// Maximum candidates returned per batch.
    pub max_results: usize,
    /// Below this many genuine survivors, the batch is padded with fallback
    /// addresses.
    pub min_genuine_results: usize,
    /// Hard cap on "more" requests for one localisation request.
    pub max_relances: u32,
    /// Radius added to the original zone at relance level 1.
    pub level1_radius_increment_m: f64,
    /// Fixed radius at relance level 2 (floored by the level-1 radius).
    pub level2_radius_m: f64,
    /// Terminal radius at relance level 3 and beyond.
    pub level3_radius_m: f64,
    /// Grid point target at level 0 (the original search).
    pub base_point_target: usize,
    /// Grid point target at relance level 1.
    pub level1_point_target: usize,
    /// Grid point target at relance level 2.
    pub level2_point_target: usize,
    /// Grid point target at relance level 3 and beyond.
    pub level3_point_target: usize,
    /// Size of the bounded worker pool for one probing pass.
    pub probe_concurrency: usize,
    /// Cooperative short-circuit: workers stop pulling new points once this
    /// many candidates have been kept.
    pub max_probed_candidates: usize,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            min_genuine_results: DEFAULT_MIN_GENUINE_RESULTS,
            max_relances: DEFAULT_MAX_RELANCES,
            level1_radius_increment_m: DEFAULT_LEVEL1_RADIUS_INCREMENT_M,
            level2_radius_m: DEFAULT_LEVEL2_RADIUS_M,
            level3_radius_m: DEFAULT_LEVEL3_RADIUS_M,
            base_point_target: DEFAULT_BASE_POINT_TARGET,
            level1_point_target: DEFAULT_LEVEL1_POINT_TARGET,
            level2_point_target: DEFAULT_LEVEL2_POINT_TARGET,
            level3_point_target: DEFAULT_LEVEL3_POINT_TARGET,
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
            max_probed_candidates: DEFAULT_MAX_PROBED_CANDIDATES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_has_documented_defaults() {
        let policy = SearchPolicy::default();

        assert_eq!(policy.max_results, 10);
        assert_eq!(policy.min_genuine_results, 3);
        assert_eq!(policy.max_relances, 3);
        assert!((policy.level1_radius_increment_m - 150.0).abs() < f64::EPSILON);
        assert!((policy.level2_radius_m - 2_000.0).abs() < f64::EPSILON);
        assert!((policy.level3_radius_m - 5_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_targets_increase_with_level() {
        let policy = SearchPolicy::default();
        assert!(policy.base_point_target < policy.level1_point_target);
        assert!(policy.level1_point_target < policy.level2_point_target);
        assert!(policy.level2_point_target < policy.level3_point_target);
    }
}
