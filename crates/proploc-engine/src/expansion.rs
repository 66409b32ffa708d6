//! Staged expansion policy for relances.
//!
//! A small state machine keyed by the number of search runs already completed
//! for the request. Each level derives a fresh zone around the original
//! centre — the caller's zone is never mutated — with non-decreasing radii
//! and increasing sampling density, up to a terminal level that covers the
//! whole administrative area.

use proploc_core::model::SearchZone;
use proploc_core::SearchPolicy;

/// Parameters for the next probing pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbePlan {
    /// Level of the run this pass will produce (0 = original search).
    pub level: i32,
    pub zone: SearchZone,
    pub point_target: usize,
}

/// Outcome of planning: either probe with these parameters, or the request
/// has used up its relance budget.
#[derive(Debug, Clone, PartialEq)]
pub enum PassPlan {
    Probe(ProbePlan),
    Exhausted,
}

/// Select zone and density for the next pass.
///
/// `completed_runs` is the number of runs already persisted for the request.
/// Levels beyond 3 reuse the level-3 parameters; requests past the relance
/// cap get the explicit `Exhausted` signal instead of growing unbounded.
#[must_use]
pub fn plan_pass(base: &SearchZone, completed_runs: u32, policy: &SearchPolicy) -> PassPlan {
    if completed_runs > policy.max_relances {
        return PassPlan::Exhausted;
    }

    #[allow(clippy::cast_possible_wrap)]
    let level = completed_runs as i32;

    let level1_radius = base.radius_m + policy.level1_radius_increment_m;
    let level2_radius = policy.level2_radius_m.max(level1_radius);
    let level3_radius = policy.level3_radius_m.max(level2_radius);

    let (radius_m, point_target) = match completed_runs {
        0 => (base.radius_m, policy.base_point_target),
        1 => (level1_radius, policy.level1_point_target),
        2 => (level2_radius, policy.level2_point_target),
        _ => (level3_radius, policy.level3_point_target),
    };

    PassPlan::Probe(ProbePlan {
        level,
        zone: SearchZone {
            center: base.center,
            radius_m,
            postal_code: base.postal_code.clone(),
            city: base.city.clone(),
        },
        point_target,
    })
}
