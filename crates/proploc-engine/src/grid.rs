//! Sample-point generation for one probing pass.
//!
//! Points are laid out as concentric rings around the zone centre, with
//! per-ring counts proportional to circumference so areal coverage stays
//! roughly uniform, plus the centre itself. A small jitter breaks the
//! regularity so repeated passes at widened radii do not all sample the exact
//! same street corners; the jitter is seeded from the inputs, so the same
//! `(center, radius, count)` always yields the same point set.

use std::hash::{DefaultHasher, Hash, Hasher};

use proploc_core::geo;
use proploc_core::model::GeoPoint;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::EngineError;

/// Fraction of the inter-ring spacing used as maximum radial jitter.
const RADIAL_JITTER_FRACTION: f64 = 0.25;

/// Generate a deterministic set of sample coordinates covering the zone.
///
/// `target_count` is a soft target: the returned set has approximately that
/// many points (the ring arithmetic may land one or two off). Every point is
/// guaranteed to lie within `radius_m` of `center`.
///
/// # Errors
///
/// Returns [`EngineError::InvalidZone`] for a non-positive or non-finite
/// radius, or a zero target count. A positive radius never yields a silent
/// empty set.
pub fn generate_grid(
    center: GeoPoint,
    radius_m: f64,
    target_count: usize,
) -> Result<Vec<GeoPoint>, EngineError> {
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return Err(EngineError::InvalidZone {
            reason: format!("grid radius must be positive, got {radius_m}"),
        });
    }
    if target_count == 0 {
        return Err(EngineError::InvalidZone {
            reason: "grid target count must be positive".to_string(),
        });
    }

    let mut rng = StdRng::seed_from_u64(grid_seed(center, radius_m, target_count));

    let mut points = Vec::with_capacity(target_count);
    points.push(center);
    if target_count == 1 {
        return Ok(points);
    }

    // Ring k of K carries a share of the remaining points proportional to k,
    // matching the growth of ring circumference with radius.
    let remaining = target_count - 1;
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let ring_count = ((remaining as f64 / 2.0).sqrt().ceil() as usize).max(1);
    #[allow(clippy::cast_precision_loss)]
    let per_unit = remaining as f64 / (ring_count * (ring_count + 1) / 2) as f64;
    #[allow(clippy::cast_precision_loss)]
    let ring_step = radius_m / ring_count as f64;

    for ring in 1..=ring_count {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ring_points = ((per_unit * ring as f64).round() as usize).max(1);
        #[allow(clippy::cast_precision_loss)]
        let ring_radius = ring_step * ring as f64;
        let start_angle = rng.random_range(0.0..std::f64::consts::TAU);

        for i in 0..ring_points {
            #[allow(clippy::cast_precision_loss)]
            let angle =
                start_angle + std::f64::consts::TAU * i as f64 / ring_points as f64;
            let jitter = rng.random_range(-1.0..1.0) * ring_step * RADIAL_JITTER_FRACTION;
            // Jitter must never push a point outside the zone.
            let r = (ring_radius + jitter).clamp(0.0, radius_m * 0.999);
            points.push(geo::offset(center, r * angle.cos(), r * angle.sin()));
        }
    }

    Ok(points)
}

/// Stable seed from the grid inputs. Bit-level hashing keeps the seed exact
/// for any representable `f64` input.
fn grid_seed(center: GeoPoint, radius_m: f64, target_count: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    center.lat.to_bits().hash(&mut hasher);
    center.lng.to_bits().hash(&mut hasher);
    radius_m.to_bits().hash(&mut hasher);
    target_count.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARIS: GeoPoint = GeoPoint {
        lat: 48.8566,
        lng: 2.3522,
    };

    #[test]
    fn identical_inputs_yield_identical_points() {
        let a = generate_grid(PARIS, 500.0, 40).expect("grid");
        let b = generate_grid(PARIS, 500.0, 40).expect("grid");
        assert_eq!(a, b);
    }

    #[test]
    fn different_radius_yields_different_points() {
        let a = generate_grid(PARIS, 500.0, 40).expect("grid");
        let b = generate_grid(PARIS, 650.0, 40).expect("grid");
        assert_ne!(a, b);
    }

    #[test]
    fn every_point_lies_within_the_radius() {
        let radius = 500.0;
        let points = generate_grid(PARIS, radius, 80).expect("grid");
        for p in &points {
            let d = geo::haversine_m(PARIS, *p);
            assert!(d <= radius + 1.0, "point {p:?} is {d} m from center");
        }
    }

    #[test]
    fn point_count_is_close_to_target() {
        for target in [10, 40, 120] {
            let points = generate_grid(PARIS, 1_000.0, target).expect("grid");
            let delta = points.len().abs_diff(target);
            assert!(
                delta <= target / 5 + 2,
                "target {target}, got {}",
                points.len()
            );
        }
    }

    #[test]
    fn rings_give_areal_coverage_not_a_cluster() {
        let radius = 1_000.0;
        let points = generate_grid(PARIS, radius, 60).expect("grid");
        // At least one point in the inner half and one in the outer half.
        let inner = points
            .iter()
            .filter(|p| geo::haversine_m(PARIS, **p) < radius / 2.0)
            .count();
        let outer = points.len() - inner;
        assert!(inner > 0, "no inner-half coverage");
        assert!(outer > 0, "no outer-half coverage");
    }

    #[test]
    fn zero_radius_fails_loudly() {
        let result = generate_grid(PARIS, 0.0, 40);
        assert!(matches!(result, Err(EngineError::InvalidZone { .. })));
    }

    #[test]
    fn zero_target_fails_loudly() {
        let result = generate_grid(PARIS, 500.0, 0);
        assert!(matches!(result, Err(EngineError::InvalidZone { .. })));
    }

    #[test]
    fn target_of_one_returns_just_the_center() {
        let points = generate_grid(PARIS, 500.0, 1).expect("grid");
        assert_eq!(points, vec![PARIS]);
    }
}
