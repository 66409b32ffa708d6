//! Candidate probing: bounded concurrent resolution of sample points.
//!
//! One probing pass fans the grid queue out over a fixed-size worker pool.
//! Each worker runs a fully synchronous sequence per point (resolve address,
//! maybe detect pool) and shares only a claimed-address set and a kept-count
//! with its peers. Once the kept-count reaches the configured maximum,
//! in-flight workers finish their current point but new points are skipped —
//! a cooperative short-circuit, not a cancellation.
//!
//! A single point's failure never aborts the batch: it is logged and skipped.
//! Only a collaborator that errors on every call and succeeds on none fails
//! the whole pass.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::stream::{self, StreamExt};
use proploc_core::model::{GeoPoint, PoolObservation, ResolvedAddress};
use proploc_core::SearchPolicy;

use crate::error::{CollaboratorError, EngineError};
use crate::traits::{PoolDetector, ReverseGeocoder};

/// A sample point that survived probing: a street-level address, plus the
/// pool observation when the signature demanded one.
#[derive(Debug, Clone)]
pub struct ProbedPoint {
    pub address: ResolvedAddress,
    pub pool: Option<PoolObservation>,
}

/// Per-pass bookkeeping, for logging and the fallback decision.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProbeStats {
    /// Points actually probed (excludes short-circuited queue entries).
    pub probed: usize,
    pub kept: usize,
    pub no_address: usize,
    pub no_pool: usize,
    pub duplicate_address: usize,
    pub failed: usize,
    /// Queue entries skipped after the kept-count cap was reached.
    pub short_circuited: usize,
}

enum ProbeOutcome {
    Kept(ProbedPoint),
    NoAddress,
    NoPool,
    Duplicate,
    GeocoderFailed(CollaboratorError),
    DetectorFailed(CollaboratorError),
    ShortCircuited,
}

/// Probe every grid point through the collaborators.
///
/// The queue order is the grid order; completion order is not guaranteed.
/// Within the batch, the first point to claim an address wins and later
/// duplicates are dropped.
///
/// # Errors
///
/// Returns [`EngineError::CollaboratorUnavailable`] when the geocoder — or
/// the pool detector, on passes that require one — errored on every call it
/// received and succeeded on none. Timeouts are point-local failures and do
/// not count toward unavailability.
pub async fn probe_points<G, P>(
    geocoder: &G,
    detector: &P,
    points: &[GeoPoint],
    requires_pool: bool,
    policy: &SearchPolicy,
) -> Result<(Vec<ProbedPoint>, ProbeStats), EngineError>
where
    G: ReverseGeocoder,
    P: PoolDetector,
{
    let claimed: Mutex<HashSet<String>> = Mutex::new(HashSet::new());
    let kept_count = AtomicUsize::new(0);
    let max_kept = policy.max_probed_candidates.max(1);

    let outcomes: Vec<ProbeOutcome> = stream::iter(points.iter().copied())
        .map(|point| {
            let claimed = &claimed;
            let kept_count = &kept_count;
            async move {
                if kept_count.load(Ordering::SeqCst) >= max_kept {
                    return ProbeOutcome::ShortCircuited;
                }

                let resolved = match geocoder.reverse(point).await {
                    Ok(Some(address)) => address,
                    Ok(None) => return ProbeOutcome::NoAddress,
                    Err(e) => {
                        tracing::warn!(
                            lat = point.lat,
                            lng = point.lng,
                            error = %e,
                            "address resolution failed for point — skipping"
                        );
                        return ProbeOutcome::GeocoderFailed(e);
                    }
                };

                // First occurrence of an address wins within the batch.
                let newly_claimed = claimed
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .insert(resolved.label.clone());
                if !newly_claimed {
                    return ProbeOutcome::Duplicate;
                }

                let pool = if requires_pool {
                    match detector.detect(resolved.coords).await {
                        Ok(obs) if obs.pool_visible => Some(obs),
                        Ok(_) => return ProbeOutcome::NoPool,
                        Err(e) => {
                            tracing::warn!(
                                address = %resolved.label,
                                error = %e,
                                "pool detection failed for point — skipping"
                            );
                            return ProbeOutcome::DetectorFailed(e);
                        }
                    }
                } else {
                    None
                };

                // Reserve a slot; losers of the race past the cap are treated
                // as short-circuited.
                if kept_count.fetch_add(1, Ordering::SeqCst) >= max_kept {
                    return ProbeOutcome::ShortCircuited;
                }
                ProbeOutcome::Kept(ProbedPoint {
                    address: resolved,
                    pool,
                })
            }
        })
        .buffer_unordered(policy.probe_concurrency.max(1))
        .collect()
        .await;

    summarize(outcomes, requires_pool)
}

/// Fold the per-point outcomes into kept points and stats, and decide whether
/// a collaborator was down for the entire batch.
fn summarize(
    outcomes: Vec<ProbeOutcome>,
    requires_pool: bool,
) -> Result<(Vec<ProbedPoint>, ProbeStats), EngineError> {
    let mut kept = Vec::new();
    let mut stats = ProbeStats::default();
    let mut geocoder_ok = 0usize;
    let mut geocoder_down: Option<String> = None;
    let mut geocoder_down_count = 0usize;
    let mut detector_ok = 0usize;
    let mut detector_down: Option<String> = None;
    let mut detector_down_count = 0usize;

    for outcome in outcomes {
        match outcome {
            ProbeOutcome::ShortCircuited => {
                stats.short_circuited += 1;
                continue;
            }
            _ => stats.probed += 1,
        }
        match outcome {
            ProbeOutcome::Kept(point) => {
                geocoder_ok += 1;
                if point.pool.is_some() {
                    detector_ok += 1;
                }
                stats.kept += 1;
                kept.push(point);
            }
            ProbeOutcome::NoAddress => {
                geocoder_ok += 1;
                stats.no_address += 1;
            }
            ProbeOutcome::NoPool => {
                geocoder_ok += 1;
                detector_ok += 1;
                stats.no_pool += 1;
            }
            ProbeOutcome::Duplicate => {
                geocoder_ok += 1;
                stats.duplicate_address += 1;
            }
            ProbeOutcome::GeocoderFailed(e) => {
                stats.failed += 1;
                if let CollaboratorError::Unavailable { reason, .. } = e {
                    geocoder_down_count += 1;
                    geocoder_down.get_or_insert(reason);
                }
            }
            ProbeOutcome::DetectorFailed(e) => {
                geocoder_ok += 1;
                stats.failed += 1;
                if let CollaboratorError::Unavailable { reason, .. } = e {
                    detector_down_count += 1;
                    detector_down.get_or_insert(reason);
                }
            }
            ProbeOutcome::ShortCircuited => unreachable!("handled above"),
        }
    }

    if geocoder_ok == 0 {
        if let Some(reason) = geocoder_down {
            tracing::error!(
                failures = geocoder_down_count,
                "address resolution errored on every probe — failing the pass"
            );
            return Err(EngineError::CollaboratorUnavailable {
                service: "address-resolution",
                reason,
            });
        }
    }
    if requires_pool && detector_ok == 0 {
        if let Some(reason) = detector_down {
            tracing::error!(
                failures = detector_down_count,
                "pool detection errored on every probe — failing the pass"
            );
            return Err(EngineError::CollaboratorUnavailable {
                service: "pool-detection",
                reason,
            });
        }
    }

    tracing::info!(
        probed = stats.probed,
        kept = stats.kept,
        no_address = stats.no_address,
        no_pool = stats.no_pool,
        duplicates = stats.duplicate_address,
        failed = stats.failed,
        short_circuited = stats.short_circuited,
        "probing pass finished"
    );

    Ok((kept, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::sync::atomic::AtomicUsize;

    struct ScriptedGeocoder {
        calls: AtomicUsize,
        /// Addresses per call index; `None` = street level not found.
        fail_all: bool,
        timeout_all: bool,
        duplicate_label: bool,
    }

    impl ScriptedGeocoder {
        fn resolving() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_all: false,
                timeout_all: false,
                duplicate_label: false,
            }
        }
    }

    impl ReverseGeocoder for ScriptedGeocoder {
        fn reverse(
            &self,
            point: GeoPoint,
        ) -> impl Future<Output = Result<Option<ResolvedAddress>, CollaboratorError>> + Send
        {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let fail_all = self.fail_all;
            let timeout_all = self.timeout_all;
            let duplicate_label = self.duplicate_label;
            async move {
                if fail_all {
                    return Err(CollaboratorError::Unavailable {
                        service: "address-resolution",
                        reason: "connection refused".to_string(),
                    });
                }
                if timeout_all {
                    return Err(CollaboratorError::Timeout {
                        service: "address-resolution",
                    });
                }
                let label = if duplicate_label {
                    "1 Rue Unique 75001 Paris".to_string()
                } else {
                    format!("{} Rue des Essais 75001 Paris", n + 1)
                };
                Ok(Some(ResolvedAddress {
                    label,
                    postal_code: "75001".to_string(),
                    city: "Paris".to_string(),
                    coords: point,
                }))
            }
        }

        fn search_near(
            &self,
            _zone: &proploc_core::model::SearchZone,
            _limit: usize,
        ) -> impl Future<Output = Result<Vec<ResolvedAddress>, CollaboratorError>> + Send
        {
            async { Ok(Vec::new()) }
        }
    }

    struct ScriptedDetector {
        visible: bool,
        fail_all: bool,
    }

    impl PoolDetector for ScriptedDetector {
        fn detect(
            &self,
            _point: GeoPoint,
        ) -> impl Future<Output = Result<PoolObservation, CollaboratorError>> + Send {
            let visible = self.visible;
            let fail_all = self.fail_all;
            async move {
                if fail_all {
                    return Err(CollaboratorError::Unavailable {
                        service: "pool-detection",
                        reason: "502 Bad Gateway".to_string(),
                    });
                }
                Ok(PoolObservation {
                    pool_visible: visible,
                    confidence: 0.9,
                    shape: None,
                    area_m2: None,
                    position: None,
                    color: None,
                })
            }
        }
    }

    fn points(n: usize) -> Vec<GeoPoint> {
        #[allow(clippy::cast_precision_loss)]
        let points = (0..n)
            .map(|i| GeoPoint {
                lat: 48.85 + i as f64 * 0.001,
                lng: 2.35,
            })
            .collect();
        points
    }

    fn policy() -> SearchPolicy {
        SearchPolicy::default()
    }

    #[tokio::test]
    async fn keeps_resolved_points_without_pool_requirement() {
        let geocoder = ScriptedGeocoder::resolving();
        let detector = ScriptedDetector {
            visible: false,
            fail_all: false,
        };
        let (kept, stats) = probe_points(&geocoder, &detector, &points(5), false, &policy())
            .await
            .expect("probe");
        assert_eq!(kept.len(), 5);
        assert_eq!(stats.kept, 5);
        assert!(kept.iter().all(|p| p.pool.is_none()));
    }

    #[tokio::test]
    async fn drops_points_where_no_pool_is_detected() {
        let geocoder = ScriptedGeocoder::resolving();
        let detector = ScriptedDetector {
            visible: false,
            fail_all: false,
        };
        let (kept, stats) = probe_points(&geocoder, &detector, &points(5), true, &policy())
            .await
            .expect("probe");
        assert!(kept.is_empty());
        assert_eq!(stats.no_pool, 5);
    }

    #[tokio::test]
    async fn deduplicates_addresses_within_the_batch() {
        let mut geocoder = ScriptedGeocoder::resolving();
        geocoder.duplicate_label = true;
        let detector = ScriptedDetector {
            visible: true,
            fail_all: false,
        };
        let (kept, stats) = probe_points(&geocoder, &detector, &points(6), false, &policy())
            .await
            .expect("probe");
        assert_eq!(kept.len(), 1, "first occurrence wins");
        assert_eq!(stats.duplicate_address, 5);
    }

    #[tokio::test]
    async fn short_circuits_once_the_cap_is_reached() {
        let geocoder = ScriptedGeocoder::resolving();
        let detector = ScriptedDetector {
            visible: true,
            fail_all: false,
        };
        let mut policy = policy();
        policy.max_probed_candidates = 3;
        let (kept, stats) = probe_points(&geocoder, &detector, &points(40), false, &policy)
            .await
            .expect("probe");
        assert_eq!(kept.len(), 3);
        assert!(
            stats.short_circuited > 0,
            "expected skipped queue entries, stats: {stats:?}"
        );
    }

    #[tokio::test]
    async fn geocoder_down_for_whole_batch_fails_the_pass() {
        let mut geocoder = ScriptedGeocoder::resolving();
        geocoder.fail_all = true;
        let detector = ScriptedDetector {
            visible: true,
            fail_all: false,
        };
        let result = probe_points(&geocoder, &detector, &points(5), false, &policy()).await;
        assert!(matches!(
            result,
            Err(EngineError::CollaboratorUnavailable {
                service: "address-resolution",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn timeouts_alone_do_not_fail_the_pass() {
        let mut geocoder = ScriptedGeocoder::resolving();
        geocoder.timeout_all = true;
        let detector = ScriptedDetector {
            visible: true,
            fail_all: false,
        };
        let (kept, stats) = probe_points(&geocoder, &detector, &points(5), false, &policy())
            .await
            .expect("timeouts are point-local failures");
        assert!(kept.is_empty());
        assert_eq!(stats.failed, 5);
    }

    #[tokio::test]
    async fn detector_down_for_whole_batch_fails_a_pool_pass() {
        let geocoder = ScriptedGeocoder::resolving();
        let detector = ScriptedDetector {
            visible: true,
            fail_all: true,
        };
        let result = probe_points(&geocoder, &detector, &points(5), true, &policy()).await;
        assert!(matches!(
            result,
            Err(EngineError::CollaboratorUnavailable {
                service: "pool-detection",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn detector_down_is_ignored_when_no_pool_is_required() {
        let geocoder = ScriptedGeocoder::resolving();
        let detector = ScriptedDetector {
            visible: true,
            fail_all: true,
        };
        let (kept, _) = probe_points(&geocoder, &detector, &points(5), false, &policy())
            .await
            .expect("detector is not consulted");
        assert_eq!(kept.len(), 5);
    }
}
