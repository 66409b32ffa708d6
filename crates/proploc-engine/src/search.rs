//! Search orchestration: one entry point per user-facing operation.
//!
//! A pass is strictly sequential at the top level: plan the zone, sample it,
//! probe the points, enrich and score the survivors, filter against the
//! request's fingerprint history, rank, pad with fallbacks if the batch is
//! thin, then commit the run. Nothing is persisted until selection has
//! finished, so a failed pass leaves no partial run behind.

use std::collections::HashMap;

use proploc_core::model::{
    Candidate, CandidateFingerprint, NewSearchRun, PoolObservation, RequestStatus, SearchZone,
    VisualSignature,
};
use proploc_core::SearchPolicy;
use uuid::Uuid;

use crate::error::EngineError;
use crate::exclusion::{self, filter_candidates};
use crate::expansion::{plan_pass, PassPlan, ProbePlan};
use crate::grid::generate_grid;
use crate::prober::probe_points;
use crate::ranking;
use crate::scorer::score_candidate;
use crate::traits::{ImageryProvider, PoolDetector, RequestRepository, ReverseGeocoder};

/// What a completed pass produced, beyond the candidates themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// At least one genuine candidate survived exclusion.
    Matches,
    /// Only fallback padding; every genuine candidate was excluded or none
    /// resolved.
    FallbackOnly,
    /// Nothing at all, not even padding.
    Empty,
}

/// One ranked batch returned to the caller.
#[derive(Debug, Clone)]
pub struct SearchBatch {
    pub request_id: Uuid,
    /// 0 for the original search, incremented once per relance.
    pub level: i32,
    pub candidates: Vec<Candidate>,
    /// Candidates dropped because they were already surfaced for this request.
    pub excluded_count: usize,
    pub outcome: BatchOutcome,
}

/// Result of a "give me more" relance.
#[derive(Debug, Clone)]
pub enum MoreOutcome {
    Batch(SearchBatch),
    /// The request has used its relance budget; no further pass will run.
    Exhausted,
}

/// The localisation engine, generic over its collaborators and its store.
pub struct SearchEngine<G, P, I, R> {
    geocoder: G,
    detector: P,
    imagery: I,
    repo: R,
    policy: SearchPolicy,
}

impl<G, P, I, R> SearchEngine<G, P, I, R>
where
    G: ReverseGeocoder,
    P: PoolDetector,
    I: ImageryProvider,
    R: RequestRepository,
{
    pub fn new(geocoder: G, detector: P, imagery: I, repo: R, policy: SearchPolicy) -> Self {
        Self {
            geocoder,
            detector,
            imagery,
            repo,
            policy,
        }
    }

    /// The repository the engine was built with, for read-only inspection of
    /// requests outside a probing pass.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn geocoder(&self) -> &G {
        &self.geocoder
    }

    /// Start a new localisation request and run its level-0 pass.
    ///
    /// The request record is created before probing, so a pass that fails on
    /// a collaborator leaves a zero-run request behind; the next
    /// [`Self::request_more`] simply retries level 0.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidZone`] when the zone is degenerate;
    /// [`EngineError::CollaboratorUnavailable`] when a required collaborator
    /// was down for the whole pass; [`EngineError::Store`] on persistence
    /// failures.
    pub async fn start_search(
        &self,
        zone: &SearchZone,
        signature: &VisualSignature,
        user_hints: Option<&str>,
    ) -> Result<SearchBatch, EngineError> {
        if let Some(reason) = zone.degenerate_reason() {
            return Err(EngineError::InvalidZone { reason });
        }

        let request_id = self.repo.create(zone, signature, user_hints).await?;
        tracing::info!(
            request_id = %request_id,
            radius_m = zone.radius_m,
            "localisation request created"
        );

        // Zero completed runs always plans a level-0 probe.
        let PassPlan::Probe(plan) = plan_pass(zone, 0, &self.policy) else {
            return Err(EngineError::InvalidZone {
                reason: "search policy allows no probing pass".to_string(),
            });
        };

        self.run_pass(request_id, &plan, signature, user_hints, &[])
            .await
    }

    /// Run the next relance for an existing request.
    ///
    /// # Errors
    ///
    /// [`EngineError::RequestNotFound`] for an unknown id; otherwise as
    /// [`Self::start_search`].
    pub async fn request_more(&self, request_id: Uuid) -> Result<MoreOutcome, EngineError> {
        let request = self
            .repo
            .fetch(request_id)
            .await?
            .ok_or(EngineError::RequestNotFound(request_id))?;

        if request.status == RequestStatus::Exhausted {
            return Ok(MoreOutcome::Exhausted);
        }

        let plan = match plan_pass(&request.zone, request.completed_runs, &self.policy) {
            PassPlan::Probe(plan) => plan,
            PassPlan::Exhausted => {
                tracing::info!(
                    request_id = %request_id,
                    completed_runs = request.completed_runs,
                    "relance budget used up — marking request exhausted"
                );
                self.repo.mark_exhausted(request_id).await?;
                return Ok(MoreOutcome::Exhausted);
            }
        };

        let history = self.repo.history(request_id).await?;
        let batch = self
            .run_pass(
                request_id,
                &plan,
                &request.signature,
                request.user_hints.as_deref(),
                &history,
            )
            .await?;
        Ok(MoreOutcome::Batch(batch))
    }

    /// One probing pass: sample, probe, score, filter, rank, pad, commit.
    async fn run_pass(
        &self,
        request_id: Uuid,
        plan: &ProbePlan,
        signature: &VisualSignature,
        user_hints: Option<&str>,
        history: &[CandidateFingerprint],
    ) -> Result<SearchBatch, EngineError> {
        tracing::info!(
            request_id = %request_id,
            level = plan.level,
            radius_m = plan.zone.radius_m,
            point_target = plan.point_target,
            "starting probing pass"
        );

        let points = generate_grid(plan.zone.center, plan.zone.radius_m, plan.point_target)?;
        let (probed, _stats) = probe_points(
            &self.geocoder,
            &self.detector,
            &points,
            signature.requires_pool(),
            &self.policy,
        )
        .await?;

        let mut candidates = Vec::with_capacity(probed.len());
        let mut pools: Vec<Option<PoolObservation>> = Vec::with_capacity(probed.len());
        let mut pool_by_id: HashMap<Uuid, PoolObservation> = HashMap::new();

        for point in probed {
            // Imagery is presentation-only enrichment; a failed lookup never
            // drops the candidate.
            let assets = match self.imagery.assets(point.address.coords).await {
                Ok(assets) => Some(assets),
                Err(e) => {
                    tracing::warn!(
                        address = %point.address.label,
                        error = %e,
                        "imagery lookup failed — candidate kept without assets"
                    );
                    None
                }
            };

            let (score, breakdown, explanation) =
                score_candidate(signature, &point.address, point.pool.as_ref(), user_hints);
            let id = Uuid::new_v4();
            if let Some(obs) = &point.pool {
                pool_by_id.insert(id, obs.clone());
            }
            pools.push(point.pool);
            candidates.push(Candidate {
                id,
                address: point.address.label,
                postal_code: point.address.postal_code,
                city: point.address.city,
                coords: point.address.coords,
                score,
                breakdown,
                explanation,
                assets,
                is_fallback: false,
            });
        }

        let filtered = filter_candidates(candidates, &pools, history);
        let excluded_count = filtered.excluded_count();
        let mut ranked = ranking::select(filtered.survivors, self.policy.max_results);
        let genuine_count = ranked.len();

        if genuine_count < self.policy.min_genuine_results {
            let padding = self
                .pad_with_fallbacks(&plan.zone, &ranked, history)
                .await;
            ranked.extend(padding);
        }

        let fingerprints: Vec<CandidateFingerprint> = ranked
            .iter()
            .filter(|c| !c.is_fallback)
            .map(|c| exclusion::fingerprint(c, pool_by_id.get(&c.id)))
            .collect();
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let run = NewSearchRun {
            level: plan.level,
            fingerprints,
            excluded_count: excluded_count as i32,
        };
        self.repo.append_run(request_id, &run).await?;

        let outcome = if genuine_count > 0 {
            BatchOutcome::Matches
        } else if ranked.is_empty() {
            BatchOutcome::Empty
        } else {
            BatchOutcome::FallbackOnly
        };
        tracing::info!(
            request_id = %request_id,
            level = plan.level,
            genuine = genuine_count,
            fallbacks = ranked.len() - genuine_count,
            excluded = excluded_count,
            outcome = ?outcome,
            "probing pass committed"
        );

        Ok(SearchBatch {
            request_id,
            level: plan.level,
            candidates: ranked,
            excluded_count,
            outcome,
        })
    }

    /// Pad a thin batch with generic nearby addresses, ranked strictly below
    /// every genuine candidate. Best-effort: a failed lookup logs and pads
    /// nothing.
    async fn pad_with_fallbacks(
        &self,
        zone: &SearchZone,
        genuine: &[Candidate],
        history: &[CandidateFingerprint],
    ) -> Vec<Candidate> {
        let needed = self.policy.max_results.saturating_sub(genuine.len());
        if needed == 0 {
            return Vec::new();
        }

        // Over-fetch so exclusion and duplicate trimming still leave enough.
        let addresses = match self.geocoder.search_near(zone, needed * 2).await {
            Ok(addresses) => addresses,
            Err(e) => {
                tracing::warn!(error = %e, "fallback address lookup failed — batch stays thin");
                return Vec::new();
            }
        };

        let score = ranking::fallback_score(genuine);
        let breakdown = proploc_core::model::ScoreBreakdown {
            architecture: score,
            pool: score,
            vegetation: score,
            parcel: score,
            orientation: score,
            context: score,
        };

        let mut padding = Vec::with_capacity(needed);
        for address in addresses {
            if padding.len() >= needed {
                break;
            }
            if genuine.iter().any(|c| c.address == address.label) {
                continue;
            }
            let candidate = Candidate {
                id: Uuid::new_v4(),
                address: address.label,
                postal_code: address.postal_code,
                city: address.city,
                coords: address.coords,
                score,
                breakdown,
                explanation: format!(
                    "nearby address offered as a lead; no strong visual match ({score}/100)"
                ),
                assets: None,
                is_fallback: true,
            };
            // Fallbacks must not re-surface a previously shown address either.
            let fp = exclusion::fingerprint(&candidate, None);
            if exclusion::should_exclude(&fp, history).is_some() {
                continue;
            }
            padding.push(candidate);
        }
        padding
    }
}
