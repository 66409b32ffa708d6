//! Ranking and result-set selection.

use proploc_core::model::Candidate;

/// Score given to fallback padding when the batch has no genuine candidate to
/// undercut.
const ORPHAN_FALLBACK_SCORE: u8 = 20;

/// How far below the weakest genuine candidate a fallback lands.
const FALLBACK_SCORE_GAP: u8 = 10;

/// Sort candidates by global score descending and truncate to `max`.
///
/// `Vec::sort_by` is stable, so candidates with equal scores keep their
/// discovery order — output stays deterministic for a deterministic probe
/// queue.
#[must_use]
pub fn select(mut candidates: Vec<Candidate>, max: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates.truncate(max);
    candidates
}

/// Score to assign fallback padding so it ranks strictly below every genuine
/// candidate in the batch.
#[must_use]
pub fn fallback_score(genuine: &[Candidate]) -> u8 {
    genuine
        .iter()
        .filter(|c| !c.is_fallback)
        .map(|c| c.score)
        .min()
        .map_or(ORPHAN_FALLBACK_SCORE, |lowest| {
            lowest.saturating_sub(FALLBACK_SCORE_GAP).max(1)
        })
}
