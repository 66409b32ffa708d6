//! Image-driven property localisation engine.
//!
//! Given a visual signature of a property and an approximate search zone, the
//! engine samples the zone, resolves candidate street addresses through the
//! external collaborators, scores them against the signature, filters out
//! everything already surfaced for the request, and returns a ranked batch.
//! Repeated "more" requests widen the zone through a staged escalation policy
//! and never re-show a previously surfaced candidate.
//!
//! All I/O goes through the traits in [`traits`]; the engine itself holds no
//! global state and no concrete client.

pub mod error;
pub mod exclusion;
pub mod expansion;
pub mod grid;
pub mod prober;
pub mod ranking;
pub mod scorer;
pub mod search;
pub mod traits;

pub use error::{CollaboratorError, EngineError, StoreError};
pub use exclusion::{filter_candidates, should_exclude, ExclusionRule, FilterOutcome};
pub use expansion::{plan_pass, PassPlan, ProbePlan};
pub use grid::generate_grid;
pub use ranking::select;
pub use scorer::score_candidate;
pub use search::{BatchOutcome, MoreOutcome, SearchBatch, SearchEngine};
pub use traits::{ImageryProvider, PoolDetector, RequestRepository, ReverseGeocoder, StoredRequest};
