pub mod app_config;
pub mod config;
pub mod geo;
pub mod model;
pub mod policy;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use model::{
    BoundingBox, Candidate, CandidateFingerprint, GeoPoint, PoolObservation, RequestStatus,
    ResolvedAddress, ScoreBreakdown, SearchRunSummary, SearchZone, VisualAssets, VisualSignature,
};
pub use policy::SearchPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
