use thiserror::Error;
use uuid::Uuid;

/// Failure of a single external collaborator call.
///
/// A [`CollaboratorError::Timeout`] is always a point-local problem (skip the
/// point, keep probing). [`CollaboratorError::Unavailable`] counts toward the
/// whole-batch failure detection in the prober: a service that errors on every
/// call and succeeds on none fails the pass.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{service} call timed out")]
    Timeout { service: &'static str },

    #[error("{service} unavailable: {reason}")]
    Unavailable {
        service: &'static str,
        reason: String,
    },
}

/// Failure of the fingerprint store / request repository.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("localisation request {0} not found")]
    RequestNotFound(Uuid),

    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// The zone is missing or degenerate. Rejected before any probing starts
    /// and never retried automatically.
    #[error("invalid search zone: {reason}")]
    InvalidZone { reason: String },

    /// An external service was unreachable for an entire probing pass. No
    /// partial run is persisted; the caller may retry the whole call.
    #[error("collaborator {service} unavailable for the whole pass: {reason}")]
    CollaboratorUnavailable {
        service: &'static str,
        reason: String,
    },

    #[error("localisation request {0} not found")]
    RequestNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}
