//! HTTP clients for the engine's external collaborators: reverse geocoding,
//! aerial pool detection, and imagery assets.
//!
//! Each client wraps `reqwest` with typed errors, retry with back-off, and a
//! `new(base_url, ..)` constructor that tests point at a wiremock server.
//! The clients implement the engine's collaborator traits, translating
//! [`ProviderError`] into the engine's timeout/unavailable split.

pub mod error;
pub mod geocoding;
pub mod imagery;
pub mod pools;
mod retry;

use proploc_core::AppConfig;
use proploc_engine::error::CollaboratorError;

pub use error::ProviderError;
pub use geocoding::GeocodingClient;
pub use imagery::ImageryClient;
pub use pools::PoolDetectionClient;

/// Transport settings shared by every collaborator client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl ClientOptions {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.collaborator_timeout_secs,
            user_agent: config.collaborator_user_agent.clone(),
            max_retries: config.collaborator_max_retries,
            backoff_base_ms: config.collaborator_retry_backoff_base_secs * 1_000,
        }
    }
}

/// The three production clients, wired from one [`AppConfig`].
pub struct Collaborators {
    pub geocoder: GeocodingClient,
    pub detector: PoolDetectionClient,
    pub imagery: ImageryClient,
}

impl Collaborators {
    /// # Errors
    ///
    /// Propagates the first client construction failure.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let options = ClientOptions::from_config(config);
        Ok(Self {
            geocoder: GeocodingClient::new(&config.geocoder_base_url, &options)?,
            detector: PoolDetectionClient::new(&config.pool_detector_base_url, &options)?,
            imagery: ImageryClient::new(
                &config.imagery_base_url,
                config.imagery_api_key.as_deref(),
                &options,
            )?,
        })
    }
}

/// Map a provider failure onto the engine's collaborator error split: only a
/// transport timeout counts as a timeout; everything else reads as the
/// service being unavailable for this call.
pub(crate) fn to_collaborator(service: &'static str, err: &ProviderError) -> CollaboratorError {
    match err {
        ProviderError::Http(e) if e.is_timeout() => CollaboratorError::Timeout { service },
        other => CollaboratorError::Unavailable {
            service,
            reason: other.to_string(),
        },
    }
}
