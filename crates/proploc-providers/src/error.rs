use thiserror::Error;

/// Errors returned by the external-collaborator HTTP clients.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a status the client does not accept.
    #[error("{service} answered HTTP {status}: {body}")]
    UnexpectedStatus {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The response body could not be deserialized into the expected shape.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl ProviderError {
    /// True for failures worth another attempt after a back-off delay:
    /// network-level trouble and 5xx answers. Client-side errors (4xx,
    /// malformed bodies, bad configuration) are returned immediately.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            ProviderError::UnexpectedStatus { status, .. } => (500..600).contains(status),
            ProviderError::Deserialize { .. } | ProviderError::InvalidBaseUrl { .. } => false,
        }
    }
}
