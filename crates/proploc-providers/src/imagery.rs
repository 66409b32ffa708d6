//! HTTP client for the visual-assets service (satellite, street-level and
//! cadastral imagery references).

use std::future::Future;
use std::time::Duration;

use proploc_core::model::{GeoPoint, VisualAssets};
use proploc_engine::error::CollaboratorError;
use proploc_engine::traits::ImageryProvider;
use reqwest::{Client, Url};

use crate::error::ProviderError;
use crate::retry::retry_with_backoff;
use crate::{to_collaborator, ClientOptions};

const SERVICE: &str = "imagery";

pub struct ImageryClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl ImageryClient {
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ProviderError::InvalidBaseUrl`] for an
    /// unparseable base URL.
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        options: &ClientOptions,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(options.user_agent.clone())
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| ProviderError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.map(str::to_owned),
            max_retries: options.max_retries,
            backoff_base_ms: options.backoff_base_ms,
        })
    }

    /// Fetch imagery references for a candidate's coordinates.
    ///
    /// # Errors
    ///
    /// [`ProviderError::Http`], [`ProviderError::UnexpectedStatus`] or
    /// [`ProviderError::Deserialize`] on transport, status or body problems.
    pub async fn assets_at(&self, point: GeoPoint) -> Result<VisualAssets, ProviderError> {
        let mut url = self
            .base_url
            .join("v1/assets")
            .map_err(|e| ProviderError::InvalidBaseUrl {
                url: format!("{}v1/assets", self.base_url),
                reason: e.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("lat", &point.lat.to_string())
            .append_pair("lng", &point.lng.to_string());

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let mut request = self.client.get(url);
                if let Some(key) = &self.api_key {
                    request = request.header("x-api-key", key);
                }
                let response = request.send().await?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(ProviderError::UnexpectedStatus {
                        service: SERVICE,
                        status: status.as_u16(),
                        body,
                    });
                }
                let body = response.text().await?;
                serde_json::from_str(&body).map_err(|e| ProviderError::Deserialize {
                    context: "imagery v1/assets".to_owned(),
                    source: e,
                })
            }
        })
        .await
    }
}

impl ImageryProvider for ImageryClient {
    fn assets(
        &self,
        point: GeoPoint,
    ) -> impl Future<Output = Result<VisualAssets, CollaboratorError>> + Send {
        async move {
            self.assets_at(point)
                .await
                .map_err(|e| to_collaborator(SERVICE, &e))
        }
    }
}
