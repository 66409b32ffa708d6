//! HTTP client for the aerial pool-detection service.

use std::future::Future;
use std::time::Duration;

use proploc_core::model::{GeoPoint, PoolObservation};
use proploc_engine::error::CollaboratorError;
use proploc_engine::traits::PoolDetector;
use reqwest::{Client, Url};
use serde::Serialize;

use crate::error::ProviderError;
use crate::retry::retry_with_backoff;
use crate::{to_collaborator, ClientOptions};

const SERVICE: &str = "pool-detection";

pub struct PoolDetectionClient {
    client: Client,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

#[derive(Serialize)]
struct DetectRequest {
    lat: f64,
    lng: f64,
}

impl PoolDetectionClient {
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ProviderError::InvalidBaseUrl`] for an
    /// unparseable base URL.
    pub fn new(base_url: &str, options: &ClientOptions) -> Result<Self, ProviderError> {
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
            max_retries: options.max_retries,
            backoff_base_ms: options.backoff_base_ms,
        })
    }

    /// Ask the detector whether a pool is visible at this coordinate.
    ///
    /// # Errors
    ///
    /// [`ProviderError::Http`], [`ProviderError::UnexpectedStatus`] or
    /// [`ProviderError::Deserialize`] on transport, status or body problems.
    pub async fn detect_at(&self, point: GeoPoint) -> Result<PoolObservation, ProviderError> {
        let url = self
            .base_url
            .join("v1/detect")
            .map_err(|e| ProviderError::InvalidBaseUrl {
                url: format!("{}v1/detect", self.base_url),
                reason: e.to_string(),
            })?;
        let body = DetectRequest {
            lat: point.lat,
            lng: point.lng,
        };

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            let body = &body;
            async move {
                let response = self.client.post(url).json(body).send().await?;
                let status = response.status();
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(ProviderError::UnexpectedStatus {
                        service: SERVICE,
                        status: status.as_u16(),
                        body: text,
                    });
                }
                let text = response.text().await?;
                serde_json::from_str(&text).map_err(|e| ProviderError::Deserialize {
                    context: "pool detection v1/detect".to_owned(),
                    source: e,
                })
            }
        })
        .await
    }
}

impl PoolDetector for PoolDetectionClient {
    fn detect(
        &self,
        point: GeoPoint,
    ) -> impl Future<Output = Result<PoolObservation, CollaboratorError>> + Send {
        async move {
            self.detect_at(point)
                .await
                .map_err(|e| to_collaborator(SERVICE, &e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options() -> ClientOptions {
        ClientOptions {
            timeout_secs: 5,
            user_agent: "proploc-test/0.1".to_owned(),
            max_retries: 0,
            backoff_base_ms: 0,
        }
    }

    #[tokio::test]
    async fn detect_parses_a_full_observation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/detect"))
            .and(body_json(json!({ "lat": 43.5804, "lng": 7.1251 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pool_visible": true,
                "confidence": 0.92,
                "shape": "rectangular",
                "area_m2": 32.5,
                "position": "south",
                "color": "blue",
            })))
            .mount(&server)
            .await;

        let client = PoolDetectionClient::new(&server.uri(), &options()).expect("client");
        let obs = client
            .detect_at(GeoPoint {
                lat: 43.5804,
                lng: 7.1251,
            })
            .await
            .expect("detect");
        assert!(obs.pool_visible);
        assert!(obs.has_traits());
        assert_eq!(obs.shape.as_deref(), Some("rectangular"));
    }

    #[tokio::test]
    async fn detect_tolerates_a_visibility_only_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/detect"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pool_visible": false,
                "confidence": 0.4,
            })))
            .mount(&server)
            .await;

        let client = PoolDetectionClient::new(&server.uri(), &options()).expect("client");
        let obs = client
            .detect_at(GeoPoint { lat: 0.0, lng: 0.0 })
            .await
            .expect("detect");
        assert!(!obs.pool_visible);
        assert!(!obs.has_traits());
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/detect"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad coordinates"))
            .expect(1)
            .mount(&server)
            .await;

        let mut opts = options();
        opts.max_retries = 3;
        let client = PoolDetectionClient::new(&server.uri(), &opts).expect("client");
        let err = client
            .detect_at(GeoPoint { lat: 0.0, lng: 0.0 })
            .await
            .expect_err("422 must fail");
        assert!(matches!(
            err,
            ProviderError::UnexpectedStatus { status: 422, .. }
        ));
    }
}
