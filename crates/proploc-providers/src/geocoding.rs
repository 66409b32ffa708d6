//! HTTP client for the national address geocoding API.
//!
//! The API speaks `GeoJSON`: both `/reverse/` and `/search/` answer with a
//! `FeatureCollection` whose features carry the address label, postcode, city
//! and a precision `type`. Only street-level precision (`housenumber` or
//! `street`) is accepted; coarser matches (municipality, locality) resolve to
//! nothing rather than to a misleading address.

use std::future::Future;
use std::time::Duration;

use proploc_core::model::{GeoPoint, ResolvedAddress, SearchZone};
use proploc_engine::error::CollaboratorError;
use proploc_engine::traits::ReverseGeocoder;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::ProviderError;
use crate::retry::retry_with_backoff;
use crate::{to_collaborator, ClientOptions};

const SERVICE: &str = "address-resolution";

/// Client for the reverse-geocoding and address-search endpoints.
///
/// Use [`GeocodingClient::new`] with the configured base URL, or point it at
/// a wiremock server in tests.
#[derive(Debug)]
pub struct GeocodingClient {
    client: Client,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl GeocodingClient {
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

        // Normalise: exactly one trailing slash so joined paths extend the
        // base instead of replacing its last segment.
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

    /// Resolve a coordinate to the nearest street-level address, if any.
    ///
    /// # Errors
    ///
    /// [`ProviderError::Http`], [`ProviderError::UnexpectedStatus`] or
    /// [`ProviderError::Deserialize`] on transport, status or body problems.
    pub async fn reverse_point(
        &self,
        point: GeoPoint,
    ) -> Result<Option<ResolvedAddress>, ProviderError> {
        let collection = self
            .get_features(
                "reverse/",
                &[
                    ("lat", point.lat.to_string()),
                    ("lon", point.lng.to_string()),
                    ("limit", "5".to_owned()),
                ],
            )
            .await?;
        Ok(collection.features.into_iter().find_map(street_level))
    }

    /// Generic addresses near the zone centre, for fallback padding.
    ///
    /// The query term is the zone's city (or postcode) so the API stays close
    /// to the administrative area while the lat/lon bias keeps results near
    /// the centre.
    ///
    /// # Errors
    ///
    /// As [`GeocodingClient::reverse_point`].
    pub async fn search_addresses(
        &self,
        zone: &SearchZone,
        limit: usize,
    ) -> Result<Vec<ResolvedAddress>, ProviderError> {
        let query = zone
            .city
            .clone()
            .or_else(|| zone.postal_code.clone())
            .unwrap_or_else(|| "adresse".to_owned());
        let collection = self
            .get_features(
                "search/",
                &[
                    ("q", query),
                    ("lat", zone.center.lat.to_string()),
                    ("lon", zone.center.lng.to_string()),
                    ("limit", limit.max(1).to_string()),
                ],
            )
            .await?;
        Ok(collection
            .features
            .into_iter()
            .filter_map(street_level)
            .collect())
    }

    async fn get_features(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<FeatureCollection, ProviderError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ProviderError::InvalidBaseUrl {
                url: format!("{}{path}", self.base_url),
                reason: e.to_string(),
            })?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self.client.get(url).send().await?;
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
                    context: format!("geocoding {path}"),
                    source: e,
                })
            }
        })
        .await
    }
}

impl ReverseGeocoder for GeocodingClient {
    fn reverse(
        &self,
        point: GeoPoint,
    ) -> impl Future<Output = Result<Option<ResolvedAddress>, CollaboratorError>> + Send {
        async move {
            self.reverse_point(point)
                .await
                .map_err(|e| to_collaborator(SERVICE, &e))
        }
    }

    fn search_near(
        &self,
        zone: &SearchZone,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ResolvedAddress>, CollaboratorError>> + Send {
        async move {
            self.search_addresses(zone, limit)
                .await
                .map_err(|e| to_collaborator(SERVICE, &e))
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: FeatureProperties,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct FeatureProperties {
    label: String,
    #[serde(default)]
    postcode: Option<String>,
    #[serde(default)]
    city: Option<String>,
    /// Precision of the match: `housenumber`, `street`, `locality`,
    /// `municipality`.
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// `[longitude, latitude]`, per `GeoJSON`.
    coordinates: [f64; 2],
}

/// Keep only street-level features carrying a full administrative address.
fn street_level(feature: Feature) -> Option<ResolvedAddress> {
    if feature.properties.kind != "housenumber" && feature.properties.kind != "street" {
        return None;
    }
    Some(ResolvedAddress {
        label: feature.properties.label,
        postal_code: feature.properties.postcode?,
        city: feature.properties.city?,
        coords: GeoPoint {
            lat: feature.geometry.coordinates[1],
            lng: feature.geometry.coordinates[0],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options() -> ClientOptions {
        ClientOptions {
            timeout_secs: 5,
            user_agent: "proploc-test/0.1".to_owned(),
            max_retries: 0,
            backoff_base_ms: 0,
        }
    }

    fn feature(kind: &str, label: &str) -> serde_json::Value {
        json!({
            "properties": {
                "label": label,
                "postcode": "06600",
                "city": "Antibes",
                "type": kind,
            },
            "geometry": { "coordinates": [7.1251, 43.5804] },
        })
    }

    #[tokio::test]
    async fn reverse_returns_the_first_street_level_feature() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse/"))
            .and(query_param("lat", "43.5804"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "features": [
                    feature("municipality", "Antibes"),
                    feature("housenumber", "8 Chemin des Sables 06600 Antibes"),
                ]
            })))
            .mount(&server)
            .await;

        let client = GeocodingClient::new(&server.uri(), &options()).expect("client");
        let resolved = client
            .reverse_point(GeoPoint {
                lat: 43.5804,
                lng: 7.1251,
            })
            .await
            .expect("reverse")
            .expect("street-level match");
        assert_eq!(resolved.label, "8 Chemin des Sables 06600 Antibes");
        assert_eq!(resolved.postal_code, "06600");
        assert!((resolved.coords.lat - 43.5804).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn reverse_without_street_level_match_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "features": [feature("municipality", "Antibes")]
            })))
            .mount(&server)
            .await;

        let client = GeocodingClient::new(&server.uri(), &options()).expect("client");
        let resolved = client
            .reverse_point(GeoPoint {
                lat: 43.58,
                lng: 7.12,
            })
            .await
            .expect("reverse");
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn reverse_with_empty_feature_list_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "features": [] })))
            .mount(&server)
            .await;

        let client = GeocodingClient::new(&server.uri(), &options()).expect("client");
        let resolved = client
            .reverse_point(GeoPoint { lat: 0.0, lng: 0.0 })
            .await
            .expect("reverse");
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn search_filters_to_street_level_features() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/"))
            .and(query_param("q", "Antibes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "features": [
                    feature("street", "Avenue de la Gare 06600 Antibes"),
                    feature("locality", "Les Semboules"),
                    feature("housenumber", "2 Rue du Port 06600 Antibes"),
                ]
            })))
            .mount(&server)
            .await;

        let client = GeocodingClient::new(&server.uri(), &options()).expect("client");
        let zone = SearchZone {
            center: GeoPoint {
                lat: 43.5804,
                lng: 7.1251,
            },
            radius_m: 500.0,
            postal_code: Some("06600".to_owned()),
            city: Some("Antibes".to_owned()),
        };
        let found = client.search_addresses(&zone, 10).await.expect("search");
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn server_error_surfaces_as_unexpected_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = GeocodingClient::new(&server.uri(), &options()).expect("client");
        let err = client
            .reverse_point(GeoPoint { lat: 0.0, lng: 0.0 })
            .await
            .expect_err("503 must fail");
        assert!(matches!(
            err,
            ProviderError::UnexpectedStatus { status: 503, .. }
        ));
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse/"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/reverse/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "features": [feature("housenumber", "8 Chemin des Sables 06600 Antibes")]
            })))
            .mount(&server)
            .await;

        let mut opts = options();
        opts.max_retries = 2;
        let client = GeocodingClient::new(&server.uri(), &opts).expect("client");
        let resolved = client
            .reverse_point(GeoPoint {
                lat: 43.58,
                lng: 7.12,
            })
            .await
            .expect("retried call");
        assert!(resolved.is_some());
    }

    #[tokio::test]
    async fn invalid_base_url_is_rejected_up_front() {
        let err = GeocodingClient::new("not a url", &options()).expect_err("invalid URL");
        assert!(matches!(err, ProviderError::InvalidBaseUrl { .. }));
    }
}
