use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{GoogleError, Result};

const BASE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    pub short_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Clone, Deserialize)]
struct RawResult {
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<RawResult>,
}

/// Best match for a geocoded address.
#[derive(Debug, Clone)]
pub struct GeocodeResult {
    pub location: LatLng,
    pub formatted_address: Option<String>,
    pub components: Vec<AddressComponent>,
}

impl GeocodeResult {
    /// First component tagged with `kind`, e.g. `locality` or `postal_code`.
    pub fn component(&self, kind: &str) -> Option<&AddressComponent> {
        self.components
            .iter()
            .find(|c| c.types.iter().any(|t| t == kind))
    }
}

pub struct GeocodingClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeocodingClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: crate::http_client(),
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Geocode a free-form address. Only the first (best) result is returned.
    pub async fn geocode(&self, address: &str) -> Result<GeocodeResult> {
        debug!(address, "Geocoding address");

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GoogleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GeocodeResponse = resp.json().await?;
        if body.status != "OK" {
            return Err(GoogleError::Status {
                status: body.status,
                message: body.error_message.unwrap_or_default(),
            });
        }

        let first = body
            .results
            .into_iter()
            .next()
            .ok_or_else(|| GoogleError::Parse("OK status without results".to_string()))?;

        info!(
            address,
            lat = first.geometry.location.lat,
            lng = first.geometry.location.lng,
            "Geocoded address"
        );

        Ok(GeocodeResult {
            location: first.geometry.location,
            formatted_address: first.formatted_address,
            components: first.address_components,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const SPRINGFIELD: &str = r#"{
        "status": "OK",
        "results": [{
            "formatted_address": "100 S 2nd St, Springfield, IL 62701, USA",
            "address_components": [
                { "long_name": "Springfield", "short_name": "Springfield", "types": ["locality", "political"] },
                { "long_name": "Sangamon County", "short_name": "Sangamon County", "types": ["administrative_area_level_2", "political"] },
                { "long_name": "Illinois", "short_name": "IL", "types": ["administrative_area_level_1", "political"] },
                { "long_name": "62701", "short_name": "62701", "types": ["postal_code"] }
            ],
            "geometry": { "location": { "lat": 39.8017, "lng": -89.6437 } }
        }]
    }"#;

    #[tokio::test]
    async fn geocode_returns_first_result() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("address".into(), "100 S 2nd St, Springfield, IL 62701".into()),
                Matcher::UrlEncoded("key".into(), "geo-key".into()),
            ]))
            .with_status(200)
            .with_body(SPRINGFIELD)
            .expect(1)
            .create_async()
            .await;

        let client = GeocodingClient::new("geo-key").with_base_url(format!("{}/", server.url()));
        let result = client
            .geocode("100 S 2nd St, Springfield, IL 62701")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.location.lat, 39.8017);
        assert_eq!(result.component("administrative_area_level_1").unwrap().short_name, "IL");
        assert_eq!(result.component("locality").unwrap().long_name, "Springfield");
        assert!(result.component("sublocality_level_1").is_none());
    }

    #[tokio::test]
    async fn zero_results_is_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"ZERO_RESULTS","results":[]}"#)
            .create_async()
            .await;

        let client = GeocodingClient::new("geo-key").with_base_url(format!("{}/", server.url()));
        match client.geocode("nowhere").await {
            Err(GoogleError::Status { status, .. }) => assert_eq!(status, "ZERO_RESULTS"),
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn denied_request_carries_message() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"REQUEST_DENIED","error_message":"The provided API key is invalid."}"#)
            .create_async()
            .await;

        let client = GeocodingClient::new("bad").with_base_url(format!("{}/", server.url()));
        let err = client.geocode("x").await.unwrap_err();
        assert!(err.to_string().contains("API key is invalid"));
    }
}
