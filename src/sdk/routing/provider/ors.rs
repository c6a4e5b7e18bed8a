use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::Duration;

use super::types::{DirectionsResponse, GeoResponse};
use crate::sdk::config::ProviderConfig;
use crate::sdk::geo::Coordinate;
use crate::sdk::routing::error::{OrsErrorPayload, RoutingError, ORS_UNROUTABLE_POINT};
use crate::sdk::routing::route::{Directions, TravelMode};
use crate::sdk::routing::service::RoutingProvider;
use crate::sdk::util::rate_limit::Limiter;

pub const ORS_HOSTED_URL: &str = "https://api.openrouteservice.org";

/// openrouteservice, either the hosted API or a self-hosted instance.
///
/// The hosted flavour sends the api key and waits on the shared limiter;
/// a self-hosted instance is called directly.
pub struct OrsProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    limiter: Option<Limiter>,
}

impl OrsProvider {
    pub fn remote(api_key: String, limiter: Limiter) -> Result<Self, RoutingError> {
        Ok(Self {
            client: build_client()?,
            base_url: ORS_HOSTED_URL.to_string(),
            api_key: Some(api_key),
            limiter: Some(limiter),
        })
    }

    pub fn local(base_url: String) -> Result<Self, RoutingError> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            limiter: None,
        })
    }

    pub fn from_config(config: &ProviderConfig, limiter: Limiter) -> Result<Self, RoutingError> {
        match config {
            ProviderConfig::Remote { api_key } => Self::remote(api_key.clone(), limiter),
            ProviderConfig::Local { base_url } => Self::local(base_url.clone()),
        }
    }

    async fn wait_for_quota(&self, call: &str) {
        if let Some(limiter) = &self.limiter {
            log::debug!("Waiting for ORS limiter before {}...", call);
            limiter.until_ready().await;
        }
    }
}

fn build_client() -> Result<Client, RoutingError> {
    Ok(Client::builder().timeout(Duration::from_secs(15)).build()?)
}

#[async_trait]
impl RoutingProvider for OrsProvider {
    async fn geocode(&self, place: &str) -> Result<Coordinate, RoutingError> {
        self.wait_for_quota("geocode").await;
        log::debug!("[PROVIDER] Calling geocode for place: \"{}\"", place);

        let request = match &self.api_key {
            Some(key) => self
                .client
                .get(format!("{}/geocode/search", self.base_url))
                .query(&[("api_key", key.as_str()), ("text", place), ("size", "1")]),
            None => self
                .client
                .get(format!("{}/pelias/v1/search", self.base_url))
                .query(&[("text", place), ("size", "1")]),
        };
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(parse_error(status, &text));
        }
        parse_geocode(place, &text)
    }

    async fn directions(
        &self,
        start: Coordinate,
        end: Coordinate,
        mode: TravelMode,
    ) -> Result<Directions, RoutingError> {
        if start == end {
            log::debug!("Start and end coordinates are identical. Returning zero route.");
            return Ok(Directions {
                distance_m: 0.0,
                duration_s: 0.0,
                path: vec![start, end],
            });
        }

        self.wait_for_quota("directions").await;
        log::debug!(
            "[PROVIDER] Calling {} directions for {} -> {}",
            mode.profile(),
            start,
            end
        );
        let url = format!("{}/v2/directions/{}/geojson", self.base_url, mode.profile());
        let body = json!({ "coordinates": [start.to_lon_lat(), end.to_lon_lat()] });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", key);
        }
        let response = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                log::error!("Failed to send POST request. URL: {}\nError: {}", url, e);
                return Err(e.into());
            }
        };

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(parse_error(status, &text));
        }
        parse_directions(&text).map_err(|e| {
            log::error!("Failed to parse DirectionsResponse. URL: {}\nError: {}", url, e);
            e
        })
    }
}

pub(crate) fn parse_error(status: StatusCode, text: &str) -> RoutingError {
    // Try to parse the structured error first
    match serde_json::from_str::<OrsErrorPayload>(text) {
        Ok(payload) if payload.error.code == ORS_UNROUTABLE_POINT => RoutingError::UnroutablePoint,
        Ok(payload) => RoutingError::ApiError {
            code: payload.error.code,
            message: payload.error.message,
        },
        Err(_) => {
            log::error!(
                "API returned non-success status: {}. Unparseable Body: {}",
                status,
                text
            );
            RoutingError::RawApiError(format!("{}: {}", status, text))
        }
    }
}

pub(crate) fn parse_geocode(place: &str, text: &str) -> Result<Coordinate, RoutingError> {
    let resp: GeoResponse = serde_json::from_str(text)?;
    let coords = resp
        .features
        .first()
        .ok_or_else(|| RoutingError::PlaceNotFound(place.to_string()))?
        .geometry
        .coordinates;
    Ok(Coordinate::from_lon_lat(coords)?)
}

pub(crate) fn parse_directions(text: &str) -> Result<Directions, RoutingError> {
    let response: DirectionsResponse = serde_json::from_str(text)?;
    let feature = response
        .features
        .into_iter()
        .next()
        .ok_or_else(|| RoutingError::UnexpectedResponse("No route found in success response".to_string()))?;
    let path = feature
        .geometry
        .coordinates
        .into_iter()
        .map(Coordinate::from_lon_lat)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Directions {
        distance_m: feature.properties.summary.distance,
        duration_s: feature.properties.summary.duration,
        path,
    })
}
