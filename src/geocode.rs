//! Exchange location geocoding (Google Geocoding API)

use crate::error::AgentError;
use crate::models::{GeoLocation, Notice};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Raw geocoder answer: the provider status plus any results.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeResult {
    pub formatted_address: String,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<GeocodeResponse>;
}

pub struct GoogleGeocoder {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            api_key,
            base_url: GOOGLE_GEOCODE_URL.to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeocodeResponse> {
        debug!(%address, "Geocoding address");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| AgentError::Geocoding(format!("request failed: {}", e)))?;

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| AgentError::Geocoding(format!("invalid response: {}", e)))
    }
}

pub fn maps_link(lat: f64, lng: f64) -> String {
    format!("https://www.google.com/maps?q={},{}", lat, lng)
}

pub struct LocationResolver {
    geocoder: Arc<dyn Geocoder>,
}

impl LocationResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { geocoder }
    }

    /// Geocode `address`. Any failure yields `None` plus a notice.
    pub async fn resolve(&self, address: &str, notices: &mut Vec<Notice>) -> Option<GeoLocation> {
        let response = match self.geocoder.geocode(address).await {
            Ok(response) => response,
            Err(e) => {
                error!("Geocoding failed: {}", e);
                notices.push(Notice::error(format!("Error with geocoding: {}", e)));
                return None;
            }
        };

        if response.status != "OK" {
            warn!(status = %response.status, "Geocoding returned non-OK status");
            notices.push(Notice::warning(format!(
                "Geocoding API returned status: {}",
                response.status
            )));
            return None;
        }

        let Some(first) = response.results.into_iter().next() else {
            warn!("Geocoding returned OK with no results");
            notices.push(Notice::warning("Geocoding API returned no results"));
            return None;
        };

        let LatLng { lat, lng } = first.geometry.location;
        info!(lat, lng, "Resolved exchange location");

        Some(GeoLocation {
            link: maps_link(lat, lng),
            lat,
            lng,
            formatted_address: first.formatted_address,
        })
    }
}
