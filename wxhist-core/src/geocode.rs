//! Free-text location → coordinates.

use std::{collections::HashMap, fmt::Debug};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    Config,
    error::GeocodeError,
    model::Coordinates,
    provider::{http_client, truncate_body},
};

pub const OPEN_METEO_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com";

#[async_trait]
pub trait GeocodingResolver: Send + Sync + Debug {
    /// Resolve `location_name` to the first/best match.
    async fn resolve(&self, location_name: &str) -> Result<Coordinates, GeocodeError>;
}

/// Open-Meteo location search.
#[derive(Debug, Clone)]
pub struct OpenMeteoGeocoder {
    http: Client,
    base_url: String,
}

impl OpenMeteoGeocoder {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: OPEN_METEO_GEOCODING_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Option<Vec<SearchResult>>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
    name: Option<String>,
}

#[async_trait]
impl GeocodingResolver for OpenMeteoGeocoder {
    async fn resolve(&self, location_name: &str) -> Result<Coordinates, GeocodeError> {
        let name = location_name.trim();
        if name.is_empty() {
            return Err(GeocodeError::EmptyQuery);
        }

        let url = format!("{}/v1/search", self.base_url);
        info!(location = name, %url, "Requesting coordinates");

        let res = self
            .http
            .get(&url)
            .query(&[("name", name), ("count", "1")])
            .send()
            .await
            .map_err(|source| GeocodeError::Transport {
                location: name.to_string(),
                source,
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|source| GeocodeError::Transport {
            location: name.to_string(),
            source,
        })?;
        debug!(%status, "Geocoding response received");

        if !status.is_success() {
            return Err(GeocodeError::HttpStatus {
                location: name.to_string(),
                status,
                body: truncate_body(&body),
            });
        }

        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|e| GeocodeError::MalformedResponse {
                location: name.to_string(),
                reason: format!("invalid JSON: {e}"),
            })?;

        let first = parsed
            .results
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| {
                warn!(location = name, "Location not found in geocoding response");
                GeocodeError::LocationNotFound(name.to_string())
            })?;

        let (Some(latitude), Some(longitude)) = (first.latitude, first.longitude) else {
            return Err(GeocodeError::MalformedResponse {
                location: name.to_string(),
                reason: "first result lacks latitude/longitude".to_string(),
            });
        };

        let coords = Coordinates::new(latitude, longitude);
        info!(
            location = name,
            matched = first.name.as_deref().unwrap_or(name),
            %coords,
            "Resolved coordinates"
        );
        Ok(coords)
    }
}

/// Open-Meteo geocoder honouring `geocoding_url` and `http_timeout_secs`.
pub fn geocoder_from_config(config: &Config) -> anyhow::Result<Box<dyn GeocodingResolver>> {
    let http = http_client(config.http_timeout()).context("Failed to build HTTP client")?;
    let geocoder = OpenMeteoGeocoder::new(http);
    Ok(Box::new(match config.geocoding_url.as_deref() {
        Some(url) => geocoder.with_base_url(url),
        None => geocoder,
    }))
}

/// In-memory lookup table; names match case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct FixedGeocoder {
    entries: HashMap<String, Coordinates>,
}

impl FixedGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(mut self, name: &str, coords: Coordinates) -> Self {
        self.entries.insert(name.trim().to_lowercase(), coords);
        self
    }
}

#[async_trait]
impl GeocodingResolver for FixedGeocoder {
    async fn resolve(&self, location_name: &str) -> Result<Coordinates, GeocodeError> {
        let key = location_name.trim().to_lowercase();
        if key.is_empty() {
            return Err(GeocodeError::EmptyQuery);
        }
        self.entries
            .get(&key)
            .copied()
            .ok_or_else(|| GeocodeError::LocationNotFound(location_name.trim().to_string()))
    }
}
