use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{Coordinates, WeatherRecord, error::ProviderError, window::DateWindow};

use super::{HistoricalWeatherProvider, fetch_body, normalize_celsius, parse_body};

pub const ACCUWEATHER_URL: &str = "http://api.accuweather.com";
pub const ACCUWEATHER_HISTORICAL_URL: &str = "https://historical.accuweather.com";

const NAME: &str = "accuweather";

/// Per-day provider. Coordinates are first mapped to an AccuWeather location
/// key, then each day is requested against that key.
#[derive(Debug, Clone)]
pub struct AccuWeatherProvider {
    api_key: String,
    http: Client,
    base_url: String,
    historical_url: String,
}

impl AccuWeatherProvider {
    pub fn new(http: Client, api_key: String) -> Self {
        Self {
            api_key,
            http,
            base_url: ACCUWEATHER_URL.to_string(),
            historical_url: ACCUWEATHER_HISTORICAL_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_historical_url(mut self, historical_url: impl Into<String>) -> Self {
        self.historical_url = historical_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn location_key(&self, coords: Coordinates) -> Result<String, ProviderError> {
        let url = format!("{}/locations/v1/cities/geoposition/search", self.base_url);
        let query = format!("{},{}", coords.latitude, coords.longitude);

        debug!(provider = NAME, %coords, "Resolving location key");
        let request = self.http.get(&url).query(&[
            ("apikey", self.api_key.as_str()),
            ("q", query.as_str()),
            ("language", "en-us"),
        ]);
        let body = fetch_body(NAME, request).await?;
        let parsed: AwGeoposition = parse_body(NAME, &body)?;

        match parsed.key {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ProviderError::upstream(
                NAME,
                format!("could not get location key for {coords}"),
            )),
        }
    }

    async fn fetch_day(
        &self,
        location_key: &str,
        day: NaiveDate,
    ) -> Result<Option<WeatherRecord>, ProviderError> {
        let url = format!(
            "{}/v1/daily/historical/{}",
            self.historical_url, location_key
        );
        let start = format!("{day}T00:00:00Z");
        let end = format!("{day}T23:59:59Z");

        info!(provider = NAME, %day, location_key, "Requesting day");
        let request = self.http.get(&url).query(&[
            ("apikey", self.api_key.as_str()),
            ("startDateTime", start.as_str()),
            ("endDateTime", end.as_str()),
        ]);
        let body = fetch_body(NAME, request).await?;
        let days: Vec<AwDay> = parse_body(NAME, &body)?;

        let Some(entry) = days.into_iter().next() else {
            return Ok(None);
        };

        let max_temp_c = normalize_celsius(entry.temperature.maximum.value.unwrap_or(0.0));
        let min_temp_c = normalize_celsius(entry.temperature.minimum.value.unwrap_or(0.0));
        let precipitation_mm = entry.day.rain.value.unwrap_or(0.0);

        Ok(Some(WeatherRecord::new(
            day,
            "",
            max_temp_c,
            min_temp_c,
            precipitation_mm,
        )?))
    }
}

#[derive(Debug, Deserialize)]
struct AwGeoposition {
    #[serde(rename = "Key")]
    key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwValue {
    #[serde(default)]
    value: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwTemperature {
    #[serde(default)]
    maximum: AwValue,
    #[serde(default)]
    minimum: AwValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwHalfDay {
    #[serde(default)]
    rain: AwValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwDay {
    #[serde(default)]
    temperature: AwTemperature,
    #[serde(default)]
    day: AwHalfDay,
}

#[async_trait]
impl HistoricalWeatherProvider for AccuWeatherProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch(
        &self,
        coords: Coordinates,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeatherRecord>, ProviderError> {
        let Some(window) = DateWindow::new(start, end) else {
            return Ok(Vec::new());
        };

        let location_key = self.location_key(coords).await?;

        let mut records = Vec::new();
        for day in window.days() {
            match self.fetch_day(&location_key, day).await? {
                Some(record) => records.push(record),
                None => warn!(provider = NAME, %day, "No data for day, skipping"),
            }
        }

        info!(provider = NAME, count = records.len(), "Parsed records");
        Ok(records)
    }
}
