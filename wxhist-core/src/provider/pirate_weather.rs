use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{Coordinates, WeatherRecord, error::ProviderError, window::DateWindow};

use super::{HistoricalWeatherProvider, fetch_body, local_date, parse_body, reconcile_date};

pub const PIRATE_WEATHER_URL: &str = "https://timemachine.pirateweather.net";

const NAME: &str = "pirateweather";
const FREE_TIER_KEY: &str = "free";

/// Per-day provider backed by the Pirate Weather time machine (ERA5 reanalysis).
#[derive(Debug, Clone)]
pub struct PirateWeatherProvider {
    api_key: Option<String>,
    http: Client,
    base_url: String,
}

impl PirateWeatherProvider {
    pub fn new(http: Client, api_key: Option<String>) -> Self {
        Self {
            api_key,
            http,
            base_url: PIRATE_WEATHER_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `None` when the upstream had nothing for `day`.
    async fn fetch_day(
        &self,
        coords: Coordinates,
        day: NaiveDate,
    ) -> Result<Option<WeatherRecord>, ProviderError> {
        let key = self.api_key.as_deref().unwrap_or(FREE_TIER_KEY);
        // A time without an offset is read in the location's own zone.
        let url = format!(
            "{}/forecast/{}/{},{},{}T12:00:00",
            self.base_url, key, coords.latitude, coords.longitude, day
        );

        info!(provider = NAME, %day, %coords, "Requesting day");
        let request = self
            .http
            .get(&url)
            .query(&[("units", "si"), ("exclude", "currently,minutely,hourly,alerts")]);
        let body = fetch_body(NAME, request).await?;
        let parsed: PwResponse = parse_body(NAME, &body)?;

        let Some(entry) = parsed.daily.and_then(|daily| daily.data.into_iter().next()) else {
            return Ok(None);
        };

        let offset_secs = parsed
            .offset
            .map(|hours| (hours * 3600.0).round() as i64)
            .unwrap_or(0);
        let returned = entry.time.and_then(|ts| local_date(ts, offset_secs));
        let record_date = reconcile_date(NAME, day, returned);

        // si units report accumulation in centimetres
        let precipitation_mm = entry.precip_accumulation.unwrap_or(0.0) * 10.0;

        let record = WeatherRecord::new(
            record_date,
            "",
            entry.temperature_max.unwrap_or(0.0),
            entry.temperature_min.unwrap_or(0.0),
            precipitation_mm,
        )?;
        Ok(Some(record))
    }
}

#[derive(Debug, Deserialize)]
struct PwResponse {
    offset: Option<f64>,
    daily: Option<PwDaily>,
}

#[derive(Debug, Deserialize)]
struct PwDaily {
    #[serde(default)]
    data: Vec<PwDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PwDay {
    time: Option<i64>,
    /// Calendar-day extremes. `temperatureHigh`/`Low` span 06:00 to 06:00
    /// and can invert.
    temperature_max: Option<f64>,
    temperature_min: Option<f64>,
    precip_accumulation: Option<f64>,
}

#[async_trait]
impl HistoricalWeatherProvider for PirateWeatherProvider {
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

        let mut records = Vec::new();
        for day in window.days() {
            match self.fetch_day(coords, day).await? {
                Some(record) => records.push(record),
                None => warn!(provider = NAME, %day, "No daily data, skipping day"),
            }
        }

        info!(provider = NAME, count = records.len(), "Parsed records");
        Ok(records)
    }
}
