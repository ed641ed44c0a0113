use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{Coordinates, WeatherRecord, error::ProviderError};

use super::{HistoricalWeatherProvider, fetch_body, parse_body};

pub const OPEN_METEO_ARCHIVE_URL: &str = "https://archive-api.open-meteo.com";

const NAME: &str = "open-meteo";
const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,precipitation_sum";

/// Range-query provider: one request covers the whole window.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    http: Client,
    base_url: String,
}

impl OpenMeteoProvider {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: OPEN_METEO_ARCHIVE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: Option<ArchiveDaily>,
}

#[derive(Debug, Deserialize)]
struct ArchiveDaily {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
}

/// Zips the parallel daily arrays; `null` cells become `0.0`.
fn records_from_daily(daily: ArchiveDaily) -> Result<Vec<WeatherRecord>, ProviderError> {
    let ArchiveDaily {
        time,
        temperature_2m_max: max_temps,
        temperature_2m_min: min_temps,
        precipitation_sum: precipitation,
    } = daily;

    let expected = time.len();
    if max_temps.len() < expected || min_temps.len() < expected || precipitation.len() < expected
    {
        return Err(ProviderError::upstream(
            NAME,
            format!(
                "daily arrays shorter than the {expected} dates \
                 (max: {}, min: {}, precipitation: {})",
                max_temps.len(),
                min_temps.len(),
                precipitation.len()
            ),
        ));
    }

    time.iter()
        .zip(max_temps)
        .zip(min_temps)
        .zip(precipitation)
        .map(|(((raw_date, max), min), precip)| -> Result<WeatherRecord, ProviderError> {
            let record_date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|e| {
                ProviderError::upstream(NAME, format!("invalid date '{raw_date}': {e}"))
            })?;

            Ok(WeatherRecord::new(
                record_date,
                "",
                max.unwrap_or(0.0),
                min.unwrap_or(0.0),
                precip.unwrap_or(0.0),
            )?)
        })
        .collect()
}

#[async_trait]
impl HistoricalWeatherProvider for OpenMeteoProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch(
        &self,
        coords: Coordinates,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeatherRecord>, ProviderError> {
        let url = format!("{}/v1/archive", self.base_url);
        let params = [
            ("latitude", coords.latitude.to_string()),
            ("longitude", coords.longitude.to_string()),
            ("start_date", start.to_string()),
            ("end_date", end.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("timezone", "auto".to_string()),
        ];

        info!(provider = NAME, %coords, %start, %end, "Requesting historical weather");
        debug!(?params, "Request params");

        let body = fetch_body(NAME, self.http.get(&url).query(&params)).await?;
        let parsed: ArchiveResponse = parse_body(NAME, &body)?;

        let daily = parsed.daily.ok_or_else(|| {
            ProviderError::upstream(NAME, "response did not contain 'daily' data")
        })?;

        let records = records_from_daily(daily)?;
        info!(provider = NAME, count = records.len(), "Parsed records");
        Ok(records)
    }
}
