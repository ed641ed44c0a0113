use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{Coordinates, WeatherRecord, error::ProviderError, window::DateWindow};

use super::{
    HistoricalWeatherProvider, estimated_utc_offset, fetch_body, local_date, local_noon_timestamp,
    normalize_celsius, parse_body, reconcile_date,
};

pub const OPENWEATHER_URL: &str = "https://api.openweathermap.org";

const NAME: &str = "openweather";

/// Per-day provider over the One Call 3.0 time machine. It returns a single
/// local-noon sample per day, so max and min are the same value.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    http: Client,
    base_url: String,
}

impl OpenWeatherProvider {
    pub fn new(http: Client, api_key: String) -> Self {
        Self {
            api_key,
            http,
            base_url: OPENWEATHER_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn request_at(
        &self,
        coords: Coordinates,
        unix: i64,
    ) -> Result<OwTimemachineResponse, ProviderError> {
        let url = format!("{}/data/3.0/onecall/timemachine", self.base_url);

        debug!(provider = NAME, %coords, dt = unix, "Requesting sample");
        let request = self.http.get(&url).query(&[
            ("lat", coords.latitude.to_string()),
            ("lon", coords.longitude.to_string()),
            ("dt", unix.to_string()),
            ("appid", self.api_key.clone()),
        ]);
        let body = fetch_body(NAME, request).await?;
        parse_body(NAME, &body)
    }
}

/// UTC offset used to place each request at local noon. Starts as a
/// longitude guess and is replaced by the first offset the upstream reports.
#[derive(Debug)]
struct LocalClock {
    utc_offset: i64,
    confirmed: bool,
}

impl LocalClock {
    fn estimated(coords: Coordinates) -> Self {
        Self {
            utc_offset: estimated_utc_offset(coords.longitude),
            confirmed: false,
        }
    }
}

fn record_from(
    day: NaiveDate,
    parsed: OwTimemachineResponse,
) -> Result<Option<WeatherRecord>, ProviderError> {
    let Some(sample) = parsed.data.into_iter().next() else {
        return Ok(None);
    };

    let returned = sample
        .dt
        .and_then(|ts| local_date(ts, parsed.timezone_offset.unwrap_or(0)));
    let record_date = reconcile_date(NAME, day, returned);

    let temp_c = normalize_celsius(sample.temp.unwrap_or(0.0));
    let precipitation_mm = sample.rain.and_then(|rain| rain.one_hour).unwrap_or(0.0);

    Ok(Some(WeatherRecord::new(
        record_date,
        "",
        temp_c,
        temp_c,
        precipitation_mm,
    )?))
}

#[derive(Debug, Deserialize)]
struct OwRain {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwSample {
    dt: Option<i64>,
    temp: Option<f64>,
    rain: Option<OwRain>,
}

#[derive(Debug, Deserialize)]
struct OwTimemachineResponse {
    timezone_offset: Option<i64>,
    #[serde(default)]
    data: Vec<OwSample>,
}

#[async_trait]
impl HistoricalWeatherProvider for OpenWeatherProvider {
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

        let mut clock = LocalClock::estimated(coords);
        let mut records = Vec::new();
        for day in window.days() {
            info!(provider = NAME, %day, %coords, "Requesting day");
            let requested_at = local_noon_timestamp(day, clock.utc_offset);
            let mut parsed = self.request_at(coords, requested_at).await?;

            if let (false, Some(actual)) = (clock.confirmed, parsed.timezone_offset) {
                clock.confirmed = true;
                if actual != clock.utc_offset {
                    clock.utc_offset = actual;
                    if local_date(requested_at, actual) != Some(day) {
                        debug!(
                            provider = NAME,
                            %day,
                            utc_offset = actual,
                            "Longitude estimate missed the local day, requesting local noon"
                        );
                        parsed = self
                            .request_at(coords, local_noon_timestamp(day, actual))
                            .await?;
                    }
                }
            }

            match record_from(day, parsed)? {
                Some(record) => records.push(record),
                None => warn!(provider = NAME, %day, "No data for day, skipping"),
            }
        }

        info!(provider = NAME, count = records.len(), "Parsed records");
        Ok(records)
    }
}
