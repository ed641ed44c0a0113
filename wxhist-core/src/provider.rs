use std::{convert::TryFrom, fmt::Debug, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::{
    Config, Coordinates, WeatherRecord,
    error::ProviderError,
    provider::{
        accuweather::AccuWeatherProvider, mock::MockProvider, open_meteo::OpenMeteoProvider,
        openweather::OpenWeatherProvider, pirate_weather::PirateWeatherProvider,
    },
};

pub mod accuweather;
pub mod mock;
pub mod open_meteo;
pub mod openweather;
pub mod pirate_weather;

const USER_AGENT: &str = concat!("wxhist/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenMeteo,
    PirateWeather,
    OpenWeather,
    AccuWeather,
    Mock,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "open-meteo",
            ProviderId::PirateWeather => "pirateweather",
            ProviderId::OpenWeather => "openweather",
            ProviderId::AccuWeather => "accuweather",
            ProviderId::Mock => "mock",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[
            ProviderId::OpenMeteo,
            ProviderId::PirateWeather,
            ProviderId::OpenWeather,
            ProviderId::AccuWeather,
            ProviderId::Mock,
        ]
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderId::OpenWeather | ProviderId::AccuWeather)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.trim().to_lowercase();

        match lower.as_str() {
            "open-meteo" | "openmeteo" => Ok(ProviderId::OpenMeteo),
            "pirateweather" | "pirate-weather" => Ok(ProviderId::PirateWeather),
            "openweather" | "openweathermap" => Ok(ProviderId::OpenWeather),
            "accuweather" => Ok(ProviderId::AccuWeather),
            "mock" => Ok(ProviderId::Mock),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: \
                 open-meteo, pirateweather, openweather, accuweather, mock."
            )),
        }
    }
}

/// A source of daily historical observations.
///
/// Implementations own their wire format and unit mapping and emit records
/// with an empty `location`. Callers guarantee `start <= end`.
#[async_trait]
pub trait HistoricalWeatherProvider: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        coords: Coordinates,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeatherRecord>, ProviderError>;
}

pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Construct a provider from config and explicit ProviderId.
///
/// `api_key` is supplied by the caller; keys are never read from the config file.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
    api_key: Option<String>,
) -> anyhow::Result<Box<dyn HistoricalWeatherProvider>> {
    let api_key = api_key.filter(|key| !key.trim().is_empty());

    if id.requires_api_key() && api_key.is_none() {
        anyhow::bail!(
            "No API key supplied for provider '{id}'.\n\
             Hint: pass --api-key or set {}.",
            Config::api_key_env_var(id)
        );
    }

    let http = http_client(config.http_timeout()).context("Failed to build HTTP client")?;
    let base_url = config.provider_base_url(id);

    let boxed: Box<dyn HistoricalWeatherProvider> = match id {
        ProviderId::OpenMeteo => {
            let provider = OpenMeteoProvider::new(http);
            Box::new(match base_url {
                Some(url) => provider.with_base_url(url),
                None => provider,
            })
        }
        ProviderId::PirateWeather => {
            let provider = PirateWeatherProvider::new(http, api_key);
            Box::new(match base_url {
                Some(url) => provider.with_base_url(url),
                None => provider,
            })
        }
        ProviderId::OpenWeather => {
            let provider = OpenWeatherProvider::new(http, api_key.unwrap_or_default());
            Box::new(match base_url {
                Some(url) => provider.with_base_url(url),
                None => provider,
            })
        }
        ProviderId::AccuWeather => {
            let mut provider = AccuWeatherProvider::new(http, api_key.unwrap_or_default());
            if let Some(url) = base_url {
                provider = provider.with_base_url(url);
            }
            if let Some(url) = config.accuweather_historical_url() {
                provider = provider.with_historical_url(url);
            }
            Box::new(provider)
        }
        ProviderId::Mock => Box::new(MockProvider::new()),
    };

    Ok(boxed)
}

/// Send `request` and return the body of a 2xx response.
pub(crate) async fn fetch_body(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<String, ProviderError> {
    let res = request
        .send()
        .await
        .map_err(|source| ProviderError::Transport { provider, source })?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|source| ProviderError::Transport { provider, source })?;

    if !status.is_success() {
        return Err(ProviderError::HttpStatus {
            provider,
            status,
            body: truncate_body(&body),
        });
    }

    Ok(body)
}

pub(crate) fn parse_body<T: DeserializeOwned>(
    provider: &'static str,
    body: &str,
) -> Result<T, ProviderError> {
    serde_json::from_str(body)
        .map_err(|e| ProviderError::upstream(provider, format!("invalid JSON: {e}")))
}

/// Unix timestamp of 12:00 UTC on `date`.
pub(crate) fn noon_timestamp(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp() + 12 * 3600
}

/// Unix timestamp of 12:00 local time on `date` for a location `utc_offset_secs` from UTC.
pub(crate) fn local_noon_timestamp(date: NaiveDate, utc_offset_secs: i64) -> i64 {
    noon_timestamp(date) - utc_offset_secs
}

/// Solar-time guess at a UTC offset, one hour per 15 degrees of longitude.
///
/// Zones near the date line disagree with it (Tonga is UTC+13 at -175°).
pub(crate) fn estimated_utc_offset(longitude: f64) -> i64 {
    (longitude / 15.0).round() as i64 * 3600
}

/// Calendar day of `unix` seen from a location `utc_offset_secs` away from UTC.
pub(crate) fn local_date(unix: i64, utc_offset_secs: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(unix.checked_add(utc_offset_secs)?, 0).map(|dt| dt.date_naive())
}

/// The upstream's own date wins over the one we asked for.
pub(crate) fn reconcile_date(
    provider: &'static str,
    requested: NaiveDate,
    returned: Option<NaiveDate>,
) -> NaiveDate {
    match returned {
        Some(returned) if returned != requested => {
            warn!(provider, %requested, %returned, "Date mismatch, using returned date");
            returned
        }
        _ => requested,
    }
}

const KELVIN_THRESHOLD: f64 = 200.0;

/// Values with a magnitude above 200 can only be Kelvin.
pub(crate) fn normalize_celsius(value: f64) -> f64 {
    if value.abs() > KELVIN_THRESHOLD {
        value - 273.15
    } else {
        value
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn provider_id_accepts_aliases_and_case() {
        assert_eq!(ProviderId::try_from("OpenMeteo").unwrap(), ProviderId::OpenMeteo);
        assert_eq!(ProviderId::try_from(" AccuWeather ").unwrap(), ProviderId::AccuWeather);
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = provider_from_config(ProviderId::OpenWeather, &cfg, None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("No API key supplied for provider"));
        assert!(msg.contains("WXHIST_OPENWEATHER_API_KEY"));

        let err = provider_from_config(ProviderId::AccuWeather, &cfg, Some("  ".into()));
        assert!(err.is_err());
    }

    #[test]
    fn keyless_providers_build_without_key() {
        let cfg = Config::default();
        for id in [ProviderId::OpenMeteo, ProviderId::PirateWeather, ProviderId::Mock] {
            let provider = provider_from_config(id, &cfg, None).unwrap();
            assert_eq!(provider.name(), id.as_str());
        }
    }

    #[test]
    fn noon_timestamp_is_midday_utc() {
        assert_eq!(noon_timestamp(date(2024, 1, 1)), 1_704_110_400);
    }

    #[test]
    fn local_noon_lands_on_the_local_day() {
        let day = date(2023, 1, 1);
        assert_eq!(local_noon_timestamp(day, 0), noon_timestamp(day));

        for offset_hours in [-11, -5, 0, 5, 12, 13, 14] {
            let offset = offset_hours * 3600;
            assert_eq!(local_date(local_noon_timestamp(day, offset), offset), Some(day));
        }

        // 12:00 UTC is already tomorrow at UTC+13.
        assert_eq!(local_date(noon_timestamp(day), 13 * 3600), Some(date(2023, 1, 2)));
    }

    #[test]
    fn utc_offset_estimate_follows_longitude() {
        assert_eq!(estimated_utc_offset(0.0), 0);
        assert_eq!(estimated_utc_offset(-0.12), 0);
        assert_eq!(estimated_utc_offset(174.76), 12 * 3600);
        assert_eq!(estimated_utc_offset(-157.86), -11 * 3600);
    }

    #[test]
    fn local_date_applies_offset() {
        // 2024-01-01T23:00:00Z
        let ts = 1_704_150_000;
        assert_eq!(local_date(ts, 0), Some(date(2024, 1, 1)));
        assert_eq!(local_date(ts, 2 * 3600), Some(date(2024, 1, 2)));
        assert_eq!(local_date(i64::MAX, 1), None);
    }

    #[test]
    fn reconcile_prefers_returned_date() {
        let requested = date(2024, 1, 1);
        assert_eq!(reconcile_date("test", requested, None), requested);
        assert_eq!(reconcile_date("test", requested, Some(requested)), requested);
        assert_eq!(
            reconcile_date("test", requested, Some(date(2023, 12, 31))),
            date(2023, 12, 31)
        );
    }

    #[test]
    fn kelvin_values_are_converted() {
        assert!((normalize_celsius(293.15) - 20.0).abs() < 1e-9);
        assert_eq!(normalize_celsius(-12.5), -12.5);
        assert_eq!(normalize_celsius(45.0), 45.0);
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(250);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
