//! Multi-year aggregation: one location, one date window, repeated across
//! past years.
//!
//! A query resolves its coordinates once, then asks the provider for the
//! window at offsets `0..=years_back`. Offsets are applied by subtracting from
//! the calendar year (Feb 29 becomes Feb 28 in common years). A failing year
//! is logged and kept in the [`RangeReport`]; it never fails the query.

use chrono::NaiveDate;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    Coordinates, WeatherRecord,
    error::{AggregationError, ProviderError},
    geocode::GeocodingResolver,
    provider::HistoricalWeatherProvider,
    window::{DateWindow, year_windows},
};

/// How the per-year requests of one query are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// One year after another.
    #[default]
    Sequential,
    /// All years in flight at once; results keep offset order.
    Concurrent,
}

/// Outcome of one offset's provider call.
#[derive(Debug)]
pub struct YearAttempt {
    pub window: DateWindow,
    pub outcome: Result<Vec<WeatherRecord>, ProviderError>,
}

impl YearAttempt {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn records(&self) -> &[WeatherRecord] {
        self.outcome.as_deref().unwrap_or_default()
    }

    pub fn error(&self) -> Option<&ProviderError> {
        self.outcome.as_ref().err()
    }
}

/// Everything one `fetch_range` call attempted, in offset order.
#[derive(Debug)]
pub struct RangeReport {
    pub location: String,
    pub coordinates: Coordinates,
    pub attempts: Vec<YearAttempt>,
}

impl RangeReport {
    pub fn failures(&self) -> impl Iterator<Item = &YearAttempt> {
        self.attempts.iter().filter(|attempt| !attempt.is_success())
    }

    pub fn record_count(&self) -> usize {
        self.attempts.iter().map(|attempt| attempt.records().len()).sum()
    }

    /// Flattens successful years, newest offset first.
    pub fn into_records(self) -> Vec<WeatherRecord> {
        self.attempts
            .into_iter()
            .filter_map(|attempt| attempt.outcome.ok())
            .flatten()
            .collect()
    }
}

#[derive(Debug)]
pub struct WeatherAggregationService {
    geocoder: Box<dyn GeocodingResolver>,
    provider: Box<dyn HistoricalWeatherProvider>,
    mode: FetchMode,
}

impl WeatherAggregationService {
    pub fn new(
        geocoder: Box<dyn GeocodingResolver>,
        provider: Box<dyn HistoricalWeatherProvider>,
    ) -> Self {
        Self {
            geocoder,
            provider,
            mode: FetchMode::default(),
        }
    }

    pub fn with_fetch_mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Records for `[start, end]` and the same window in each of the
    /// `years_back` preceding years.
    ///
    /// An empty vector means the location resolved but no year had data.
    pub async fn fetch_range(
        &self,
        location: &str,
        start: NaiveDate,
        end: NaiveDate,
        years_back: u32,
    ) -> Result<Vec<WeatherRecord>, AggregationError> {
        let report = self
            .fetch_range_report(location, start, end, years_back)
            .await?;
        Ok(report.into_records())
    }

    /// Like [`fetch_range`](Self::fetch_range), keeping per-year outcomes.
    pub async fn fetch_range_report(
        &self,
        location: &str,
        start: NaiveDate,
        end: NaiveDate,
        years_back: u32,
    ) -> Result<RangeReport, AggregationError> {
        if start > end {
            return Err(AggregationError::InvalidWindow { start, end });
        }
        let windows =
            year_windows(start, end, years_back).ok_or(AggregationError::WindowOutOfRange {
                start,
                end,
                years_back,
            })?;

        debug!(phase = "resolving_location", location);
        let coordinates = self.geocoder.resolve(location).await.map_err(|err| {
            warn!(phase = "failed", location, error = %err, "Location resolution failed");
            AggregationError::LocationResolutionFailed(err)
        })?;

        info!(
            location,
            %coordinates,
            provider = self.provider.name(),
            years = windows.len(),
            mode = ?self.mode,
            "Fetching historical windows"
        );

        let attempts = match self.mode {
            FetchMode::Sequential => {
                let mut attempts = Vec::with_capacity(windows.len());
                for window in windows {
                    attempts.push(self.attempt_year(coordinates, location, window).await);
                }
                attempts
            }
            FetchMode::Concurrent => {
                join_all(
                    windows
                        .into_iter()
                        .map(|window| self.attempt_year(coordinates, location, window)),
                )
                .await
            }
        };

        debug!(phase = "merging", attempts = attempts.len());
        let report = RangeReport {
            location: location.to_string(),
            coordinates,
            attempts,
        };

        info!(
            phase = "done",
            location,
            records = report.record_count(),
            failed_years = report.failures().count(),
            "Aggregated records"
        );
        Ok(report)
    }

    async fn attempt_year(
        &self,
        coordinates: Coordinates,
        location: &str,
        window: DateWindow,
    ) -> YearAttempt {
        debug!(phase = "fetching_year", offset = window.offset(), %window);

        let outcome = self
            .provider
            .fetch(coordinates, window.start(), window.end())
            .await
            .map(|records| {
                records
                    .into_iter()
                    .map(|record| record.with_location(location))
                    .collect::<Vec<_>>()
            });

        match &outcome {
            Ok(records) => debug!(offset = window.offset(), count = records.len(), "Year fetched"),
            Err(err) => warn!(
                offset = window.offset(),
                %window,
                error = %err,
                "Skipping year after provider failure"
            ),
        }

        YearAttempt { window, outcome }
    }
}
