use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};

use crate::{Coordinates, WeatherRecord, error::ProviderError, window::DateWindow};

use super::HistoricalWeatherProvider;

const NAME: &str = "mock";

/// Offline provider producing deterministic values per calendar day.
///
/// Windows starting in a year passed to [`MockProvider::failing_for_year`]
/// fail with an upstream error, which is handy for exercising partial failure.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    failing_years: BTreeSet<i32>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for_year(mut self, year: i32) -> Self {
        self.failing_years.insert(year);
        self
    }
}

#[async_trait]
impl HistoricalWeatherProvider for MockProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch(
        &self,
        _coords: Coordinates,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeatherRecord>, ProviderError> {
        if self.failing_years.contains(&start.year()) {
            return Err(ProviderError::upstream(
                NAME,
                format!("simulated outage for {}", start.year()),
            ));
        }

        let Some(window) = DateWindow::new(start, end) else {
            return Ok(Vec::new());
        };

        window
            .days()
            .map(|day| -> Result<WeatherRecord, ProviderError> {
                let dom = f64::from(day.day());
                Ok(WeatherRecord::new(
                    day,
                    "",
                    20.0 + dom % 10.0,
                    10.0 + dom % 5.0,
                    dom % 5.0,
                )?)
            })
            .collect()
    }
}
