use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Latitude/longitude pair in plain degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// One location-day of weather.
///
/// Values are immutable once built; [`WeatherRecord::new`] is the only way in
/// and it rejects `max_temp_c < min_temp_c`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWeatherRecord")]
pub struct WeatherRecord {
    record_date: NaiveDate,
    year: i32,
    location: String,
    max_temp_c: f64,
    min_temp_c: f64,
    precipitation_mm: f64,
}

impl WeatherRecord {
    pub fn new(
        record_date: NaiveDate,
        location: impl Into<String>,
        max_temp_c: f64,
        min_temp_c: f64,
        precipitation_mm: f64,
    ) -> Result<Self, RecordError> {
        if max_temp_c.is_nan() || min_temp_c.is_nan() {
            return Err(RecordError::NotANumber { date: record_date });
        }
        if max_temp_c < min_temp_c {
            return Err(RecordError::InvertedTemperatureRange {
                date: record_date,
                max_temp_c,
                min_temp_c,
            });
        }

        Ok(Self {
            record_date,
            year: record_date.year(),
            location: location.into(),
            max_temp_c,
            min_temp_c,
            precipitation_mm,
        })
    }

    /// Returns the same observation labelled with `location`.
    pub fn with_location(self, location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..self
        }
    }

    pub fn record_date(&self) -> NaiveDate {
        self.record_date
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn max_temp_c(&self) -> f64 {
        self.max_temp_c
    }

    pub fn min_temp_c(&self) -> f64 {
        self.min_temp_c
    }

    pub fn precipitation_mm(&self) -> f64 {
        self.precipitation_mm
    }

    /// `(month, day)` key used to line up the same calendar day across years.
    pub fn month_day(&self) -> (u32, u32) {
        (self.record_date.month(), self.record_date.day())
    }
}

#[derive(Deserialize)]
struct RawWeatherRecord {
    record_date: NaiveDate,
    #[serde(default)]
    location: String,
    max_temp_c: f64,
    min_temp_c: f64,
    precipitation_mm: f64,
}

impl TryFrom<RawWeatherRecord> for WeatherRecord {
    type Error = RecordError;

    fn try_from(raw: RawWeatherRecord) -> Result<Self, Self::Error> {
        WeatherRecord::new(
            raw.record_date,
            raw.location,
            raw.max_temp_c,
            raw.min_temp_c,
            raw.precipitation_mm,
        )
    }
}
