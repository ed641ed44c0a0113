use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// A record that cannot exist: raised by [`crate::WeatherRecord::new`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("max temperature {max_temp_c}°C is below min temperature {min_temp_c}°C on {date}")]
    InvertedTemperatureRange {
        date: NaiveDate,
        max_temp_c: f64,
        min_temp_c: f64,
    },

    #[error("temperature on {date} is not a number")]
    NotANumber { date: NaiveDate },
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Location name must not be empty")]
    EmptyQuery,

    #[error("Location '{0}' not found")]
    LocationNotFound(String),

    #[error("Network error while resolving '{location}': {source}")]
    Transport {
        location: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Geocoding request for '{location}' failed with status {status}: {body}")]
    HttpStatus {
        location: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Malformed geocoding response for '{location}': {reason}")]
    MalformedResponse { location: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider}: network error: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider}: request failed with status {status}: {body}")]
    HttpStatus {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{provider}: unusable response: {reason}")]
    UpstreamData {
        provider: &'static str,
        reason: String,
    },

    #[error("invalid record in upstream data: {0}")]
    InvalidRecord(#[from] RecordError),
}

impl ProviderError {
    pub(crate) fn upstream(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::UpstreamData {
            provider,
            reason: reason.into(),
        }
    }

    /// Network, timeout and HTTP status failures. Everything else means the
    /// request went through but the payload was unusable.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::HttpStatus { .. })
    }
}

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Start date {start} is after end date {end}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },

    #[error("Window {start}..{end} cannot be shifted back {years_back} years")]
    WindowOutOfRange {
        start: NaiveDate,
        end: NaiveDate,
        years_back: u32,
    },

    #[error("Could not resolve location: {0}")]
    LocationResolutionFailed(#[source] GeocodeError),
}

impl AggregationError {
    pub fn is_location_not_found(&self) -> bool {
        matches!(
            self,
            Self::LocationResolutionFailed(GeocodeError::LocationNotFound(_))
        )
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to create export directory '{0}'")]
    CreateDir(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("CSV error on '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Spreadsheet error on '{path}': {source}")]
    Spreadsheet {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },

    #[error("Invalid record in '{path}': {source}")]
    InvalidRecord {
        path: PathBuf,
        #[source]
        source: RecordError,
    },
}
