//! Core library for the `wxhist` CLI.
//!
//! This crate defines:
//! - Configuration handling
//! - Geocoding and historical weather provider abstractions
//! - Multi-year aggregation of one date window
//! - Tabular export and month-day pivoting of the results
//!
//! It is used by `wxhist-cli`, but can also be reused by other binaries or services.

pub mod analysis;
pub mod config;
pub mod error;
pub mod export;
pub mod geocode;
pub mod model;
pub mod provider;
pub mod service;
pub mod window;

pub use analysis::{Metric, MonthDayPivot, PivotRow, pivot_by_month_day};
pub use config::{Config, ProviderConfig};
pub use error::{AggregationError, ExportError, GeocodeError, ProviderError, RecordError};
pub use export::{ExportFormat, TabularExporter, read_csv};
pub use geocode::{FixedGeocoder, GeocodingResolver, OpenMeteoGeocoder, geocoder_from_config};
pub use model::{Coordinates, WeatherRecord};
pub use provider::{HistoricalWeatherProvider, ProviderId, provider_from_config};
pub use service::{FetchMode, RangeReport, WeatherAggregationService, YearAttempt};
pub use window::{DateWindow, RangePreset, year_windows};
