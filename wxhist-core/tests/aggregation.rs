use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use wxhist_core::{
    AggregationError, Coordinates, ExportFormat, FetchMode, FixedGeocoder, GeocodeError,
    GeocodingResolver, HistoricalWeatherProvider, ProviderError, TabularExporter,
    WeatherAggregationService, WeatherRecord, read_csv,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn testville() -> FixedGeocoder {
    FixedGeocoder::new().with_location("Testville", Coordinates::new(10.0, 20.0))
}

type Calls = Arc<Mutex<Vec<(Coordinates, NaiveDate, NaiveDate)>>>;

/// Records every request; max temperature encodes the day of month plus a
/// per-year bias so tests can tell years apart.
#[derive(Debug, Default)]
struct RecordingProvider {
    calls: Calls,
    failing_years: Vec<i32>,
    empty: bool,
}

impl RecordingProvider {
    fn new(calls: Calls) -> Self {
        Self {
            calls,
            ..Self::default()
        }
    }

    fn failing(mut self, year: i32) -> Self {
        self.failing_years.push(year);
        self
    }

    fn empty(mut self) -> Self {
        self.empty = true;
        self
    }
}

#[async_trait]
impl HistoricalWeatherProvider for RecordingProvider {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn fetch(
        &self,
        coords: Coordinates,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeatherRecord>, ProviderError> {
        self.calls.lock().unwrap().push((coords, start, end));

        if self.failing_years.contains(&start.year()) {
            return Err(ProviderError::UpstreamData {
                provider: "recording",
                reason: format!("no data for {}", start.year()),
            });
        }
        if self.empty {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut day = start;
        while day <= end {
            let max = 19.0 + f64::from(day.day()) + f64::from(2024 - day.year()) * 0.5;
            records.push(WeatherRecord::new(day, "", max, 0.0, 1.0).unwrap());
            day = day.succ_opt().unwrap();
        }
        Ok(records)
    }
}

#[derive(Debug, Default)]
struct UnreachableGeocoder {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl GeocodingResolver for UnreachableGeocoder {
    async fn resolve(&self, location_name: &str) -> Result<Coordinates, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GeocodeError::LocationNotFound(location_name.to_string()))
    }
}

fn service(provider: RecordingProvider) -> WeatherAggregationService {
    WeatherAggregationService::new(Box::new(testville()), Box::new(provider))
}

#[tokio::test]
async fn zero_years_back_requests_exact_window_once() {
    let calls = Calls::default();
    let records = service(RecordingProvider::new(calls.clone()))
        .fetch_range("Testville", date(2024, 3, 10), date(2024, 3, 12), 0)
        .await
        .unwrap();

    assert_eq!(records.len(), 3);
    let calls = calls.lock().unwrap();
    assert_eq!(
        *calls,
        vec![(Coordinates::new(10.0, 20.0), date(2024, 3, 10), date(2024, 3, 12))]
    );
}

#[tokio::test]
async fn one_request_per_offset_each_a_year_earlier() {
    let calls = Calls::default();
    service(RecordingProvider::new(calls.clone()))
        .fetch_range("Testville", date(2024, 6, 1), date(2024, 6, 7), 4)
        .await
        .unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 5);
    for (offset, (coords, start, end)) in calls.iter().enumerate() {
        let year = 2024 - offset as i32;
        assert_eq!(*coords, Coordinates::new(10.0, 20.0));
        assert_eq!(*start, date(year, 6, 1));
        assert_eq!(*end, date(year, 6, 7));
    }
    assert!(calls.windows(2).all(|pair| pair[1].1 < pair[0].1));
}

#[tokio::test]
async fn geocoding_failure_skips_provider() {
    let calls = Calls::default();
    let geocoder = UnreachableGeocoder::default();
    let geocode_calls = geocoder.calls.clone();
    let service = WeatherAggregationService::new(
        Box::new(geocoder),
        Box::new(RecordingProvider::new(calls.clone())),
    );

    let err = service
        .fetch_range("Atlantis", date(2024, 1, 1), date(2024, 1, 3), 3)
        .await
        .unwrap_err();

    assert!(err.is_location_not_found());
    assert!(matches!(err, AggregationError::LocationResolutionFailed(_)));
    assert_eq!(geocode_calls.load(Ordering::SeqCst), 1);
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_year_is_skipped_and_reported() {
    let calls = Calls::default();
    let service = service(RecordingProvider::new(calls.clone()).failing(2023));

    let report = service
        .fetch_range_report("Testville", date(2024, 1, 1), date(2024, 1, 3), 1)
        .await
        .unwrap();

    assert_eq!(report.attempts.len(), 2);
    let failed: Vec<_> = report.failures().map(|a| a.window.start()).collect();
    assert_eq!(failed, vec![date(2023, 1, 1)]);

    let records = report.into_records();
    let dates: Vec<_> = records.iter().map(WeatherRecord::record_date).collect();
    assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3)]);
    let maxima: Vec<_> = records.iter().map(WeatherRecord::max_temp_c).collect();
    assert_eq!(maxima, vec![20.0, 21.0, 22.0]);
    assert!(records.iter().all(|r| r.location() == "Testville" && r.year() == 2024));
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn middle_year_failure_keeps_offset_order() {
    let records = service(RecordingProvider::new(Calls::default()).failing(2023))
        .fetch_range("Testville", date(2024, 5, 5), date(2024, 5, 6), 2)
        .await
        .unwrap();

    let years: Vec<_> = records.iter().map(WeatherRecord::year).collect();
    assert_eq!(years, vec![2024, 2024, 2022, 2022]);
}

#[tokio::test]
async fn leap_day_window_clamps_in_common_years() {
    let calls = Calls::default();
    service(RecordingProvider::new(calls.clone()))
        .fetch_range("Testville", date(2024, 2, 29), date(2024, 3, 1), 4)
        .await
        .unwrap();

    let starts: Vec<_> = calls.lock().unwrap().iter().map(|c| c.1).collect();
    assert_eq!(
        starts,
        vec![
            date(2024, 2, 29),
            date(2023, 2, 28),
            date(2022, 2, 28),
            date(2021, 2, 28),
            date(2020, 2, 29),
        ]
    );
}

#[tokio::test]
async fn no_data_anywhere_is_an_empty_success() {
    let records = service(RecordingProvider::new(Calls::default()).empty())
        .fetch_range("Testville", date(2024, 1, 1), date(2024, 1, 3), 2)
        .await
        .unwrap();

    assert!(records.is_empty());
}

#[tokio::test]
async fn concurrent_mode_keeps_offset_order() {
    let calls = Calls::default();
    let records = service(RecordingProvider::new(calls.clone()).failing(2021))
        .with_fetch_mode(FetchMode::Concurrent)
        .fetch_range("Testville", date(2024, 12, 30), date(2024, 12, 31), 4)
        .await
        .unwrap();

    let years: Vec<_> = records.iter().map(WeatherRecord::year).collect();
    assert_eq!(years, vec![2024, 2024, 2023, 2023, 2022, 2022, 2020, 2020]);
    assert_eq!(calls.lock().unwrap().len(), 5);
}

#[tokio::test]
async fn aggregated_records_survive_csv_export() {
    let records = service(RecordingProvider::new(Calls::default()))
        .fetch_range("Testville", date(2024, 1, 1), date(2024, 1, 2), 1)
        .await
        .unwrap();

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("out").join("testville.csv");
    TabularExporter::new()
        .export(&records, &path, ExportFormat::Csv)
        .unwrap();

    assert_eq!(read_csv(&path).unwrap(), records);
}
