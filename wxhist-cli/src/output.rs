use wxhist_core::{MonthDayPivot, RangeReport, WeatherRecord};

const MISSING: &str = "-";

pub fn render_records(records: &[WeatherRecord]) -> String {
    let loc_width = records
        .iter()
        .map(|r| r.location().chars().count())
        .max()
        .unwrap_or(0)
        .max("Location".len());

    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(format!(
        "{:<10}  {:>4}  {:<loc_width$}  {:>8}  {:>8}  {:>9}",
        "Date", "Year", "Location", "Max °C", "Min °C", "Precip mm"
    ));
    for r in records {
        lines.push(format!(
            "{:<10}  {:>4}  {:<loc_width$}  {:>8.1}  {:>8.1}  {:>9.1}",
            r.record_date().to_string(),
            r.year(),
            r.location(),
            r.max_temp_c(),
            r.min_temp_c(),
            r.precipitation_mm()
        ));
    }
    lines.join("\n")
}

/// One line per year whose request failed.
pub fn render_failures(report: &RangeReport) -> Vec<String> {
    report
        .failures()
        .filter_map(|attempt| {
            attempt
                .error()
                .map(|err| format!("Skipped {}: {err}", attempt.window))
        })
        .collect()
}

pub fn render_pivot(pivot: &MonthDayPivot) -> String {
    let mut header = format!("{:<5}", "MM-DD");
    for year in &pivot.years {
        header.push_str(&format!("  {year:>7}"));
    }

    let mut lines = vec![pivot.metric.label().to_string(), header];
    for row in &pivot.rows {
        let mut line = format!("{:02}-{:02}", row.month, row.day);
        for cell in &row.values {
            match cell {
                Some(value) => line.push_str(&format!("  {value:>7.1}")),
                None => line.push_str(&format!("  {MISSING:>7}")),
            }
        }
        lines.push(line);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wxhist_core::{FixedGeocoder, Metric, WeatherAggregationService, pivot_by_month_day};
    use wxhist_core::{Coordinates, provider::mock::MockProvider};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn records() -> Vec<WeatherRecord> {
        vec![
            WeatherRecord::new(date(2024, 1, 1), "Testville", 20.0, 10.25, 0.0).unwrap(),
            WeatherRecord::new(date(2023, 1, 1), "Testville", 18.5, 9.0, 2.04).unwrap(),
        ]
    }

    #[test]
    fn table_has_header_and_one_line_per_record() {
        let table = render_records(&records());
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Date"));
        assert!(lines[1].starts_with("2024-01-01  2024  Testville"));
        assert!(lines[1].contains("20.0"));
        assert!(lines[2].trim_end().ends_with("2.0"));
    }

    #[test]
    fn pivot_marks_missing_cells() {
        let mut records = records();
        records.push(WeatherRecord::new(date(2024, 1, 2), "Testville", 1.0, 0.0, 0.0).unwrap());

        let rendered = render_pivot(&pivot_by_month_day(&records, Metric::MaxTemp));
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "Max Temp (°C)");
        assert_eq!(lines[1], "MM-DD     2023     2024");
        assert_eq!(lines[2], "01-01     18.5     20.0");
        assert_eq!(lines[3], "01-02        -      1.0");
    }

    #[tokio::test]
    async fn failures_name_the_skipped_window() {
        let service = WeatherAggregationService::new(
            Box::new(FixedGeocoder::new().with_location("Testville", Coordinates::new(10.0, 20.0))),
            Box::new(MockProvider::new().failing_for_year(2023)),
        );
        let report = service
            .fetch_range_report("Testville", date(2024, 1, 1), date(2024, 1, 3), 1)
            .await
            .unwrap();

        let failures = render_failures(&report);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with("Skipped 2023-01-01..=2023-01-03"));
        assert!(failures[0].contains("simulated outage"));
    }
}
