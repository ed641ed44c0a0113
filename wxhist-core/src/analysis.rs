use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::WeatherRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Metric {
    MaxTemp,
    MinTemp,
    Precipitation,
}

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Metric::MaxTemp => "Max Temp (°C)",
            Metric::MinTemp => "Min Temp (°C)",
            Metric::Precipitation => "Precipitation (mm)",
        }
    }

    fn value(&self, record: &WeatherRecord) -> f64 {
        match self {
            Metric::MaxTemp => record.max_temp_c(),
            Metric::MinTemp => record.min_temp_c(),
            Metric::Precipitation => record.precipitation_mm(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotRow {
    pub month: u32,
    pub day: u32,
    /// One cell per entry of [`MonthDayPivot::years`].
    pub values: Vec<Option<f64>>,
}

/// Same calendar day across years: rows keyed by month-day, one column per year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthDayPivot {
    pub metric: Metric,
    pub years: Vec<i32>,
    pub rows: Vec<PivotRow>,
}

/// Rows and year columns come out ascending. If a (month-day, year) cell
/// appears twice, the later record wins.
pub fn pivot_by_month_day(records: &[WeatherRecord], metric: Metric) -> MonthDayPivot {
    let mut cells: BTreeMap<(u32, u32), BTreeMap<i32, f64>> = BTreeMap::new();
    let mut years = BTreeSet::new();

    for record in records {
        years.insert(record.year());
        cells
            .entry(record.month_day())
            .or_default()
            .insert(record.year(), metric.value(record));
    }

    let years: Vec<i32> = years.into_iter().collect();
    let rows = cells
        .into_iter()
        .map(|((month, day), by_year)| PivotRow {
            month,
            day,
            values: years.iter().map(|year| by_year.get(year).copied()).collect(),
        })
        .collect();

    MonthDayPivot {
        metric,
        years,
        rows,
    }
}
