use std::{fs, path::Path};

use chrono::NaiveDate;
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{WeatherRecord, error::ExportError};

pub const COLUMNS: [&str; 6] = [
    "Date",
    "Year",
    "Location",
    "Max Temp (°C)",
    "Min Temp (°C)",
    "Precipitation (mm)",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Comma-delimited text.
    Csv,
    /// Excel workbook.
    Xlsx,
}

impl ExportFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Max Temp (°C)")]
    max_temp_c: f64,
    #[serde(rename = "Min Temp (°C)")]
    min_temp_c: f64,
    #[serde(rename = "Precipitation (mm)")]
    precipitation_mm: f64,
}

impl From<&WeatherRecord> for CsvRow {
    fn from(record: &WeatherRecord) -> Self {
        Self {
            date: record.record_date(),
            year: record.year(),
            location: record.location().to_string(),
            max_temp_c: record.max_temp_c(),
            min_temp_c: record.min_temp_c(),
            precipitation_mm: record.precipitation_mm(),
        }
    }
}

/// Writes record sets to disk as tables, one row per record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TabularExporter;

impl TabularExporter {
    pub fn new() -> Self {
        Self
    }

    /// Write `records` to `path`, creating missing parent directories.
    ///
    /// Write failures are returned as-is; a partially written file is left in place.
    pub fn export(
        &self,
        records: &[WeatherRecord],
        path: &Path,
        format: ExportFormat,
    ) -> Result<(), ExportError> {
        info!(path = %path.display(), ?format, count = records.len(), "Exporting records");

        let result = ensure_parent_dir(path).and_then(|()| match format {
            ExportFormat::Csv => write_csv(records, path),
            ExportFormat::Xlsx => write_xlsx(records, path),
        });

        match &result {
            Ok(()) => info!(path = %path.display(), "Export successful"),
            Err(err) => error!(path = %path.display(), error = %err, "Export failed"),
        }
        result
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), ExportError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|source| ExportError::CreateDir(parent.to_path_buf(), source)),
        _ => Ok(()),
    }
}

fn write_csv(records: &[WeatherRecord], path: &Path) -> Result<(), ExportError> {
    let csv_err = |source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for record in records {
        writer.serialize(CsvRow::from(record)).map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|source| ExportError::Io(path.to_path_buf(), source))
}

fn write_xlsx(records: &[WeatherRecord], path: &Path) -> Result<(), ExportError> {
    let xlsx_err = |source| ExportError::Spreadsheet {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Weather").map_err(xlsx_err)?;

    for (col, header) in (0u16..).zip(COLUMNS) {
        sheet.write_string(0, col, header).map_err(xlsx_err)?;
    }

    for (row, record) in (1u32..).zip(records) {
        sheet
            .write_string(row, 0, record.record_date().to_string())
            .map_err(xlsx_err)?;
        sheet
            .write_number(row, 1, f64::from(record.year()))
            .map_err(xlsx_err)?;
        sheet
            .write_string(row, 2, record.location())
            .map_err(xlsx_err)?;
        sheet
            .write_number(row, 3, record.max_temp_c())
            .map_err(xlsx_err)?;
        sheet
            .write_number(row, 4, record.min_temp_c())
            .map_err(xlsx_err)?;
        sheet
            .write_number(row, 5, record.precipitation_mm())
            .map_err(xlsx_err)?;
    }

    workbook.save(path).map_err(xlsx_err)
}

/// Read a CSV produced by [`TabularExporter`] back into validated records.
pub fn read_csv(path: &Path) -> Result<Vec<WeatherRecord>, ExportError> {
    let csv_err = |source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    reader
        .deserialize::<CsvRow>()
        .map(|row| {
            let row = row.map_err(csv_err)?;
            WeatherRecord::new(
                row.date,
                row.location,
                row.max_temp_c,
                row.min_temp_c,
                row.precipitation_mm,
            )
            .map_err(|source| ExportError::InvalidRecord {
                path: path.to_path_buf(),
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_records() -> Vec<WeatherRecord> {
        vec![
            WeatherRecord::new(date(2024, 1, 1), "Testville", 20.1, -3.333333333333333, 0.1)
                .unwrap(),
            WeatherRecord::new(date(2023, 1, 1), "Testville", 0.30000000000000004, 0.3, 12.75)
                .unwrap(),
        ]
    }

    #[test]
    fn format_is_inferred_from_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("a/b.CSV")), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::from_path(Path::new("out.xlsx")), Some(ExportFormat::Xlsx));
        assert_eq!(ExportFormat::from_path(Path::new("out.txt")), None);
        assert_eq!(ExportFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn csv_round_trip_preserves_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("weather.csv");
        let records = sample_records();

        TabularExporter::new()
            .export(&records, &path, ExportFormat::Csv)
            .unwrap();
        let read_back = read_csv(&path).unwrap();

        assert_eq!(read_back, records);
    }

    #[test]
    fn csv_has_expected_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("weather.csv");

        TabularExporter::new()
            .export(&sample_records(), &path, ExportFormat::Csv)
            .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let header = contents.lines().next().unwrap();
        assert_eq!(header, COLUMNS.join(","));
    }

    #[test]
    fn xlsx_export_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reports").join("weather.xlsx");

        TabularExporter::new()
            .export(&sample_records(), &path, ExportFormat::Xlsx)
            .unwrap();

        let bytes = fs::read(&path).unwrap();
        // xlsx files are zip archives
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn write_failure_is_surfaced() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should go.
        let path = dir.path().join("taken.csv");
        fs::create_dir(&path).unwrap();

        let err = TabularExporter::new()
            .export(&sample_records(), &path, ExportFormat::Csv)
            .unwrap_err();
        assert!(matches!(err, ExportError::Csv { .. }));
    }

    #[test]
    fn reading_inverted_row_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(
            &path,
            format!("{}\n2024-01-01,2024,X,1.0,5.0,0.0\n", COLUMNS.join(",")),
        )
        .unwrap();

        assert!(matches!(read_csv(&path), Err(ExportError::InvalidRecord { .. })));
    }
}
