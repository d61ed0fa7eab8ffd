use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use crate::models::HourlySeries;

/// Accepted timestamp layouts for series CSV files.
const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Loads `timestamp,value` CSV files into hourly series, so the
/// calculator can run against already-materialized data without any
/// network access.
pub struct SeriesLoader;

impl SeriesLoader {
    /// Read one series file. Rows that fail to parse are skipped with a
    /// warning; a missing hour is valid input downstream.
    pub fn load_series_csv(path: &Path) -> Result<HourlySeries> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open series file {}", path.display()))?;

        let mut series = HourlySeries::new();
        for (row, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("bad CSV row in {}", path.display()))?;
            let (Some(raw_timestamp), Some(raw_value)) = (record.get(0), record.get(1)) else {
                log::warn!("{}: row {} is missing columns, skipped", path.display(), row + 2);
                continue;
            };
            let Some(timestamp) = parse_timestamp(raw_timestamp.trim()) else {
                log::warn!(
                    "{}: row {} has unparseable timestamp '{}', skipped",
                    path.display(),
                    row + 2,
                    raw_timestamp
                );
                continue;
            };
            match raw_value.trim().parse::<f64>() {
                Ok(value) => {
                    series.insert(timestamp, value);
                }
                Err(_) => {
                    log::warn!(
                        "{}: row {} has non-numeric value '{}', skipped",
                        path.display(),
                        row + 2,
                        raw_value
                    );
                }
            }
        }
        Ok(series)
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}
