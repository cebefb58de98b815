use std::path::Path;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::errors::NormalizeError;
use crate::model::{RawTable, TransformSummary};
use crate::registry::Transformer;

use super::schema::{is_placeholder_column, TIMESTAMP_COLUMN, WEATHER_COLUMNS};
use super::{
    coerce_integer, coerce_numeric_text, read_input, read_table_tolerant, text_frame, write_table,
};

const DATE_COLUMN: &str = "DATE";
const HOUR_COLUMN: &str = "HOUR_UTC";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherNormalization {
    pub headers: Vec<String>,
    /// Retained rows; every cell is present.
    pub rows: Vec<Vec<Option<String>>>,
    pub rows_read: usize,
    pub renamed: bool,
}

/// `DATE` plus an integer hour becomes `YYYY-MM-DD HH:00:00`; any failure is null.
pub fn derive_weather_timestamp(date: Option<&str>, hour: Option<&str>) -> Option<String> {
    let date = date?.trim();
    let hour = coerce_integer(hour?)?;
    if !(0..=23).contains(&hour) {
        return None;
    }
    let combined = format!("{date} {hour:02}:00");
    NaiveDateTime::parse_from_str(&combined, "%Y-%m-%d %H:%M")
        .ok()
        .map(|dt| dt.format("%Y-%m-%d %H:00:00").to_string())
}

/// Drop placeholder columns, rename to the canonical schema when the width
/// matches exactly, coerce every cell, derive `DATAHORA` and keep complete rows.
pub fn normalize_weather(table: RawTable) -> WeatherNormalization {
    let kept: Vec<usize> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, header)| !is_placeholder_column(header))
        .map(|(index, _)| index)
        .collect();

    let renamed = kept.len() == WEATHER_COLUMNS.len();
    let mut headers: Vec<String> = if renamed {
        WEATHER_COLUMNS.iter().map(|name| name.to_string()).collect()
    } else {
        kept.iter().map(|index| table.headers[*index].clone()).collect()
    };

    let rows_read = table.height();
    let mut rows: Vec<Vec<Option<String>>> = table
        .rows
        .into_iter()
        .map(|row| {
            kept.iter()
                .map(|index| row[*index].as_deref().and_then(coerce_numeric_text))
                .collect()
        })
        .collect();

    let date_index = headers.iter().position(|h| h == DATE_COLUMN);
    let hour_index = headers.iter().position(|h| h == HOUR_COLUMN);
    if let (Some(date_index), Some(hour_index)) = (date_index, hour_index) {
        let existing = headers.iter().position(|h| h == TIMESTAMP_COLUMN);
        for row in rows.iter_mut() {
            let stamp =
                derive_weather_timestamp(row[date_index].as_deref(), row[hour_index].as_deref());
            match existing {
                Some(index) => row[index] = stamp,
                None => row.push(stamp),
            }
        }
        if existing.is_none() {
            headers.push(TIMESTAMP_COLUMN.to_string());
        }
    }

    rows.retain(|row| row.iter().all(Option::is_some));

    WeatherNormalization {
        headers,
        rows,
        rows_read,
        renamed,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WeatherSeriesTransformer;

impl WeatherSeriesTransformer {
    pub const NAME: &'static str = "weather";
    const PRIMARY_DELIMITER: u8 = b';';
}

impl Transformer for WeatherSeriesTransformer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(&self, input: &Path, output: &Path) -> Result<TransformSummary, NormalizeError> {
        let bytes = read_input(Self::NAME, input)?;
        let table = read_table_tolerant(Self::NAME, &bytes, Self::PRIMARY_DELIMITER)?;
        let normalized = normalize_weather(table);
        debug!(
            columns = normalized.headers.len(),
            renamed = normalized.renamed,
            "weather series normalized"
        );

        let mut df = text_frame(Self::NAME, &normalized.headers, &normalized.rows)?;
        write_table(Self::NAME, &mut df, output)?;

        let mut summary = TransformSummary {
            rows_read: normalized.rows_read,
            rows_written: normalized.rows.len(),
            rows_dropped: normalized.rows_read - normalized.rows.len(),
            notes: Vec::new(),
        };
        if !normalized.renamed {
            summary.note("column count did not match the canonical schema; names kept");
        }
        Ok(summary)
    }
}
