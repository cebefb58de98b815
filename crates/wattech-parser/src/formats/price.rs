use std::path::Path;

use chrono::NaiveDateTime;

use crate::errors::NormalizeError;
use crate::model::{RawTable, TransformSummary};
use crate::registry::Transformer;

use super::schema::{PRICE_DAY_COLUMN, PRICE_HOUR_COLUMN, PRICE_MONTH_COLUMN, TIMESTAMP_COLUMN};
use super::{parse_integral, read_input, read_table, text_frame, write_table, TIMESTAMP_FORMAT};

/// `202401`, `5`, `9` -> `2024-01-05 09:00:00`. Any part that does not parse
/// yields `None`; the row itself is kept by the caller.
pub fn derive_price_timestamp(
    reference_month: Option<&str>,
    day: Option<&str>,
    hour: Option<&str>,
) -> Option<String> {
    let month = reference_month?.trim();
    let day = parse_integral(day?)?;
    let hour = parse_integral(hour?)?;
    let token = format!("{month}{day:02}{hour:02}00");
    NaiveDateTime::parse_from_str(&token, "%Y%m%d%H%M")
        .ok()
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceNormalization {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub unparsed_timestamps: usize,
}

/// Replace the three fragment columns by a trailing `DATAHORA` column. Rows are
/// never dropped here, even when their timestamp is null.
pub fn normalize_price(table: RawTable) -> Result<PriceNormalization, NormalizeError> {
    let locate = |column: &str| {
        table
            .column_index(column)
            .ok_or_else(|| NormalizeError::MissingColumn {
                transformer: PriceSeriesTransformer::NAME,
                column: column.to_string(),
            })
    };
    let month_index = locate(PRICE_MONTH_COLUMN)?;
    let day_index = locate(PRICE_DAY_COLUMN)?;
    let hour_index = locate(PRICE_HOUR_COLUMN)?;
    let fragments = [month_index, day_index, hour_index];

    let kept: Vec<usize> = (0..table.headers.len())
        .filter(|index| !fragments.contains(index))
        .collect();
    let mut headers: Vec<String> = kept.iter().map(|index| table.headers[*index].clone()).collect();
    headers.push(TIMESTAMP_COLUMN.to_string());

    let mut unparsed_timestamps = 0;
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let stamp = derive_price_timestamp(
                row[month_index].as_deref(),
                row[day_index].as_deref(),
                row[hour_index].as_deref(),
            );
            if stamp.is_none() {
                unparsed_timestamps += 1;
            }
            let mut out: Vec<Option<String>> =
                kept.iter().map(|index| row[*index].clone()).collect();
            out.push(stamp);
            out
        })
        .collect();

    Ok(PriceNormalization {
        headers,
        rows,
        unparsed_timestamps,
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PriceSeriesTransformer;

impl PriceSeriesTransformer {
    pub const NAME: &'static str = "price";
    const DELIMITER: u8 = b';';
}

impl Transformer for PriceSeriesTransformer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(&self, input: &Path, output: &Path) -> Result<TransformSummary, NormalizeError> {
        let bytes = read_input(Self::NAME, input)?;
        let table = read_table(Self::NAME, &bytes, Self::DELIMITER)?;
        let normalized = normalize_price(table)?;

        let mut df = text_frame(Self::NAME, &normalized.headers, &normalized.rows)?;
        write_table(Self::NAME, &mut df, output)?;

        let mut summary = TransformSummary {
            rows_read: normalized.rows.len(),
            rows_written: normalized.rows.len(),
            rows_dropped: 0,
            notes: Vec::new(),
        };
        if normalized.unparsed_timestamps > 0 {
            summary.note(format!(
                "{} rows kept with a null timestamp",
                normalized.unparsed_timestamps
            ));
        }
        Ok(summary)
    }
}
