use std::collections::HashMap;
use std::path::Path;

use polars::prelude::DataFrame;
use tracing::{debug, warn};

use crate::errors::NormalizeError;
use crate::model::{LocationSalt, RawTable, SensorRecord, TransformSummary};
use crate::registry::Transformer;

use super::schema::{
    canonical_metric, canonical_sensor_column, canonical_unit, METRIC_COLUMN,
    SENSOR_COLUMNS, SENSOR_CRITICAL_COLUMNS, TIMESTAMP_COLUMN, UNIT_COLUMN,
};
use super::{
    anonymize_location, parse_tolerant_datetime, parse_tolerant_float, read_input, read_table,
    read_table_tolerant, text_frame, write_table, TableBuilder, OUTPUT_DELIMITER,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SensorParse {
    /// Canonical columns found in the input, in canonical order.
    pub columns: Vec<&'static str>,
    pub records: Vec<SensorRecord>,
    pub rows_read: usize,
}

impl SensorParse {
    pub fn rows_dropped(&self) -> usize {
        self.rows_read - self.records.len()
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// Map input headers onto the canonical sensor columns. The first header that
/// resolves to a canonical name wins; unknown headers are discarded.
fn resolve_columns(headers: &[String]) -> HashMap<&'static str, usize> {
    let mut resolved = HashMap::new();
    for (index, header) in headers.iter().enumerate() {
        let canonical = canonical_sensor_column(header);
        if let Some(name) = SENSOR_COLUMNS.iter().find(|name| **name == canonical) {
            resolved.entry(*name).or_insert(index);
        }
    }
    resolved
}

/// First pass: keep the canonical columns, trim text, anonymize the location,
/// parse `data` and `created_at`, and drop rows missing a critical field.
pub fn parse_sensor_table(table: &RawTable, salt: &LocationSalt) -> SensorParse {
    let resolved = resolve_columns(&table.headers);
    let columns: Vec<&'static str> = SENSOR_COLUMNS
        .iter()
        .copied()
        .filter(|name| resolved.contains_key(name))
        .collect();
    let critical: Vec<&'static str> = SENSOR_CRITICAL_COLUMNS
        .iter()
        .copied()
        .filter(|name| resolved.contains_key(name))
        .collect();

    let mut records = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let cell = |name: &str| {
            resolved
                .get(name)
                .and_then(|index| row[*index].as_deref())
        };

        let record = SensorRecord {
            sensor_model: trimmed(cell("sensor_model")),
            measure_unit: trimmed(cell("measure_unit")),
            device: trimmed(cell("device")),
            location: Some(anonymize_location(cell("location"), salt)).filter(|v| !v.is_empty()),
            data_type: trimmed(cell("data_type")),
            data: parse_tolerant_float(&cell("data")),
            created_at: cell("created_at").and_then(parse_tolerant_datetime),
        };

        let complete = critical.iter().all(|name| match *name {
            "data" => record.data.is_some(),
            "created_at" => record.created_at.is_some(),
            "data_type" => record.data_type.is_some(),
            _ => true,
        });
        if complete {
            records.push(record);
        }
    }

    SensorParse {
        columns,
        records,
        rows_read: table.height(),
    }
}

pub(crate) fn sensor_frame(parsed: &SensorParse) -> Result<DataFrame, NormalizeError> {
    let text = |get: fn(&SensorRecord) -> &Option<String>| -> Vec<Option<String>> {
        parsed.records.iter().map(|record| get(record).clone()).collect()
    };

    let mut builder = TableBuilder::new();
    for column in &parsed.columns {
        match *column {
            "sensor_model" => builder.text(*column, text(|r| &r.sensor_model)),
            "measure_unit" => builder.text(*column, text(|r| &r.measure_unit)),
            "device" => builder.text(*column, text(|r| &r.device)),
            "location" => builder.text(*column, text(|r| &r.location)),
            "data_type" => builder.text(*column, text(|r| &r.data_type)),
            "created_at" => builder.text(*column, text(|r| &r.created_at)),
            "data" => builder.float(
                *column,
                parsed.records.iter().map(|record| record.data).collect(),
            ),
            _ => &mut builder,
        };
    }
    builder.build(SensorRecordTransformer::NAME)
}

/// Second pass: add `DATAHORA`, `unit` and `metric` derived from the already
/// parsed table. Existing derived columns are overwritten in place, so running
/// this twice gives the same table.
pub fn canonicalize_sensor_table(mut table: RawTable) -> RawTable {
    let derive = |table: &RawTable, source: &str, map: fn(&str) -> String| {
        table.column_index(source).map(|index| {
            table
                .rows
                .iter()
                .map(|row| row[index].as_deref().map(map))
                .collect::<Vec<_>>()
        })
    };

    let stamps = derive(&table, "created_at", |value| value.to_string());
    let units = derive(&table, "measure_unit", canonical_unit);
    let metrics = derive(&table, "data_type", canonical_metric);

    for (name, values) in [
        (TIMESTAMP_COLUMN, stamps),
        (UNIT_COLUMN, units),
        (METRIC_COLUMN, metrics),
    ] {
        if let Some(values) = values {
            set_column(&mut table, name, values);
        }
    }
    table
}

fn set_column(table: &mut RawTable, name: &str, values: Vec<Option<String>>) {
    match table.column_index(name) {
        Some(index) => {
            for (row, value) in table.rows.iter_mut().zip(values) {
                row[index] = value;
            }
        }
        None => {
            table.headers.push(name.to_string());
            for (row, value) in table.rows.iter_mut().zip(values) {
                row.push(value);
            }
        }
    }
}

/// Rewrite a parsed sensor table in place with its canonical columns.
pub fn canonicalize_sensor_file(path: &Path) -> Result<(), NormalizeError> {
    let name = SensorRecordTransformer::NAME;
    let bytes = read_input(name, path)?;
    let table = canonicalize_sensor_table(read_table(name, &bytes, OUTPUT_DELIMITER)?);
    let mut df = text_frame(name, &table.headers, &table.rows)?;
    write_table(name, &mut df, path)
}

#[derive(Debug, Clone, Default)]
pub struct SensorRecordTransformer {
    salt: LocationSalt,
}

impl SensorRecordTransformer {
    pub const NAME: &'static str = "sensor";
    const PRIMARY_DELIMITER: u8 = b',';

    pub fn new(salt: LocationSalt) -> Self {
        Self { salt }
    }

    pub fn salt(&self) -> &LocationSalt {
        &self.salt
    }
}

impl Transformer for SensorRecordTransformer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(&self, input: &Path, output: &Path) -> Result<TransformSummary, NormalizeError> {
        let bytes = read_input(Self::NAME, input)?;
        let table = read_table_tolerant(Self::NAME, &bytes, Self::PRIMARY_DELIMITER)?;
        let parsed = parse_sensor_table(&table, &self.salt);
        debug!(
            columns = ?parsed.columns,
            dropped = parsed.rows_dropped(),
            "sensor records parsed"
        );

        let mut df = sensor_frame(&parsed)?;
        write_table(Self::NAME, &mut df, output)?;

        let mut summary = TransformSummary {
            rows_read: parsed.rows_read,
            rows_written: parsed.records.len(),
            rows_dropped: parsed.rows_dropped(),
            notes: Vec::new(),
        };

        if let Err(err) = canonicalize_sensor_file(output) {
            warn!(
                output = %output.display(),
                "unit/metric canonicalization failed, keeping parsed output: {err}"
            );
            summary.note(format!("canonicalization skipped: {err}"));
        }
        Ok(summary)
    }
}
