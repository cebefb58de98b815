use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use encoding_rs::WINDOWS_1252;
use polars::prelude::*;
use tracing::{debug, warn};

use crate::errors::NormalizeError;
use crate::model::RawTable;

const SNIFF_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Cell spellings read as null, the same set pandas treats as missing by default.
const NULL_TOKENS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Output delimiter shared by every transformer.
pub const OUTPUT_DELIMITER: u8 = b';';

pub(crate) fn read_input(
    transformer: &'static str,
    path: &Path,
) -> Result<Vec<u8>, NormalizeError> {
    if !path.exists() {
        return Err(NormalizeError::MissingInput {
            transformer,
            path: path.to_path_buf(),
        });
    }
    fs::read(path).map_err(|err| NormalizeError::io(transformer, path, err))
}

/// UTF-8 when the bytes are valid UTF-8, Windows-1252 otherwise. A leading BOM is dropped.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (decoded, _, _) = WINDOWS_1252.decode(bytes);
            decoded
        }
    }
}

/// Pick the candidate delimiter that occurs most often in the header line.
pub fn sniff_delimiter(text: &str, fallback: u8) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    let mut best = fallback;
    let mut best_count = 0;
    for candidate in SNIFF_CANDIDATES {
        let count = header.bytes().filter(|byte| *byte == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

/// Strict read: every record must have as many fields as the header.
pub fn read_table(
    transformer: &'static str,
    bytes: &[u8],
    delimiter: u8,
) -> Result<RawTable, NormalizeError> {
    let text = decode_text(bytes);
    parse_records(transformer, &text, delimiter, false)
}

/// Strict read with the primary delimiter, then a flexible read with the sniffed
/// delimiter when the primary attempt errors or collapses into a single column.
pub fn read_table_tolerant(
    transformer: &'static str,
    bytes: &[u8],
    primary: u8,
) -> Result<RawTable, NormalizeError> {
    let text = decode_text(bytes);
    let sniffed = sniff_delimiter(&text, primary);

    match parse_records(transformer, &text, primary, false) {
        Ok(table) if table.headers.len() > 1 || sniffed == primary => return Ok(table),
        Ok(_) => debug!(
            transformer,
            delimiter = %char::from(sniffed),
            "primary delimiter produced a single column; retrying with sniffed delimiter"
        ),
        Err(NormalizeError::EmptyInput { .. }) => {
            return Err(NormalizeError::EmptyInput { transformer })
        }
        Err(err) => warn!(
            transformer,
            delimiter = %char::from(sniffed),
            "primary read failed ({err}); retrying with sniffed delimiter"
        ),
    }

    parse_records(transformer, &text, sniffed, true)
}

fn parse_records(
    transformer: &'static str,
    text: &str,
    delimiter: u8,
    flexible: bool,
) -> Result<RawTable, NormalizeError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(flexible)
        .from_reader(text.as_bytes());

    let header_record = reader
        .headers()
        .map_err(|source| NormalizeError::Csv {
            transformer,
            source,
        })?
        .clone();
    if header_record.is_empty() {
        return Err(NormalizeError::EmptyInput { transformer });
    }
    let headers = dedupe_headers(header_record.iter().enumerate().map(|(index, header)| {
        match header.trim() {
            "" => format!("Unnamed: {index}"),
            trimmed => trimmed.to_string(),
        }
    }));
    let width = headers.len();

    let mut rows = Vec::new();
    for (line_index, record) in reader.records().enumerate() {
        let record = record.map_err(|source| NormalizeError::Csv {
            transformer,
            source,
        })?;
        if record.len() > width {
            warn!(
                transformer,
                line_index,
                extra = record.len() - width,
                "dropping trailing cells beyond the header width"
            );
        }
        let mut row: Vec<Option<String>> = record
            .iter()
            .take(width)
            .map(|cell| Some(cell.to_string()).filter(|cell| !is_null_cell(cell)))
            .collect();
        row.resize(width, None);
        rows.push(row);
    }

    Ok(RawTable { headers, rows })
}

fn is_null_cell(cell: &str) -> bool {
    let trimmed = cell.trim();
    trimmed.is_empty() || NULL_TOKENS.contains(&trimmed)
}

/// Blank headers are named `Unnamed: N` upstream; repeated names get a `.N`
/// suffix in order of appearance.
fn dedupe_headers(headers: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .map(|header| {
            let count = seen.entry(header.clone()).or_insert(0);
            let name = if *count == 0 {
                header
            } else {
                format!("{header}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

pub(crate) enum ColumnData {
    Text(Vec<Option<String>>),
    Float(Vec<Option<f64>>),
}

/// Ordered set of named columns turned into a polars frame.
#[derive(Default)]
pub(crate) struct TableBuilder {
    columns: Vec<(String, ColumnData)>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, name: impl Into<String>, values: Vec<Option<String>>) -> &mut Self {
        self.columns.push((name.into(), ColumnData::Text(values)));
        self
    }

    pub fn float(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> &mut Self {
        self.columns.push((name.into(), ColumnData::Float(values)));
        self
    }

    pub fn build(self, transformer: &'static str) -> Result<DataFrame, NormalizeError> {
        let mut cols: Vec<Column> = Vec::with_capacity(self.columns.len());
        for (name, data) in self.columns {
            let series = match data {
                ColumnData::Text(values) => {
                    let utf8: Vec<Option<&str>> = values.iter().map(|v| v.as_deref()).collect();
                    Series::new(name.as_str().into(), utf8)
                }
                ColumnData::Float(values) => Series::new(name.as_str().into(), values),
            };
            cols.push(series.into());
        }
        DataFrame::new(cols).map_err(|err| NormalizeError::table(transformer, err))
    }
}

/// Build a frame of text columns straight from a raw table.
pub(crate) fn text_frame(
    transformer: &'static str,
    headers: &[String],
    rows: &[Vec<Option<String>>],
) -> Result<DataFrame, NormalizeError> {
    let mut builder = TableBuilder::new();
    for (index, header) in headers.iter().enumerate() {
        let values = rows.iter().map(|row| row[index].clone()).collect();
        builder.text(header.clone(), values);
    }
    builder.build(transformer)
}

/// Write the frame as `;`-separated UTF-8 with a header row. The file is staged
/// next to the target and renamed over it, so readers never see a partial table.
pub fn write_table(
    transformer: &'static str,
    df: &mut DataFrame,
    path: &Path,
) -> Result<(), NormalizeError> {
    let staging = staging_path(path);
    let result = (|| {
        let mut file =
            File::create(&staging).map_err(|err| NormalizeError::io(transformer, &staging, err))?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(OUTPUT_DELIMITER)
            .finish(df)
            .map_err(|err| NormalizeError::table(transformer, err))?;
        file.sync_all()
            .map_err(|err| NormalizeError::io(transformer, &staging, err))?;
        fs::rename(&staging, path).map_err(|err| NormalizeError::io(transformer, path, err))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&staging);
    }
    result
}

fn staging_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{file_name}.partial"))
}
