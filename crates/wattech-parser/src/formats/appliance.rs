use std::path::{Path, PathBuf};

use lopdf::Document;
use polars::prelude::DataFrame;
use tracing::{debug, warn};

use crate::errors::NormalizeError;
use crate::model::{ApplianceRow, TransformSummary};
use crate::registry::Transformer;

use super::page_text::page_text;
use super::schema::APPLIANCE_COLUMNS;
use super::{remove_accents, write_table, TableBuilder};

/// Lines at the top of every page that carry titles and column captions.
const PAGE_HEADER_LINES: usize = 8;
const TRAILING_FIELDS: usize = 5;
const NOISE_CHARS: [char; 2] = ['*', '"'];

/// Source of the per-page text of a report.
pub trait PageSource {
    fn pages(&self) -> Result<Vec<String>, NormalizeError>;
}

/// Pages of a PDF on disk, extracted in page order with one visual row per line.
pub struct PdfPages {
    path: PathBuf,
}

impl PdfPages {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PageSource for PdfPages {
    fn pages(&self) -> Result<Vec<String>, NormalizeError> {
        let document = Document::load(&self.path).map_err(|source| NormalizeError::Pdf {
            transformer: ApplianceReportTransformer::NAME,
            source,
        })?;

        let mut pages = Vec::new();
        for (page_number, page_id) in document.get_pages() {
            match page_text(&document, page_id) {
                Ok(text) => pages.push(text),
                Err(err) => {
                    warn!(page = page_number, "could not extract page text: {err}");
                    pages.push(String::new());
                }
            }
        }
        Ok(pages)
    }
}

impl PageSource for Vec<String> {
    fn pages(&self) -> Result<Vec<String>, NormalizeError> {
        Ok(self.clone())
    }
}

/// Split one report line into an appliance row. Lines with fewer than six
/// tokens are noise or continuations and yield `None`.
pub fn parse_appliance_line(line: &str) -> Option<ApplianceRow> {
    let cleaned: String = line.chars().filter(|ch| !NOISE_CHARS.contains(ch)).collect();
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    if tokens.len() <= TRAILING_FIELDS {
        return None;
    }

    let (name_tokens, fields) = tokens.split_at(tokens.len() - TRAILING_FIELDS);
    let usage_factor = match fields[2] {
        "-" => "1",
        other => other,
    };
    let unit = match fields[3] {
        "-" => "h",
        other => other,
    };

    Some(ApplianceRow {
        name: remove_accents(&name_tokens.join(" ")),
        power_rating: fields[0].to_string(),
        usage_days: fields[1].to_string(),
        usage_factor: usage_factor.to_string(),
        unit: unit.to_string(),
        consumption: fields[4].to_string(),
    })
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplianceExtraction {
    pub rows: Vec<ApplianceRow>,
    pub pages_seen: usize,
    pub lines_skipped: usize,
}

/// Walk the pages in order, skipping each page's header block.
pub fn extract_appliance_rows(pages: &[String]) -> ApplianceExtraction {
    let mut extraction = ApplianceExtraction::default();
    for page in pages {
        if page.trim().is_empty() {
            continue;
        }
        extraction.pages_seen += 1;
        for line in page.split('\n').skip(PAGE_HEADER_LINES) {
            match parse_appliance_line(line.trim_end_matches('\r')) {
                Some(row) => extraction.rows.push(row),
                None => extraction.lines_skipped += 1,
            }
        }
    }
    extraction
}

pub(crate) fn appliance_frame(rows: &[ApplianceRow]) -> Result<DataFrame, NormalizeError> {
    let column = |get: fn(&ApplianceRow) -> &String| -> Vec<Option<String>> {
        rows.iter().map(|row| Some(get(row).clone())).collect()
    };

    let mut builder = TableBuilder::new();
    builder
        .text(APPLIANCE_COLUMNS[0], column(|row| &row.name))
        .text(APPLIANCE_COLUMNS[1], column(|row| &row.power_rating))
        .text(APPLIANCE_COLUMNS[2], column(|row| &row.usage_days))
        .text(APPLIANCE_COLUMNS[3], column(|row| &row.usage_factor))
        .text(APPLIANCE_COLUMNS[4], column(|row| &row.unit))
        .text(APPLIANCE_COLUMNS[5], column(|row| &row.consumption));
    builder.build(ApplianceReportTransformer::NAME)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ApplianceReportTransformer;

impl ApplianceReportTransformer {
    pub const NAME: &'static str = "appliance";

    pub fn run_with_source(
        &self,
        source: &dyn PageSource,
        output: &Path,
    ) -> Result<TransformSummary, NormalizeError> {
        let pages = source.pages()?;
        let extraction = extract_appliance_rows(&pages);
        debug!(
            pages = extraction.pages_seen,
            skipped = extraction.lines_skipped,
            "appliance report scanned"
        );

        let mut df = appliance_frame(&extraction.rows)?;
        write_table(Self::NAME, &mut df, output)?;

        let mut summary = TransformSummary {
            rows_read: extraction.rows.len() + extraction.lines_skipped,
            rows_written: extraction.rows.len(),
            rows_dropped: extraction.lines_skipped,
            notes: Vec::new(),
        };
        summary.note(format!("{} pages", extraction.pages_seen));
        Ok(summary)
    }
}

impl Transformer for ApplianceReportTransformer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(&self, input: &Path, output: &Path) -> Result<TransformSummary, NormalizeError> {
        if !input.exists() {
            return Err(NormalizeError::MissingInput {
                transformer: Self::NAME,
                path: input.to_path_buf(),
            });
        }
        self.run_with_source(&PdfPages::new(input), output)
    }
}
