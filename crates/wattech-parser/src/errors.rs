use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("{transformer} input not found: {}", .path.display())]
    MissingInput {
        transformer: &'static str,
        path: PathBuf,
    },

    #[error("{transformer} I/O error on {}: {source}", .path.display())]
    Io {
        transformer: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{transformer} CSV error: {source}")]
    Csv {
        transformer: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("{transformer} PDF error: {source}")]
    Pdf {
        transformer: &'static str,
        #[source]
        source: lopdf::Error,
    },

    #[error("{transformer} input is missing required column '{column}'")]
    MissingColumn {
        transformer: &'static str,
        column: String,
    },

    #[error("{transformer} table error: {source}")]
    Table {
        transformer: &'static str,
        #[source]
        source: PolarsError,
    },

    #[error("{transformer} input did not contain a header row")]
    EmptyInput { transformer: &'static str },

    #[error("{transformer} aborted unexpectedly: {message}")]
    Panicked {
        transformer: &'static str,
        message: String,
    },
}

impl NormalizeError {
    pub fn transformer(&self) -> &'static str {
        match self {
            NormalizeError::MissingInput { transformer, .. }
            | NormalizeError::Io { transformer, .. }
            | NormalizeError::Csv { transformer, .. }
            | NormalizeError::Pdf { transformer, .. }
            | NormalizeError::MissingColumn { transformer, .. }
            | NormalizeError::Table { transformer, .. }
            | NormalizeError::Panicked { transformer, .. }
            | NormalizeError::EmptyInput { transformer } => transformer,
        }
    }

    pub(crate) fn io(
        transformer: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        NormalizeError::Io {
            transformer,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn table(transformer: &'static str, source: PolarsError) -> Self {
        NormalizeError::Table {
            transformer,
            source,
        }
    }
}
