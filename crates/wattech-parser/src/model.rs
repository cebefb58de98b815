use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Placeholder salt used when the caller does not supply one. It is public
/// knowledge, so digests produced with it can be reversed by dictionary attack.
pub const DEFAULT_LOCATION_SALT: &str = "change-me-salt";

/// Secret mixed into sensor locations before hashing.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationSalt(String);

impl LocationSalt {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_insecure_default(&self) -> bool {
        self.0 == DEFAULT_LOCATION_SALT
    }
}

impl Default for LocationSalt {
    fn default() -> Self {
        Self(DEFAULT_LOCATION_SALT.to_string())
    }
}

impl fmt::Debug for LocationSalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_insecure_default() {
            f.write_str("LocationSalt(<insecure default>)")
        } else {
            f.write_str("LocationSalt(<redacted>)")
        }
    }
}

/// One appliance line of the consumption report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplianceRow {
    pub name: String,
    pub power_rating: String,
    pub usage_days: String,
    pub usage_factor: String,
    pub unit: String,
    pub consumption: String,
}

/// One sensor reading after the parse pass. Every field is optional because
/// the input may not carry the column at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorRecord {
    pub sensor_model: Option<String>,
    pub measure_unit: Option<String>,
    pub device: Option<String>,
    pub location: Option<String>,
    pub data_type: Option<String>,
    pub data: Option<f64>,
    pub created_at: Option<String>,
}

/// Header plus text cells, as read from a delimited input. Empty cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }
}

/// Counters reported by a transformer that wrote its output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformSummary {
    pub rows_read: usize,
    pub rows_written: usize,
    pub rows_dropped: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl TransformSummary {
    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Written,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Written => "written",
            StepStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller learns about one transformer invocation.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub transformer: &'static str,
    pub input: PathBuf,
    pub output: PathBuf,
    pub status: StepStatus,
    pub summary: Option<TransformSummary>,
    pub message: Option<String>,
}

impl StepReport {
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Written
    }
}
