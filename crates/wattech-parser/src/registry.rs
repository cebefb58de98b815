use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use once_cell::sync::Lazy;
use tracing::{error, info};

use crate::errors::NormalizeError;
use crate::model::{StepReport, StepStatus, TransformSummary};

pub trait Transformer {
    fn name(&self) -> &'static str;
    fn run(&self, input: &Path, output: &Path) -> Result<TransformSummary, NormalizeError>;
}

#[derive(Debug, Clone)]
pub struct TransformerDescriptor {
    pub code: &'static str,
    pub default_input: &'static str,
    pub default_output: &'static str,
    pub description: &'static str,
}

static TRANSFORMERS: Lazy<Vec<TransformerDescriptor>> = Lazy::new(|| {
    vec![
        TransformerDescriptor {
            code: "appliance",
            default_input: "consumoAparelho.pdf",
            default_output: "consumo_aparelho.csv",
            description: "Extracts appliance consumption rows from the multi-page report",
        },
        TransformerDescriptor {
            code: "price",
            default_input: "horarioPrecoDiff.csv",
            default_output: "pld_normalizado.csv",
            description: "Reassembles reference month, day and hour into one timestamp",
        },
        TransformerDescriptor {
            code: "weather",
            default_input: "clima.csv",
            default_output: "dados_clima.csv",
            description: "Cleans the weather-station series and derives a date-hour column",
        },
        TransformerDescriptor {
            code: "sensor",
            default_input: "dados.csv",
            default_output: "dados.csv",
            description: "Normalizes telemetry, hashes locations, canonicalizes units and metrics",
        },
    ]
});

pub fn all_transformer_descriptors() -> &'static [TransformerDescriptor] {
    TRANSFORMERS.as_slice()
}

pub fn transformer_descriptor(code: &str) -> Option<&'static TransformerDescriptor> {
    TRANSFORMERS.iter().find(|descriptor| descriptor.code == code)
}

/// Run one transformer and fold its outcome into a report. Failures are logged
/// and reported, never propagated, so sibling transformers keep running.
pub fn run_transformer(transformer: &dyn Transformer, input: &Path, output: &Path) -> StepReport {
    let name = transformer.name();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| transformer.run(input, output)))
        .unwrap_or_else(|payload| Err(NormalizeError::Panicked {
            transformer: name,
            message: panic_message(payload.as_ref()),
        }));
    match outcome {
        Ok(summary) => {
            info!(
                transformer = name,
                output = %output.display(),
                rows = summary.rows_written,
                dropped = summary.rows_dropped,
                "output written"
            );
            StepReport {
                transformer: name,
                input: input.to_path_buf(),
                output: output.to_path_buf(),
                status: StepStatus::Written,
                summary: Some(summary),
                message: None,
            }
        }
        Err(err) => {
            error!(
                transformer = err.transformer(),
                input = %input.display(),
                "transformation failed: {err}"
            );
            StepReport {
                transformer: name,
                input: input.to_path_buf(),
                output: output.to_path_buf(),
                status: StepStatus::Failed,
                summary: None,
                message: Some(err.to_string()),
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
