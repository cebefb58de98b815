use std::fs;

use anyhow::{Context, Result};
use comfy_table::Table;
use tracing::{info, warn};
use wattech_parser::{
    run_transformer, ApplianceReportTransformer, PriceSeriesTransformer, SensorRecordTransformer,
    StepReport, StepStatus, Transformer, WeatherSeriesTransformer,
};

use crate::config::NormalizerConfig;

/// Run the four transformers in order over the configured folders. A failed
/// step is logged and reported; the remaining steps still run.
pub fn run_all(config: &NormalizerConfig) -> Result<Vec<StepReport>> {
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "failed to create output folder {}",
            config.output_dir.display()
        )
    })?;

    if config.location_salt.is_insecure_default() {
        warn!("using the default location salt; set SENSORS_LOCATION_SALT before production use");
    }

    let appliance = ApplianceReportTransformer;
    let price = PriceSeriesTransformer;
    let weather = WeatherSeriesTransformer;
    let sensor = SensorRecordTransformer::new(config.location_salt.clone());
    let steps: [&dyn Transformer; 4] = [&appliance, &price, &weather, &sensor];

    info!(
        input_dir = %config.input_dir.display(),
        output_dir = %config.output_dir.display(),
        "processing local files"
    );

    Ok(steps.into_iter().map(|step| run_step(config, step)).collect())
}

/// Run one step with its configured paths. A step without configured file
/// names is reported as failed rather than skipped.
fn run_step(config: &NormalizerConfig, step: &dyn Transformer) -> StepReport {
    let name = step.name();
    match (config.input_path(name), config.output_path(name)) {
        (Some(input), Some(output)) => run_transformer(step, &input, &output),
        (input, output) => {
            warn!(transformer = name, "no file names configured for step");
            StepReport {
                transformer: name,
                input: input.unwrap_or_default(),
                output: output.unwrap_or_default(),
                status: StepStatus::Failed,
                summary: None,
                message: Some(format!("no file names configured for {name}")),
            }
        }
    }
}

pub fn render_summary(reports: &[StepReport]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["step", "status", "rows", "dropped", "output", "detail"]);
    for report in reports {
        let (rows, dropped, detail) = match &report.summary {
            Some(summary) => (
                summary.rows_written.to_string(),
                summary.rows_dropped.to_string(),
                summary.notes.join("; "),
            ),
            None => (
                "-".to_string(),
                "-".to_string(),
                report.message.clone().unwrap_or_default(),
            ),
        };
        table.add_row(vec![
            report.transformer.to_string(),
            report.status.to_string(),
            rows,
            dropped,
            report.output.display().to_string(),
            detail,
        ]);
    }
    table.to_string()
}
