mod config;
mod pipeline;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wattech_parser::{
    all_transformer_descriptors, run_transformer, ApplianceReportTransformer, LocationSalt,
    PriceSeriesTransformer, SensorRecordTransformer, StepReport, Transformer,
    WeatherSeriesTransformer,
};

use crate::config::NormalizerConfig;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Normalizes the daily household energy sources",
    long_about = None
)]
struct Cli {
    /// Optional TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Human-readable logs instead of JSON lines
    #[arg(long, global = true)]
    plain_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every transformer over the input folder
    RunAll(RunAllArgs),
    /// Extract appliance rows from the consumption report PDF
    Appliance(StepArgs),
    /// Rebuild timestamps in the price-differential series
    Price(StepArgs),
    /// Clean the weather-station series
    Weather(StepArgs),
    /// Normalize telemetry readings and canonicalize units and metrics
    Sensor(SensorArgs),
    /// List the available transformers and their default file names
    List,
}

#[derive(Args, Debug, Default)]
struct RunAllArgs {
    /// Folder holding the raw inputs
    #[arg(long)]
    input_dir: Option<PathBuf>,
    /// Folder receiving the normalized tables
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Salt for location anonymization
    #[arg(long)]
    salt: Option<String>,
    /// Exit non-zero when any step failed
    #[arg(long)]
    strict: bool,
    /// Print the step reports as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug, Default)]
struct StepArgs {
    /// Input file (defaults to the configured input folder and name)
    #[arg(long)]
    input: Option<PathBuf>,
    /// Output file (defaults to the configured output folder and name)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
struct SensorArgs {
    #[command(flatten)]
    step: StepArgs,
    /// Salt for location anonymization
    #[arg(long)]
    salt: Option<String>,
}

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.plain_logs);

    let mut config = NormalizerConfig::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok());

    match cli.command {
        Command::RunAll(args) => handle_run_all(config, args),
        Command::Appliance(args) => handle_step(&config, &ApplianceReportTransformer, args),
        Command::Price(args) => handle_step(&config, &PriceSeriesTransformer, args),
        Command::Weather(args) => handle_step(&config, &WeatherSeriesTransformer, args),
        Command::Sensor(args) => {
            if let Some(salt) = args.salt {
                config.location_salt = LocationSalt::new(salt);
            }
            warn_on_default_salt(&config.location_salt);
            let transformer = SensorRecordTransformer::new(config.location_salt.clone());
            handle_step(&config, &transformer, args.step)
        }
        Command::List => {
            for descriptor in all_transformer_descriptors() {
                println!(
                    "{:<10} {:<22} -> {:<22} {}",
                    descriptor.code,
                    descriptor.default_input,
                    descriptor.default_output,
                    descriptor.description
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(plain: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if plain {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    }
}

fn warn_on_default_salt(salt: &LocationSalt) {
    if salt.is_insecure_default() {
        warn!("using the default location salt; set SENSORS_LOCATION_SALT before production use");
    }
}

fn handle_run_all(mut config: NormalizerConfig, args: RunAllArgs) -> Result<ExitCode> {
    if let Some(dir) = args.input_dir {
        config.input_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(salt) = args.salt {
        config.location_salt = LocationSalt::new(salt);
    }

    let reports = pipeline::run_all(&config)?;
    print_reports(&reports, args.json)?;

    let failed = reports.iter().filter(|report| !report.is_success()).count();
    info!(steps = reports.len(), failed, "all files processed");
    if args.strict && failed > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_step(
    config: &NormalizerConfig,
    transformer: &dyn Transformer,
    args: StepArgs,
) -> Result<ExitCode> {
    let code = transformer.name();
    let input = match args.input {
        Some(path) => path,
        None => config
            .input_path(code)
            .with_context(|| format!("no input file configured for {code}"))?,
    };
    let output = match args.output {
        Some(path) => path,
        None => config
            .output_path(code)
            .with_context(|| format!("no output file configured for {code}"))?,
    };
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output folder {}", parent.display()))?;
    }

    let report = run_transformer(transformer, &input, &output);
    print_reports(std::slice::from_ref(&report), false)?;
    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn print_reports(reports: &[StepReport], json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(reports).context("failed to serialize step reports")?;
        println!("{rendered}");
    } else {
        println!("{}", pipeline::render_summary(reports));
    }
    Ok(())
}
