//! CLI entry point for the transit station difference-in-differences study.
//!
//! Subcommands run the pipeline stage by stage (`classify`, `process`,
//! `analyze`) or end to end (`run`). Inputs must already be on disk; use
//! `check-inputs` to see what is expected where.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use transit_did::geography::Group;
use transit_did::output::{ReportFormat, write_units};
use transit_did::report::Report;
use transit_did::{StudyConfig, pipeline};

#[derive(Parser)]
#[command(name = "transit_did")]
#[command(
    about = "Difference-in-differences study of employment around new transit stations",
    long_about = None
)]
struct Cli {
    /// TOML study configuration; built-in Seattle defaults when omitted
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Report format for `analyze` and `run`
    #[arg(short, long, global = true, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the input files the study expects and whether each exists
    CheckInputs,
    /// Classify block groups into treatment and control by station distance
    Classify {
        /// Optional CSV to write the classified units to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Classify and build the unit × year panel CSV
    Process,
    /// Fit the primary and placebo models on the processed panel
    Analyze,
    /// `process` followed by `analyze`
    Run,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/transit_did.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("transit_did.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        );

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(
            EnvFilter::try_from_env("RUST_LOG_JSON").unwrap_or_else(|_| EnvFilter::new("debug")),
        );

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli) {
        error!(error = %e, "Study failed");
        return Err(e);
    }
    Ok(())
}

fn execute(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            StudyConfig::from_file(path)?
        }
        None => {
            info!("No --config given, using built-in Seattle University Link study");
            StudyConfig::seattle_u_link()
        }
    };

    match cli.command {
        Commands::CheckInputs => {
            let inputs = pipeline::check_inputs(&config);
            for input in &inputs {
                if input.present {
                    info!(input = %input.description, path = %input.path.display(), "Found");
                } else {
                    warn!(input = %input.description, path = %input.path.display(), "Missing");
                }
            }
            let missing = inputs.iter().filter(|i| !i.present).count();
            if inputs.first().is_some_and(|b| !b.present) {
                bail!("boundary file is missing; retrieve the block-group shapefile first");
            }
            if missing == inputs.len() - 1 {
                bail!("no yearly count file is present; retrieve the workplace counts first");
            }
            info!(present = inputs.len() - missing, missing, "Input check complete");
        }
        Commands::Classify { output } => {
            let units = pipeline::classify_units(&config)?;
            let treatment = units.iter().filter(|u| u.group == Group::Treatment).count();
            info!(
                treatment,
                control = units.len() - treatment,
                "Classification complete"
            );
            if let Some(path) = output {
                write_units(&path, &units)?;
            }
        }
        Commands::Process => {
            let panel = pipeline::process(&config)?;
            info!(
                rows = panel.len(),
                units = panel.unit_count(),
                years = ?panel.years(),
                path = %config.outputs.panel_path().display(),
                "Processing complete"
            );
        }
        Commands::Analyze => {
            let report = pipeline::analyze(&config, cli.format)?;
            present(&report, cli.format)?;
        }
        Commands::Run => {
            let report = pipeline::run(&config, cli.format)?;
            present(&report, cli.format)?;
        }
    }

    Ok(())
}

fn present(report: &Report, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Text => println!("{}", report.render_text()),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    info!(headline = %report.primary.headline(), "Primary model");
    info!(headline = %report.placebo.headline(), "Placebo model");
    Ok(())
}
