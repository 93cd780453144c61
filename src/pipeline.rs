//! Stage orchestration behind the CLI subcommands.
//!
//! Each function takes the full [`StudyConfig`] and runs one or more stages
//! end to end against the filesystem layout it describes.

use crate::config::StudyConfig;
use crate::error::Result;
use crate::geography::{Classifier, GeographicUnit, load_boundaries};
use crate::output::{ReportFormat, write_panel, write_report};
use crate::panel::{Panel, PanelOptions, build_panel};
use crate::report::{Report, build_report};
use crate::source::{CountSource, DirectorySource};
use std::path::PathBuf;
use tracing::info;

/// One input artifact the retrieval step is expected to have produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputStatus {
    pub description: String,
    pub path: PathBuf,
    pub present: bool,
}

/// Lists the boundary file and every yearly count file, with whether each exists.
pub fn check_inputs(config: &StudyConfig) -> Vec<InputStatus> {
    let source = DirectorySource::from_config(config);
    let boundary = &config.sources.boundary_file;
    let mut inputs = vec![InputStatus {
        description: "block-group boundaries".to_string(),
        path: boundary.clone(),
        present: boundary.exists(),
    }];
    for &year in &config.study.years {
        let present = source.existing_path(year);
        inputs.push(InputStatus {
            description: format!("workplace counts {year}"),
            path: present.clone().unwrap_or_else(|| source.path_for(year)),
            present: present.is_some(),
        });
    }
    inputs
}

/// Loads boundaries and runs the classifier.
#[tracing::instrument(skip_all, fields(boundary_file = %config.sources.boundary_file.display()))]
pub fn classify_units(config: &StudyConfig) -> Result<Vec<GeographicUnit>> {
    let boundaries = load_boundaries(
        &config.sources.boundary_file,
        &config.sources.boundary_key_column,
        &config.region.key_prefix,
    )?;
    Classifier::from_config(config)?.classify(&boundaries)
}

/// Builds the panel from `source` for already-classified units.
pub fn assemble_panel<S: CountSource>(
    config: &StudyConfig,
    source: &S,
    units: &[GeographicUnit],
) -> Result<Panel> {
    build_panel(source, units, &PanelOptions::from_config(config))
}

/// Classifier plus panel builder; writes the panel CSV.
#[tracing::instrument(skip_all)]
pub fn process(config: &StudyConfig) -> Result<Panel> {
    let units = classify_units(config)?;
    let panel = assemble_panel(config, &DirectorySource::from_config(config), &units)?;
    write_panel(&config.outputs.panel_path(), &panel)?;
    Ok(panel)
}

/// Fits both models on `panel` and writes the report to the configured path.
pub fn analyze_panel(config: &StudyConfig, panel: &Panel, format: ReportFormat) -> Result<Report> {
    let report = build_report(panel, config)?;
    let path = report_path(config, format);
    write_report(&path, &report, format)?;
    Ok(report)
}

/// Reads the processed panel and runs [`analyze_panel`].
#[tracing::instrument(skip_all, fields(format = ?format))]
pub fn analyze(config: &StudyConfig, format: ReportFormat) -> Result<Report> {
    let panel = Panel::read_csv(&config.outputs.panel_path())?;
    info!(rows = panel.len(), units = panel.unit_count(), "Panel ready for analysis");
    analyze_panel(config, &panel, format)
}

/// `process` followed by `analyze`, without re-reading the panel.
pub fn run(config: &StudyConfig, format: ReportFormat) -> Result<Report> {
    let panel = process(config)?;
    analyze_panel(config, &panel, format)
}

/// Configured report path, with the extension swapped to `.json` for JSON output.
pub fn report_path(config: &StudyConfig, format: ReportFormat) -> PathBuf {
    let path = config.outputs.report_path();
    match format {
        ReportFormat::Text => path,
        ReportFormat::Json => path.with_extension("json"),
    }
}
