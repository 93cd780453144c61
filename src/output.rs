//! Artifact persistence: the panel CSV, the classified-units CSV, and the report.
//!
//! Every writer creates missing parent directories and overwrites whatever is
//! already at the path, so reruns are idempotent.

use crate::error::Result;
use crate::geography::{GeographicUnit, Group};
use crate::panel::Panel;
use crate::report::Report;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::{self, File};
use std::path::Path;
use tracing::info;

/// Report encodings accepted by [`write_report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Writes the long panel with a header row.
pub fn write_panel(path: &Path, panel: &Panel) -> Result<()> {
    create_parent(path)?;
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);
    for row in panel.rows() {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = panel.len(), "Panel written");
    Ok(())
}

#[derive(Serialize)]
struct UnitRecord<'a> {
    unit_key: &'a str,
    group: Group,
    dist_to_station: f64,
    centroid_x: f64,
    centroid_y: f64,
}

/// Writes classified units without their geometry.
pub fn write_units(path: &Path, units: &[GeographicUnit]) -> Result<()> {
    create_parent(path)?;
    let mut writer = WriterBuilder::new().from_path(path)?;
    for unit in units {
        writer.serialize(UnitRecord {
            unit_key: &unit.key,
            group: unit.group,
            dist_to_station: unit.dist_to_station,
            centroid_x: unit.centroid.x(),
            centroid_y: unit.centroid.y(),
        })?;
    }
    writer.flush()?;
    info!(path = %path.display(), units = units.len(), "Classified units written");
    Ok(())
}

/// Renders `report` in `format` and writes it to `path`.
pub fn write_report(path: &Path, report: &Report, format: ReportFormat) -> Result<()> {
    create_parent(path)?;
    let body = match format {
        ReportFormat::Text => report.render_text(),
        ReportFormat::Json => serde_json::to_string_pretty(report)?,
    };
    fs::write(path, body)?;
    info!(path = %path.display(), ?format, "Report written");
    Ok(())
}
