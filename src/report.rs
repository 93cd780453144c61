//! The regression report: descriptive table plus primary and placebo fits.

use crate::analyzers::significance::is_significant;
use crate::analyzers::{FittedModel, ModelSpecification};
use crate::config::StudyConfig;
use crate::error::Result;
use crate::geography::Station;
use crate::panel::Panel;
use crate::stats::GroupYearStats;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;
use tracing::{info, warn};

/// Level at which a placebo effect counts as a warning sign.
const PLACEBO_LEVEL: f64 = 0.05;

#[derive(Debug, Clone, Serialize)]
pub struct StudyContext {
    pub stations: Vec<Station>,
    pub treatment_radius_m: f64,
    pub control_min_distance_m: f64,
    pub target_crs: String,
    pub cutover_year: i32,
    pub years: Vec<i32>,
    pub units: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub context: StudyContext,
    pub descriptive: GroupYearStats,
    pub primary: FittedModel,
    pub placebo: FittedModel,
    /// Whether the placebo interaction is significant at 5%.
    pub placebo_significant: bool,
}

/// Fits both specifications on `panel` and collects the results.
///
/// # Errors
///
/// Whatever either fit returns; a degenerate placebo is as fatal as a
/// degenerate primary model.
#[tracing::instrument(skip_all, fields(rows = panel.len()))]
pub fn build_report(panel: &Panel, config: &StudyConfig) -> Result<Report> {
    let (primary_spec, placebo_spec) = ModelSpecification::from_config(config)?;
    let primary = primary_spec.fit(panel)?;
    let placebo = placebo_spec.fit(panel)?;

    let placebo_significant = is_significant(placebo.did().p_value, PLACEBO_LEVEL);
    if placebo_significant {
        warn!(
            p_value = placebo.did().p_value,
            "Placebo interaction is significant; pre-trends may differ between groups"
        );
    }

    let report = Report {
        generated_at: Utc::now(),
        context: StudyContext {
            stations: config.stations.clone(),
            treatment_radius_m: config.classification.treatment_radius_m,
            control_min_distance_m: config.classification.control_min_distance_m,
            target_crs: config.classification.target_crs.clone(),
            cutover_year: config.study.cutover_year,
            years: panel.years(),
            units: panel.unit_count(),
        },
        descriptive: GroupYearStats::from_panel(panel),
        primary,
        placebo,
        placebo_significant,
    };
    info!(
        primary = report.primary.did().estimate,
        placebo = report.placebo.did().estimate,
        "Report assembled"
    );
    Ok(report)
}

impl Report {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let c = &self.context;
        let stations = c
            .stations
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let _ = writeln!(out, "Transit station difference-in-differences");
        let _ = writeln!(out, "Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out, "Stations: {stations}");
        let _ = writeln!(
            out,
            "Treatment <= {} m, control >= {} m ({}), cutover {}, {} units",
            c.treatment_radius_m, c.control_min_distance_m, c.target_crs, c.cutover_year, c.units
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", self.primary.headline());
        let _ = writeln!(out, "{}", self.placebo.headline());
        if self.placebo_significant {
            let _ = writeln!(out, "WARNING: placebo effect is significant at the 5% level.");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Mean employment by group and year");
        out.push_str(&self.descriptive.render());
        let _ = writeln!(out);
        out.push_str(&self.primary.summary());
        let _ = writeln!(out);
        out.push_str(&self.placebo.summary());
        out
    }
}
