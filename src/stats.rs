//! Descriptive group × year table of the panel outcome.

use crate::analyzers::utility::{mean, sample_stddev};
use crate::geography::Group;
use crate::panel::Panel;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Outcome summary for one group in one year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellStats {
    pub group: Group,
    pub year: i32,
    pub units: usize,
    pub total: u64,
    pub mean: f64,
    /// Sample standard deviation; NaN with fewer than two units.
    pub std_dev: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupYearStats {
    pub cells: Vec<CellStats>,
}

impl GroupYearStats {
    /// Cells ordered by group (Treatment first) then year.
    pub fn from_panel(panel: &Panel) -> Self {
        let mut by_cell: BTreeMap<(Group, i32), Vec<u64>> = BTreeMap::new();
        for row in panel.rows() {
            by_cell.entry((row.group, row.year)).or_default().push(row.employment);
        }

        let cells = by_cell
            .into_iter()
            .map(|((group, year), counts)| {
                let values: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
                let m = mean(&values);
                CellStats {
                    group,
                    year,
                    units: counts.len(),
                    total: counts.iter().sum(),
                    mean: m,
                    std_dev: sample_stddev(&values, m),
                }
            })
            .collect();
        Self { cells }
    }

    pub fn get(&self, group: Group, year: i32) -> Option<&CellStats> {
        self.cells.iter().find(|c| c.group == group && c.year == year)
    }

    /// Mean outcome by year, one column per group.
    pub fn render(&self) -> String {
        let mut years: Vec<i32> = self.cells.iter().map(|c| c.year).collect();
        years.sort_unstable();
        years.dedup();

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<6}{:>14}{:>8}{:>14}{:>8}",
            "year", "control mean", "n", "treated mean", "n"
        );
        for year in years {
            let control = self.get(Group::Control, year);
            let treated = self.get(Group::Treatment, year);
            let _ = writeln!(
                out,
                "{:<6}{:>14}{:>8}{:>14}{:>8}",
                year,
                control.map_or("-".to_string(), |c| format!("{:.2}", c.mean)),
                control.map_or(0, |c| c.units),
                treated.map_or("-".to_string(), |c| format!("{:.2}", c.mean)),
                treated.map_or(0, |c| c.units),
            );
        }
        out
    }
}
