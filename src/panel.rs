//! Unit × year panel assembly.
//!
//! Raw block rows are truncated to block-group keys, restricted to the
//! study region, summed, and inner-joined against the classified units one
//! year at a time. Years are stacked in configured order.

use crate::config::StudyConfig;
use crate::error::{Result, StudyError};
use crate::geography::{GeographicUnit, Group};
use crate::source::{CountSource, EmploymentRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// One observation: a unit in a year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRow {
    pub unit_key: String,
    pub group: Group,
    pub dist_to_station: f64,
    pub year: i32,
    pub post: u8,
    pub treated: u8,
    pub employment: u64,
}

impl PanelRow {
    pub fn is_treated(&self) -> bool {
        self.treated == 1
    }

    pub fn is_post(&self) -> bool {
        self.post == 1
    }
}

/// Post indicator for `year` against `cutover`.
pub fn post_indicator(year: i32, cutover: i32) -> u8 {
    u8::from(year >= cutover)
}

/// Rows with unique `(unit_key, year)` and a fixed group per unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Panel {
    rows: Vec<PanelRow>,
}

impl Panel {
    /// Validates and wraps `rows`.
    ///
    /// # Errors
    ///
    /// [`StudyError::InvalidPanel`] for a duplicated unit-year, a Buffer row,
    /// a `treated` flag that disagrees with the group, or a unit whose group
    /// changes between years.
    pub fn from_rows(rows: Vec<PanelRow>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(rows.len());
        let mut groups: HashMap<&str, Group> = HashMap::new();

        for row in &rows {
            if !seen.insert((row.unit_key.as_str(), row.year)) {
                return Err(StudyError::InvalidPanel {
                    detail: format!("unit {} appears twice in {}", row.unit_key, row.year),
                });
            }
            if row.group == Group::Buffer {
                return Err(StudyError::InvalidPanel {
                    detail: format!("unit {} is a Buffer unit", row.unit_key),
                });
            }
            if row.treated != u8::from(row.group == Group::Treatment) {
                return Err(StudyError::InvalidPanel {
                    detail: format!(
                        "unit {} in {} has treated={} but group {}",
                        row.unit_key, row.year, row.treated, row.group
                    ),
                });
            }
            match groups.get(row.unit_key.as_str()) {
                Some(&g) if g != row.group => {
                    return Err(StudyError::InvalidPanel {
                        detail: format!(
                            "unit {} changes group from {} to {}",
                            row.unit_key, g, row.group
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    groups.insert(&row.unit_key, row.group);
                }
            }
        }

        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<PanelRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct years, ascending.
    pub fn years(&self) -> Vec<i32> {
        self.rows
            .iter()
            .map(|r| r.year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn unit_count(&self) -> usize {
        self.rows.iter().map(|r| r.unit_key.as_str()).collect::<HashSet<_>>().len()
    }

    /// Rows whose year satisfies `keep`, in their original order.
    pub fn filter_years(&self, keep: impl Fn(i32) -> bool) -> Panel {
        Panel {
            rows: self.rows.iter().filter(|r| keep(r.year)).cloned().collect(),
        }
    }

    /// Same rows with `post` recomputed against `cutover`.
    pub fn with_cutover(&self, cutover: i32) -> Panel {
        Panel {
            rows: self
                .rows
                .iter()
                .map(|r| PanelRow {
                    post: post_indicator(r.year, cutover),
                    ..r.clone()
                })
                .collect(),
        }
    }

    /// Reads a panel previously written by [`crate::output::write_panel`].
    ///
    /// # Errors
    ///
    /// [`StudyError::MissingInput`] if the file is absent.
    pub fn read_csv(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StudyError::missing_input(
                path,
                "Processed panel not found; run `transit_did process` first.",
            ));
        }
        let mut rdr = csv::Reader::from_path(path)?;
        let mut rows = Vec::new();
        for result in rdr.deserialize() {
            let row: PanelRow = result?;
            rows.push(row);
        }
        debug!(rows = rows.len(), path = %path.display(), "Panel loaded");
        Self::from_rows(rows)
    }
}

/// The parts of the configuration the builder reads.
#[derive(Debug, Clone)]
pub struct PanelOptions {
    pub key_prefix: String,
    pub unit_key_len: usize,
    pub cutover_year: i32,
    pub years: Vec<i32>,
}

impl PanelOptions {
    pub fn from_config(config: &StudyConfig) -> Self {
        Self {
            key_prefix: config.region.key_prefix.clone(),
            unit_key_len: config.region.unit_key_len,
            cutover_year: config.study.cutover_year,
            years: config.study.years.clone(),
        }
    }
}

/// The unit key a fine geocode belongs to, or `None` if the geocode is too short.
pub fn unit_key(geocode: &str, unit_key_len: usize) -> Option<&str> {
    geocode.get(..unit_key_len)
}

/// Sums counts per unit key for geocodes inside the region.
pub fn aggregate_by_unit(
    records: &[EmploymentRecord],
    key_prefix: &str,
    unit_key_len: usize,
) -> BTreeMap<String, u64> {
    let mut totals: BTreeMap<String, u64> = BTreeMap::new();
    let mut short_keys = 0usize;

    for record in records {
        let Some(key) = unit_key(&record.geocode, unit_key_len) else {
            short_keys += 1;
            continue;
        };
        if !key.starts_with(key_prefix) {
            continue;
        }
        *totals.entry(key.to_string()).or_default() += record.jobs;
    }

    if short_keys > 0 {
        debug!(short_keys, unit_key_len, "Skipped geocodes shorter than the unit key");
    }
    totals
}

/// Inner-joins one year's totals against the classified units.
///
/// Rows come out in unit order; units with no data this year are absent.
pub fn join_year(
    units: &[GeographicUnit],
    totals: &BTreeMap<String, u64>,
    year: i32,
    cutover_year: i32,
) -> Vec<PanelRow> {
    units
        .iter()
        .filter_map(|unit| {
            totals.get(&unit.key).map(|&employment| PanelRow {
                unit_key: unit.key.clone(),
                group: unit.group,
                dist_to_station: unit.dist_to_station,
                year,
                post: post_indicator(year, cutover_year),
                treated: u8::from(unit.group == Group::Treatment),
                employment,
            })
        })
        .collect()
}

/// Builds the long panel for every configured year.
///
/// A year without a raw file is skipped with a warning.
///
/// # Errors
///
/// [`StudyError::EmptyResult`] if a present year joins to zero units, or if
/// no year produced any rows.
#[tracing::instrument(skip_all, fields(years = ?options.years, cutover = options.cutover_year))]
pub fn build_panel<S: CountSource>(
    source: &S,
    units: &[GeographicUnit],
    options: &PanelOptions,
) -> Result<Panel> {
    let mut rows = Vec::new();
    let mut loaded_years = 0usize;

    for &year in &options.years {
        info!(year, "Loading raw counts");
        let Some(records) = source.load_year(year)? else {
            warn!(year, path = %source.describe(year), "Raw count file not found, skipping year");
            continue;
        };

        let totals = aggregate_by_unit(&records, &options.key_prefix, options.unit_key_len);
        let joined = join_year(units, &totals, year, options.cutover_year);
        debug!(
            year,
            raw_rows = records.len(),
            region_units = totals.len(),
            joined = joined.len(),
            "Year aggregated"
        );

        if joined.is_empty() {
            return Err(StudyError::EmptyResult {
                stage: "panel builder",
                detail: format!(
                    "{year}: none of {} aggregated units matched a classified unit \
                     (check that region.key_prefix agrees with the boundary keys)",
                    totals.len()
                ),
            });
        }

        loaded_years += 1;
        rows.extend(joined);
    }

    if loaded_years == 0 {
        return Err(StudyError::EmptyResult {
            stage: "panel builder",
            detail: "no configured year had a raw count file".into(),
        });
    }

    info!(rows = rows.len(), years = loaded_years, "Panel assembled");
    Panel::from_rows(rows)
}
