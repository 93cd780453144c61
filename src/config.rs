//! Static study configuration.
//!
//! Every stage takes a [`StudyConfig`] (or the part of it it needs) as an
//! explicit argument. The built-in [`Default`] is the Seattle University Link
//! extension study: two stations opened in March 2016, LODES years 2014–2018,
//! King County block groups.

use crate::error::{Result, StudyError};
use crate::geography::{Projection, Station};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Semantic checks that parsing alone cannot express.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StudyConfig {
    pub region: RegionConfig,
    pub study: StudyWindow,
    pub classification: ClassificationConfig,
    pub stations: Vec<Station>,
    pub sources: SourceConfig,
    pub outputs: OutputConfig,
}

/// Which geographic units belong to the study area and how their keys look.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Lower-case state abbreviation used in LODES file names.
    pub state_abbr: String,
    /// Unit-key prefix selecting the sub-region (state FIPS + county FIPS).
    pub key_prefix: String,
    /// Length of a block-group key; fine block keys are truncated to this.
    pub unit_key_len: usize,
    /// CRS of the boundary file and of station coordinates.
    pub source_crs: String,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            state_abbr: "wa".to_string(),
            key_prefix: "53033".to_string(),
            unit_key_len: 12,
            source_crs: "EPSG:4269".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyWindow {
    pub cutover_year: i32,
    /// Synthetic cutover for the placebo fit; `cutover_year - 1` when unset.
    pub placebo_cutover_year: Option<i32>,
    pub years: Vec<i32>,
}

impl Default for StudyWindow {
    fn default() -> Self {
        Self {
            cutover_year: 2016,
            placebo_cutover_year: None,
            years: vec![2014, 2015, 2016, 2017, 2018],
        }
    }
}

impl StudyWindow {
    pub fn placebo_cutover(&self) -> i32 {
        self.placebo_cutover_year.unwrap_or(self.cutover_year - 1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub treatment_radius_m: f64,
    pub control_min_distance_m: f64,
    /// Planar metric CRS distances are measured in.
    pub target_crs: String,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            treatment_radius_m: 800.0,
            control_min_distance_m: 1600.0,
            target_crs: "EPSG:32610".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub raw_dir: PathBuf,
    pub boundary_file: PathBuf,
    pub boundary_key_column: String,
    pub geocode_column: String,
    pub count_column: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            boundary_file: PathBuf::from("data/raw/shapefiles/tl_2020_53_bg.shp"),
            boundary_key_column: "GEOID".to_string(),
            geocode_column: "w_geocode".to_string(),
            count_column: "C000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub processed_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub panel_file: String,
    pub report_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            processed_dir: PathBuf::from("data/processed"),
            outputs_dir: PathBuf::from("outputs"),
            panel_file: "panel_dataset.csv".to_string(),
            report_file: "regression_results.txt".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn panel_path(&self) -> PathBuf {
        self.processed_dir.join(&self.panel_file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.outputs_dir.join(&self.report_file)
    }
}

impl StudyConfig {
    /// Seattle University Link defaults, stations included.
    pub fn seattle_u_link() -> Self {
        Self {
            stations: vec![
                Station::new("University of Washington", 47.6503, -122.3016),
                Station::new("Capitol Hill", 47.6198, -122.3200),
            ],
            ..Self::default()
        }
    }

    /// Loads and validates a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StudyError::missing_input(
                path,
                "Pass an existing TOML file to --config or omit the flag to use built-in defaults.",
            ));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StudyConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn source_projection(&self) -> Result<Projection> {
        Projection::from_epsg(&self.region.source_crs).and_then(|p| match p {
            Projection::Geographic => Ok(p),
            _ => Err(StudyError::config(
                "region.source_crs",
                format!("{} is not a geographic (lon/lat) CRS", self.region.source_crs),
            )),
        })
    }

    pub fn target_projection(&self) -> Result<Projection> {
        Projection::from_epsg(&self.classification.target_crs).and_then(|p| match p {
            Projection::Geographic => Err(StudyError::config(
                "classification.target_crs",
                "distances need a planar metric CRS, not lon/lat",
            )),
            _ => Ok(p),
        })
    }
}

impl Validate for StudyConfig {
    fn validate(&self) -> Result<()> {
        let region = &self.region;
        validate_non_empty_string("region.state_abbr", &region.state_abbr)?;
        validate_non_empty_string("region.key_prefix", &region.key_prefix)?;
        if !region.key_prefix.chars().all(|c| c.is_ascii_digit()) {
            return Err(StudyError::config(
                "region.key_prefix",
                format!("`{}` must contain only digits", region.key_prefix),
            ));
        }
        if region.key_prefix.len() > region.unit_key_len {
            return Err(StudyError::config(
                "region.key_prefix",
                format!(
                    "prefix length {} exceeds unit_key_len {}",
                    region.key_prefix.len(),
                    region.unit_key_len
                ),
            ));
        }
        self.source_projection()?;
        self.target_projection()?;

        let c = &self.classification;
        if !c.treatment_radius_m.is_finite() || c.treatment_radius_m < 0.0 {
            return Err(StudyError::config(
                "classification.treatment_radius_m",
                "must be a finite, non-negative distance",
            ));
        }
        // A zero-width buffer band would let one distance qualify as both groups.
        if !(c.control_min_distance_m > c.treatment_radius_m)
            || !c.control_min_distance_m.is_finite()
        {
            return Err(StudyError::config(
                "classification.control_min_distance_m",
                format!(
                    "must be finite and strictly greater than treatment_radius_m ({})",
                    c.treatment_radius_m
                ),
            ));
        }

        if self.stations.is_empty() {
            return Err(StudyError::config("stations", "at least one station is required"));
        }
        for station in &self.stations {
            validate_non_empty_string("stations.name", &station.name)?;
            validate_range("stations.lat", station.lat, -90.0, 90.0)?;
            validate_range("stations.lon", station.lon, -180.0, 180.0)?;
        }

        let w = &self.study;
        if w.years.is_empty() {
            return Err(StudyError::config("study.years", "at least one year is required"));
        }
        let mut seen = HashSet::new();
        for year in &w.years {
            if !seen.insert(year) {
                return Err(StudyError::config(
                    "study.years",
                    format!("year {year} is listed twice"),
                ));
            }
        }
        if w.placebo_cutover() >= w.cutover_year {
            return Err(StudyError::config(
                "study.placebo_cutover_year",
                format!(
                    "{} must be strictly before cutover_year {}",
                    w.placebo_cutover(),
                    w.cutover_year
                ),
            ));
        }

        validate_non_empty_string(
            "sources.boundary_key_column",
            &self.sources.boundary_key_column,
        )?;
        validate_non_empty_string("sources.geocode_column", &self.sources.geocode_column)?;
        validate_non_empty_string("sources.count_column", &self.sources.count_column)?;
        validate_non_empty_string("outputs.panel_file", &self.outputs.panel_file)?;
        validate_non_empty_string("outputs.report_file", &self.outputs.report_file)?;
        Ok(())
    }
}

fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StudyError::config(field_name, "value cannot be empty or whitespace-only"));
    }
    Ok(())
}

fn validate_range(field_name: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if !(min..=max).contains(&value) {
        return Err(StudyError::config(
            field_name,
            format!("{value} must be between {min} and {max}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seattle_defaults_validate() {
        let config = StudyConfig::seattle_u_link();
        assert!(config.validate().is_ok());
        assert_eq!(config.study.placebo_cutover(), 2015);
        assert_eq!(config.outputs.panel_path(), PathBuf::from("data/processed/panel_dataset.csv"));
    }

    #[test]
    fn test_default_without_stations_is_rejected() {
        let err = StudyConfig::default().validate().unwrap_err();
        assert!(matches!(err, StudyError::Config { ref field, .. } if field == "stations"));
    }

    #[test]
    fn test_from_toml_str_partial_document() {
        let toml = r#"
            [study]
            cutover_year = 2016
            years = [2015, 2016]

            [classification]
            treatment_radius_m = 500.0
            control_min_distance_m = 1500.0

            [[stations]]
            name = "Capitol Hill"
            lat = 47.6198
            lon = -122.3200
        "#;

        let config = StudyConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.study.years, vec![2015, 2016]);
        assert_eq!(config.classification.treatment_radius_m, 500.0);
        assert_eq!(config.classification.target_crs, "EPSG:32610");
        assert_eq!(config.region.key_prefix, "53033");
        assert_eq!(config.stations.len(), 1);
    }

    #[test]
    fn test_thresholds_must_leave_a_buffer_band() {
        let mut config = StudyConfig::seattle_u_link();
        config.classification.control_min_distance_m = config.classification.treatment_radius_m;
        assert!(config.validate().is_err());

        config.classification.control_min_distance_m = 100.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_years_rejected() {
        let mut config = StudyConfig::seattle_u_link();
        config.study.years = vec![2014, 2015, 2015];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_placebo_cutover_must_precede_cutover() {
        let mut config = StudyConfig::seattle_u_link();
        config.study.placebo_cutover_year = Some(2016);
        assert!(config.validate().is_err());

        config.study.placebo_cutover_year = Some(2014);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_prefix_must_be_digits_and_fit_key() {
        let mut config = StudyConfig::seattle_u_link();
        config.region.key_prefix = "53O33".to_string();
        assert!(config.validate().is_err());

        config.region.key_prefix = "5303300000001".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_crs_roles_are_checked() {
        let mut config = StudyConfig::seattle_u_link();
        config.classification.target_crs = "EPSG:4326".to_string();
        assert!(config.validate().is_err());

        let mut config = StudyConfig::seattle_u_link();
        config.region.source_crs = "EPSG:3857".to_string();
        assert!(config.validate().is_err());

        let mut config = StudyConfig::seattle_u_link();
        config.classification.target_crs = "EPSG:3857".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_missing_is_missing_input() {
        let err = StudyConfig::from_file("/definitely/not/here/study.toml").unwrap_err();
        assert!(matches!(err, StudyError::MissingInput { .. }));
    }

    #[test]
    fn test_bundled_study_file_matches_defaults() {
        let config = StudyConfig::from_toml_str(include_str!("../study.toml")).unwrap();
        let defaults = StudyConfig::seattle_u_link();
        assert_eq!(config.stations, defaults.stations);
        assert_eq!(config.study.years, defaults.study.years);
        assert_eq!(config.classification.target_crs, defaults.classification.target_crs);
        assert_eq!(config.outputs.panel_path(), defaults.outputs.panel_path());
    }
}
