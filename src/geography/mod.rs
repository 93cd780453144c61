//! Spatial treatment assignment.
//!
//! Boundaries are reprojected into a planar metric system, reduced to their
//! centroids, and labelled by the distance to the nearest station:
//!
//! | Distance                          | Group     |
//! |-----------------------------------|-----------|
//! | `<= treatment_radius_m`           | Treatment |
//! | `>= control_min_distance_m`       | Control   |
//! | otherwise (or no centroid)        | Buffer    |
//!
//! Buffer units never leave this module.

mod boundary;
mod projection;

pub use boundary::{Boundary, load_boundaries};
pub use projection::Projection;

use crate::config::StudyConfig;
use crate::error::{Result, StudyError};
use geo::{Centroid, Coord, EuclideanDistance, MultiPolygon, Point};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// A named point of interest in geographic degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Station {
    pub fn new(name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            name: name.into(),
            lat,
            lon,
        }
    }

    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Group {
    Treatment,
    Control,
    Buffer,
}

impl Group {
    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Treatment => "Treatment",
            Group::Control => "Control",
            Group::Buffer => "Buffer",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distance thresholds in projected meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub treatment_radius_m: f64,
    pub control_min_distance_m: f64,
}

impl Thresholds {
    /// Checked constructor: the control distance must sit strictly beyond the treatment radius.
    pub fn new(treatment_radius_m: f64, control_min_distance_m: f64) -> Result<Self> {
        let thresholds = Self {
            treatment_radius_m,
            control_min_distance_m,
        };
        thresholds.check()?;
        Ok(thresholds)
    }

    fn check(&self) -> Result<()> {
        if !(self.treatment_radius_m.is_finite() && self.treatment_radius_m >= 0.0) {
            return Err(StudyError::config(
                "classification.treatment_radius_m",
                format!("{} is not a non-negative distance", self.treatment_radius_m),
            ));
        }
        if !(self.control_min_distance_m.is_finite()
            && self.control_min_distance_m > self.treatment_radius_m)
        {
            return Err(StudyError::config(
                "classification.control_min_distance_m",
                format!(
                    "{} must be greater than the treatment radius {}",
                    self.control_min_distance_m, self.treatment_radius_m
                ),
            ));
        }
        Ok(())
    }

    /// Labels a distance. NaN falls through to Buffer.
    pub fn classify(&self, dist: f64) -> Group {
        if dist <= self.treatment_radius_m {
            Group::Treatment
        } else if dist >= self.control_min_distance_m {
            Group::Control
        } else {
            Group::Buffer
        }
    }
}

/// A labelled unit that survived classification (never Buffer).
#[derive(Debug, Clone, PartialEq)]
pub struct GeographicUnit {
    pub key: String,
    pub group: Group,
    pub dist_to_station: f64,
    /// Projected geometry, kept for diagnostics only.
    pub geometry: MultiPolygon<f64>,
    pub centroid: Point<f64>,
}

/// Outcome of labelling one boundary, Buffer included.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub group: Group,
    /// NaN when the geometry has no centroid.
    pub dist_to_station: f64,
    pub geometry: MultiPolygon<f64>,
    pub centroid: Option<Point<f64>>,
}

/// Everything the classifier needs, resolved from a [`StudyConfig`].
#[derive(Debug, Clone)]
pub struct Classifier {
    target: Projection,
    thresholds: Thresholds,
    /// Station positions already in the target projection.
    stations: Vec<(String, Point<f64>)>,
}

impl Classifier {
    pub fn new(
        source: Projection,
        target: Projection,
        thresholds: Thresholds,
        stations: &[Station],
    ) -> Result<Self> {
        if stations.is_empty() {
            return Err(StudyError::config("stations", "at least one station is required"));
        }
        thresholds.check()?;
        if source != Projection::Geographic {
            return Err(StudyError::config("region.source_crs", "boundaries must be in lon/lat"));
        }
        let stations = stations
            .iter()
            .map(|s| (s.name.clone(), Point::from(target.project(s.coord()))))
            .collect();
        Ok(Self {
            target,
            thresholds,
            stations,
        })
    }

    pub fn from_config(config: &StudyConfig) -> Result<Self> {
        Self::new(
            config.source_projection()?,
            config.target_projection()?,
            Thresholds::new(
                config.classification.treatment_radius_m,
                config.classification.control_min_distance_m,
            )?,
            &config.stations,
        )
    }

    /// Minimum distance from a projected point to any station, with that station's name.
    pub fn nearest_station(&self, point: &Point<f64>) -> Option<(&str, f64)> {
        self.stations
            .iter()
            .map(|(name, s)| (name.as_str(), point.euclidean_distance(s)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Labels one boundary. Returns the distance alongside the group even for Buffer.
    pub fn label(&self, boundary: &Boundary) -> Label {
        let geometry = self.target.project_multipolygon(&boundary.geometry);
        let centroid = geometry.centroid();
        let dist = centroid
            .as_ref()
            .and_then(|c| self.nearest_station(c))
            .map(|(_, d)| d)
            .unwrap_or(f64::NAN);
        Label {
            group: self.thresholds.classify(dist),
            dist_to_station: dist,
            geometry,
            centroid,
        }
    }

    /// Classifies all boundaries and drops the Buffer band.
    ///
    /// The result is sorted by key, so it is independent of input order.
    ///
    /// # Errors
    ///
    /// [`StudyError::EmptyResult`] when no Treatment or Control unit remains.
    #[tracing::instrument(skip_all, fields(boundaries = boundaries.len()))]
    pub fn classify(&self, boundaries: &[Boundary]) -> Result<Vec<GeographicUnit>> {
        let mut units = Vec::with_capacity(boundaries.len());
        let mut buffer = 0usize;

        for boundary in boundaries {
            let label = self.label(boundary);
            match (label.group, label.centroid) {
                (Group::Buffer, _) | (_, None) => {
                    buffer += 1;
                }
                (group, Some(centroid)) => units.push(GeographicUnit {
                    key: boundary.key.clone(),
                    group,
                    dist_to_station: label.dist_to_station,
                    geometry: label.geometry,
                    centroid,
                }),
            }
        }

        units.sort_by(|a, b| a.key.cmp(&b.key));

        let treatment = units.iter().filter(|u| u.group == Group::Treatment).count();
        let control = units.len() - treatment;
        debug!(buffer, "Buffer units excluded");
        info!(treatment, control, "Geography ready");

        if units.is_empty() {
            return Err(StudyError::EmptyResult {
                stage: "geographic classifier",
                detail: format!(
                    "none of {} boundaries fell in the treatment or control band",
                    boundaries.len()
                ),
            });
        }
        Ok(units)
    }
}
