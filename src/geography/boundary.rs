//! TIGER/Line boundary loading.

use crate::error::{Result, StudyError};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile::dbase::FieldValue;
use shapefile::{PolygonRing, Shape};
use std::path::Path;
use tracing::{debug, info, warn};

/// One boundary row: unit key plus its polygon in the source CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    pub key: String,
    pub geometry: MultiPolygon<f64>,
}

impl Boundary {
    pub fn new(key: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            key: key.into(),
            geometry,
        }
    }
}

/// Reads every polygon from `path` whose `key_column` starts with `key_prefix`.
///
/// # Errors
///
/// [`StudyError::MissingInput`] when the `.shp` file is absent, and
/// [`StudyError::Boundary`] when a record lacks a usable key.
#[tracing::instrument(skip_all, fields(path = %path.display(), key_prefix))]
pub fn load_boundaries(
    path: &Path,
    key_column: &str,
    key_prefix: &str,
) -> Result<Vec<Boundary>> {
    if !path.exists() {
        return Err(StudyError::missing_input(
            path,
            "Boundary shapefile is missing; run the data download step first.",
        ));
    }

    let mut reader = shapefile::Reader::from_path(path)?;
    let mut boundaries = Vec::new();
    let mut outside_region = 0usize;

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        let key = match record.get(key_column) {
            Some(FieldValue::Character(Some(value))) => value.trim().to_string(),
            Some(other) => {
                return Err(StudyError::Boundary {
                    detail: format!(
                        "column `{key_column}` is not a text field (found {other:?})"
                    ),
                });
            }
            None => {
                return Err(StudyError::Boundary {
                    detail: format!("column `{key_column}` not present in {}", path.display()),
                });
            }
        };

        if !key.starts_with(key_prefix) {
            outside_region += 1;
            continue;
        }

        let geometry = match shape {
            Shape::Polygon(p) => rings_to_multipolygon(
                p.rings().iter().map(|r| ring_coords(r, |pt| Coord { x: pt.x, y: pt.y })),
            ),
            Shape::PolygonM(p) => rings_to_multipolygon(
                p.rings().iter().map(|r| ring_coords(r, |pt| Coord { x: pt.x, y: pt.y })),
            ),
            Shape::PolygonZ(p) => rings_to_multipolygon(
                p.rings().iter().map(|r| ring_coords(r, |pt| Coord { x: pt.x, y: pt.y })),
            ),
            Shape::NullShape => {
                warn!(key = %key, "Boundary record has no geometry");
                MultiPolygon::new(Vec::new())
            }
            other => {
                return Err(StudyError::Boundary {
                    detail: format!(
                        "unit {key} has non-polygon shape type {:?}",
                        other.shapetype()
                    ),
                });
            }
        };

        boundaries.push(Boundary { key, geometry });
    }

    debug!(outside_region, "Skipped boundaries outside the region prefix");
    info!(units = boundaries.len(), "Boundaries loaded");
    Ok(boundaries)
}

/// Outer ring flag plus coordinates for one shapefile ring.
fn ring_coords<P>(
    ring: &PolygonRing<P>,
    xy: impl Fn(&P) -> Coord<f64>,
) -> (bool, Vec<Coord<f64>>) {
    let is_outer = matches!(ring, PolygonRing::Outer(_));
    let coords = ring.points().iter().map(xy).collect();
    (is_outer, coords)
}

/// Groups rings into polygons: each outer ring owns the inner rings that follow it.
pub(crate) fn rings_to_multipolygon<I>(rings: I) -> MultiPolygon<f64>
where
    I: IntoIterator<Item = (bool, Vec<Coord<f64>>)>,
{
    let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();

    for (is_outer, coords) in rings {
        let line = LineString::from(coords);
        if is_outer || polygons.is_empty() {
            polygons.push((line, Vec::new()));
        } else if let Some((_, holes)) = polygons.last_mut() {
            holes.push(line);
        }
    }

    MultiPolygon::new(
        polygons
            .into_iter()
            .map(|(exterior, holes)| Polygon::new(exterior, holes))
            .collect(),
    )
}
