//! Forward projections from geographic lon/lat degrees into planar meters.
//!
//! Only the handful of systems the study needs are supported: geographic
//! input (WGS84 / NAD83, treated as coincident), spherical Web Mercator, and
//! UTM on the GRS80/WGS84 ellipsoid.

use crate::error::{Result, StudyError};
use geo::{Coord, MapCoords, MultiPolygon, Point};

const SEMI_MAJOR_M: f64 = 6_378_137.0;
const INVERSE_FLATTENING: f64 = 298.257_223_563;
const UTM_SCALE: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Longitude/latitude in degrees; the identity projection.
    Geographic,
    /// EPSG:3857, spherical Web Mercator.
    WebMercator,
    /// EPSG:326zz (north) or EPSG:327zz (south).
    Utm { zone: u8, north: bool },
}

impl Projection {
    /// Parses an `EPSG:<code>` identifier.
    pub fn from_epsg(code: &str) -> Result<Self> {
        let trimmed = code.trim();
        let digits = trimmed
            .get(..5)
            .filter(|p| p.eq_ignore_ascii_case("epsg:"))
            .map(|_| &trimmed[5..])
            .ok_or_else(|| {
                StudyError::config("crs", format!("`{code}` is not an EPSG:<code> identifier"))
            })?;
        let number: u32 = digits
            .parse()
            .map_err(|_| {
                StudyError::config("crs", format!("`{code}` has a non-numeric EPSG code"))
            })?;

        match number {
            4326 | 4269 => Ok(Projection::Geographic),
            3857 => Ok(Projection::WebMercator),
            32601..=32660 => Ok(Projection::Utm {
                zone: (number - 32600) as u8,
                north: true,
            }),
            32701..=32760 => Ok(Projection::Utm {
                zone: (number - 32700) as u8,
                north: false,
            }),
            _ => Err(StudyError::config("crs", format!("unsupported CRS `{code}`"))),
        }
    }

    /// Projects a lon/lat coordinate (degrees).
    pub fn project(&self, coord: Coord<f64>) -> Coord<f64> {
        match *self {
            Projection::Geographic => coord,
            Projection::WebMercator => web_mercator(coord),
            Projection::Utm { zone, north } => utm(coord, zone, north),
        }
    }

    pub fn project_point(&self, point: Point<f64>) -> Point<f64> {
        Point::from(self.project(point.0))
    }

    pub fn project_multipolygon(&self, geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        let projection = *self;
        geometry.map_coords(move |c| projection.project(c))
    }
}

fn web_mercator(c: Coord<f64>) -> Coord<f64> {
    let lambda = c.x.to_radians();
    let phi = c.y.to_radians();
    Coord {
        x: SEMI_MAJOR_M * lambda,
        y: SEMI_MAJOR_M * (std::f64::consts::FRAC_PI_4 + phi / 2.0).tan().ln(),
    }
}

/// Transverse Mercator series (Snyder, *Map Projections: A Working Manual*, eq. 8-9..8-10).
fn utm(c: Coord<f64>, zone: u8, north: bool) -> Coord<f64> {
    let f = 1.0 / INVERSE_FLATTENING;
    let e2 = f * (2.0 - f);
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let ep2 = e2 / (1.0 - e2);

    let central_meridian = (f64::from(zone) - 1.0) * 6.0 - 180.0 + 3.0;
    let phi = c.y.to_radians();
    let dlambda = (c.x - central_meridian).to_radians();

    let (sin_phi, cos_phi) = phi.sin_cos();
    let tan_phi = phi.tan();

    let n = SEMI_MAJOR_M / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let cc = ep2 * cos_phi * cos_phi;
    let a = cos_phi * dlambda;

    let m = SEMI_MAJOR_M
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin());

    let a2 = a * a;
    let a3 = a2 * a;
    let a4 = a3 * a;
    let a5 = a4 * a;
    let a6 = a5 * a;

    let x = UTM_SCALE
        * n
        * (a + (1.0 - t + cc) * a3 / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * cc - 58.0 * ep2) * a5 / 120.0)
        + UTM_FALSE_EASTING;

    let mut y = UTM_SCALE
        * (m + n
            * tan_phi
            * (a2 / 2.0
                + (5.0 - t + 9.0 * cc + 4.0 * cc * cc) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * cc - 330.0 * ep2) * a6 / 720.0));
    if !north {
        y += UTM_FALSE_NORTHING_SOUTH;
    }

    Coord { x, y }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{EuclideanDistance, HaversineDistance};

    #[test]
    fn test_from_epsg_codes() {
        assert_eq!(Projection::from_epsg("EPSG:4326").unwrap(), Projection::Geographic);
        assert_eq!(Projection::from_epsg("epsg:4269").unwrap(), Projection::Geographic);
        assert_eq!(Projection::from_epsg("EPSG:3857").unwrap(), Projection::WebMercator);
        assert_eq!(
            Projection::from_epsg("EPSG:32610").unwrap(),
            Projection::Utm { zone: 10, north: true }
        );
        assert_eq!(
            Projection::from_epsg("EPSG:32733").unwrap(),
            Projection::Utm { zone: 33, north: false }
        );
        assert!(Projection::from_epsg("EPSG:2285").is_err());
        assert!(Projection::from_epsg("3857").is_err());
        assert!(Projection::from_epsg("EPSG:abc").is_err());
    }

    #[test]
    fn test_web_mercator_reference_points() {
        let origin = Projection::WebMercator.project(Coord { x: 0.0, y: 0.0 });
        assert_relative_eq!(origin.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(origin.y, 0.0, epsilon = 1e-9);

        let antimeridian = Projection::WebMercator.project(Coord { x: 180.0, y: 0.0 });
        assert_relative_eq!(antimeridian.x, 20_037_508.342_789_244, epsilon = 1e-6);
    }

    #[test]
    fn test_utm_central_meridian_on_equator() {
        let p = Projection::Utm { zone: 10, north: true }.project(Coord { x: -123.0, y: 0.0 });
        assert_relative_eq!(p.x, 500_000.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-6);

        let s = Projection::Utm { zone: 10, north: false }.project(Coord { x: -123.0, y: 0.0 });
        assert_relative_eq!(s.y, 10_000_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_utm_preserves_local_distances() {
        // Two Seattle stations roughly 3.7 km apart.
        let a = Point::new(-122.3016, 47.6503);
        let b = Point::new(-122.3200, 47.6198);
        let ground = a.haversine_distance(&b);

        let utm = Projection::Utm { zone: 10, north: true };
        let planar = utm.project_point(a).euclidean_distance(&utm.project_point(b));

        assert_relative_eq!(planar, ground, max_relative = 5e-3);
    }

    #[test]
    fn test_web_mercator_inflates_distances_at_high_latitude() {
        let a = Point::new(-122.3016, 47.6503);
        let b = Point::new(-122.3200, 47.6198);
        let ground = a.haversine_distance(&b);

        let merc = Projection::WebMercator;
        let planar = merc.project_point(a).euclidean_distance(&merc.project_point(b));

        // Scale factor is 1 / cos(latitude), about 1.48 in Seattle.
        assert!(planar / ground > 1.4 && planar / ground < 1.55);
    }

    #[test]
    fn test_geographic_is_identity() {
        let c = Coord { x: -122.3, y: 47.6 };
        assert_eq!(Projection::Geographic.project(c), c);
    }
}
