//! Reprojection of WGS84 coordinates into the target SRS.
//!
//! Latlong and spherical Mercator are built in; any other EPSG target
//! needs a caller-supplied transform (the projection library binding is
//! an external collaborator).

use std::f64::consts::PI;
use std::fmt;

use geo::Coord;
use thiserror::Error;

use osmplace_core::{Coordinate, PROJ_LATLONG, PROJ_SPHERE_MERC};

/// Earth's circumference at the equator in metres; fixed by the tile
/// ecosystem, do not touch.
pub const EARTH_CIRCUMFERENCE: f64 = 40_075_016.68;

/// Latitude clip just outside the Mercator world square so clipped
/// points land past the edge of the map.
const MAX_MERC_LAT: f64 = 85.07;

const SRID_LATLONG: i32 = 4326;
const SRID_SPHERE_MERC: i32 = 900_913;

/// External EPSG transform: `(lon, lat)` degrees in, target units out.
pub type EpsgTransform = Box<dyn Fn(f64, f64) -> (f64, f64) + Send + Sync>;

/// Failure to set up the target projection.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("EPSG projection {srid} requires an external transform")]
    MissingTransform { srid: i32 },
    #[error("unknown projection id {id}")]
    UnknownId { id: i32 },
}

/// The target projection of the import.
pub enum Reprojection {
    Latlong,
    SphereMerc,
    Epsg { srid: i32, transform: EpsgTransform },
}

impl fmt::Debug for Reprojection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reprojection::Latlong => f.write_str("Latlong"),
            Reprojection::SphereMerc => f.write_str("SphereMerc"),
            Reprojection::Epsg { srid, .. } => f.debug_struct("Epsg").field("srid", srid).finish(),
        }
    }
}

impl Reprojection {
    /// Resolve a projection id from the options. Negative ids are EPSG
    /// codes and need [`Reprojection::epsg`] with a real transform.
    pub fn from_id(id: i32) -> Result<Self, ProjectionError> {
        match id {
            PROJ_LATLONG => Ok(Reprojection::Latlong),
            PROJ_SPHERE_MERC => Ok(Reprojection::SphereMerc),
            id if id < 0 => Err(ProjectionError::MissingTransform { srid: -id }),
            id => Err(ProjectionError::UnknownId { id }),
        }
    }

    /// Target an arbitrary EPSG SRS through an external transform.
    pub fn epsg(srid: i32, transform: EpsgTransform) -> Self {
        Reprojection::Epsg { srid, transform }
    }

    pub fn srid(&self) -> i32 {
        match self {
            Reprojection::Latlong => SRID_LATLONG,
            Reprojection::SphereMerc => SRID_SPHERE_MERC,
            Reprojection::Epsg { srid, .. } => *srid,
        }
    }

    pub fn target_latlong(&self) -> bool {
        matches!(self, Reprojection::Latlong)
    }

    /// Default maximum linestring length in target units. Latlong output
    /// is never split.
    pub fn default_split_at(&self) -> f64 {
        if self.target_latlong() {
            f64::INFINITY
        } else {
            100_000.0
        }
    }

    pub fn reproject(&self, coord: Coordinate) -> Coord<f64> {
        match self {
            Reprojection::Latlong => Coord {
                x: coord.lon,
                y: coord.lat,
            },
            Reprojection::SphereMerc => {
                let lat = coord.lat.clamp(-MAX_MERC_LAT, MAX_MERC_LAT);
                Coord {
                    x: coord.lon * EARTH_CIRCUMFERENCE / 360.0,
                    y: (PI / 4.0 + lat * PI / 360.0).tan().ln() * EARTH_CIRCUMFERENCE / (2.0 * PI),
                }
            }
            Reprojection::Epsg { transform, .. } => {
                let (x, y) = transform(coord.lon, coord.lat);
                Coord { x, y }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn latlong_is_identity() {
        let proj = Reprojection::Latlong;
        let p = proj.reproject(Coordinate::new(12.3, 3.0));
        assert_eq!(p, Coord { x: 12.3, y: 3.0 });
        assert_eq!(proj.srid(), 4326);
        assert!(proj.default_split_at().is_infinite());
    }

    #[rstest]
    fn mercator_maps_the_origin_to_zero() {
        let proj = Reprojection::SphereMerc;
        let p = proj.reproject(Coordinate::new(0.0, 0.0));
        assert!(p.x.abs() < 1e-9);
        assert!(p.y.abs() < 1e-9);
    }

    #[rstest]
    fn mercator_x_is_linear_in_longitude() {
        let proj = Reprojection::SphereMerc;
        let p = proj.reproject(Coordinate::new(180.0, 0.0));
        assert!((p.x - EARTH_CIRCUMFERENCE / 2.0).abs() < 1e-6);
    }

    #[rstest]
    #[case(86.0)]
    #[case(90.0)]
    fn mercator_clamps_polar_latitudes(#[case] lat: f64) {
        let proj = Reprojection::SphereMerc;
        let clamped = proj.reproject(Coordinate::new(0.0, MAX_MERC_LAT));
        let beyond = proj.reproject(Coordinate::new(0.0, lat));
        assert_eq!(beyond.y, clamped.y);
    }

    #[rstest]
    fn epsg_without_transform_is_an_error() {
        let err = Reprojection::from_id(-3857).unwrap_err();
        assert!(matches!(err, ProjectionError::MissingTransform { srid: 3857 }));
    }

    #[rstest]
    fn epsg_transform_is_applied() {
        let proj = Reprojection::epsg(32633, Box::new(|lon, lat| (lon * 2.0, lat * 3.0)));
        let p = proj.reproject(Coordinate::new(1.0, 1.0));
        assert_eq!(p, Coord { x: 2.0, y: 3.0 });
        assert_eq!(proj.srid(), 32633);
    }
}
