//! Coordinate records and the fixed-point codec used by the flat-node file.

use geo::Coord;

/// Default decimal scale for fixed-point storage (seven decimal places,
/// roughly centimetre resolution at the equator).
pub const DEFAULT_SCALE: i32 = 10_000_000;

/// A WGS84 longitude/latitude pair.
///
/// The "absent" sentinel is both fields NaN; it marks node ids that have
/// never been written to the cache.
///
/// # Examples
/// ```
/// use osmplace_core::Coordinate;
///
/// let c = Coordinate::new(12.3, 3.0);
/// assert!(c.is_valid());
/// assert!(!c.is_absent());
/// assert!(Coordinate::ABSENT.is_absent());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    /// Sentinel for "no coordinate stored".
    pub const ABSENT: Coordinate = Coordinate {
        lon: f64::NAN,
        lat: f64::NAN,
    };

    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_absent(&self) -> bool {
        self.lon.is_nan() && self.lat.is_nan()
    }

    /// Finite and inside the WGS84 value range.
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

impl From<Coordinate> for Coord<f64> {
    fn from(c: Coordinate) -> Self {
        Coord { x: c.lon, y: c.lat }
    }
}

/// Fixed-point codec for on-disk coordinate records.
///
/// Values are multiplied by a decimal scale and stored as `i32`; the
/// absence sentinel is `(i32::MIN, i32::MIN)`. NaN input encodes to the
/// sentinel rather than a garbage record.
#[derive(Debug, Clone, Copy)]
pub struct FixedPoint {
    scale: i32,
}

impl FixedPoint {
    pub fn new(scale: i32) -> Self {
        debug_assert!(scale > 0);
        Self { scale }
    }

    pub fn scale(&self) -> i32 {
        self.scale
    }

    /// Encode a coordinate as `(lon, lat)` fixed-point fields.
    pub fn encode(&self, coord: Coordinate) -> (i32, i32) {
        if coord.lon.is_nan() && coord.lat.is_nan() {
            return (i32::MIN, i32::MIN);
        }
        (self.to_fix(coord.lon), self.to_fix(coord.lat))
    }

    /// Decode fixed-point fields; the sentinel decodes to `None`.
    pub fn decode(&self, lon: i32, lat: i32) -> Option<Coordinate> {
        if lon == i32::MIN && lat == i32::MIN {
            return None;
        }
        Some(Coordinate::new(self.to_double(lon), self.to_double(lat)))
    }

    // Truncating conversion, matching the storage format this codec has
    // to stay bit-compatible with.
    fn to_fix(&self, v: f64) -> i32 {
        (v * f64::from(self.scale) + 0.5) as i32
    }

    fn to_double(&self, v: i32) -> f64 {
        f64::from(v) / f64::from(self.scale)
    }
}

impl Default for FixedPoint {
    fn default() -> Self {
        Self::new(DEFAULT_SCALE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(12.3456789, 3.0)]
    #[case(-180.0, -85.07)]
    #[case(179.9999999, 89.9999999)]
    fn fixed_point_round_trips_within_scale(#[case] lon: f64, #[case] lat: f64) {
        let codec = FixedPoint::default();
        let (flon, flat) = codec.encode(Coordinate::new(lon, lat));
        let decoded = codec.decode(flon, flat).expect("not the sentinel");
        let eps = 1.0 / f64::from(DEFAULT_SCALE);
        assert!((decoded.lon - lon).abs() <= eps);
        assert!((decoded.lat - lat).abs() <= eps);
    }

    #[rstest]
    fn nan_encodes_to_sentinel() {
        let codec = FixedPoint::default();
        assert_eq!(codec.encode(Coordinate::ABSENT), (i32::MIN, i32::MIN));
        assert!(codec.decode(i32::MIN, i32::MIN).is_none());
    }

    #[rstest]
    fn sentinel_requires_both_fields() {
        let codec = FixedPoint::default();
        // A legitimate record may hold i32::MIN in one field.
        assert!(codec.decode(i32::MIN, 0).is_some());
        assert!(codec.decode(0, i32::MIN).is_some());
    }

    #[rstest]
    #[case(181.0, 0.0)]
    #[case(0.0, 90.5)]
    #[case(f64::INFINITY, 0.0)]
    fn out_of_range_is_invalid(#[case] lon: f64, #[case] lat: f64) {
        assert!(!Coordinate::new(lon, lat).is_valid());
    }
}
