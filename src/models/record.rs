//! Observation records and their coordinates.

use geo::Point;

/// Geographic point (lat/lon) in WGS84 degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Build a point only if both coordinates are finite and in range
    pub fn checked(lat: f64, lon: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        valid.then_some(Self { lat, lon })
    }

    /// Planar point in (x = lon, y = lat) order
    pub fn to_point(self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

/// A single observation row.
///
/// `fields` holds every column of the source row in schema order, with the
/// coordinate columns rewritten in normalized numeric form.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub point: GeoPoint,
    pub fields: Vec<String>,
}

impl Record {
    pub fn new(point: GeoPoint, fields: Vec<String>) -> Self {
        Self { point, fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_rejects_out_of_range() {
        assert!(GeoPoint::checked(30.0, 79.0).is_some());
        assert!(GeoPoint::checked(90.0, -180.0).is_some());
        assert!(GeoPoint::checked(90.5, 79.0).is_none());
        assert!(GeoPoint::checked(30.0, 180.01).is_none());
        assert!(GeoPoint::checked(f64::NAN, 79.0).is_none());
        assert!(GeoPoint::checked(30.0, f64::INFINITY).is_none());
    }

    #[test]
    fn test_point_axis_order() {
        let p = GeoPoint::new(30.0, 79.0).to_point();
        assert_eq!(p.x(), 79.0);
        assert_eq!(p.y(), 30.0);
    }
}
