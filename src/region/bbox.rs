//! Axis-aligned bounding-box region.

use crate::error::{ClipError, Result};
use crate::models::{FilteredTable, GeoPoint, NormalizedTable};

/// Latitude/longitude rectangle, inclusive on every edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    lat_min: f64,
    lat_max: f64,
    lon_min: f64,
    lon_max: f64,
}

impl BoundingBox {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Result<Self> {
        let values = [lat_min, lat_max, lon_min, lon_max];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(invalid(format!("bounds must be finite, got {:?}", values)));
        }
        if lat_min > lat_max {
            return Err(invalid(format!("lat_min {} > lat_max {}", lat_min, lat_max)));
        }
        if lon_min > lon_max {
            return Err(invalid(format!("lon_min {} > lon_max {}", lon_min, lon_max)));
        }
        if lat_min < -90.0 || lat_max > 90.0 {
            return Err(invalid(format!(
                "latitude range [{}, {}] exceeds [-90, 90]",
                lat_min, lat_max
            )));
        }
        if lon_min < -180.0 || lon_max > 180.0 {
            return Err(invalid(format!(
                "longitude range [{}, {}] exceeds [-180, 180]",
                lon_min, lon_max
            )));
        }

        Ok(Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        })
    }

    pub fn lat_range(&self) -> (f64, f64) {
        (self.lat_min, self.lat_max)
    }

    pub fn lon_range(&self) -> (f64, f64) {
        (self.lon_min, self.lon_max)
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        (self.lat_min..=self.lat_max).contains(&point.lat)
            && (self.lon_min..=self.lon_max).contains(&point.lon)
    }

    /// Keep the rows inside the box. Columns pass through unchanged.
    pub fn filter(&self, table: NormalizedTable) -> FilteredTable {
        let mut filtered = FilteredTable::new(table.columns);
        filtered.rows = table
            .records
            .into_iter()
            .filter(|record| self.contains(record.point))
            .map(|record| record.fields)
            .collect();
        filtered
    }
}

fn invalid(reason: String) -> ClipError {
    ClipError::InvalidBoundingBox { reason }
}
