//! Coordinate normalization.
//!
//! Turns the raw lat/lon text of each row into checked numbers. Rows whose
//! coordinates are missing, unparseable or out of range are dropped, never
//! reported as errors.

use tracing::debug;

use crate::models::{GeoPoint, NormalizedTable, RawTable, Record};

/// Field values treated as missing before numeric coercion
const MISSING_TOKENS: [&str; 8] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// Coerce a field to a finite number; anything else is missing
pub fn coerce_coordinate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if MISSING_TOKENS.contains(&raw) {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Normalize the coordinate columns of a raw table.
///
/// Callers guarantee both columns exist; the loader rejects tables without them.
pub fn normalize(raw: RawTable, lat_column: &str, lon_column: &str) -> NormalizedTable {
    let (Some(lat_idx), Some(lon_idx)) = (raw.column_index(lat_column), raw.column_index(lon_column))
    else {
        let dropped = raw.len();
        return NormalizedTable {
            source: raw.source,
            columns: raw.columns,
            records: Vec::new(),
            dropped,
        };
    };

    let total = raw.rows.len();
    let mut records = Vec::with_capacity(total);

    for mut fields in raw.rows {
        let lat = fields.get(lat_idx).and_then(|v| coerce_coordinate(v));
        let lon = fields.get(lon_idx).and_then(|v| coerce_coordinate(v));

        let Some(point) = lat.zip(lon).and_then(|(lat, lon)| GeoPoint::checked(lat, lon)) else {
            continue;
        };

        fields[lat_idx] = point.lat.to_string();
        fields[lon_idx] = point.lon.to_string();
        records.push(Record::new(point, fields));
    }

    let dropped = total - records.len();
    if dropped > 0 {
        debug!(
            "Dropped {} of {} rows without valid coordinates in {}",
            dropped,
            total,
            raw.source.display()
        );
    }

    NormalizedTable {
        source: raw.source,
        columns: raw.columns,
        records,
        dropped,
    }
}
