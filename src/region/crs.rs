//! Coordinate reference handling for boundary datasets.
//!
//! Boundary polygons are brought into WGS84 lon/lat degrees once, at load
//! time, so point tests never reproject.

use geo::{Coord, MapCoords, MultiPolygon};
use proj4rs::{proj::Proj, transform::transform};
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{ClipError, Result};

pub const WGS84_PROJ4: &str = "+proj=longlat +datum=WGS84 +no_defs";
const NAD83_PROJ4: &str = "+proj=longlat +datum=NAD83 +no_defs";

/// Where boundary coordinates come from
#[derive(Debug, Clone, PartialEq)]
pub enum SourceCrs {
    /// Already EPSG:4326; no transform needed
    Wgs84,
    Epsg(u16),
    Proj4(String),
}

impl SourceCrs {
    /// Parse a user-supplied CRS: "EPSG:<code>" or a PROJ.4 string
    pub fn parse_user(value: &str) -> Result<Self> {
        let value = value.trim();
        if let Some(code) = value
            .strip_prefix("EPSG:")
            .or_else(|| value.strip_prefix("epsg:"))
        {
            let code: u32 = code
                .trim()
                .parse()
                .map_err(|_| ClipError::UnsupportedCrs(value.to_string()))?;
            return Self::from_epsg(code);
        }
        if value.starts_with('+') {
            return Ok(SourceCrs::Proj4(value.to_string()));
        }
        Err(ClipError::UnsupportedCrs(value.to_string()))
    }

    fn from_epsg(code: u32) -> Result<Self> {
        if code == 4326 {
            return Ok(SourceCrs::Wgs84);
        }
        u16::try_from(code)
            .map(SourceCrs::Epsg)
            .map_err(|_| ClipError::UnsupportedCrs(format!("EPSG:{}", code)))
    }

    /// Resolve the CRS described by the WKT of a `.prj` file
    pub fn from_prj(wkt: &str) -> Result<Self> {
        let wkt = wkt.trim();

        // Only an AUTHORITY closing the root node names the whole CRS;
        // nested ones belong to the datum, unit or geographic base.
        let root_authority = Regex::new(r#"AUTHORITY\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]\s*\]\s*$"#)
            .map_err(|e| ClipError::UnsupportedCrs(e.to_string()))?;
        if let Some(code) = root_authority
            .captures(wkt)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        {
            return Self::from_epsg(code);
        }

        let upper = wkt.to_ascii_uppercase();
        let unsupported_datum = || {
            ClipError::UnsupportedCrs(format!(
                "datum of {} has no known transform to WGS84; set the boundary CRS explicitly",
                truncate(wkt, 120)
            ))
        };

        if upper.starts_with("GEOGCS") || upper.starts_with("GEOGCRS") {
            return match datum_of(wkt)? {
                Some(Datum::Wgs84) => Ok(SourceCrs::Wgs84),
                Some(Datum::Nad83) => Ok(SourceCrs::Proj4(NAD83_PROJ4.to_string())),
                None => Err(unsupported_datum()),
            };
        }

        let utm = Regex::new(r"(?i)UTM[_ ]?zone[_ ]?(\d{1,2})\s*([NS])")
            .map_err(|e| ClipError::UnsupportedCrs(e.to_string()))?;
        if let Some(caps) = utm.captures(wkt) {
            let zone: u32 = caps[1]
                .parse()
                .map_err(|_| ClipError::UnsupportedCrs(wkt.to_string()))?;
            if !(1..=60).contains(&zone) {
                return Err(ClipError::UnsupportedCrs(wkt.to_string()));
            }
            let south = caps[2].eq_ignore_ascii_case("S");
            let datum = match datum_of(wkt)? {
                Some(Datum::Wgs84) => "WGS84",
                Some(Datum::Nad83) => "NAD83",
                None => return Err(unsupported_datum()),
            };
            return Ok(SourceCrs::Proj4(utm_proj4(zone, south, datum)));
        }

        Err(ClipError::UnsupportedCrs(truncate(wkt, 120)))
    }

    /// Determine the CRS of a shapefile bundle.
    ///
    /// An explicit override wins; otherwise the sibling `.prj` is consulted. A
    /// bundle without `.prj` is assumed to be WGS84.
    pub fn detect(shp_path: &Path, override_crs: Option<&str>) -> Result<Self> {
        if let Some(value) = override_crs {
            return Self::parse_user(value);
        }

        let prj_path = shp_path.with_extension("prj");
        if !prj_path.exists() {
            warn!(
                "No .prj found next to {}, assuming EPSG:4326",
                shp_path.display()
            );
            return Ok(SourceCrs::Wgs84);
        }

        let wkt = fs::read_to_string(&prj_path).map_err(|e| ClipError::Boundary {
            path: prj_path.clone(),
            reason: e.to_string(),
        })?;
        Self::from_prj(&wkt)
    }

    fn to_proj(&self) -> Result<Proj> {
        let proj = match self {
            SourceCrs::Wgs84 => Proj::from_proj_string(WGS84_PROJ4),
            SourceCrs::Epsg(code) => Proj::from_epsg_code(*code),
            SourceCrs::Proj4(definition) => Proj::from_proj_string(definition),
        };
        proj.map_err(|e| ClipError::UnsupportedCrs(format!("{}: {}", self, e)))
    }
}

impl std::fmt::Display for SourceCrs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceCrs::Wgs84 => write!(f, "EPSG:4326"),
            SourceCrs::Epsg(code) => write!(f, "EPSG:{}", code),
            SourceCrs::Proj4(definition) => write!(f, "{}", definition),
        }
    }
}

/// Datums that resolve without an explicit override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Datum {
    Wgs84,
    Nad83,
}

/// Classify the `DATUM["name", ...]` node of a WKT string.
///
/// Only the datum name is inspected; a `TOWGS84` parameter on some other
/// datum does not make it WGS84.
fn datum_of(wkt: &str) -> Result<Option<Datum>> {
    let datum = Regex::new(r#"(?i)DATUM\[\s*"([^"]*)""#)
        .map_err(|e| ClipError::UnsupportedCrs(e.to_string()))?;
    let Some(name) = datum.captures(wkt).and_then(|c| c.get(1)) else {
        return Ok(None);
    };

    let key: String = name
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_uppercase();

    if key.contains("WGS84") || key.contains("WGS1984") {
        Ok(Some(Datum::Wgs84))
    } else if key.contains("NAD83")
        || key.contains("NAD1983")
        || (key.contains("NORTHAMERICAN") && key.contains("1983"))
    {
        Ok(Some(Datum::Nad83))
    } else {
        Ok(None)
    }
}

/// PROJ.4 definition of a UTM zone
pub fn utm_proj4(zone: u32, south: bool, datum: &str) -> String {
    let south = if south { " +south" } else { "" };
    format!("+proj=utm +zone={zone}{south} +datum={datum} +units=m +no_defs")
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Transforms geometries from a source CRS into WGS84 lon/lat degrees
pub struct Reprojector {
    from: Proj,
    to: Proj,
    source_is_geographic: bool,
}

impl Reprojector {
    /// Build a reprojector, or `None` when the source is already WGS84
    pub fn new(source: &SourceCrs) -> Result<Option<Self>> {
        if *source == SourceCrs::Wgs84 {
            return Ok(None);
        }

        let from = source.to_proj()?;
        let to = SourceCrs::Wgs84.to_proj()?;
        let source_is_geographic = from.is_latlong();

        info!("Reprojecting boundary from {} to EPSG:4326", source);

        Ok(Some(Self {
            from,
            to,
            source_is_geographic,
        }))
    }

    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        // proj4rs works in radians for geographic systems
        let mut point = if self.source_is_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };
        transform(&self.from, &self.to, &mut point)
            .map_err(|e| ClipError::Reprojection(format!("({}, {}): {}", coord.x, coord.y, e)))?;
        Ok(Coord {
            x: point.0.to_degrees(),
            y: point.1.to_degrees(),
        })
    }

    pub fn reproject(&self, geometry: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        geometry.try_map_coords(|coord| self.transform_coord(coord))
    }
}
