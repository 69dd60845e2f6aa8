//! Run configuration.
//!
//! Every field has a default so a run works with an empty (or absent) TOML
//! file. The defaults describe the tab-separated hotspot archive with two
//! leading comment lines, clipped to the Uttarakhand bounding box.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ClipError, Result};
use crate::region::{BoundaryPolicy, BoundingBox};

/// Fixed column order of the hotspot detection files
pub const DEFAULT_COLUMNS: [&str; 14] = [
    "id",
    "year",
    "month",
    "day",
    "time_utc",
    "lat",
    "lon",
    "area_km2",
    "volcano",
    "level",
    "reliability",
    "frp_wm2",
    "qf",
    "hot_id",
];

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub region: RegionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct InputConfig {
    /// Root of the directory tree to scan
    pub dir: PathBuf,
    /// File extensions to pick up (case-insensitive, without the dot)
    pub extensions: Vec<String>,
    /// Column names assigned to each row, in order. Ignored when `header` is set.
    pub columns: Vec<String>,
    /// Take column names from the first line after `skip_rows` instead
    pub header: bool,
    pub delimiter: char,
    /// Leading lines to discard before data (or the header) begins
    pub skip_rows: usize,
    /// Lines starting with this character are ignored
    pub comment: Option<char>,
    pub lat_column: String,
    pub lon_column: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            extensions: vec!["csv".to_string()],
            columns: DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            header: false,
            delimiter: '\t',
            skip_rows: 2,
            comment: None,
            lat_column: "lat".to_string(),
            lon_column: "lon".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub delimiter: char,
    /// Optional JSON run summary
    pub summary: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("output/Filtered_Uttarakhand_Data.csv"),
            delimiter: ',',
            summary: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionConfig {
    Bbox {
        lat_min: f64,
        lat_max: f64,
        lon_min: f64,
        lon_max: f64,
    },
    Boundary {
        /// Path to the `.shp` file of the boundary bundle
        path: PathBuf,
        /// Override for the bundle's CRS: "EPSG:<code>" or a PROJ.4 string
        #[serde(default)]
        crs: Option<String>,
        /// dBase fields to join onto matched rows (all fields when absent)
        #[serde(default)]
        attributes: Option<Vec<String>>,
        #[serde(default)]
        policy: BoundaryPolicy,
    },
}

impl Default for RegionConfig {
    fn default() -> Self {
        RegionConfig::Bbox {
            lat_min: 29.24,
            lat_max: 31.30,
            lon_min: 77.50,
            lon_max: 81.80,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ClipError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ClipError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config)
    }

    /// Check everything that can be checked before touching input files
    pub fn validate(&self) -> Result<()> {
        ascii_byte("input.delimiter", self.input.delimiter)?;
        ascii_byte("output.delimiter", self.output.delimiter)?;
        if let Some(comment) = self.input.comment {
            ascii_byte("input.comment", comment)?;
        }

        if self.input.extensions.is_empty() {
            return Err(invalid("input.extensions", "at least one extension is required"));
        }

        if !self.input.header {
            if self.input.columns.is_empty() {
                return Err(invalid(
                    "input.columns",
                    "column names are required unless input.header is set",
                ));
            }
            for column in [&self.input.lat_column, &self.input.lon_column] {
                if !self.input.columns.contains(column) {
                    return Err(invalid(
                        "input.columns",
                        &format!("coordinate column '{}' is not part of the schema", column),
                    ));
                }
            }
        }

        if self.input.lat_column == self.input.lon_column {
            return Err(invalid(
                "input.lat_column",
                "latitude and longitude must be different columns",
            ));
        }

        if let RegionConfig::Bbox {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        } = self.region
        {
            BoundingBox::new(lat_min, lat_max, lon_min, lon_max)?;
        }

        Ok(())
    }
}

/// Convert a configured delimiter/comment character to the byte the csv crate expects
pub fn ascii_byte(key: &str, c: char) -> Result<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(invalid(key, &format!("'{}' is not a single-byte character", c)))
    }
}

fn invalid(key: &str, reason: &str) -> ClipError {
    ClipError::ConfigInvalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
