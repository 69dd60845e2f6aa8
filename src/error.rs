//! Error types for hotspot-clip.
//!
//! `ClipError` covers conditions that end a run. `LoadError` covers a single
//! input file and is always contained at the file boundary.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClipError {
    // Configuration errors
    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // Region errors
    #[error("Invalid bounding box: {reason}")]
    InvalidBoundingBox { reason: String },

    #[error("Failed to load region boundary {path}: {reason}")]
    Boundary { path: PathBuf, reason: String },

    #[error("Unsupported coordinate reference system: {0}")]
    UnsupportedCrs(String),

    #[error("Reprojection to EPSG:4326 failed: {0}")]
    Reprojection(String),

    // Input/output errors
    #[error("Input directory not found: {path}")]
    InputDirNotFound { path: PathBuf },

    #[error("Failed to write output {path}: {reason}")]
    Output { path: PathBuf, reason: String },
}

/// Why a single input file was skipped.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("File is empty")]
    Empty,

    #[error("Parsing error encountered: line {line} has {found} fields, expected {expected}")]
    Arity {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("'{lat}' and/or '{lon}' columns not found")]
    MissingCoordinateColumns { lat: String, lon: String },

    #[error("Columns do not match earlier files: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Parsing error encountered: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClipError>;
