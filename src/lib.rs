//! hotspot-clip - clip point detections to a region
//!
//! This library provides the loader, normalizer, region filters and
//! aggregator used by the `hotspot-clip` binary.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod region;

pub use config::Config;
pub use error::{ClipError, LoadError};
pub use models::{FilteredTable, GeoPoint, Record};
pub use pipeline::{Pipeline, RunSummary};
pub use region::{BoundaryPolicy, BoundingBox, Region};
