//! Core data models for the extraction pipeline.

pub mod record;
pub mod table;

pub use record::{GeoPoint, Record};
pub use table::{FilteredTable, NormalizedTable, RawTable, JOIN_KEY_COLUMN};
