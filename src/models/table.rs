//! Row-oriented tables passed between pipeline stages.

use std::path::{Path, PathBuf};

use super::Record;

/// Column added by the polygon path holding the matched boundary's position.
pub const JOIN_KEY_COLUMN: &str = "index_right";

/// A parsed file before coordinate normalization. All fields are raw text.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub source: PathBuf,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(source: &Path, columns: Vec<String>) -> Self {
        Self {
            source: source.to_path_buf(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A table whose coordinate columns are guaranteed numeric.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub source: PathBuf,
    pub columns: Vec<String>,
    pub records: Vec<Record>,
    /// Rows discarded for missing, unparseable or out-of-range coordinates
    pub dropped: usize,
}

/// Rows that passed a region test, ready for aggregation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl FilteredTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Remove a column by name, returning whether it was present
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.columns.iter().position(|c| c == name) else {
            return false;
        };
        self.columns.remove(idx);
        for row in &mut self.rows {
            if idx < row.len() {
                row.remove(idx);
            }
        }
        true
    }
}
