//! Accumulation of per-file matches and output writing.

use csv::WriterBuilder;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{ClipError, LoadError, Result};
use crate::models::{FilteredTable, JOIN_KEY_COLUMN};

/// Concatenates filtered tables in the order they are pushed
#[derive(Debug, Default)]
pub struct Aggregator {
    columns: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
    tables_with_rows: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one file's matches.
    ///
    /// The first non-empty table fixes the column list; later tables must
    /// match it. Returns the number of rows added.
    pub fn push(&mut self, table: FilteredTable) -> std::result::Result<usize, LoadError> {
        if table.is_empty() {
            return Ok(0);
        }

        if let Some(columns) = self.columns.as_ref().filter(|c| **c != table.columns) {
            return Err(LoadError::SchemaMismatch {
                expected: columns.clone(),
                found: table.columns,
            });
        }
        if self.columns.is_none() {
            self.columns = Some(table.columns);
        }

        let added = table.rows.len();
        self.rows.extend(table.rows);
        self.tables_with_rows += 1;
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of pushed tables that contributed at least one row
    pub fn tables_with_rows(&self) -> usize {
        self.tables_with_rows
    }

    /// Consolidated table with the join key removed, or `None` when nothing matched
    pub fn finish(self) -> Option<FilteredTable> {
        let columns = self.columns?;
        if self.rows.is_empty() {
            return None;
        }
        let mut table = FilteredTable {
            columns,
            rows: self.rows,
        };
        if table.drop_column(JOIN_KEY_COLUMN) {
            debug!("Dropped join column '{}'", JOIN_KEY_COLUMN);
        }
        Some(table)
    }
}

/// Write a table as delimited text with a header row, creating parent directories
pub fn write_table(table: &FilteredTable, path: &Path, delimiter: u8) -> Result<()> {
    let output_err = |reason: String| ClipError::Output {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| output_err(e.to_string()))?;
    }

    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| output_err(e.to_string()))?;

    writer
        .write_record(&table.columns)
        .map_err(|e| output_err(e.to_string()))?;
    for row in &table.rows {
        writer
            .write_record(row)
            .map_err(|e| output_err(e.to_string()))?;
    }
    writer.flush().map_err(|e| output_err(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> FilteredTable {
        FilteredTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|f| f.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_preserves_push_order() {
        let mut agg = Aggregator::new();
        agg.push(table(&["id"], &[&["a1"], &["a2"]])).unwrap();
        agg.push(table(&["id"], &[])).unwrap();
        agg.push(table(&["id"], &[&["b1"]])).unwrap();

        assert_eq!(agg.len(), 3);
        assert_eq!(agg.tables_with_rows(), 2);
        let out = agg.finish().unwrap();
        assert_eq!(out.rows, vec![vec!["a1"], vec!["a2"], vec!["b1"]]);
    }

    #[test]
    fn test_nothing_matched() {
        let mut agg = Aggregator::new();
        agg.push(table(&["id"], &[])).unwrap();
        assert!(agg.is_empty());
        assert!(agg.finish().is_none());
        assert!(Aggregator::new().finish().is_none());
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let mut agg = Aggregator::new();
        agg.push(table(&["id", "lat"], &[&["1", "30"]])).unwrap();
        let err = agg.push(table(&["id", "latitude"], &[&["2", "30"]])).unwrap_err();
        assert!(matches!(err, LoadError::SchemaMismatch { .. }));
        assert_eq!(agg.len(), 1);
    }

    #[test]
    fn test_join_key_dropped() {
        let mut agg = Aggregator::new();
        agg.push(table(&["id", JOIN_KEY_COLUMN, "NAME"], &[&["1", "4", "Tehri"]]))
            .unwrap();
        let out = agg.finish().unwrap();
        assert_eq!(out.columns, vec!["id", "NAME"]);
        assert_eq!(out.rows[0], vec!["1", "Tehri"]);
    }

    #[test]
    fn test_write_table_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/extract.csv");
        let out = table(&["id", "note"], &[&["1", "a,b"]]);

        write_table(&out, &path, b',').unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "id,note\n1,\"a,b\"\n");
    }
}
