//! Delimited-file loader.
//!
//! Reads one source file into a [`RawTable`]. Failures are returned as
//! [`LoadError`] so the pipeline can skip the file and keep going.

use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use crate::config::{ascii_byte, InputConfig};
use crate::error::{LoadError, Result};
use crate::models::RawTable;

/// Rows shown in the debug preview of each file
const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Fixed column names; `None` reads them from the first line after `skip_rows`
    pub columns: Option<Vec<String>>,
    pub delimiter: u8,
    pub skip_rows: usize,
    pub comment: Option<u8>,
    pub lat_column: String,
    pub lon_column: String,
}

impl LoaderOptions {
    pub fn from_config(input: &InputConfig) -> Result<Self> {
        Ok(Self {
            columns: (!input.header).then(|| input.columns.clone()),
            delimiter: ascii_byte("input.delimiter", input.delimiter)?,
            skip_rows: input.skip_rows,
            comment: input
                .comment
                .map(|c| ascii_byte("input.comment", c))
                .transpose()?,
            lat_column: input.lat_column.clone(),
            lon_column: input.lon_column.clone(),
        })
    }
}

impl Default for LoaderOptions {
    fn default() -> Self {
        let input = InputConfig::default();
        Self {
            columns: Some(input.columns),
            delimiter: b'\t',
            skip_rows: input.skip_rows,
            comment: None,
            lat_column: input.lat_column,
            lon_column: input.lon_column,
        }
    }
}

pub struct Loader {
    options: LoaderOptions,
}

impl Loader {
    pub fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Load a file from disk
    pub fn load(&self, path: &Path) -> std::result::Result<RawTable, LoadError> {
        let file = File::open(path)?;
        self.load_from_reader(path, BufReader::new(file))
    }

    /// Load from any buffered reader; `source` is only used for bookkeeping
    pub fn load_from_reader<R: BufRead>(
        &self,
        source: &Path,
        mut reader: R,
    ) -> std::result::Result<RawTable, LoadError> {
        // Leading comment lines are discarded raw, before the csv parser sees them,
        // so stray quotes or delimiters in them cannot break parsing.
        let mut skipped = 0u64;
        let mut discard = Vec::new();
        for _ in 0..self.options.skip_rows {
            discard.clear();
            if reader.read_until(b'\n', &mut discard)? == 0 {
                break;
            }
            skipped += 1;
        }

        let mut csv_reader = ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.options.delimiter)
            .comment(self.options.comment)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut records = csv_reader.records();

        let columns = match &self.options.columns {
            Some(columns) => columns.clone(),
            None => {
                let header = loop {
                    match records.next() {
                        Some(record) => {
                            let record = record?;
                            if !is_blank(&record) {
                                break record;
                            }
                        }
                        None => return Err(LoadError::Empty),
                    }
                };
                header.iter().map(|h| h.to_string()).collect()
            }
        };

        if !columns.contains(&self.options.lat_column) || !columns.contains(&self.options.lon_column)
        {
            return Err(LoadError::MissingCoordinateColumns {
                lat: self.options.lat_column.clone(),
                lon: self.options.lon_column.clone(),
            });
        }

        let mut table = RawTable::new(source, columns);
        let expected = table.columns.len();
        let header_mode = self.options.columns.is_none();

        for record in records {
            let record = record?;
            if is_blank(&record) {
                continue;
            }

            let mut fields: Vec<String> = record.iter().map(|f| f.to_string()).collect();

            // A trailing delimiter produces one extra empty field
            if fields.len() == expected + 1 && fields.last().is_some_and(|f| f.is_empty()) {
                fields.pop();
            }

            if fields.len() != expected {
                let line = record.position().map(|p| p.line()).unwrap_or(0) + skipped;
                return Err(LoadError::Arity {
                    line,
                    expected,
                    found: fields.len(),
                });
            }

            table.rows.push(fields);
        }

        if table.is_empty() && !header_mode {
            return Err(LoadError::Empty);
        }

        debug!("Columns found: {:?}", table.columns);
        for row in table.rows.iter().take(PREVIEW_ROWS) {
            debug!("  {:?}", row);
        }

        Ok(table)
    }
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|f| f.is_empty())
}
