//! End-to-end extraction: discover files, load, normalize, filter, aggregate.
//!
//! Files are processed strictly one after another. A file that fails to load
//! is recorded as skipped and never stops the run; only region, input
//! directory and output failures are fatal.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::aggregate::{write_table, Aggregator};
use crate::config::{ascii_byte, Config, InputConfig, OutputConfig};
use crate::error::{ClipError, LoadError, Result};
use crate::loader::{Loader, LoaderOptions};
use crate::normalize::normalize;
use crate::region::Region;

/// A file that contributed nothing because it could not be loaded
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// What happened to one input file
#[derive(Debug)]
pub enum FileOutcome {
    Processed {
        rows_read: usize,
        rows_dropped: usize,
        rows_matched: usize,
    },
    Skipped(LoadError),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub files_discovered: usize,
    pub files_processed: usize,
    pub files_with_matches: usize,
    pub skipped: Vec<SkippedFile>,
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub rows_matched: usize,
    /// Set only when an output file was written
    pub output: Option<PathBuf>,
}

impl RunSummary {
    pub fn log(&self) {
        info!(
            "Files: {} discovered, {} processed, {} with matches, {} skipped",
            self.files_discovered,
            self.files_processed,
            self.files_with_matches,
            self.skipped.len()
        );
        info!(
            "Rows: {} read, {} dropped for invalid coordinates, {} within region",
            self.rows_read, self.rows_dropped, self.rows_matched
        );
        for skipped in &self.skipped {
            info!("  skipped {}: {}", skipped.path.display(), skipped.reason);
        }
        match &self.output {
            Some(path) => info!("Consolidated filtered data saved to {}", path.display()),
            None => info!("No data points found within the region; no output written"),
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let output_err = |reason: String| ClipError::Output {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::create(path).map_err(|e| output_err(e.to_string()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| output_err(e.to_string()))
    }
}

/// Recursively list input files with a matching extension, sorted by name
pub fn discover_files(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ClipError::InputDirNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)));
        if matches {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

pub struct Pipeline {
    loader: Loader,
    region: Region,
    input: InputConfig,
    output: OutputConfig,
}

impl Pipeline {
    /// Validate the configuration and build the region.
    ///
    /// Boundary problems surface here, before any input file is read.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let region = Region::from_config(&config.region)?;
        Self::with_region(config, region)
    }

    /// Build a pipeline around an already constructed region
    pub fn with_region(config: &Config, region: Region) -> Result<Self> {
        let loader = Loader::new(LoaderOptions::from_config(&config.input)?);
        Ok(Self {
            loader,
            region,
            input: config.input.clone(),
            output: config.output.clone(),
        })
    }

    /// Load, normalize and filter one file, appending matches to `aggregator`
    pub fn process_file(&self, path: &Path, aggregator: &mut Aggregator) -> FileOutcome {
        let raw = match self.loader.load(path) {
            Ok(raw) => raw,
            Err(e) => return FileOutcome::Skipped(e),
        };
        let rows_read = raw.len();

        let normalized = normalize(raw, &self.input.lat_column, &self.input.lon_column);
        let rows_dropped = normalized.dropped;

        let filtered = self.region.filter(normalized);
        match aggregator.push(filtered) {
            Ok(rows_matched) => FileOutcome::Processed {
                rows_read,
                rows_dropped,
                rows_matched,
            },
            Err(e) => FileOutcome::Skipped(e),
        }
    }

    /// Run over every input file and write the consolidated extract
    pub fn run(&self) -> Result<RunSummary> {
        info!("Region: {}", self.region.describe());
        info!("Scanning {}", self.input.dir.display());

        let files = discover_files(&self.input.dir, &self.input.extensions)?;
        info!("Found {} input files", files.len());

        let mut summary = RunSummary {
            files_discovered: files.len(),
            ..RunSummary::default()
        };
        let mut aggregator = Aggregator::new();

        let pb = ProgressBar::new(files.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        for path in &files {
            pb.inc(1);
            match self.process_file(path, &mut aggregator) {
                FileOutcome::Processed {
                    rows_read,
                    rows_dropped,
                    rows_matched,
                } => {
                    info!(
                        "Processed {}: {} points within region",
                        path.display(),
                        rows_matched
                    );
                    summary.files_processed += 1;
                    summary.rows_read += rows_read;
                    summary.rows_dropped += rows_dropped;
                    summary.rows_matched += rows_matched;
                }
                FileOutcome::Skipped(reason) => {
                    warn!("Skipped {}: {}", path.display(), reason);
                    summary.skipped.push(SkippedFile {
                        path: path.clone(),
                        reason: reason.to_string(),
                    });
                }
            }
        }
        pb.finish_and_clear();

        summary.files_with_matches = aggregator.tables_with_rows();

        if let Some(table) = aggregator.finish() {
            let delimiter = ascii_byte("output.delimiter", self.output.delimiter)?;
            write_table(&table, &self.output.path, delimiter)?;
            summary.output = Some(self.output.path.clone());
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegionConfig;
    use crate::models::{FilteredTable, JOIN_KEY_COLUMN};
    use crate::region::{BoundaryDataset, BoundaryIndex, BoundaryPolicy, RegionBoundary, SourceCrs};
    use geo::{polygon, MultiPolygon};
    use std::fs;
    use tempfile::TempDir;

    const PREAMBLE: &str = "# hotspot export\n# id year month day time lat lon ...\n";

    fn row(id: &str, lat: &str, lon: &str) -> String {
        format!(
            "{}\t2024\t3\t15\t0610\t{}\t{}\t0.14\t0\t1\t80\t12.5\t0\t9{}\n",
            id, lat, lon, id
        )
    }

    fn write_input(dir: &Path, name: &str, rows: &[String]) {
        let mut text = PREAMBLE.to_string();
        for r in rows {
            text.push_str(r);
        }
        fs::write(dir.join(name), text).unwrap();
    }

    fn setup() -> (TempDir, Config) {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("data");
        fs::create_dir_all(&input).unwrap();

        let mut config = Config::default();
        config.input.dir = input;
        config.output.path = tmp.path().join("out/extract.csv");
        (tmp, config)
    }

    fn read_output(path: &Path) -> FilteredTable {
        let options = LoaderOptions {
            columns: None,
            delimiter: b',',
            skip_rows: 0,
            ..LoaderOptions::default()
        };
        let raw = Loader::new(options).load(path).unwrap();
        FilteredTable {
            columns: raw.columns,
            rows: raw.rows,
        }
    }

    #[test]
    fn test_example_points() {
        let (_tmp, config) = setup();
        write_input(
            &config.input.dir,
            "a.csv",
            &[
                row("1", "30.0", "79.0"),
                row("2", "28.0", "79.0"),
                row("3", "29.24", "77.50"),
                row("4", "31.31", "79.0"),
            ],
        );

        let summary = Pipeline::new(&config).unwrap().run().unwrap();
        assert_eq!(summary.rows_read, 4);
        assert_eq!(summary.rows_matched, 2);

        let out = read_output(&config.output.path);
        assert_eq!(out.columns.len(), 14);
        let ids: Vec<&str> = out.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_files_concatenated_in_name_order() {
        let (_tmp, config) = setup();
        write_input(&config.input.dir, "b.csv", &[row("b1", "30.5", "80.0")]);
        write_input(
            &config.input.dir,
            "a.csv",
            &[row("a1", "30.0", "79.0"), row("a2", "30.1", "79.1")],
        );

        let summary = Pipeline::new(&config).unwrap().run().unwrap();
        assert_eq!(summary.files_with_matches, 2);

        let out = read_output(&config.output.path);
        let ids: Vec<&str> = out.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2", "b1"]);
    }

    #[test]
    fn test_malformed_file_skipped() {
        let (_tmp, config) = setup();
        write_input(&config.input.dir, "a.csv", &[row("1", "30.0", "79.0")]);
        fs::write(
            config.input.dir.join("b.csv"),
            format!("{}1\t2024\t3\n", PREAMBLE),
        )
        .unwrap();
        fs::write(config.input.dir.join("c.csv"), "").unwrap();
        write_input(&config.input.dir, "d.csv", &[row("4", "30.2", "79.2")]);

        let summary = Pipeline::new(&config).unwrap().run().unwrap();
        assert_eq!(summary.files_discovered, 4);
        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.skipped.len(), 2);

        let out = read_output(&config.output.path);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_unparseable_coordinates_yield_no_rows() {
        let (_tmp, config) = setup();
        write_input(
            &config.input.dir,
            "a.csv",
            &[row("1", "N/A", "79.0"), row("2", "30.0", "abc")],
        );
        write_input(&config.input.dir, "b.csv", &[row("3", "30.0", "79.0")]);

        let summary = Pipeline::new(&config).unwrap().run().unwrap();
        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.rows_dropped, 2);
        assert_eq!(summary.files_with_matches, 1);
        assert_eq!(read_output(&config.output.path).len(), 1);
    }

    #[test]
    fn test_no_matches_writes_nothing() {
        let (_tmp, config) = setup();
        write_input(&config.input.dir, "a.csv", &[row("1", "10.0", "10.0")]);

        let summary = Pipeline::new(&config).unwrap().run().unwrap();
        assert_eq!(summary.rows_matched, 0);
        assert!(summary.output.is_none());
        assert!(!config.output.path.exists());
    }

    #[test]
    fn test_output_coordinates_round_trip() {
        let (_tmp, config) = setup();
        write_input(
            &config.input.dir,
            "a.csv",
            &[row("1", "30.123456789", "79.987654321"), row("2", " 29.5 ", "80")],
        );

        Pipeline::new(&config).unwrap().run().unwrap();
        let out = read_output(&config.output.path);

        let parsed: Vec<(f64, f64)> = out
            .rows
            .iter()
            .map(|r| (r[5].parse().unwrap(), r[6].parse().unwrap()))
            .collect();
        let expected = [(30.123456789, 79.987654321), (29.5, 80.0)];
        for ((lat, lon), (want_lat, want_lon)) in parsed.iter().zip(expected.iter()) {
            assert!((lat - want_lat).abs() < 1e-9);
            assert!((lon - want_lon).abs() < 1e-9);
        }
    }

    #[test]
    fn test_boundary_region_joins_attributes() {
        let (_tmp, config) = setup();
        write_input(
            &config.input.dir,
            "a.csv",
            &[
                row("1", "30.0", "79.0"),
                row("2", "35.0", "79.0"),
                row("3", "29.0", "78.0"),
            ],
        );

        let dataset = BoundaryDataset {
            attribute_names: vec!["NAME".to_string()],
            boundaries: vec![RegionBoundary {
                index: 0,
                attributes: vec!["Tehri".to_string()],
                geometry: MultiPolygon::new(vec![polygon![
                    (x: 78.0, y: 29.0),
                    (x: 80.0, y: 29.0),
                    (x: 80.0, y: 31.0),
                    (x: 78.0, y: 31.0),
                ]]),
            }],
            crs: SourceCrs::Wgs84,
        };
        let region = Region::Boundary(BoundaryIndex::build(dataset, BoundaryPolicy::Inclusive));

        let summary = Pipeline::with_region(&config, region).unwrap().run().unwrap();
        assert_eq!(summary.rows_matched, 2);

        let out = read_output(&config.output.path);
        assert_eq!(out.columns.last().map(String::as_str), Some("NAME"));
        assert!(!out.columns.iter().any(|c| c == JOIN_KEY_COLUMN));
        let ids: Vec<&str> = out.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(out.rows[0].last().map(String::as_str), Some("Tehri"));
    }

    #[test]
    fn test_missing_boundary_is_fatal() {
        let (tmp, mut config) = setup();
        config.region = RegionConfig::Boundary {
            path: tmp.path().join("missing.shp"),
            crs: None,
            attributes: None,
            policy: BoundaryPolicy::Inclusive,
        };
        assert!(matches!(
            Pipeline::new(&config),
            Err(ClipError::Boundary { .. })
        ));
    }

    #[test]
    fn test_missing_input_dir_is_fatal() {
        let (tmp, mut config) = setup();
        config.input.dir = tmp.path().join("nowhere");
        assert!(matches!(
            Pipeline::new(&config).unwrap().run(),
            Err(ClipError::InputDirNotFound { .. })
        ));
    }

    #[test]
    fn test_discover_filters_extensions_recursively() {
        let (_tmp, config) = setup();
        let nested = config.input.dir.join("2024/03");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("x.CSV"), "").unwrap();
        fs::write(config.input.dir.join("notes.txt"), "").unwrap();
        fs::write(config.input.dir.join("a.csv"), "").unwrap();

        let files = discover_files(&config.input.dir, &config.input.extensions).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.extension().is_some()));
    }

    #[test]
    fn test_summary_json() {
        let (tmp, config) = setup();
        write_input(&config.input.dir, "a.csv", &[row("1", "30.0", "79.0")]);
        let summary = Pipeline::new(&config).unwrap().run().unwrap();

        let path = tmp.path().join("summary.json");
        summary.write_json(&path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["rows_matched"], 1);
        assert_eq!(value["files_processed"], 1);
    }
}
