//! Command-line driver for the extraction pipeline.
//!
//! Walks a directory of hotspot detection files, keeps the rows that fall
//! inside the configured region and writes them to one consolidated table.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hotspot_clip::config::{Config, RegionConfig};
use hotspot_clip::region::BoundaryPolicy;
use hotspot_clip::Pipeline;

#[derive(Parser, Debug)]
#[command(name = "hotspot-clip")]
#[command(about = "Clip point detections to a bounding box or boundary polygon")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root directory of input files
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Output file for the consolidated extract
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Input field delimiter: a single character, "tab" or "comma"
    #[arg(long, value_parser = parse_delimiter)]
    delimiter: Option<char>,

    /// Leading lines to skip in each input file
    #[arg(long)]
    skip_rows: Option<usize>,

    /// Read column names from each file's first line after the skipped lines
    #[arg(long)]
    header: bool,

    /// Bounding box as lat_min,lat_max,lon_min,lon_max
    #[arg(long, allow_hyphen_values = true, conflicts_with = "boundary")]
    bbox: Option<String>,

    /// Boundary shapefile (.shp) to clip against instead of a bounding box
    #[arg(long)]
    boundary: Option<PathBuf>,

    /// CRS of the boundary, overriding its .prj ("EPSG:32644" or a PROJ.4 string)
    #[arg(long)]
    boundary_crs: Option<String>,

    /// Boundary attribute to join onto matched rows (repeatable; default all)
    #[arg(long = "attribute")]
    attributes: Vec<String>,

    /// Exclude points lying exactly on a boundary edge
    #[arg(long)]
    exclusive_boundary: bool,

    /// Write a JSON run summary to this path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

fn parse_delimiter(value: &str) -> std::result::Result<char, String> {
    match value {
        "tab" | "\\t" => Ok('\t'),
        "comma" => Ok(','),
        _ => {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(format!("expected a single character, got '{}'", value)),
            }
        }
    }
}

fn parse_bbox(value: &str) -> Result<[f64; 4]> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("invalid --bbox '{}'", value))?;
    match parts.as_slice() {
        [lat_min, lat_max, lon_min, lon_max] => Ok([*lat_min, *lat_max, *lon_min, *lon_max]),
        _ => bail!(
            "--bbox expects 4 values (lat_min,lat_max,lon_min,lon_max), got {}",
            parts.len()
        ),
    }
}

/// Layer command-line flags over the file (or default) configuration
fn apply_overrides(config: &mut Config, args: &Args) -> Result<()> {
    if let Some(dir) = &args.input_dir {
        config.input.dir = dir.clone();
    }
    if let Some(output) = &args.output {
        config.output.path = output.clone();
    }
    if let Some(delimiter) = args.delimiter {
        config.input.delimiter = delimiter;
    }
    if let Some(skip_rows) = args.skip_rows {
        config.input.skip_rows = skip_rows;
    }
    if args.header {
        config.input.header = true;
    }
    if let Some(summary) = &args.summary {
        config.output.summary = Some(summary.clone());
    }

    if let Some(bbox) = &args.bbox {
        let [lat_min, lat_max, lon_min, lon_max] = parse_bbox(bbox)?;
        config.region = RegionConfig::Bbox {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        };
    }

    if let Some(path) = &args.boundary {
        config.region = RegionConfig::Boundary {
            path: path.clone(),
            crs: None,
            attributes: None,
            policy: BoundaryPolicy::default(),
        };
    }

    if let RegionConfig::Boundary {
        crs,
        attributes,
        policy,
        ..
    } = &mut config.region
    {
        if let Some(value) = &args.boundary_crs {
            *crs = Some(value.clone());
        }
        if !args.attributes.is_empty() {
            *attributes = Some(args.attributes.clone());
        }
        if args.exclusive_boundary {
            *policy = BoundaryPolicy::Exclusive;
        }
    } else if args.boundary_crs.is_some() || args.exclusive_boundary || !args.attributes.is_empty()
    {
        bail!("--boundary-crs, --attribute and --exclusive-boundary require a boundary region");
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("hotspot-clip");

    let mut config = match &args.config {
        Some(path) => {
            info!("Config: {}", path.display());
            Config::load_from_file(path)?
        }
        None => Config::default(),
    };
    apply_overrides(&mut config, &args)?;

    let pipeline = match Pipeline::new(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("{}", e);
            return Err(e).context("Failed to set up region");
        }
    };

    let summary = match pipeline.run() {
        Ok(summary) => summary,
        Err(e) => {
            error!("{}", e);
            return Err(e).context("Extraction failed");
        }
    };

    summary.log();

    if let Some(path) = &config.output.summary {
        summary
            .write_json(path)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        info!("Run summary written to {}", path.display());
    }

    Ok(())
}
