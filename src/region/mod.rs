//! Target region and the membership test applied to each record.
//!
//! A region is either a latitude/longitude box or a polygon boundary dataset
//! behind an R-tree. The variant is chosen once per run; `filter` dispatches
//! once per table and the per-point loop never branches on the variant.

mod bbox;
mod boundary;
mod crs;
mod index;
mod shp;

pub use bbox::BoundingBox;
pub use boundary::{load_boundaries, BoundaryDataset, BoundaryOptions, RegionBoundary};
pub use crs::{utm_proj4, Reprojector, SourceCrs, WGS84_PROJ4};
pub use index::{BoundaryIndex, BoundaryPolicy};
pub use shp::{assemble_polygons, field_value_to_string, shape_to_multipolygon};

use crate::config::RegionConfig;
use crate::error::Result;
use crate::models::{FilteredTable, GeoPoint, NormalizedTable};

pub enum Region {
    BoundingBox(BoundingBox),
    Boundary(BoundaryIndex),
}

impl Region {
    /// Build the region described by the configuration.
    ///
    /// For boundaries this loads, reprojects and indexes the whole dataset.
    pub fn from_config(config: &RegionConfig) -> Result<Self> {
        match config {
            RegionConfig::Bbox {
                lat_min,
                lat_max,
                lon_min,
                lon_max,
            } => Ok(Region::BoundingBox(BoundingBox::new(
                *lat_min, *lat_max, *lon_min, *lon_max,
            )?)),
            RegionConfig::Boundary {
                path,
                crs,
                attributes,
                policy,
            } => {
                let options = BoundaryOptions {
                    crs: crs.clone(),
                    attributes: attributes.clone(),
                };
                let dataset = load_boundaries(path, &options)?;
                Ok(Region::Boundary(BoundaryIndex::build(dataset, *policy)))
            }
        }
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        match self {
            Region::BoundingBox(bbox) => bbox.contains(point),
            Region::Boundary(index) => index.contains(point),
        }
    }

    pub fn filter(&self, table: NormalizedTable) -> FilteredTable {
        match self {
            Region::BoundingBox(bbox) => bbox.filter(table),
            Region::Boundary(index) => index.filter(table),
        }
    }

    /// Short human-readable description for logs
    pub fn describe(&self) -> String {
        match self {
            Region::BoundingBox(bbox) => {
                let (lat_min, lat_max) = bbox.lat_range();
                let (lon_min, lon_max) = bbox.lon_range();
                format!(
                    "bounding box lat [{}, {}], lon [{}, {}]",
                    lat_min, lat_max, lon_min, lon_max
                )
            }
            Region::Boundary(index) => format!(
                "{} boundary polygons ({:?})",
                index.len(),
                index.policy()
            ),
        }
    }
}
