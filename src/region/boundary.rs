//! Region boundary loading from shapefile bundles.

use geo::{BoundingRect, MultiPolygon};
use shapefile::Reader;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info, warn};

use super::crs::{Reprojector, SourceCrs};
use super::shp::{field_value_to_string, shape_to_multipolygon};
use crate::error::{ClipError, Result};

/// A single boundary polygon with its joined attributes
#[derive(Debug, Clone)]
pub struct RegionBoundary {
    /// Position of the feature in the source dataset (the join key)
    pub index: usize,
    /// Attribute values, aligned with `BoundaryDataset::attribute_names`
    pub attributes: Vec<String>,
    /// Geometry in WGS84 lon/lat degrees
    pub geometry: MultiPolygon<f64>,
}

impl RegionBoundary {
    /// Get the bounding box of this boundary
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        self.geometry
            .bounding_rect()
            .map(|rect| (rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }
}

/// All polygons of a boundary bundle, already in EPSG:4326
#[derive(Debug, Clone)]
pub struct BoundaryDataset {
    pub attribute_names: Vec<String>,
    pub boundaries: Vec<RegionBoundary>,
    pub crs: SourceCrs,
}

#[derive(Debug, Clone, Default)]
pub struct BoundaryOptions {
    /// Override for the bundle's CRS ("EPSG:<code>" or PROJ.4)
    pub crs: Option<String>,
    /// Attributes to carry; all fields in name order when `None`
    pub attributes: Option<Vec<String>>,
}

/// Required members of a shapefile bundle
const REQUIRED_COMPONENTS: [&str; 3] = ["shp", "shx", "dbf"];

fn verify_components(path: &Path) -> Result<()> {
    let missing: Vec<String> = REQUIRED_COMPONENTS
        .iter()
        .filter(|ext| !path.with_extension(ext).exists())
        .map(|ext| format!(".{}", ext))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ClipError::Boundary {
            path: path.to_path_buf(),
            reason: format!("missing required component files: {}", missing.join(", ")),
        })
    }
}

/// Load a shapefile bundle and reproject its polygons to EPSG:4326.
///
/// Any failure here is fatal for the run: without a boundary there is no region.
pub fn load_boundaries(path: &Path, options: &BoundaryOptions) -> Result<BoundaryDataset> {
    info!("Loading region boundary from {}", path.display());

    let boundary_err = |reason: String| ClipError::Boundary {
        path: path.to_path_buf(),
        reason,
    };

    verify_components(path)?;

    let crs = SourceCrs::detect(path, options.crs.as_deref())?;
    let reprojector = Reprojector::new(&crs)?;

    let mut reader = Reader::from_path(path).map_err(|e| boundary_err(e.to_string()))?;

    let mut features: Vec<(usize, MultiPolygon<f64>, BTreeMap<String, String>)> = Vec::new();
    let mut field_names: BTreeSet<String> = BTreeSet::new();
    let mut skipped = 0usize;

    for (index, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) =
            result.map_err(|e| boundary_err(format!("error reading feature {}: {}", index, e)))?;

        let Some(geometry) = shape_to_multipolygon(&shape) else {
            debug!("Skipping non-polygon feature {}", index);
            skipped += 1;
            continue;
        };

        let geometry = match &reprojector {
            Some(reprojector) => reprojector.reproject(&geometry)?,
            None => geometry,
        };

        let attributes: BTreeMap<String, String> = record
            .into_iter()
            .map(|(name, value)| (name, field_value_to_string(&value)))
            .collect();
        field_names.extend(attributes.keys().cloned());

        features.push((index, geometry, attributes));
    }

    if skipped > 0 {
        warn!("Skipped {} features without polygon geometry", skipped);
    }
    if features.is_empty() {
        return Err(boundary_err("no polygon features found".to_string()));
    }

    let attribute_names = match &options.attributes {
        Some(requested) => {
            if let Some(unknown) = requested.iter().find(|name| !field_names.contains(*name)) {
                return Err(boundary_err(format!("attribute '{}' not found", unknown)));
            }
            requested.clone()
        }
        None => field_names.into_iter().collect(),
    };

    let boundaries = features
        .into_iter()
        .map(|(index, geometry, mut attributes)| RegionBoundary {
            index,
            attributes: attribute_names
                .iter()
                .map(|name| attributes.remove(name).unwrap_or_default())
                .collect(),
            geometry,
        })
        .collect::<Vec<_>>();

    info!(
        "Loaded {} boundary polygons ({}) with {} attributes",
        boundaries.len(),
        crs,
        attribute_names.len()
    );

    Ok(BoundaryDataset {
        attribute_names,
        boundaries,
        crs,
    })
}
