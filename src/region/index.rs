//! Spatial index for fast boundary lookups.

use geo::{Contains, Intersects};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{BoundaryDataset, RegionBoundary};
use crate::models::{FilteredTable, GeoPoint, NormalizedTable, JOIN_KEY_COLUMN};

/// Whether a point exactly on a polygon edge counts as inside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Interior and boundary points match
    #[default]
    Inclusive,
    /// Only interior points match
    Exclusive,
}

/// Wrapper for R-tree indexing of boundaries
#[derive(Debug, Clone)]
struct IndexedBoundary {
    slot: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedBoundary {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Spatial index over the polygons of a boundary dataset
pub struct BoundaryIndex {
    tree: RTree<IndexedBoundary>,
    boundaries: Vec<RegionBoundary>,
    attribute_names: Vec<String>,
    policy: BoundaryPolicy,
}

impl BoundaryIndex {
    /// Build spatial index from a loaded dataset
    pub fn build(dataset: BoundaryDataset, policy: BoundaryPolicy) -> Self {
        info!(
            "Building spatial index for {} boundaries...",
            dataset.boundaries.len()
        );

        let indexed: Vec<IndexedBoundary> = dataset
            .boundaries
            .iter()
            .enumerate()
            .filter_map(|(slot, boundary)| {
                let (min_x, min_y, max_x, max_y) = boundary.bbox()?;
                Some(IndexedBoundary {
                    slot,
                    envelope: AABB::from_corners([min_x, min_y], [max_x, max_y]),
                })
            })
            .collect();

        let tree = RTree::bulk_load(indexed);

        info!(
            "Spatial index built with {} entries ({:?} boundary policy)",
            tree.size(),
            policy
        );

        Self {
            tree,
            boundaries: dataset.boundaries,
            attribute_names: dataset.attribute_names,
            policy,
        }
    }

    /// Find the boundary containing a point.
    ///
    /// When polygons overlap, the one earliest in the dataset wins so a point
    /// always joins to at most one boundary.
    pub fn lookup(&self, point: GeoPoint) -> Option<&RegionBoundary> {
        let geometry_point = point.to_point();
        let query_envelope = AABB::from_point([point.lon, point.lat]);

        // Use R-tree to get candidates via envelope intersection, then filter with exact containment
        self.tree
            .locate_in_envelope_intersecting(&query_envelope)
            .map(|ib| &self.boundaries[ib.slot])
            .filter(|boundary| match self.policy {
                BoundaryPolicy::Inclusive => boundary.geometry.intersects(&geometry_point),
                BoundaryPolicy::Exclusive => boundary.geometry.contains(&geometry_point),
            })
            .min_by_key(|boundary| boundary.index)
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        self.lookup(point).is_some()
    }

    /// Output columns for a table with the given passthrough columns.
    ///
    /// Boundary attributes follow the join key; a name already used by the
    /// passthrough columns gets a `_right` suffix.
    pub fn joined_columns(&self, passthrough: &[String]) -> Vec<String> {
        let mut columns = passthrough.to_vec();
        columns.push(JOIN_KEY_COLUMN.to_string());
        for name in &self.attribute_names {
            if columns.contains(name) {
                columns.push(format!("{}_right", name));
            } else {
                columns.push(name.clone());
            }
        }
        columns
    }

    /// Keep rows inside any boundary and append the matched boundary's attributes
    pub fn filter(&self, table: NormalizedTable) -> FilteredTable {
        let mut filtered = FilteredTable::new(self.joined_columns(&table.columns));

        for record in table.records {
            let Some(boundary) = self.lookup(record.point) else {
                continue;
            };
            let mut row = record.fields;
            row.reserve(1 + boundary.attributes.len());
            row.push(boundary.index.to_string());
            row.extend(boundary.attributes.iter().cloned());
            filtered.rows.push(row);
        }

        filtered
    }

    pub fn policy(&self) -> BoundaryPolicy {
        self.policy
    }

    /// Get total number of indexed boundaries
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use crate::region::SourceCrs;
    use geo::{polygon, MultiPolygon};
    use std::path::PathBuf;

    fn square(index: usize, min: f64, max: f64, name: &str) -> RegionBoundary {
        RegionBoundary {
            index,
            attributes: vec![name.to_string()],
            geometry: MultiPolygon::new(vec![polygon![
                (x: min, y: min),
                (x: max, y: min),
                (x: max, y: max),
                (x: min, y: max),
            ]]),
        }
    }

    fn index(boundaries: Vec<RegionBoundary>, policy: BoundaryPolicy) -> BoundaryIndex {
        BoundaryIndex::build(
            BoundaryDataset {
                attribute_names: vec!["NAME".to_string()],
                boundaries,
                crs: SourceCrs::Wgs84,
            },
            policy,
        )
    }

    #[test]
    fn test_empty_index() {
        let idx = index(vec![], BoundaryPolicy::Inclusive);
        assert!(idx.is_empty());
        assert!(!idx.contains(GeoPoint::new(30.0, 79.0)));
    }

    #[test]
    fn test_inclusive_square() {
        let idx = index(vec![square(0, 0.0, 10.0, "A")], BoundaryPolicy::Inclusive);

        // Interior
        assert!(idx.contains(GeoPoint::new(5.0, 5.0)));
        // Corners
        assert!(idx.contains(GeoPoint::new(0.0, 0.0)));
        assert!(idx.contains(GeoPoint::new(10.0, 10.0)));
        assert!(idx.contains(GeoPoint::new(0.0, 10.0)));
        // Edges
        assert!(idx.contains(GeoPoint::new(0.0, 5.0)));
        assert!(idx.contains(GeoPoint::new(5.0, 10.0)));
        // Exterior
        assert!(!idx.contains(GeoPoint::new(-0.001, 5.0)));
        assert!(!idx.contains(GeoPoint::new(5.0, 10.5)));
        assert!(!idx.contains(GeoPoint::new(20.0, 20.0)));
    }

    #[test]
    fn test_exclusive_square() {
        let idx = index(vec![square(0, 0.0, 10.0, "A")], BoundaryPolicy::Exclusive);

        assert!(idx.contains(GeoPoint::new(5.0, 5.0)));
        assert!(!idx.contains(GeoPoint::new(0.0, 0.0)));
        assert!(!idx.contains(GeoPoint::new(0.0, 5.0)));
        assert!(!idx.contains(GeoPoint::new(5.0, 10.0)));
        assert!(!idx.contains(GeoPoint::new(20.0, 20.0)));
    }

    #[test]
    fn test_overlap_prefers_first_feature() {
        let idx = index(
            vec![square(1, 0.0, 10.0, "B"), square(0, 5.0, 15.0, "A")],
            BoundaryPolicy::Inclusive,
        );
        let hit = idx.lookup(GeoPoint::new(7.0, 7.0)).unwrap();
        assert_eq!(hit.index, 0);
        assert_eq!(hit.attributes, vec!["A"]);

        let hit = idx.lookup(GeoPoint::new(2.0, 2.0)).unwrap();
        assert_eq!(hit.index, 1);
    }

    #[test]
    fn test_filter_joins_attributes() {
        let idx = index(
            vec![square(0, 0.0, 10.0, "Dehradun"), square(1, 20.0, 30.0, "Almora")],
            BoundaryPolicy::Inclusive,
        );
        let columns = vec!["id".to_string(), "lat".to_string(), "lon".to_string()];
        let table = NormalizedTable {
            source: PathBuf::from("t.csv"),
            columns,
            records: vec![
                Record::new(GeoPoint::new(25.0, 25.0), vec!["1".into(), "25".into(), "25".into()]),
                Record::new(GeoPoint::new(15.0, 15.0), vec!["2".into(), "15".into(), "15".into()]),
                Record::new(GeoPoint::new(5.0, 5.0), vec!["3".into(), "5".into(), "5".into()]),
            ],
            dropped: 0,
        };

        let filtered = idx.filter(table);
        assert_eq!(filtered.columns, vec!["id", "lat", "lon", JOIN_KEY_COLUMN, "NAME"]);
        assert_eq!(filtered.rows.len(), 2);
        assert_eq!(filtered.rows[0], vec!["1", "25", "25", "1", "Almora"]);
        assert_eq!(filtered.rows[1], vec!["3", "5", "5", "0", "Dehradun"]);
    }

    #[test]
    fn test_joined_columns_suffix_collisions() {
        let idx = index(vec![square(0, 0.0, 1.0, "A")], BoundaryPolicy::Inclusive);
        let columns = idx.joined_columns(&["id".to_string(), "NAME".to_string()]);
        assert_eq!(columns, vec!["id", "NAME", JOIN_KEY_COLUMN, "NAME_right"]);
    }
}
