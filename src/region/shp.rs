//! Conversions from shapefile records to `geo` geometries and plain text attributes.

use geo::{Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use shapefile::dbase::FieldValue;
use shapefile::{PolygonRing, Shape};

/// Convert a polygon-type shape to a MultiPolygon.
///
/// Returns `None` for null shapes and non-areal geometry (points, lines, patches).
pub fn shape_to_multipolygon(shape: &Shape) -> Option<MultiPolygon<f64>> {
    let rings: Vec<(bool, Vec<Coord<f64>>)> = match shape {
        Shape::Polygon(p) => p
            .rings()
            .iter()
            .map(|r| ring_coords(r, |pt| Coord { x: pt.x, y: pt.y }))
            .collect(),
        Shape::PolygonM(p) => p
            .rings()
            .iter()
            .map(|r| ring_coords(r, |pt| Coord { x: pt.x, y: pt.y }))
            .collect(),
        Shape::PolygonZ(p) => p
            .rings()
            .iter()
            .map(|r| ring_coords(r, |pt| Coord { x: pt.x, y: pt.y }))
            .collect(),
        _ => return None,
    };

    let polygons = assemble_polygons(rings);
    if polygons.is_empty() {
        None
    } else {
        Some(MultiPolygon::new(polygons))
    }
}

/// Split a ring into (is_outer, closed coordinate list)
fn ring_coords<P>(ring: &PolygonRing<P>, xy: impl Fn(&P) -> Coord<f64>) -> (bool, Vec<Coord<f64>>) {
    let (is_outer, points) = match ring {
        PolygonRing::Outer(points) => (true, points),
        PolygonRing::Inner(points) => (false, points),
    };
    let mut coords: Vec<Coord<f64>> = points.iter().map(xy).collect();
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }
    (is_outer, coords)
}

/// Group outer rings with the holes they contain.
///
/// Holes are attached to the first outer ring containing their first vertex;
/// holes with no enclosing outer ring are discarded. Rings with fewer than
/// four coordinates (a closed triangle) are discarded.
pub fn assemble_polygons(rings: Vec<(bool, Vec<Coord<f64>>)>) -> Vec<Polygon<f64>> {
    let mut exteriors: Vec<(Polygon<f64>, Vec<LineString<f64>>)> = Vec::new();
    let mut holes: Vec<LineString<f64>> = Vec::new();

    for (is_outer, coords) in rings {
        if coords.len() < 4 {
            continue;
        }
        let ring = LineString::new(coords);
        if is_outer {
            exteriors.push((Polygon::new(ring, vec![]), Vec::new()));
        } else {
            holes.push(ring);
        }
    }

    for hole in holes {
        let Some(probe) = hole.0.first().map(|c| Point::from(*c)) else {
            continue;
        };
        if let Some((_, interiors)) = exteriors
            .iter_mut()
            .find(|(outer, _)| outer.contains(&probe) || outer.exterior().contains(&probe))
        {
            interiors.push(hole);
        }
    }

    exteriors
        .into_iter()
        .map(|(outer, interiors)| {
            let (exterior, _) = outer.into_inner();
            Polygon::new(exterior, interiors)
        })
        .collect()
}

/// Render a dBase value as text; empty for nulls
pub fn field_value_to_string(value: &FieldValue) -> String {
    match value {
        FieldValue::Character(Some(s)) => s.trim().to_string(),
        FieldValue::Memo(s) => s.trim().to_string(),
        FieldValue::Numeric(Some(n)) => n.to_string(),
        FieldValue::Float(Some(f)) => f.to_string(),
        FieldValue::Double(d) => d.to_string(),
        FieldValue::Currency(c) => c.to_string(),
        FieldValue::Integer(i) => i.to_string(),
        FieldValue::Logical(Some(b)) => b.to_string(),
        FieldValue::Date(Some(date)) => {
            format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
        }
        _ => String::new(),
    }
}
