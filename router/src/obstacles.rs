//! Obstruction extraction and endpoint exemption.

use sky130_common::db::core::{Obstruction, PolygonSource};
use sky130_common::db::layer::LayerId;
use sky130_common::geom::point::DbuPoint;
use sky130_common::geom::rect::BBox;
use sky130_common::geom::rtree::SpatialIndex;

/// Every polygon on `layers` apart from those exempted at `exempt_points`,
/// in layer order then shape order.
pub fn extract<S: PolygonSource>(
    source: &S,
    layers: &[LayerId],
    exempt_points: &[DbuPoint],
) -> Vec<Obstruction> {
    let all: Vec<Obstruction> = layers
        .iter()
        .flat_map(|&layer| {
            source
                .polygons(layer)
                .filter(|poly| poly.points().len() >= 3)
                .map(move |poly| Obstruction::new(layer, poly.clone()))
        })
        .collect();
    let exempt = find_exempt(&all, exempt_points);
    all.into_iter()
        .enumerate()
        .filter(|(i, _)| exempt.binary_search(i).is_err())
        .map(|(_, o)| o)
        .collect()
}

/// Index of the first obstruction whose bbox contains each point, sorted and
/// deduplicated. A point inside no obstruction exempts nothing.
pub fn find_exempt(obstructions: &[Obstruction], points: &[DbuPoint]) -> Vec<usize> {
    let mut exempt: Vec<usize> = points
        .iter()
        .filter_map(|p| obstructions.iter().position(|o| o.bbox.contains(*p)))
        .collect();
    exempt.sort_unstable();
    exempt.dedup();
    exempt
}

/// Obstructions of a session with a spatial index over their bboxes.
pub struct ObstacleSet {
    items: Vec<Obstruction>,
    index: SpatialIndex,
}

impl ObstacleSet {
    pub fn new(items: Vec<Obstruction>) -> Self {
        let index = SpatialIndex::from_rects(items.iter().enumerate().map(|(i, o)| (o.bbox, i)));
        Self { items, index }
    }

    pub fn items(&self) -> &[Obstruction] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Ids overlapping `bbox`, skipping `exempt` (sorted) and, when given,
    /// keeping only obstructions on one of `layers`.
    pub fn hits(
        &self,
        bbox: BBox,
        layers: Option<&[LayerId]>,
        exempt: &[usize],
    ) -> Vec<usize> {
        self.index
            .query(bbox)
            .into_iter()
            .filter(|i| exempt.binary_search(i).is_err())
            .filter(|&i| layers.is_none_or(|ls| ls.contains(&self.items[i].layer)))
            .collect()
    }

    /// The obstructions left once `exempt` is removed, in their original order.
    pub fn without(&self, exempt: &[usize]) -> Vec<Obstruction> {
        self.items
            .iter()
            .enumerate()
            .filter(|(i, _)| exempt.binary_search(i).is_err())
            .map(|(_, o)| o.clone())
            .collect()
    }
}
