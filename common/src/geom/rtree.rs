use super::rect::BBox;
use rstar::{AABB, RTree};

/// R-tree over boxes, answering "which ids overlap this box".
pub struct SpatialIndex {
    tree: RTree<IndexedRect>,
}

struct IndexedRect {
    rect: BBox,
    id: usize,
}

impl rstar::RTreeObject for IndexedRect {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.rect.west, self.rect.south],
            [self.rect.east, self.rect.north],
        )
    }
}

impl SpatialIndex {
    pub fn from_rects<I: IntoIterator<Item = (BBox, usize)>>(rects: I) -> Self {
        let items = rects
            .into_iter()
            .map(|(rect, id)| IndexedRect { rect, id })
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    /// Ids of every stored box overlapping `rect` with positive area, sorted.
    pub fn query(&self, rect: BBox) -> Vec<usize> {
        let aabb = AABB::from_corners([rect.west, rect.south], [rect.east, rect.north]);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&aabb)
            .filter(|item| item.rect.intersects(&rect))
            .map(|item| item.id)
            .collect();
        hits.sort_unstable();
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_ignores_touching() {
        let index = SpatialIndex::from_rects([
            (BBox::new(10, 10, 0, 0), 0),
            (BBox::new(10, 30, 0, 20), 1),
        ]);
        assert_eq!(index.query(BBox::new(5, 20, 5, 5)), vec![0]);
        assert_eq!(index.query(BBox::new(5, 25, 5, 5)), vec![0, 1]);
        assert!(index.query(BBox::new(10, 20, 0, 10)).is_empty());
    }
}
