use super::point::DbuPoint;
use super::rect::BBox;
use serde::{Deserialize, Serialize};

/// A closed axis-aligned hull. Only its bounding box matters to the router.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<DbuPoint>", into = "Vec<DbuPoint>")]
pub struct Polygon {
    points: Vec<DbuPoint>,
}

impl Polygon {
    /// Returns `None` for fewer than three vertices.
    pub fn new(points: Vec<DbuPoint>) -> Option<Self> {
        (points.len() >= 3).then_some(Self { points })
    }

    pub fn from_bbox(bbox: BBox) -> Self {
        Self {
            points: vec![
                DbuPoint::new(bbox.west, bbox.south),
                DbuPoint::new(bbox.east, bbox.south),
                DbuPoint::new(bbox.east, bbox.north),
                DbuPoint::new(bbox.west, bbox.north),
            ],
        }
    }

    pub fn points(&self) -> &[DbuPoint] {
        &self.points
    }

    pub fn bbox(&self) -> BBox {
        let mut bbox = BBox::from_corners(self.points[0], self.points[0]);
        for &p in &self.points[1..] {
            bbox = bbox.union(&BBox::from_corners(p, p));
        }
        bbox
    }
}

impl TryFrom<Vec<DbuPoint>> for Polygon {
    type Error = String;

    fn try_from(points: Vec<DbuPoint>) -> Result<Self, Self::Error> {
        let len = points.len();
        Self::new(points).ok_or_else(|| format!("polygon needs at least 3 points, got {}", len))
    }
}

impl From<Polygon> for Vec<DbuPoint> {
    fn from(polygon: Polygon) -> Self {
        polygon.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_polygons_are_rejected() {
        assert!(Polygon::new(vec![DbuPoint::new(0, 0), DbuPoint::new(1, 1)]).is_none());
    }

    #[test]
    fn l_shape_bbox() {
        let poly = Polygon::new(vec![
            DbuPoint::new(0, 0),
            DbuPoint::new(40, 0),
            DbuPoint::new(40, 10),
            DbuPoint::new(10, 10),
            DbuPoint::new(10, 30),
            DbuPoint::new(0, 30),
        ])
        .unwrap();
        assert_eq!(poly.bbox(), BBox::new(30, 40, 0, 0));
    }
}
