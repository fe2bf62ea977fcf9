use super::point::DbuPoint;
use serde::{Deserialize, Serialize};

/// An axis-aligned box in database units.
///
/// Invariant: `north >= south` and `east >= west`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BBox {
    pub north: i64,
    pub east: i64,
    pub south: i64,
    pub west: i64,
}

impl BBox {
    pub fn new(north: i64, east: i64, south: i64, west: i64) -> Self {
        debug_assert!(north >= south && east >= west, "inverted bbox");
        Self {
            north,
            east,
            south,
            west,
        }
    }

    pub fn from_corners(a: DbuPoint, b: DbuPoint) -> Self {
        Self {
            north: a.y.max(b.y),
            east: a.x.max(b.x),
            south: a.y.min(b.y),
            west: a.x.min(b.x),
        }
    }

    pub fn from_center(center: DbuPoint, width: i64, height: i64) -> Self {
        let west = center.x - width / 2;
        let south = center.y - height / 2;
        Self {
            north: south + height,
            east: west + width,
            south,
            west,
        }
    }

    pub fn width(&self) -> i64 {
        self.east - self.west
    }

    pub fn height(&self) -> i64 {
        self.north - self.south
    }

    pub fn center(&self) -> DbuPoint {
        DbuPoint::new((self.east + self.west) / 2, (self.north + self.south) / 2)
    }

    /// Inclusive point containment.
    pub fn contains(&self, p: DbuPoint) -> bool {
        p.x >= self.west && p.x <= self.east && p.y >= self.south && p.y <= self.north
    }

    /// Overlap with positive area. Boxes that only touch do not intersect.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.west < other.east
            && self.east > other.west
            && self.south < other.north
            && self.north > other.south
    }

    /// Common region of positive area, if any.
    pub fn intersection(&self, other: &BBox) -> Option<Self> {
        if !self.intersects(other) {
            return None;
        }
        Some(Self {
            north: self.north.min(other.north),
            east: self.east.min(other.east),
            south: self.south.max(other.south),
            west: self.west.max(other.west),
        })
    }

    /// True when `other` lies entirely inside `self`, edges included.
    pub fn encloses(&self, other: &BBox) -> bool {
        other.west >= self.west
            && other.east <= self.east
            && other.south >= self.south
            && other.north <= self.north
    }

    pub fn inflate(&self, d: i64) -> Self {
        Self {
            north: self.north + d,
            east: self.east + d,
            south: self.south - d,
            west: self.west - d,
        }
    }

    pub fn union(&self, other: &BBox) -> Self {
        Self {
            north: self.north.max(other.north),
            east: self.east.max(other.east),
            south: self.south.min(other.south),
            west: self.west.min(other.west),
        }
    }
}
