use super::layer::LayerId;
use crate::geom::point::DbuPoint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four axis directions of travel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dir {
    East,
    North,
    West,
    South,
}

impl Dir {
    pub const ALL: [Dir; 4] = [Dir::East, Dir::North, Dir::West, Dir::South];

    pub fn opposite(self) -> Self {
        match self {
            Dir::East => Dir::West,
            Dir::North => Dir::South,
            Dir::West => Dir::East,
            Dir::South => Dir::North,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Dir::East | Dir::West)
    }

    pub fn delta(self) -> (i64, i64) {
        match self {
            Dir::East => (1, 0),
            Dir::North => (0, 1),
            Dir::West => (-1, 0),
            Dir::South => (0, -1),
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Direction of travel from `a` to `b`, if they are distinct and aligned.
    pub fn between(a: DbuPoint, b: DbuPoint) -> Option<Self> {
        match (b.x - a.x, b.y - a.y) {
            (0, 0) => None,
            (dx, 0) if dx > 0 => Some(Dir::East),
            (_, 0) => Some(Dir::West),
            (0, dy) if dy > 0 => Some(Dir::North),
            (0, _) => Some(Dir::South),
            _ => None,
        }
    }
}

/// Facing of a port. `Omni` puts no constraint on the entry direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    East,
    North,
    West,
    South,
    Omni,
}

impl Orientation {
    /// Snaps an angle in degrees (0 = east, counter-clockwise) to the nearest cardinal.
    pub fn from_angle(degrees: f64) -> Self {
        let quadrant = (degrees / 90.0).round().rem_euclid(4.0) as u8;
        match quadrant {
            0 => Orientation::East,
            1 => Orientation::North,
            2 => Orientation::West,
            _ => Orientation::South,
        }
    }

    /// The outward facing direction, `None` for omni ports.
    pub fn dir(self) -> Option<Dir> {
        match self {
            Orientation::East => Some(Dir::East),
            Orientation::North => Some(Dir::North),
            Orientation::West => Some(Dir::West),
            Orientation::South => Some(Dir::South),
            Orientation::Omni => None,
        }
    }
}

impl From<Dir> for Orientation {
    fn from(dir: Dir) -> Self {
        match dir {
            Dir::East => Orientation::East,
            Dir::North => Orientation::North,
            Dir::West => Orientation::West,
            Dir::South => Orientation::South,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Orientation::East => "east",
            Orientation::North => "north",
            Orientation::West => "west",
            Orientation::South => "south",
            Orientation::Omni => "omni",
        };
        f.write_str(name)
    }
}

/// An electrical port: a named point on a layer with an outward facing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    pub center: DbuPoint,
    pub width: i64,
    pub orientation: Orientation,
    pub layer: LayerId,
}

impl Port {
    pub fn new(
        name: impl Into<String>,
        center: DbuPoint,
        width: i64,
        orientation: Orientation,
        layer: LayerId,
    ) -> Self {
        Self {
            name: name.into(),
            center,
            width,
            orientation,
            layer,
        }
    }
}
