use crate::geom::units::Units;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A GDS `(layer, datatype)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId {
    pub layer: u16,
    pub datatype: u16,
}

impl LayerId {
    pub const fn new(layer: u16, datatype: u16) -> Self {
        Self { layer, datatype }
    }
}

impl From<(u16, u16)> for LayerId {
    fn from((layer, datatype): (u16, u16)) -> Self {
        Self::new(layer, datatype)
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.layer, self.datatype)
    }
}

pub const MET1: LayerId = LayerId::new(68, 20);
pub const VIA: LayerId = LayerId::new(68, 44);
pub const MET2: LayerId = LayerId::new(69, 20);
pub const POLY: LayerId = LayerId::new(66, 20);
pub const DIFF: LayerId = LayerId::new(65, 20);

/// Process constants the router needs. Read-only for the lifetime of a session.
#[derive(Clone, Debug, PartialEq)]
pub struct PdkConfig {
    pub units: Units,
    pub m1: LayerId,
    pub m2: LayerId,
    pub via: LayerId,
    /// Via cut edge length in µm.
    pub via_size: f64,
    /// Cut-to-cut spacing in µm.
    pub via_spacing: f64,
    /// Metal enclosure of a cut on both landing pads, in µm.
    pub via_enclosure: f64,
}

impl PdkConfig {
    pub fn sky130() -> Self {
        Self {
            units: Units::default(),
            m1: MET1,
            m2: MET2,
            via: VIA,
            via_size: 0.15,
            via_spacing: 0.17,
            via_enclosure: 0.055,
        }
    }
}

impl Default for PdkConfig {
    fn default() -> Self {
        Self::sky130()
    }
}
