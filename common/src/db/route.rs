use super::core::Component;
use super::indices::RefId;
use super::layer::LayerId;
use super::port::Port;
use crate::geom::point::DbuPoint;
use crate::geom::rect::BBox;
use serde::Serialize;

/// A wire rectangle emitted by the realiser.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RouteRect {
    pub layer: LayerId,
    pub bbox: BBox,
    pub horizontal: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ViaRole {
    Corner,
    SourceCap,
    SinkCap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RouteVia {
    pub center: DbuPoint,
    pub role: ViaRole,
    /// Landing pad extent, identical on both metals.
    pub pad: BBox,
}

/// Which layer carries which direction when a corner list is drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LayerScheme {
    pub horizontal: LayerId,
    pub vertical: LayerId,
    pub corner_vias: bool,
}

impl LayerScheme {
    /// M1 horizontal, M2 vertical, vias at every bend.
    pub fn standard(m1: LayerId, m2: LayerId) -> Self {
        Self {
            horizontal: m1,
            vertical: m2,
            corner_vias: true,
        }
    }

    /// Everything on M2; used by via-escape routes.
    pub fn upper_only(m2: LayerId) -> Self {
        Self {
            horizontal: m2,
            vertical: m2,
            corner_vias: false,
        }
    }

    pub fn layer_for(&self, horizontal: bool) -> LayerId {
        if horizontal {
            self.horizontal
        } else {
            self.vertical
        }
    }
}

/// Everything one routed net produced.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteResult {
    pub net: String,
    pub corners: Vec<DbuPoint>,
    pub references: Vec<RefId>,
    pub length_um: f64,
    pub ports: Vec<Port>,
    pub rects: Vec<RouteRect>,
    pub vias: Vec<RouteVia>,
    pub scheme: LayerScheme,
    pub source: Port,
    pub sink: Port,
}

impl RouteResult {
    pub fn corner_via_count(&self) -> usize {
        self.vias.iter().filter(|v| v.role == ViaRole::Corner).count()
    }

    /// Removes every element this route added to `component`.
    pub fn undo(&self, component: &mut Component) {
        for &id in &self.references {
            component.remove_reference(id);
        }
    }
}
