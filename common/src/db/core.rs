use super::indices::RefId;
use super::layer::LayerId;
use super::port::{Orientation, Port};
use super::via::ViaCell;
use crate::geom::point::DbuPoint;
use crate::geom::polygon::Polygon;
use crate::geom::rect::BBox;
use serde::{Deserialize, Serialize};

/// Read side of a layout: where obstructions come from.
pub trait PolygonSource {
    fn polygons(&self, layer: LayerId) -> impl Iterator<Item = &Polygon>;
    fn bbox(&self) -> Option<BBox>;
    /// µm per database unit.
    fn dbu(&self) -> f64;
}

/// Write side of a layout: where routes are drawn.
pub trait GeometrySink {
    fn add_rectangle(&mut self, layer: LayerId, bbox: BBox) -> RefId;
    fn add_instance(&mut self, cell: ViaCell, center: DbuPoint) -> RefId;
    fn add_port(
        &mut self,
        name: &str,
        center: DbuPoint,
        width: i64,
        orientation: Orientation,
        layer: LayerId,
    ) -> RefId;
}

/// A polygon the router must keep clear of, with its bbox cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Obstruction {
    pub layer: LayerId,
    pub polygon: Polygon,
    pub bbox: BBox,
}

impl Obstruction {
    pub fn new(layer: LayerId, polygon: Polygon) -> Self {
        let bbox = polygon.bbox();
        Self {
            layer,
            polygon,
            bbox,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub id: RefId,
    pub layer: LayerId,
    pub polygon: Polygon,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: RefId,
    pub cell: ViaCell,
    pub center: DbuPoint,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRef {
    pub id: RefId,
    pub port: Port,
}

/// A flat layout cell: polygons keyed by layer, via instances and named ports.
///
/// Element order is insertion order, so iteration (and serialisation) is
/// deterministic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    dbu: f64,
    shapes: Vec<Shape>,
    instances: Vec<Instance>,
    ports: Vec<PortRef>,
    next_id: u32,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_dbu(name, 0.001)
    }

    pub fn with_dbu(name: impl Into<String>, dbu: f64) -> Self {
        Self {
            name: name.into(),
            dbu,
            shapes: Vec::new(),
            instances: Vec::new(),
            ports: Vec::new(),
            next_id: 0,
        }
    }

    fn alloc_id(&mut self) -> RefId {
        let id = RefId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn add_polygon(&mut self, layer: LayerId, polygon: Polygon) -> RefId {
        let id = self.alloc_id();
        self.shapes.push(Shape { id, layer, polygon });
        id
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().map(|p| &p.port)
    }

    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports().find(|p| p.name == name)
    }

    /// Removes the element created under `id`. Returns false if nothing had that id.
    pub fn remove_reference(&mut self, id: RefId) -> bool {
        let before = self.shapes.len() + self.instances.len() + self.ports.len();
        self.shapes.retain(|s| s.id != id);
        self.instances.retain(|i| i.id != id);
        self.ports.retain(|p| p.id != id);
        before != self.shapes.len() + self.instances.len() + self.ports.len()
    }
}

impl PolygonSource for Component {
    fn polygons(&self, layer: LayerId) -> impl Iterator<Item = &Polygon> {
        self.shapes
            .iter()
            .filter(move |s| s.layer == layer)
            .map(|s| &s.polygon)
    }

    fn bbox(&self) -> Option<BBox> {
        let shapes = self.shapes.iter().map(|s| s.polygon.bbox());
        let instances = self.instances.iter().map(|i| i.cell.extent_at(i.center));
        let ports = self
            .ports
            .iter()
            .map(|p| BBox::from_corners(p.port.center, p.port.center));
        shapes
            .chain(instances)
            .chain(ports)
            .reduce(|a, b| a.union(&b))
    }

    fn dbu(&self) -> f64 {
        self.dbu
    }
}

impl GeometrySink for Component {
    fn add_rectangle(&mut self, layer: LayerId, bbox: BBox) -> RefId {
        self.add_polygon(layer, Polygon::from_bbox(bbox))
    }

    fn add_instance(&mut self, cell: ViaCell, center: DbuPoint) -> RefId {
        let id = self.alloc_id();
        self.instances.push(Instance { id, cell, center });
        id
    }

    fn add_port(
        &mut self,
        name: &str,
        center: DbuPoint,
        width: i64,
        orientation: Orientation,
        layer: LayerId,
    ) -> RefId {
        let id = self.alloc_id();
        self.ports.push(PortRef {
            id,
            port: Port::new(name, center, width, orientation, layer),
        });
        id
    }
}
