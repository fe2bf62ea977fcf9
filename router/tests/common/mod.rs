#![allow(dead_code)]

use sky130_common::db::core::{Component, GeometrySink};
use sky130_common::db::layer::{DIFF, MET1, POLY};
use sky130_common::db::port::{Orientation, Port};
use sky130_common::geom::point::DbuPoint;
use sky130_common::geom::polygon::Polygon;
use sky130_common::geom::rect::BBox;
use sky130_common::util::config::RouterConfig;
use sky130_common::util::logger;

pub const PAD: i64 = 500;
pub const WIRE: i64 = 250;

pub fn init_logging() {
    logger::init_captured();
}

pub fn um(v: f64) -> i64 {
    (v * 1000.0).round() as i64
}

pub fn pt(x: f64, y: f64) -> DbuPoint {
    DbuPoint::new(um(x), um(y))
}

/// 1 µm global pitch, everything else default.
pub fn config() -> RouterConfig {
    RouterConfig {
        global_grid_unit: 1.0,
        ..RouterConfig::default()
    }
}

pub fn m1_rect(c: &mut Component, bbox: BBox) {
    c.add_polygon(MET1, Polygon::from_bbox(bbox));
}

/// An M1 pad with a port of the default wire width at its centre.
pub fn terminal(c: &mut Component, name: &str, center: DbuPoint, orientation: Orientation) -> Port {
    m1_rect(c, BBox::from_center(center, PAD, PAD));
    c.add_port(name, center, WIRE, orientation, MET1);
    Port::new(name, center, WIRE, orientation, MET1)
}

#[derive(Clone, Debug)]
pub struct Mos {
    pub source: Port,
    pub drain: Port,
    pub gate: Port,
    pub body: Port,
}

/// Mock transistor at `(x, y)` µm: diffusion and poly in the middle, and four
/// M1 pads two microns out, each port facing away from the device.
pub fn place_mos(c: &mut Component, name: &str, x: f64, y: f64) -> Mos {
    let o = pt(x, y);
    c.add_polygon(DIFF, Polygon::from_bbox(BBox::from_center(o, um(3.0), um(1.0))));
    c.add_polygon(POLY, Polygon::from_bbox(BBox::from_center(o, um(0.3), um(3.0))));

    let at = |dx: f64, dy: f64| DbuPoint::new(o.x + um(dx), o.y + um(dy));
    Mos {
        source: terminal(c, &format!("{name}_SOURCE"), at(-2.0, 0.0), Orientation::West),
        drain: terminal(c, &format!("{name}_DRAIN"), at(2.0, 0.0), Orientation::East),
        gate: terminal(c, &format!("{name}_GATE"), at(0.0, 2.0), Orientation::North),
        body: terminal(c, &format!("{name}_BODY"), at(0.0, -2.0), Orientation::South),
    }
}
