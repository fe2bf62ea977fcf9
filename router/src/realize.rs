//! Turns a corner list into wire rectangles, vias and optional segment ports.

use sky130_common::db::core::GeometrySink;
use sky130_common::db::indices::RefId;
use sky130_common::db::port::{Orientation, Port};
use sky130_common::db::route::{LayerScheme, RouteRect, RouteVia, ViaRole};
use sky130_common::db::via::ViaCell;
use sky130_common::geom::point::DbuPoint;
use sky130_common::geom::rect::BBox;
use sky130_common::geom::units::Units;

/// Geometry of a route before anything is written.
#[derive(Clone, Debug, PartialEq)]
pub struct WirePlan {
    pub rects: Vec<RouteRect>,
    pub vias: Vec<RouteVia>,
}

/// Rectangle of `width` centred on the segment `a`-`b`, ends flush with the points.
pub fn segment_rect(a: DbuPoint, b: DbuPoint, width: i64) -> (BBox, bool) {
    let lo = width / 2;
    let hi = width - lo;
    if a.y == b.y {
        (BBox::new(a.y + hi, a.x.max(b.x), a.y - lo, a.x.min(b.x)), true)
    } else {
        (BBox::new(a.y.max(b.y), a.x + hi, a.y.min(b.y), a.x - lo), false)
    }
}

/// Lays out the wires and vias for `corners` under `scheme`.
///
/// Segments shorter than `min_length` draw nothing. Corner vias go on every
/// interior point when the scheme asks for them; a cap via goes on an end
/// whose port layer differs from its segment's layer.
pub fn plan(
    corners: &[DbuPoint],
    scheme: LayerScheme,
    source: &Port,
    sink: &Port,
    width: i64,
    min_length: i64,
    via: &ViaCell,
) -> WirePlan {
    let mut rects = Vec::with_capacity(corners.len());
    for pair in corners.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let (dx, dy) = ((b.x - a.x).abs(), (b.y - a.y).abs());
        if dx < min_length && dy < min_length {
            continue;
        }
        let (bbox, horizontal) = segment_rect(a, b, width);
        rects.push(RouteRect {
            layer: scheme.layer_for(horizontal),
            bbox,
            horizontal,
        });
    }

    let mut vias = Vec::new();
    let n = corners.len();
    if n >= 2 {
        let first = scheme.layer_for(corners[0].y == corners[1].y);
        if source.layer != first {
            vias.push(place(via, corners[0], ViaRole::SourceCap));
        }
        if scheme.corner_vias {
            for &c in &corners[1..n - 1] {
                vias.push(place(via, c, ViaRole::Corner));
            }
        }
        let last = scheme.layer_for(corners[n - 2].y == corners[n - 1].y);
        if sink.layer != last {
            vias.push(place(via, corners[n - 1], ViaRole::SinkCap));
        }
    }

    WirePlan { rects, vias }
}

fn place(via: &ViaCell, center: DbuPoint, role: ViaRole) -> RouteVia {
    RouteVia {
        center,
        role,
        pad: via.extent_at(center),
    }
}

/// What `emit` wrote to the layout.
#[derive(Debug, Default)]
pub struct Emitted {
    pub references: Vec<RefId>,
    pub ports: Vec<Port>,
}

/// Writes `plan` to `sink`. With a `port_prefix`, every rectangle also gets a
/// port named `{prefix}_{k}` at its centre.
pub fn emit<S: GeometrySink>(
    sink: &mut S,
    plan: &WirePlan,
    via: &ViaCell,
    width: i64,
    port_prefix: Option<&str>,
) -> Emitted {
    let mut out = Emitted::default();
    for rect in &plan.rects {
        out.references.push(sink.add_rectangle(rect.layer, rect.bbox));
    }
    for v in &plan.vias {
        out.references.push(sink.add_instance(via.clone(), v.center));
    }
    if let Some(prefix) = port_prefix {
        for (k, rect) in plan.rects.iter().enumerate() {
            let name = format!("{}_{}", prefix, k);
            let orientation = if rect.horizontal {
                Orientation::East
            } else {
                Orientation::North
            };
            let center = rect.bbox.center();
            out.references
                .push(sink.add_port(&name, center, width, orientation, rect.layer));
            out.ports
                .push(Port::new(name, center, width, orientation, rect.layer));
        }
    }
    out
}

/// Length of the corner list in µm.
pub fn length_um(corners: &[DbuPoint], units: &Units) -> f64 {
    let dbu: i64 = corners.windows(2).map(|w| w[0].manhattan(&w[1])).sum();
    units.to_um(dbu)
}
