mod common;

use common::*;
use sky130_common::db::core::{Component, GeometrySink, PolygonSource};
use sky130_common::db::indices::{GroupId, RefId};
use sky130_common::db::layer::{LayerId, MET1, MET2, PdkConfig};
use sky130_common::db::port::Orientation;
use sky130_common::db::via::ViaCell;
use sky130_common::db::route::{RouteResult, ViaRole};
use sky130_common::error::{Phase, RouteError};
use sky130_common::geom::point::DbuPoint;
use sky130_common::geom::polygon::Polygon;
use sky130_common::geom::rect::BBox;
use sky130_common::util::cancel::CancelToken;
use sky130_common::util::check::{check_nets_disjoint, verify_route};
use sky130_common::util::config::RouterConfig;
use sky130_router::{Net, Session};

fn verify_all(session: &Session, nets: &[Net], routes: &[RouteResult]) {
    assert_eq!(nets.len(), routes.len());
    for (net, route) in nets.iter().zip(routes) {
        assert_eq!(route.net, net.name);
        if let Err(msg) = verify_route(
            route,
            &session.obstructions_for(net),
            &session.rules_for(net),
        ) {
            panic!("{msg}");
        }
    }
}

fn disjoint(groups: &[u32], routes: &[RouteResult]) {
    let tagged: Vec<(GroupId, &RouteResult)> = groups
        .iter()
        .zip(routes)
        .map(|(&g, r)| (GroupId(g), r))
        .collect();
    if let Err(msg) = check_nets_disjoint(&tagged) {
        panic!("{msg}");
    }
}

fn snapshot(c: &Component) -> Vec<u8> {
    serde_json::to_vec(c).unwrap()
}

fn inverter() -> (Component, Vec<Net>) {
    let mut c = Component::new("inverter");
    let n = place_mos(&mut c, "MN", 0.0, 0.0);
    let p = place_mos(&mut c, "MP", 5.0, 5.0);
    let nets = vec![
        Net::new("out", p.drain.clone(), n.drain.clone()),
        Net::new("in", p.gate.clone(), n.gate.clone()),
        Net::new("vdd", p.source.clone(), p.body.clone()),
        Net::new("vss", n.source.clone(), n.body.clone()),
    ];
    (c, nets)
}

#[test]
fn inverter_pair_routes_all_four_nets() {
    init_logging();
    let (mut c, nets) = inverter();
    let mut session = Session::new(&c, config(), PdkConfig::sky130(), None).unwrap();
    let report = session.route_nets(&mut c, &nets).unwrap();

    assert!(report.failed.is_empty());
    verify_all(&session, &nets, &report.routes);
    disjoint(&[0, 1, 2, 3], &report.routes);
    for route in &report.routes {
        assert!(route.scheme.corner_vias, "{} fell back to {:?}", route.net, route.scheme);
        assert!(route.length_um > 0.0);
    }
    // Every rect and via of every route landed in the component.
    let drawn: usize = report.routes.iter().map(|r| r.references.len()).sum();
    let expected: usize = report
        .routes
        .iter()
        .map(|r| r.rects.len() + r.vias.len())
        .sum();
    assert_eq!(drawn, expected);
}

#[test]
fn current_mirror_quad_shares_groups() {
    init_logging();
    let mut c = Component::new("mirror");
    let a = place_mos(&mut c, "MA", 0.0, 0.0);
    let b = place_mos(&mut c, "MB", 14.0, 0.0);
    let m = place_mos(&mut c, "MC", 0.0, 14.0);
    let d = place_mos(&mut c, "MD", 14.0, 14.0);
    let nets = vec![
        Net::new("gates_low", a.gate.clone(), b.gate.clone()),
        Net::new("diode_low", a.drain.clone(), a.gate.clone()),
        Net::new("gates_high", m.gate.clone(), d.gate.clone()),
        Net::new("diode_high", m.drain.clone(), m.gate.clone()),
        Net::new("tie_a", a.source.clone(), a.body.clone()),
        Net::new("tie_b", b.source.clone(), b.body.clone()),
        Net::new("tie_c", m.source.clone(), m.body.clone()),
        Net::new("tie_d", d.source.clone(), d.body.clone()),
        Net::new("rail_low", a.source.clone(), b.source.clone()),
    ];

    let mut session = Session::new(&c, config(), PdkConfig::sky130(), None).unwrap();
    let report = session.route_nets(&mut c, &nets).unwrap();

    assert!(report.failed.is_empty());
    verify_all(&session, &nets, &report.routes);
    // Diode nets join their gate nets; the low rail joins both low ties.
    disjoint(&[0, 0, 1, 1, 2, 2, 3, 4, 2], &report.routes);
}

#[test]
fn slab_between_ports_forces_upper_layer_escape() {
    init_logging();
    let mut c = Component::new("slab");
    m1_rect(&mut c, BBox::new(um(11.0), um(20.0), um(9.0), 0));
    let source = terminal(&mut c, "A", pt(10.0, 2.0), Orientation::North);
    let sink = terminal(&mut c, "B", pt(10.0, 18.0), Orientation::South);
    let config = RouterConfig {
        bbox_padding_um: 0.0,
        ..config()
    };

    let mut session = Session::new(&c, config, PdkConfig::sky130(), None).unwrap();
    let net = Net::new("cross", source, sink);
    let route = session.route_net(&mut c, &net).unwrap();

    assert!(!route.scheme.corner_vias);
    assert_eq!(route.corners, vec![pt(10.0, 2.0), pt(10.0, 18.0)]);
    assert_eq!(route.rects.iter().filter(|r| r.layer == MET1).count(), 0);
    assert!(route.rects.iter().all(|r| r.layer == MET2));
    assert_eq!(route.corner_via_count(), 0);
    let caps: Vec<ViaRole> = route.vias.iter().map(|v| v.role).collect();
    assert_eq!(caps, vec![ViaRole::SourceCap, ViaRole::SinkCap]);
    verify_all(&session, &[net], &[route]);
}

/// Source pad at the origin, another pair of pads up at y = 6, and a sink at
/// (10, 0) sealed by a square ring drawn on both metals.
fn ringed() -> (Component, Net, Net) {
    let mut c = Component::new("ring");
    let source = terminal(&mut c, "S", pt(0.0, 0.0), Orientation::East);
    let left = terminal(&mut c, "L", pt(-4.0, 6.0), Orientation::East);
    let right = terminal(&mut c, "R", pt(4.0, 6.0), Orientation::West);
    let strips = [
        BBox::new(um(2.0), um(12.0), um(1.5), um(8.0)),
        BBox::new(um(-1.5), um(12.0), um(-2.0), um(8.0)),
        BBox::new(um(2.0), um(8.5), um(-2.0), um(8.0)),
        BBox::new(um(2.0), um(12.0), um(-2.0), um(11.5)),
    ];
    for layer in [MET1, MET2] {
        for s in strips {
            c.add_polygon(layer, Polygon::from_bbox(s));
        }
    }
    let sink = terminal(&mut c, "T", pt(10.0, 0.0), Orientation::West);
    (
        c,
        Net::new("sealed", source, sink),
        Net::new("open", left, right),
    )
}

#[test]
fn sealed_sink_fails_without_touching_the_component() {
    init_logging();
    let (mut c, sealed, _) = ringed();
    let before = snapshot(&c);

    let err = sky130_router::route(&mut c, &sealed.source, &sealed.sink, &config()).unwrap_err();
    match err {
        RouteError::NoRoute { net, phase, .. } => {
            assert_eq!(net, "S-T");
            assert_eq!(phase, Phase::ViaEscape);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(snapshot(&c), before);
}

#[test]
fn failed_net_rolls_back_the_batch() {
    init_logging();
    let (mut c, sealed, open) = ringed();
    let before = snapshot(&c);
    let nets = [open.clone(), sealed.clone()];

    let mut session = Session::new(&c, config(), PdkConfig::sky130(), None).unwrap();
    match session.route_nets(&mut c, &nets) {
        Err(RouteError::NetFailed { net, source }) => {
            assert_eq!(net, "sealed");
            assert!(matches!(*source, RouteError::NoRoute { .. }));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(snapshot(&c), before);

    // The rollback released the open net's reservations: it routes again.
    let route = session.route_net(&mut c, &open).unwrap();
    assert_eq!(route.corners, vec![pt(-4.0, 6.0), pt(4.0, 6.0)]);
}

#[test]
fn best_effort_batch_reports_failures() {
    init_logging();
    let (mut c, sealed, open) = ringed();
    let config = RouterConfig {
        require_all: false,
        ..config()
    };
    let nets = [sealed, open.clone()];

    let mut session = Session::new(&c, config, PdkConfig::sky130(), None).unwrap();
    let report = session.route_nets(&mut c, &nets).unwrap();

    assert_eq!(report.routes.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "sealed");
    verify_all(&session, &[open], &report.routes);
    // One straight M1 wire between same-layer ports, no vias.
    assert_eq!(report.routes[0].rects.len(), 1);
    assert!(report.routes[0].vias.is_empty());
}

#[test]
fn repeated_runs_are_byte_identical() {
    init_logging();
    let run = || {
        let (mut c, nets) = inverter();
        let mut session = Session::new(&c, config(), PdkConfig::sky130(), None).unwrap();
        let report = session.route_nets(&mut c, &nets).unwrap();
        (snapshot(&c), serde_json::to_vec(&report.routes).unwrap())
    };
    let (layout_a, routes_a) = run();
    let (layout_b, routes_b) = run();
    assert_eq!(layout_a, layout_b);
    assert_eq!(routes_a, routes_b);
}

#[test]
fn drain_to_drain_at_every_offset() {
    init_logging();
    let offsets = [
        (5.0, 0.0),
        (-5.0, 0.0),
        (0.0, 5.0),
        (0.0, -5.0),
        (5.0, 5.0),
        (-5.0, 5.0),
        (5.0, -5.0),
        (-5.0, -5.0),
    ];
    for (dx, dy) in offsets {
        let mut c = Component::new(format!("offset_{dx}_{dy}"));
        let n = place_mos(&mut c, "MN", 0.0, 0.0);
        let p = place_mos(&mut c, "MP", dx, dy);
        let net = Net::new("out", p.drain, n.drain);

        let mut session = Session::new(&c, config(), PdkConfig::sky130(), None).unwrap();
        let route = session
            .route_net(&mut c, &net)
            .unwrap_or_else(|e| panic!("offset ({dx}, {dy}): {e}"));
        verify_all(&session, &[net], &[route]);
    }
}

#[test]
fn segment_ports_follow_the_prefix() {
    init_logging();
    let (mut c, nets) = inverter();
    let config = RouterConfig {
        add_segment_ports: true,
        ..config()
    };
    let mut session = Session::new(&c, config, PdkConfig::sky130(), None).unwrap();
    let net = nets[0].clone().with_prefix("out_seg");
    let route = session.route_net(&mut c, &net).unwrap();

    assert_eq!(route.ports.len(), route.rects.len());
    for (k, port) in route.ports.iter().enumerate() {
        assert_eq!(port.name, format!("out_seg_{k}"));
        assert!(c.port(&port.name).is_some());
    }

    // Undo removes the wires, vias and the segment ports again.
    let before_undo = c.shapes().len();
    route.undo(&mut c);
    assert_eq!(c.shapes().len(), before_undo - route.rects.len());
    assert!(c.port("out_seg_0").is_none());
    assert!(c.port("MN_DRAIN").is_some());
}

#[test]
fn routes_can_be_added_around_a_finished_batch() {
    init_logging();
    let (mut c, nets) = inverter();
    let mut session = Session::new(&c, config(), PdkConfig::sky130(), None).unwrap();
    let report = session.route_nets(&mut c, &nets[..2]).unwrap();
    assert_eq!(report.routes.len(), 2);

    let mut routes = report.routes;
    for net in &nets[2..] {
        routes.push(session.route_net(&mut c, net).unwrap());
    }
    verify_all(&session, &nets, &routes);
    disjoint(&[0, 1, 2, 3], &routes);
}

/// Component wrapper that raises `token` as soon as anything is drawn into it.
#[derive(Clone)]
struct TrippingLayout {
    inner: Component,
    token: CancelToken,
}

impl PolygonSource for TrippingLayout {
    fn polygons(&self, layer: LayerId) -> impl Iterator<Item = &Polygon> {
        self.inner.polygons(layer)
    }

    fn bbox(&self) -> Option<BBox> {
        self.inner.bbox()
    }

    fn dbu(&self) -> f64 {
        self.inner.dbu()
    }
}

impl GeometrySink for TrippingLayout {
    fn add_rectangle(&mut self, layer: LayerId, bbox: BBox) -> RefId {
        self.token.cancel();
        self.inner.add_rectangle(layer, bbox)
    }

    fn add_instance(&mut self, cell: ViaCell, center: DbuPoint) -> RefId {
        self.token.cancel();
        self.inner.add_instance(cell, center)
    }

    fn add_port(
        &mut self,
        name: &str,
        center: DbuPoint,
        width: i64,
        orientation: Orientation,
        layer: LayerId,
    ) -> RefId {
        self.token.cancel();
        self.inner.add_port(name, center, width, orientation, layer)
    }
}

#[test]
fn cancel_between_nets_keeps_the_finished_net() {
    init_logging();
    let config = RouterConfig {
        add_segment_ports: true,
        ..config()
    };
    let (c, nets) = inverter();
    let nets = vec![
        nets[0].clone().with_prefix("out_seg"),
        nets[1].clone().with_prefix("in_seg"),
    ];

    // Net "out" alone, routed without any cancellation.
    let mut reference = c.clone();
    let mut session =
        Session::new(&reference, config.clone(), PdkConfig::sky130(), None).unwrap();
    let first = session.route_net(&mut reference, &nets[0]).unwrap();
    assert!(!first.ports.is_empty());

    let token = CancelToken::new();
    let mut layout = TrippingLayout {
        inner: c,
        token: token.clone(),
    };
    let mut session =
        Session::new(&layout, config, PdkConfig::sky130(), Some(token.clone())).unwrap();
    let err = session.route_nets(&mut layout, &nets).unwrap_err();

    assert!(matches!(err, RouteError::Cancelled), "{err}");
    assert!(token.is_cancelled());
    for port in &first.ports {
        assert!(layout.inner.port(&port.name).is_some(), "{} missing", port.name);
    }
    assert!(layout.inner.port("in_seg_0").is_none());
    assert_eq!(snapshot(&layout.inner), snapshot(&reference));
}
