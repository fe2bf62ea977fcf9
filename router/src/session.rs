use crate::algo::astar::{AStar, SearchError, SearchShape};
use crate::algo::simplify;
use crate::detailed_router::{self, Refinement};
use crate::global_router;
use crate::grid::DenseGrid;
use crate::obstacles::{self, ObstacleSet};
use crate::realize;
use crate::utils::conversion::{GridConverter, ceil_div, floor_div};
use crate::via_escape::{self, EscapeContext};
use sky130_common::db::core::{GeometrySink, Obstruction, PolygonSource};
use sky130_common::db::indices::GroupId;
use sky130_common::db::layer::{LayerId, PdkConfig};
use sky130_common::db::port::{Dir, Port};
use sky130_common::db::route::{LayerScheme, RouteRect, RouteResult, ViaRole};
use sky130_common::db::via::ViaCell;
use sky130_common::error::{Phase, Result, RouteError};
use sky130_common::geom::point::DbuPoint;
use sky130_common::geom::rect::BBox;
use sky130_common::geom::units::Units;
use sky130_common::util::cancel::CancelToken;
use sky130_common::util::check::RouteRules;
use sky130_common::util::config::RouterConfig;
use sky130_common::util::profiler::ScopedTimer;
use std::collections::HashMap;

/// Window half-size around a port whose own layer is an obstruction layer, µm.
const SAME_LAYER_EXCLUSION_UM: f64 = 5.0;
const MIN_WINDOW_CELLS: u32 = 3;

/// One source/sink pair to connect.
#[derive(Clone, Debug, PartialEq)]
pub struct Net {
    pub name: String,
    pub source: Port,
    pub sink: Port,
    /// Segment port prefix; the configured one when `None`.
    pub prefix: Option<String>,
}

impl Net {
    pub fn new(name: impl Into<String>, source: Port, sink: Port) -> Self {
        Self {
            name: name.into(),
            source,
            sink,
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// Outcome of a multi-net run that was allowed to finish.
#[derive(Debug, Default)]
pub struct MultiNetReport {
    pub routes: Vec<RouteResult>,
    /// Nets skipped with `require_all = false`, in routing order.
    pub failed: Vec<(String, RouteError)>,
}

/// Configuration lengths in DBU.
#[derive(Clone, Copy, Debug)]
struct Dimensions {
    width: i64,
    clearance: i64,
    /// Inflation that keeps a wire or via pad off an obstruction.
    core: i64,
    margin: i64,
    min_segment: i64,
    min_length: i64,
    same_layer_exclusion: i64,
}

type EndpointKey = (DbuPoint, LayerId);

/// Union-find over net endpoints: nets sharing an endpoint are one group.
#[derive(Clone, Debug, Default)]
struct Groups {
    parent: Vec<u32>,
    by_endpoint: HashMap<EndpointKey, u32>,
}

impl Groups {
    fn find(&self, mut g: u32) -> u32 {
        while self.parent[g as usize] != g {
            g = self.parent[g as usize];
        }
        g
    }

    fn lookup(&self, key: &EndpointKey) -> Option<u32> {
        self.by_endpoint.get(key).map(|&g| self.find(g))
    }

    /// Group of a net, plus the group absorbed into it if the net joined two.
    fn join(&mut self, a: EndpointKey, b: EndpointKey) -> (GroupId, Option<GroupId>) {
        let (group, absorbed) = match (self.lookup(&a), self.lookup(&b)) {
            (Some(ga), Some(gb)) if ga != gb => {
                let (root, absorbed) = (ga.min(gb), ga.max(gb));
                self.parent[absorbed as usize] = root;
                (root, Some(GroupId(absorbed)))
            }
            (Some(g), _) | (_, Some(g)) => (g, None),
            (None, None) => {
                let g = self.parent.len() as u32;
                self.parent.push(g);
                (g, None)
            }
        };
        self.by_endpoint.entry(a).or_insert(group);
        self.by_endpoint.entry(b).or_insert(group);
        (GroupId(group), absorbed)
    }
}

struct Snapshot {
    global: Vec<u32>,
    detail: Vec<u32>,
    committed: Vec<(GroupId, RouteRect)>,
    groups: Groups,
}

/// A routing session over one component.
///
/// Obstructions are extracted and both grids are built once, in `new`; after
/// that only reservations change. The component must not be edited behind the
/// session's back between nets.
pub struct Session {
    config: RouterConfig,
    pdk: PdkConfig,
    cancel: Option<CancelToken>,
    dims: Dimensions,
    avoid: Vec<LayerId>,
    obstacles: ObstacleSet,
    /// Component bbox grown by half the padding; joined into every global window.
    layout_area: BBox,
    global: DenseGrid,
    detail: DenseGrid,
    global_shape: SearchShape,
    detail_shape: SearchShape,
    via: ViaCell,
    solver: AStar,
    groups: Groups,
    /// Metal of every committed route, tagged with its group.
    committed: Vec<(GroupId, RouteRect)>,
}

impl Session {
    pub fn new<S: PolygonSource>(
        source: &S,
        config: RouterConfig,
        pdk: PdkConfig,
        cancel: Option<CancelToken>,
    ) -> Result<Self> {
        let _timer = ScopedTimer::new("session build");
        config.validate()?;
        if !config.deterministic {
            log::warn!("deterministic = false is ignored: routing is always deterministic");
        }

        let units = Units::new(source.dbu());
        let pdk = PdkConfig { units, ..pdk };
        let bbox = source.bbox().ok_or_else(|| {
            RouteError::InvalidConfig("component has no geometry to route over".to_string())
        })?;

        let width = units.to_dbu(config.width);
        let global_step = units.to_dbu(config.global_grid_unit);
        let detail_step = units.to_dbu(config.detail_grid_unit);
        if width <= 0 || detail_step <= 0 || global_step <= 0 {
            return Err(RouteError::InvalidConfig(
                "width and grid units must be at least one database unit".to_string(),
            ));
        }
        let dims = Dimensions {
            width,
            clearance: units.to_dbu(config.clearance),
            core: width / 2 + units.to_dbu(pdk.via_enclosure),
            margin: units.to_dbu(config.detail_margin),
            min_segment: units.to_dbu(config.min_segment()),
            min_length: units.to_dbu(config.min_segment_length_um),
            same_layer_exclusion: units.to_dbu(SAME_LAYER_EXCLUSION_UM),
        };

        let avoid = config.avoid_layers();
        let obstacles = ObstacleSet::new(obstacles::extract(source, &avoid, &[]));

        let padding = units.to_dbu(config.bbox_padding_um);
        let area = bbox.inflate(padding);
        let origin = DbuPoint::new(
            floor_div(area.west, global_step) * global_step,
            floor_div(area.south, global_step) * global_step,
        );
        let global = build_grid(origin, global_step, area, &obstacles, dims);
        let detail = build_grid(origin, detail_step, area, &obstacles, dims);

        log::info!(
            "Routing session: {} obstructions on {} layers, global grid {}x{} ({} blocked), detail grid {}x{} ({} blocked)",
            obstacles.len(),
            avoid.len(),
            global.converter().width(),
            global.converter().height(),
            global.blocked_count(),
            detail.converter().width(),
            detail.converter().height(),
            detail.blocked_count()
        );

        let global_shape = SearchShape::for_wire(
            width,
            global_step,
            config.bend_radius_cells,
            config.max_expansions,
        );
        let detail_shape = SearchShape::for_wire(
            width,
            detail_step,
            config.bend_radius_cells,
            config.max_expansions,
        );
        let via = ViaCell::m1m2(width, width, &pdk);

        Ok(Self {
            layout_area: bbox.inflate(padding / 2),
            config,
            pdk,
            cancel,
            dims,
            avoid,
            obstacles,
            global,
            detail,
            global_shape,
            detail_shape,
            via,
            solver: AStar::new(),
            groups: Groups::default(),
            committed: Vec::new(),
        })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn pdk(&self) -> &PdkConfig {
        &self.pdk
    }

    /// What a route of `net` is verified against: the realiser skip threshold,
    /// the clearance, and the endpoint windows as opened on either grid.
    pub fn rules_for(&self, net: &Net) -> RouteRules {
        let reach = self.dims.width / 2 + self.dims.clearance;
        let mut windows = Vec::with_capacity(4);
        for port in [&net.source, &net.sink] {
            let exclusion = self.window_exclusion(port);
            for grid in [&self.global, &self.detail] {
                let c = grid.converter();
                let half = window_cells(exclusion, c.step()) as i64 * c.step();
                let center = c.to_world(c.to_grid(port.center));
                windows.push(BBox::from_center(center, 2 * half, 2 * half).inflate(reach));
            }
        }
        RouteRules {
            min_segment_length: self.dims.min_length,
            clearance: self.dims.clearance,
            windows,
        }
    }

    /// The obstructions `net` has to avoid: everything extracted minus the
    /// polygons exempted at its endpoints.
    pub fn obstructions_for(&self, net: &Net) -> Vec<Obstruction> {
        let exempt = self.exempt_for(net);
        self.obstacles.without(&exempt)
    }

    fn exempt_for(&self, net: &Net) -> Vec<usize> {
        obstacles::find_exempt(
            self.obstacles.items(),
            &[net.source.center, net.sink.center],
        )
    }

    fn to_um(&self, p: DbuPoint) -> (f64, f64) {
        (self.pdk.units.to_um(p.x), self.pdk.units.to_um(p.y))
    }

    fn check_port(&self, port: &Port) -> Result<()> {
        let inside = self.global.converter().to_grid_checked(port.center).is_some()
            && self.detail.converter().to_grid_checked(port.center).is_some();
        if inside {
            return Ok(());
        }
        let (x, y) = self.to_um(port.center);
        Err(RouteError::InvalidPort {
            name: port.name.clone(),
            x,
            y,
        })
    }

    fn join_groups(&mut self, net: &Net) -> GroupId {
        let (group, absorbed) = self.groups.join(
            (net.source.center, net.source.layer),
            (net.sink.center, net.sink.layer),
        );
        if let Some(from) = absorbed {
            log::debug!("net '{}' joins {:?} into {:?}", net.name, from, group);
            self.global.relabel_group(from, group);
            self.detail.relabel_group(from, group);
            for (g, _) in self.committed.iter_mut().filter(|(g, _)| *g == from) {
                *g = group;
            }
        }
        group
    }

    /// Half-size of the window opened around `port`, in DBU before snapping.
    fn window_exclusion(&self, port: &Port) -> i64 {
        if self.avoid.contains(&port.layer) {
            self.dims.same_layer_exclusion
        } else {
            self.dims.width + self.dims.clearance
        }
    }

    /// Applies this net's exemptions and endpoint windows to both grids.
    /// Undone by `close_endpoints`.
    fn open_endpoints(&mut self, exempt: &[usize], net: &Net, group: GroupId) {
        let windows = [&net.source, &net.sink].map(|p| (p.center, self.window_exclusion(p)));
        let items = self.obstacles.items();
        for grid in [&mut self.global, &mut self.detail] {
            grid.begin_edits();
            for &i in exempt {
                grid.remove_obstruction(&items[i].bbox, self.dims.clearance, self.dims.core);
            }
            let step = grid.converter().step();
            for &(center, exclusion) in &windows {
                let cell = grid.converter().to_grid(center);
                grid.open_window(cell, window_cells(exclusion, step));
            }
            grid.set_owner(Some(group));
        }
    }

    fn close_endpoints(&mut self) {
        self.global.rollback_edits();
        self.detail.rollback_edits();
    }

    /// True if the realised `corners` would break `rules` against a non-exempt
    /// obstruction on its own layer, or touch metal of another group.
    fn collides(
        &self,
        corners: &[DbuPoint],
        scheme: LayerScheme,
        net: &Net,
        exempt: &[usize],
        group: GroupId,
        rules: &RouteRules,
    ) -> bool {
        let plan = realize::plan(
            corners,
            scheme,
            &net.source,
            &net.sink,
            self.dims.width,
            self.dims.min_length,
            &self.via,
        );
        let foreign = |layer: LayerId, bbox: &BBox| {
            self.committed
                .iter()
                .any(|(g, r)| *g != group && r.layer == layer && r.bbox.intersects(bbox))
        };
        let items = self.obstacles.items();
        let blocked = |metal: &BBox, layers: &[LayerId]| {
            self.obstacles
                .hits(metal.inflate(rules.clearance), Some(layers), exempt)
                .into_iter()
                .any(|i| rules.violates(metal, &items[i].bbox))
        };
        let wires_hit = plan
            .rects
            .iter()
            .any(|r| blocked(&r.bbox, &[r.layer]) || foreign(r.layer, &r.bbox));
        let via_layers = [scheme.horizontal, scheme.vertical];
        let vias_hit = plan
            .vias
            .iter()
            .filter(|v| v.role == ViaRole::Corner)
            .any(|v| {
                blocked(&v.pad, &via_layers) || via_layers.iter().any(|&l| foreign(l, &v.pad))
            });
        wires_hit || vias_hit
    }

    /// Pathfinder routes first (refined, then coarse), via escape last.
    ///
    /// Expects the endpoints opened on both grids.
    fn find_corners(
        &mut self,
        net: &Net,
        exempt: &[usize],
        group: GroupId,
    ) -> Result<(Vec<DbuPoint>, LayerScheme)> {
        let (s, t) = (net.source.center, net.sink.center);
        let rules = self.rules_for(net);
        let cancel = self.cancel.as_ref();

        match global_router::run(
            &self.global,
            &mut self.solver,
            &net.source,
            &net.sink,
            self.layout_area,
            self.global_shape,
            cancel,
        ) {
            Err(SearchError::Cancelled) => return Err(RouteError::Cancelled),
            Err(SearchError::NoPath) => {
                log::warn!(
                    "{} net '{}': no path between {:?} and {:?} um",
                    Phase::Global,
                    net.name,
                    self.to_um(s),
                    self.to_um(t)
                );
            }
            Ok(coarse) => {
                let refine = self.detail.converter().step() < self.global.converter().step()
                    && !self.obstacles.is_empty();
                let mut attempts = Vec::with_capacity(2);
                if refine {
                    let mut waypoints = vec![s];
                    if coarse.len() > 2 {
                        waypoints.extend_from_slice(&coarse[1..coarse.len() - 1]);
                    }
                    waypoints.push(t);
                    let job = Refinement {
                        net: &net.name,
                        waypoints: &waypoints,
                        source_dir: net.source.orientation.dir(),
                        sink_dir: net.sink.orientation.dir().map(Dir::opposite),
                        margin: self.dims.margin,
                        shape: self.detail_shape,
                        cancel,
                    };
                    match detailed_router::run(&self.detail, &mut self.solver, &job) {
                        Ok(refined) => attempts.push((Phase::Detail, refined)),
                        Err(_) => return Err(RouteError::Cancelled),
                    }
                }
                attempts.push((Phase::Global, coarse));

                let standard = LayerScheme::standard(self.pdk.m1, self.pdk.m2);
                for (phase, raw) in attempts {
                    let corners = simplify::finalize(
                        &raw,
                        s,
                        t,
                        net.source.orientation,
                        self.dims.min_segment,
                    )?;
                    if !self.collides(&corners, standard, net, exempt, group, &rules) {
                        return Ok((corners, standard));
                    }
                    log::debug!("{} net '{}': cleaned-up path collides", phase, net.name);
                }
                log::warn!(
                    "{} net '{}': every pathfinder route collides after clean-up",
                    Phase::Detail,
                    net.name
                );
            }
        }

        let ctx = EscapeContext {
            obstacles: &self.obstacles,
            exempt,
            grid: &self.detail,
            layer: self.pdk.m2,
            width: self.dims.width,
            clearance: self.dims.clearance,
            margin: self.dims.margin,
            min_segment: self.dims.min_segment,
        };
        let escape_scheme = LayerScheme::upper_only(self.pdk.m2);
        let escaped = via_escape::plan(&ctx, s, t)
            .filter(|c| !self.collides(c, escape_scheme, net, exempt, group, &rules));
        match escaped {
            Some(corners) => {
                log::info!(
                    "{} net '{}': {} corners on {}",
                    Phase::ViaEscape,
                    net.name,
                    corners.len(),
                    self.pdk.m2
                );
                Ok((corners, escape_scheme))
            }
            None => {
                log::warn!(
                    "{} net '{}': no clear candidate between {:?} and {:?} um",
                    Phase::ViaEscape,
                    net.name,
                    self.to_um(s),
                    self.to_um(t)
                );
                Err(RouteError::NoRoute {
                    net: net.name.clone(),
                    phase: Phase::ViaEscape,
                    source_um: self.to_um(s),
                    sink_um: self.to_um(t),
                })
            }
        }
    }

    /// Routes one net and draws it into `component`.
    ///
    /// Nothing is written unless the route succeeds. Its metal is then reserved
    /// on both grids for nets of other groups.
    pub fn route_net<C: PolygonSource + GeometrySink>(
        &mut self,
        component: &mut C,
        net: &Net,
    ) -> Result<RouteResult> {
        let _timer = ScopedTimer::new(format!("net '{}'", net.name));
        self.check_port(&net.source)?;
        self.check_port(&net.sink)?;
        let group = self.join_groups(net);
        let exempt = self.exempt_for(net);

        let (corners, scheme) = if net.source.center == net.sink.center {
            (vec![net.source.center], LayerScheme::standard(self.pdk.m1, self.pdk.m2))
        } else {
            self.open_endpoints(&exempt, net, group);
            let found = self.find_corners(net, &exempt, group);
            self.close_endpoints();
            found?
        };

        let plan = realize::plan(
            &corners,
            scheme,
            &net.source,
            &net.sink,
            self.dims.width,
            self.dims.min_length,
            &self.via,
        );
        let prefix = if self.config.add_segment_ports {
            Some(net.prefix.as_deref().unwrap_or(&self.config.port_name_prefix))
        } else {
            None
        };
        let emitted = realize::emit(component, &plan, &self.via, self.dims.width, prefix);

        let reach = self.dims.width + self.dims.clearance;
        let global_buffer = ceil_div(reach, self.global.converter().step()) as u32;
        let detail_buffer = ceil_div(reach, self.detail.converter().step()) as u32;
        for rect in &plan.rects {
            self.global
                .reserve_wire(&rect.bbox, rect.horizontal, global_buffer, group);
            self.detail
                .reserve_wire(&rect.bbox, rect.horizontal, detail_buffer, group);
            self.committed.push((group, *rect));
        }

        let length_um = realize::length_um(&corners, &self.pdk.units);
        log::info!(
            "net '{}': {} corners, {} rects, {} vias, {:.3} um",
            net.name,
            corners.len(),
            plan.rects.len(),
            plan.vias.len(),
            length_um
        );

        Ok(RouteResult {
            net: net.name.clone(),
            corners,
            references: emitted.references,
            length_um,
            ports: emitted.ports,
            rects: plan.rects,
            vias: plan.vias,
            scheme,
            source: net.source.clone(),
            sink: net.sink.clone(),
        })
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            global: self.global.reservations(),
            detail: self.detail.reservations(),
            committed: self.committed.clone(),
            groups: self.groups.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.global.restore_reservations(snapshot.global);
        self.detail.restore_reservations(snapshot.detail);
        self.committed = snapshot.committed;
        self.groups = snapshot.groups;
    }

    /// Routes `nets` strictly in order on a copy of `component`.
    ///
    /// With `require_all`, the first failing net discards the copy and every
    /// reservation made by this call. Without it, failing nets are listed in
    /// the report and the rest are committed. A path invariant violation always
    /// rolls back; cancellation keeps the nets finished before it.
    pub fn route_nets<C: PolygonSource + GeometrySink + Clone>(
        &mut self,
        component: &mut C,
        nets: &[Net],
    ) -> Result<MultiNetReport> {
        let _timer = ScopedTimer::new(format!("{} nets", nets.len()));
        let snapshot = self.snapshot();
        for net in nets {
            self.join_groups(net);
        }

        let mut working = component.clone();
        let mut report = MultiNetReport::default();
        for net in nets {
            match self.route_net(&mut working, net) {
                Ok(route) => report.routes.push(route),
                Err(RouteError::Cancelled) => {
                    log::warn!(
                        "Cancelled at net '{}'; keeping {} routed nets",
                        net.name,
                        report.routes.len()
                    );
                    *component = working;
                    return Err(RouteError::Cancelled);
                }
                Err(err @ RouteError::PathInvariantViolated(_)) => {
                    log::error!("net '{}': {}", net.name, err);
                    self.restore(snapshot);
                    return Err(err);
                }
                Err(err) if self.config.require_all => {
                    log::error!("net '{}' failed, rolling back: {}", net.name, err);
                    self.restore(snapshot);
                    return Err(RouteError::NetFailed {
                        net: net.name.clone(),
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    log::warn!("net '{}' skipped: {}", net.name, err);
                    report.failed.push((net.name.clone(), err));
                }
            }
        }

        *component = working;
        log::info!("Routed {}/{} nets", report.routes.len(), nets.len());
        Ok(report)
    }
}

fn build_grid(
    origin: DbuPoint,
    step: i64,
    area: BBox,
    obstacles: &ObstacleSet,
    dims: Dimensions,
) -> DenseGrid {
    let w = ceil_div(area.east - origin.x, step) + 1;
    let h = ceil_div(area.north - origin.y, step) + 1;
    let mut grid = DenseGrid::new(GridConverter::new(origin, step, w as u32, h as u32));
    for o in obstacles.items() {
        grid.add_obstruction(&o.bbox, dims.clearance, dims.core);
    }
    grid
}

/// Window radius in cells for an exclusion distance on a grid of pitch `step`.
fn window_cells(exclusion: i64, step: i64) -> u32 {
    (ceil_div(exclusion, step).max(0) as u32).max(MIN_WINDOW_CELLS)
}
