use crate::algo::astar::{AStar, RoutingWindow, SearchError, SearchRequest, SearchShape};
use crate::algo::simplify;
use crate::grid::DenseGrid;
use sky130_common::db::port::{Dir, Port};
use sky130_common::geom::point::DbuPoint;
use sky130_common::geom::rect::BBox;
use sky130_common::util::cancel::CancelToken;

/// Coarse pass: one A* run on the global grid.
///
/// The search window is the endpoint box grown by half the endpoint distance,
/// joined with `layout_area`. Returns the corner list in DBU, collinear cells
/// removed; its ends are grid points, not the port centres.
pub fn run(
    grid: &DenseGrid,
    solver: &mut AStar,
    source: &Port,
    sink: &Port,
    layout_area: BBox,
    shape: SearchShape,
    cancel: Option<&CancelToken>,
) -> Result<Vec<DbuPoint>, SearchError> {
    let converter = grid.converter();
    let ends = BBox::from_corners(source.center, sink.center);
    let dist = ends.width().max(ends.height());
    let area = ends.inflate(dist / 2).union(&layout_area);
    let window = RoutingWindow::covering(converter, area);

    let start = converter.to_grid(source.center);
    let goal = converter.to_grid(sink.center);
    let request = SearchRequest::new(start, goal, window, shape, cancel).with_directions(
        source.orientation.dir(),
        sink.orientation.dir().map(Dir::opposite),
    );
    let cells = solver.find_path_or_omni(grid, &request)?;
    log::debug!(
        "[GLOBAL] {} -> {}: {} cells in a {:?} window",
        source.name,
        sink.name,
        cells.len(),
        window.size()
    );

    let world: Vec<DbuPoint> = cells.iter().map(|&c| converter.to_world(c)).collect();
    Ok(simplify::remove_collinear(&world))
}
