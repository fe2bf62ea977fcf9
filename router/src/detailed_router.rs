use crate::algo::astar::{AStar, RoutingWindow, SearchError, SearchRequest, SearchShape};
use crate::grid::DenseGrid;
use sky130_common::db::port::Dir;
use sky130_common::geom::point::DbuPoint;
use sky130_common::geom::rect::BBox;
use sky130_common::util::cancel::CancelToken;

/// Inputs of the refinement pass for one net.
pub struct Refinement<'a> {
    pub net: &'a str,
    /// Coarse corners with the first and last replaced by the port centres.
    pub waypoints: &'a [DbuPoint],
    /// Outward facing of the source, if not omni.
    pub source_dir: Option<Dir>,
    /// Direction of travel into the sink, if not omni.
    pub sink_dir: Option<Dir>,
    pub margin: i64,
    pub shape: SearchShape,
    pub cancel: Option<&'a CancelToken>,
}

/// Fine pass: re-routes every waypoint pair on the detail grid inside the
/// pair's box grown by `margin`.
///
/// Refined segments contribute detail grid points; a segment the fine grid
/// cannot route keeps its waypoints instead. Only cancellation aborts the pass.
pub fn run(
    grid: &DenseGrid,
    solver: &mut AStar,
    job: &Refinement<'_>,
) -> Result<Vec<DbuPoint>, SearchError> {
    let converter = grid.converter();
    let points = job.waypoints;
    let mut refined: Vec<DbuPoint> = Vec::with_capacity(points.len() * 4);
    let last_segment = points.len().saturating_sub(2);

    for (k, pair) in points.windows(2).enumerate() {
        let (a, b) = (pair[0], pair[1]);
        let along = Dir::between(a, b);
        let start_dir = if k == 0 { job.source_dir } else { along };
        let goal_dir = if k == last_segment { job.sink_dir } else { along };

        let local = BBox::from_corners(a, b).inflate(job.margin);
        let window = RoutingWindow::covering(converter, local);
        let request = SearchRequest::new(
            converter.to_grid(a),
            converter.to_grid(b),
            window,
            job.shape,
            job.cancel,
        )
        .with_directions(start_dir, goal_dir);

        match solver.find_path_or_omni(grid, &request) {
            Ok(cells) => {
                for cell in cells {
                    let p = converter.to_world(cell);
                    if refined.last() != Some(&p) {
                        refined.push(p);
                    }
                }
            }
            Err(SearchError::Cancelled) => return Err(SearchError::Cancelled),
            Err(SearchError::NoPath) => {
                log::warn!(
                    "[DETAIL] net '{}': segment {} ({:?} -> {:?}) kept coarse",
                    job.net,
                    k,
                    a,
                    b
                );
                if refined.is_empty() {
                    refined.push(a);
                }
                if refined.last() != Some(&b) {
                    refined.push(b);
                }
            }
        }
    }
    Ok(refined)
}
