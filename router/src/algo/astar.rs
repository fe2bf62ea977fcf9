use crate::grid::RoutingGrid;
use crate::utils::conversion::{GridConverter, ceil_div};
use priority_queue::PriorityQueue;
use sky130_common::db::port::Dir;
use sky130_common::geom::coord::GridCoord;
use sky130_common::geom::rect::BBox;
use sky130_common::util::cancel::CancelToken;
use std::cmp::Reverse;

/// Heading slot used by the start state, before any move was made.
const NO_HEADING: usize = 4;
const HEADINGS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchError {
    NoPath,
    Cancelled,
}

/// Rectangle of the grid a search may visit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoutingWindow {
    min_x: u32,
    max_x: u32,
    min_y: u32,
    max_y: u32,
    width: u32,
    height: u32,
}

impl RoutingWindow {
    /// Inclusive corners, clamped to a `grid_w` x `grid_h` grid.
    pub fn new(min: GridCoord, max: GridCoord, grid_w: u32, grid_h: u32) -> Self {
        let min_x = min.x.min(max.x).min(grid_w - 1);
        let max_x = max.x.max(min.x).min(grid_w - 1);
        let min_y = min.y.min(max.y).min(grid_h - 1);
        let max_y = max.y.max(min.y).min(grid_h - 1);
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        }
    }

    pub fn full<G: RoutingGrid + ?Sized>(grid: &G) -> Self {
        Self::new(
            GridCoord::new(0, 0),
            GridCoord::new(grid.width() - 1, grid.height() - 1),
            grid.width(),
            grid.height(),
        )
    }

    /// Cells covering `bbox`, clipped to the grid; the whole grid if `bbox`
    /// misses it on an axis.
    pub fn covering(converter: &GridConverter, bbox: BBox) -> Self {
        let (w, h) = (converter.width(), converter.height());
        let (x0, x1) = converter.x_cover(bbox.west, bbox.east).unwrap_or((0, w - 1));
        let (y0, y1) = converter.y_cover(bbox.south, bbox.north).unwrap_or((0, h - 1));
        Self::new(GridCoord::new(x0, y0), GridCoord::new(x1, y1), w, h)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn cells(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline(always)]
    pub fn contains(&self, c: GridCoord) -> bool {
        c.x >= self.min_x && c.x <= self.max_x && c.y >= self.min_y && c.y <= self.max_y
    }

    #[inline(always)]
    fn contains_signed(&self, x: i64, y: i64) -> bool {
        x >= self.min_x as i64
            && x <= self.max_x as i64
            && y >= self.min_y as i64
            && y <= self.max_y as i64
    }

    #[inline(always)]
    fn get_local_idx(&self, c: GridCoord) -> usize {
        let lx = c.x - self.min_x;
        let ly = c.y - self.min_y;
        (ly * self.width + lx) as usize
    }

    #[inline(always)]
    fn get_coord(&self, idx: usize) -> GridCoord {
        let idx = idx as u32;
        GridCoord::new(idx % self.width + self.min_x, idx / self.width + self.min_y)
    }
}

/// Wire-dependent move limits on a grid of pitch `step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchShape {
    pub straight_width: u32,
    pub bend_radius: u32,
    pub max_expansions: u32,
}

impl SearchShape {
    pub fn for_wire(width: i64, step: i64, bend_cells: u32, max_expansions: u32) -> Self {
        let cells = ceil_div(width, step).max(1) as u32;
        let straight_width = if cells % 2 == 0 { cells + 1 } else { cells };
        Self {
            straight_width,
            bend_radius: bend_cells.max(cells),
            max_expansions,
        }
    }
}

/// One point-to-point query.
#[derive(Clone, Copy, Debug)]
pub struct SearchRequest<'a> {
    pub start: GridCoord,
    pub goal: GridCoord,
    /// Required direction of the first move; `None` for an omni source.
    pub start_dir: Option<Dir>,
    /// Required direction of travel on the last move; `None` for an omni sink.
    pub goal_dir: Option<Dir>,
    pub window: RoutingWindow,
    /// Odd number of free cells needed across the direction of travel.
    pub straight_width: u32,
    /// Cells that must be travelled after a bend before the next one.
    pub bend_radius: u32,
    pub max_expansions: u32,
    pub cancel: Option<&'a CancelToken>,
}

impl<'a> SearchRequest<'a> {
    pub fn new(
        start: GridCoord,
        goal: GridCoord,
        window: RoutingWindow,
        shape: SearchShape,
        cancel: Option<&'a CancelToken>,
    ) -> Self {
        Self {
            start,
            goal,
            start_dir: None,
            goal_dir: None,
            window,
            straight_width: shape.straight_width,
            bend_radius: shape.bend_radius,
            max_expansions: shape.max_expansions,
            cancel,
        }
    }

    pub fn with_directions(mut self, start_dir: Option<Dir>, goal_dir: Option<Dir>) -> Self {
        self.start_dir = start_dir;
        self.goal_dir = goal_dir;
        self
    }

    fn omni(&self) -> Self {
        Self {
            start_dir: None,
            goal_dir: None,
            ..*self
        }
    }
}

/// Rectilinear A* over `(cell, heading, straight run)` states.
///
/// Path length is the cost; among equally long paths the one with fewer bends
/// wins, and remaining ties break on `(f, x, y)`.
pub struct AStar {
    parents: Vec<u32>,
    g_score: Vec<i64>,
    visited_tag: Vec<u32>,
    closed_tag: Vec<u32>,
    current_tag: u32,
    capacity: usize,
}

impl AStar {
    pub fn new() -> Self {
        let cap = 16_384;
        Self {
            parents: vec![u32::MAX; cap],
            g_score: vec![i64::MAX; cap],
            visited_tag: vec![0; cap],
            closed_tag: vec![0; cap],
            current_tag: 1,
            capacity: cap,
        }
    }

    fn ensure_capacity(&mut self, size: usize) {
        if size > self.capacity {
            self.capacity = size.max(self.capacity * 2);
            self.parents.resize(self.capacity, u32::MAX);
            self.g_score.resize(self.capacity, i64::MAX);
            self.visited_tag.resize(self.capacity, 0);
            self.closed_tag.resize(self.capacity, 0);
        }
    }

    fn reset_window(&mut self) {
        self.current_tag = self.current_tag.wrapping_add(1);
        if self.current_tag == 0 {
            self.visited_tag.fill(0);
            self.closed_tag.fill(0);
            self.current_tag = 1;
        }
    }

    /// Runs `req`; on `NoPath` retries once with both ends treated as omni.
    pub fn find_path_or_omni<G: RoutingGrid + ?Sized>(
        &mut self,
        grid: &G,
        req: &SearchRequest<'_>,
    ) -> Result<Vec<GridCoord>, SearchError> {
        match self.find_path(grid, req) {
            Err(SearchError::NoPath) if req.start_dir.is_some() || req.goal_dir.is_some() => {
                log::debug!(
                    "A* {:?} -> {:?} failed with port directions, retrying omni",
                    req.start,
                    req.goal
                );
                self.find_path(grid, &req.omni())
            }
            other => other,
        }
    }

    pub fn find_path<G: RoutingGrid + ?Sized>(
        &mut self,
        grid: &G,
        req: &SearchRequest<'_>,
    ) -> Result<Vec<GridCoord>, SearchError> {
        let window = req.window;
        if !window.contains(req.start) || !window.contains(req.goal) {
            return Err(SearchError::NoPath);
        }
        if req.start == req.goal {
            return Ok(vec![req.start]);
        }

        let bend = req.bend_radius.max(1) as usize;
        let runs = bend + 1;
        let slots = HEADINGS * runs;
        self.ensure_capacity(window.cells() * slots);
        self.reset_window();

        let encode = |cell: usize, heading: usize, run: usize| {
            ((cell * HEADINGS + heading) * runs + run) as u32
        };
        let decode = |state: u32| {
            let state = state as usize;
            let run = state % runs;
            let rest = state / runs;
            (rest / HEADINGS, rest % HEADINGS, run)
        };

        // Any bend count stays below one cell of length.
        let step_cost = window.cells() as i64 + 1;
        let half = (req.straight_width.max(1) / 2) as i64;
        let goal = req.goal;
        let heuristic = |c: GridCoord| c.manhattan(&goal) as i64 * step_cost;

        let mut open: PriorityQueue<u32, Reverse<(i64, u32, u32, u32)>> = PriorityQueue::new();
        let start_state = encode(window.get_local_idx(req.start), NO_HEADING, 0);
        let si = start_state as usize;
        self.g_score[si] = 0;
        self.visited_tag[si] = self.current_tag;
        self.parents[si] = u32::MAX;
        open.push(
            start_state,
            Reverse((heuristic(req.start), req.start.x, req.start.y, start_state)),
        );

        let mut expansions = 0u32;
        while let Some((state, _)) = open.pop() {
            if req.cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(SearchError::Cancelled);
            }
            let si = state as usize;
            if self.closed_tag[si] == self.current_tag {
                continue;
            }
            self.closed_tag[si] = self.current_tag;

            let (cell, heading, run) = decode(state);
            let position = window.get_coord(cell);
            if position == goal {
                return Ok(self.reconstruct_path(state, &window, &decode));
            }

            expansions += 1;
            if expansions > req.max_expansions {
                log::debug!("A* gave up after {} expansions", req.max_expansions);
                return Err(SearchError::NoPath);
            }

            let current_g = self.g_score[si];
            let current_dir = (heading != NO_HEADING).then(|| Dir::ALL[heading]);

            for d in Dir::ALL {
                match current_dir {
                    None => {
                        if req.start_dir.is_some_and(|sd| sd != d) {
                            continue;
                        }
                    }
                    Some(h) => {
                        if d == h.opposite() || (d != h && run < bend) {
                            continue;
                        }
                    }
                }

                let (dx, dy) = d.delta();
                let nx = position.x as i64 + dx;
                let ny = position.y as i64 + dy;
                if !window.contains_signed(nx, ny) {
                    continue;
                }
                let neighbor = GridCoord::new(nx as u32, ny as u32);

                if neighbor == goal {
                    if req.goal_dir.is_some_and(|gd| gd != d) || grid.is_reserved(neighbor) {
                        continue;
                    }
                } else if !stripe_is_free(grid, neighbor, d, half) {
                    continue;
                }

                let turned = current_dir.is_some_and(|h| h != d);
                let next_run = if current_dir == Some(d) {
                    (run + 1).min(bend)
                } else {
                    1
                };
                let next_state = encode(window.get_local_idx(neighbor), d.index(), next_run);
                let ni = next_state as usize;
                if self.closed_tag[ni] == self.current_tag {
                    continue;
                }

                let tentative_g = current_g + step_cost + i64::from(turned);
                if self.visited_tag[ni] != self.current_tag || tentative_g < self.g_score[ni] {
                    self.parents[ni] = state;
                    self.g_score[ni] = tentative_g;
                    self.visited_tag[ni] = self.current_tag;
                    let f = tentative_g + heuristic(neighbor);
                    open.push_increase(next_state, Reverse((f, neighbor.x, neighbor.y, next_state)));
                }
            }
        }
        Err(SearchError::NoPath)
    }

    fn reconstruct_path(
        &self,
        end_state: u32,
        window: &RoutingWindow,
        decode: &impl Fn(u32) -> (usize, usize, usize),
    ) -> Vec<GridCoord> {
        let mut path = Vec::new();
        let mut state = end_state;
        loop {
            let (cell, _, _) = decode(state);
            path.push(window.get_coord(cell));
            let parent = self.parents[state as usize];
            if parent == u32::MAX {
                break;
            }
            state = parent;
        }
        path.reverse();
        path
    }
}

impl Default for AStar {
    fn default() -> Self {
        Self::new()
    }
}

/// True if the `2 * half + 1` cells across direction `d`, centred on `c`, are free.
fn stripe_is_free<G: RoutingGrid + ?Sized>(grid: &G, c: GridCoord, d: Dir, half: i64) -> bool {
    (-half..=half).all(|k| {
        let (x, y) = if d.is_horizontal() {
            (c.x as i64, c.y as i64 + k)
        } else {
            (c.x as i64 + k, c.y as i64)
        };
        grid.in_bounds(x, y) && grid.is_free(GridCoord::new(x as u32, y as u32))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestGrid {
        w: u32,
        h: u32,
        blocked: Vec<GridCoord>,
    }

    impl RoutingGrid for TestGrid {
        fn width(&self) -> u32 {
            self.w
        }
        fn height(&self) -> u32 {
            self.h
        }
        fn is_blocked(&self, coord: GridCoord) -> bool {
            self.blocked.contains(&coord)
        }
        fn is_reserved(&self, _coord: GridCoord) -> bool {
            false
        }
    }

    fn open_grid(w: u32, h: u32) -> TestGrid {
        TestGrid {
            w,
            h,
            blocked: Vec::new(),
        }
    }

    fn request<'a>(grid: &TestGrid, start: GridCoord, goal: GridCoord) -> SearchRequest<'a> {
        SearchRequest {
            start,
            goal,
            start_dir: None,
            goal_dir: None,
            window: RoutingWindow::full(grid),
            straight_width: 1,
            bend_radius: 1,
            max_expansions: 100_000,
            cancel: None,
        }
    }

    fn bends(path: &[GridCoord]) -> usize {
        path.windows(3)
            .filter(|w| (w[0].x == w[1].x) != (w[1].x == w[2].x))
            .count()
    }

    fn assert_connected(path: &[GridCoord]) {
        for w in path.windows(2) {
            assert_eq!(w[0].manhattan(&w[1]), 1, "gap between {:?} and {:?}", w[0], w[1]);
        }
    }

    #[test]
    fn open_grid_path_is_shortest_with_one_bend() {
        let grid = open_grid(10, 10);
        let mut solver = AStar::new();
        let path = solver
            .find_path(&grid, &request(&grid, GridCoord::new(1, 1), GridCoord::new(6, 4)))
            .unwrap();
        assert_eq!(path.len(), 9);
        assert_eq!(bends(&path), 1);
        assert_connected(&path);
    }

    #[test]
    fn routes_around_a_wall() {
        let mut grid = open_grid(10, 10);
        grid.blocked = (0..9).map(|y| GridCoord::new(5, y)).collect();
        let mut solver = AStar::new();
        let path = solver
            .find_path(&grid, &request(&grid, GridCoord::new(2, 2), GridCoord::new(8, 2)))
            .unwrap();
        assert!(path.iter().all(|c| !grid.blocked.contains(c)));
        assert!(path.iter().any(|c| c.y == 9));
        assert_connected(&path);
    }

    #[test]
    fn port_directions_gate_first_and_last_moves() {
        let grid = open_grid(12, 12);
        let mut solver = AStar::new();
        let mut req = request(&grid, GridCoord::new(4, 4), GridCoord::new(8, 4));
        req.start_dir = Some(Dir::North);
        req.goal_dir = Some(Dir::South);
        let path = solver.find_path(&grid, &req).unwrap();
        assert_eq!(path[1], GridCoord::new(4, 5));
        assert_eq!(path[path.len() - 2], GridCoord::new(8, 5));
        assert_eq!(path.len(), 7);
    }

    #[test]
    fn bend_radius_spaces_turns() {
        let grid = open_grid(12, 12);
        let mut solver = AStar::new();
        let mut req = request(&grid, GridCoord::new(2, 2), GridCoord::new(3, 6));
        req.start_dir = Some(Dir::East);
        req.bend_radius = 3;
        let path = solver.find_path(&grid, &req).unwrap();
        assert_connected(&path);
        // Each run between bends (except the last) is at least three cells.
        let mut run = 0;
        for w in path.windows(3) {
            run += 1;
            if (w[0].x == w[1].x) != (w[1].x == w[2].x) {
                assert!(run >= 3, "bend after {} cells in {:?}", run, path);
                run = 0;
            }
        }
    }

    #[test]
    fn straight_width_needs_clear_stripe() {
        let mut grid = open_grid(10, 9);
        // A corridor one cell tall at y = 3 through x = 4..=6.
        for x in 4..=6 {
            grid.blocked.push(GridCoord::new(x, 2));
            grid.blocked.push(GridCoord::new(x, 4));
        }
        let mut solver = AStar::new();
        let mut req = request(&grid, GridCoord::new(1, 3), GridCoord::new(8, 3));
        let narrow = solver.find_path(&grid, &req).unwrap();
        assert_eq!(narrow.len(), 8);
        req.straight_width = 3;
        let wide = solver.find_path(&grid, &req).unwrap();
        assert!(wide.len() > 8);
        assert!(wide.iter().all(|c| !(4..=6).contains(&c.x) || c.y >= 5));
    }

    #[test]
    fn sealed_goal_has_no_path_and_omni_retry_helps_gating() {
        let mut grid = open_grid(8, 8);
        grid.blocked = vec![
            GridCoord::new(4, 5),
            GridCoord::new(4, 3),
            GridCoord::new(3, 4),
            GridCoord::new(5, 4),
        ];
        let mut solver = AStar::new();
        let req = request(&grid, GridCoord::new(0, 0), GridCoord::new(4, 4));
        assert_eq!(solver.find_path(&grid, &req), Err(SearchError::NoPath));

        let grid = open_grid(8, 8);
        let mut req = request(&grid, GridCoord::new(0, 4), GridCoord::new(3, 4));
        // Facing west into the grid edge.
        req.start_dir = Some(Dir::West);
        assert_eq!(solver.find_path(&grid, &req), Err(SearchError::NoPath));
        let path = solver.find_path_or_omni(&grid, &req).unwrap();
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn shape_rounds_width_up_to_odd_cells() {
        assert_eq!(SearchShape::for_wire(250, 250, 1, 10).straight_width, 1);
        assert_eq!(SearchShape::for_wire(250, 1_000, 1, 10).straight_width, 1);
        let wide = SearchShape::for_wire(600, 250, 1, 10);
        assert_eq!(wide.straight_width, 3);
        assert_eq!(wide.bend_radius, 3);
        let even = SearchShape::for_wire(500, 250, 4, 10);
        assert_eq!(even.straight_width, 3);
        assert_eq!(even.bend_radius, 4);
    }

    #[test]
    fn cancellation_is_observed() {
        let grid = open_grid(8, 8);
        let token = CancelToken::new();
        token.cancel();
        let mut req = request(&grid, GridCoord::new(0, 0), GridCoord::new(7, 7));
        req.cancel = Some(&token);
        let mut solver = AStar::new();
        assert_eq!(solver.find_path(&grid, &req), Err(SearchError::Cancelled));
    }

    #[test]
    fn identical_queries_give_identical_paths() {
        let mut grid = open_grid(16, 16);
        grid.blocked = (3..13).map(|y| GridCoord::new(8, y)).collect();
        let mut a = AStar::new();
        let mut b = AStar::new();
        let req = request(&grid, GridCoord::new(2, 8), GridCoord::new(14, 8));
        let first = a.find_path(&grid, &req).unwrap();
        // Reusing a solver must not leak state between searches.
        let _ = a.find_path(&grid, &request(&grid, GridCoord::new(0, 0), GridCoord::new(15, 15)));
        assert_eq!(first, a.find_path(&grid, &req).unwrap());
        assert_eq!(first, b.find_path(&grid, &req).unwrap());
    }
}
