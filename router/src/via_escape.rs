//! Fallback for nets the pathfinder cannot connect: a fixed family of
//! candidate shapes drawn entirely on the upper metal.

use crate::algo::simplify;
use crate::grid::{DenseGrid, RoutingGrid};
use crate::obstacles::ObstacleSet;
use crate::realize::segment_rect;
use sky130_common::db::layer::LayerId;
use sky130_common::geom::coord::GridCoord;
use sky130_common::geom::point::DbuPoint;
use sky130_common::geom::rect::BBox;

/// Everything the planner checks a candidate against.
pub struct EscapeContext<'a> {
    pub obstacles: &'a ObstacleSet,
    /// Sorted obstruction ids exempted at this net's endpoints.
    pub exempt: &'a [usize],
    /// Detail grid of the net, owner already set.
    pub grid: &'a DenseGrid,
    pub layer: LayerId,
    pub width: i64,
    pub clearance: i64,
    /// Jog distance past the blocker bounds.
    pub margin: i64,
    pub min_segment: i64,
}

fn l_paths(s: DbuPoint, t: DbuPoint) -> [Vec<DbuPoint>; 2] {
    [
        vec![s, DbuPoint::new(t.x, s.y), t],
        vec![s, DbuPoint::new(s.x, t.y), t],
    ]
}

/// Union of the bboxes of every non-exempt obstruction, on any layer, that a
/// direct L path would run over.
pub fn blocker_bounds(ctx: &EscapeContext<'_>, s: DbuPoint, t: DbuPoint) -> Option<BBox> {
    let mut hits: Vec<usize> = l_paths(s, t)
        .iter()
        .flat_map(|path| path.windows(2).map(|w| (w[0], w[1])).collect::<Vec<_>>())
        .filter(|(a, b)| a != b)
        .flat_map(|(a, b)| {
            let (rect, _) = segment_rect(a, b, ctx.width);
            ctx.obstacles.hits(rect, None, ctx.exempt)
        })
        .collect();
    hits.sort_unstable();
    hits.dedup();
    let items = ctx.obstacles.items();
    hits.into_iter()
        .map(|i| items[i].bbox)
        .reduce(|a, b| a.union(&b))
}

/// Candidate corner lists in preference order: two L paths, four U paths,
/// four S paths, then the straight path when the ends are aligned.
pub fn candidates(s: DbuPoint, t: DbuPoint, bounds: BBox, d: i64) -> Vec<Vec<DbuPoint>> {
    let x_escapes = [bounds.west - d, bounds.east + d];
    let y_escapes = [bounds.south - d, bounds.north + d];

    let mut out: Vec<Vec<DbuPoint>> = l_paths(s, t).into_iter().collect();
    for &x in &x_escapes {
        out.push(vec![s, DbuPoint::new(x, s.y), DbuPoint::new(x, t.y), t]);
    }
    for &y in &y_escapes {
        out.push(vec![s, DbuPoint::new(s.x, y), DbuPoint::new(t.x, y), t]);
    }
    for &y in &y_escapes {
        for &x in &x_escapes {
            out.push(vec![
                s,
                DbuPoint::new(s.x, y),
                DbuPoint::new(x, y),
                DbuPoint::new(x, t.y),
                t,
            ]);
        }
    }
    if s.is_aligned(&t) {
        out.push(vec![s, t]);
    }
    out
}

fn path_length(points: &[DbuPoint]) -> i64 {
    points.windows(2).map(|w| w[0].manhattan(&w[1])).sum()
}

fn crosses_reservation(grid: &DenseGrid, rect: BBox) -> bool {
    let c = grid.converter();
    let (Some((x0, x1)), Some((y0, y1))) = (
        c.x_inside(rect.west, rect.east),
        c.y_inside(rect.south, rect.north),
    ) else {
        return false;
    };
    (y0..=y1).any(|y| (x0..=x1).any(|x| grid.is_reserved(GridCoord::new(x, y))))
}

fn is_clear(ctx: &EscapeContext<'_>, points: &[DbuPoint]) -> bool {
    let layers = [ctx.layer];
    points.windows(2).all(|w| {
        let (rect, _) = segment_rect(w[0], w[1], ctx.width);
        ctx.obstacles
            .hits(rect.inflate(ctx.clearance), Some(&layers), ctx.exempt)
            .is_empty()
            && !crosses_reservation(ctx.grid, rect)
    })
}

/// Shortest clear candidate between `s` and `t`; ties go to the earlier one.
pub fn plan(ctx: &EscapeContext<'_>, s: DbuPoint, t: DbuPoint) -> Option<Vec<DbuPoint>> {
    let bounds = blocker_bounds(ctx, s, t).unwrap_or_else(|| BBox::from_corners(s, t));
    let mut best: Option<(i64, Vec<DbuPoint>)> = None;
    for (k, raw) in candidates(s, t, bounds, ctx.margin).into_iter().enumerate() {
        let points = simplify::simplify(&raw, ctx.min_segment);
        let pinned = points.first() == Some(&s) && points.last() == Some(&t);
        if !pinned || simplify::validate(&points).is_err() {
            continue;
        }
        if !is_clear(ctx, &points) {
            log::debug!("[VIA-ESCAPE] candidate {} blocked", k);
            continue;
        }
        let length = path_length(&points);
        if best.as_ref().is_none_or(|(l, _)| length < *l) {
            best = Some((length, points));
        }
    }
    best.map(|(_, points)| points)
}
