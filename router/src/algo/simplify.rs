//! Corner-list clean-up between the pathfinder and the realiser.

use sky130_common::db::port::Orientation;
use sky130_common::error::{Result, RouteError};
use sky130_common::geom::point::DbuPoint;

fn collinear(a: DbuPoint, b: DbuPoint, c: DbuPoint) -> bool {
    (a.x == b.x && b.x == c.x) || (a.y == b.y && b.y == c.y)
}

pub fn remove_duplicates(points: &mut Vec<DbuPoint>) -> bool {
    let before = points.len();
    points.dedup();
    points.len() != before
}

/// Drops every interior point lying on the line through its neighbours,
/// including backtracking ones. End points are never dropped.
pub fn remove_collinear(points: &[DbuPoint]) -> Vec<DbuPoint> {
    let mut out: Vec<DbuPoint> = Vec::with_capacity(points.len());
    for &p in points {
        while out.len() >= 2 && collinear(out[out.len() - 2], out[out.len() - 1], p) {
            out.pop();
        }
        if out.last() != Some(&p) {
            out.push(p);
        }
    }
    out
}

/// Replaces the first and last points with the exact port centres, sliding the
/// neighbouring corner along its segment so the end segments stay axis-aligned.
pub fn attach_endpoints(points: &[DbuPoint], source: DbuPoint, sink: DbuPoint) -> Vec<DbuPoint> {
    if points.len() <= 2 {
        return vec![source, sink];
    }
    let mut out = points.to_vec();
    let n = out.len();

    if out[0].y == out[1].y {
        out[1].y = source.y;
    } else if out[0].x == out[1].x {
        out[1].x = source.x;
    }
    out[0] = source;

    if out[n - 1].y == out[n - 2].y {
        out[n - 2].y = sink.y;
    } else if out[n - 1].x == out[n - 2].x {
        out[n - 2].x = sink.x;
    }
    out[n - 1] = sink;
    out
}

/// Inserts an L corner between every pair of points that share no axis.
///
/// The corner turns perpendicular to the incoming segment. For the first pair
/// the source orientation decides: north/south facing leaves vertically,
/// anything else horizontally.
pub fn force_manhattan(points: &[DbuPoint], source_orientation: Orientation) -> Vec<DbuPoint> {
    let mut out: Vec<DbuPoint> = Vec::with_capacity(points.len() * 2);
    for &p in points {
        let Some(&a) = out.last() else {
            out.push(p);
            continue;
        };
        if !a.is_aligned(&p) {
            let horizontal_first = match out.len() {
                1 => !matches!(source_orientation, Orientation::North | Orientation::South),
                len => out[len - 2].x == a.x,
            };
            let corner = if horizontal_first {
                DbuPoint::new(p.x, a.y)
            } else {
                DbuPoint::new(a.x, p.y)
            };
            out.push(corner);
        }
        out.push(p);
    }
    out
}

/// Drops an interior point in front of a segment shorter than `min_segment`
/// when its neighbours stay aligned without it. Each index is visited once.
pub fn merge_short_segments(points: &mut Vec<DbuPoint>, min_segment: i64) -> bool {
    let mut changed = false;
    let mut i = 1;
    while i + 1 < points.len() {
        let short = points[i].manhattan(&points[i + 1]) < min_segment;
        if short && points[i - 1].is_aligned(&points[i + 1]) {
            points.remove(i);
            changed = true;
        }
        i += 1;
    }
    changed
}

/// Removes a zigzag made of two short segments at either end of the path.
pub fn remove_end_zigzags(points: &mut Vec<DbuPoint>, min_segment: i64) -> bool {
    let limit = 2 * min_segment;
    let mut changed = false;
    if points.len() >= 3
        && points[0].manhattan(&points[1]) < limit
        && points[1].manhattan(&points[2]) < limit
        && points[0].is_aligned(&points[2])
    {
        points.remove(1);
        changed = true;
    }
    let n = points.len();
    if n >= 3
        && points[n - 1].manhattan(&points[n - 2]) < limit
        && points[n - 2].manhattan(&points[n - 3]) < limit
        && points[n - 1].is_aligned(&points[n - 3])
    {
        points.remove(n - 2);
        changed = true;
    }
    changed
}

/// Iterates the clean-up passes until none of them changes the list.
pub fn simplify(points: &[DbuPoint], min_segment: i64) -> Vec<DbuPoint> {
    let mut pts = points.to_vec();
    loop {
        let before = pts.len();
        pts = remove_collinear(&pts);
        let mut changed = pts.len() != before;
        changed |= merge_short_segments(&mut pts, min_segment);
        changed |= remove_end_zigzags(&mut pts, min_segment);
        changed |= remove_duplicates(&mut pts);
        if !changed {
            return pts;
        }
    }
}

/// Checks that every segment is axis-aligned and non-empty and that no three
/// consecutive points lie on one line.
pub fn validate(points: &[DbuPoint]) -> Result<()> {
    if points.is_empty() {
        return Err(RouteError::PathInvariantViolated("empty corner list".into()));
    }
    for (k, w) in points.windows(2).enumerate() {
        if w[0] == w[1] {
            return Err(RouteError::PathInvariantViolated(format!(
                "zero-length segment {} at ({}, {})",
                k, w[0].x, w[0].y
            )));
        }
        if !w[0].is_aligned(&w[1]) {
            return Err(RouteError::PathInvariantViolated(format!(
                "segment {} from ({}, {}) to ({}, {}) is not Manhattan",
                k, w[0].x, w[0].y, w[1].x, w[1].y
            )));
        }
    }
    for (k, w) in points.windows(3).enumerate() {
        if collinear(w[0], w[1], w[2]) {
            return Err(RouteError::PathInvariantViolated(format!(
                "points {}..={} travel in one direction",
                k,
                k + 2
            )));
        }
    }
    Ok(())
}

/// Full post-processing of a raw corner list: exact endpoints, Manhattan
/// corners, clean-up, then validation.
pub fn finalize(
    raw: &[DbuPoint],
    source: DbuPoint,
    sink: DbuPoint,
    source_orientation: Orientation,
    min_segment: i64,
) -> Result<Vec<DbuPoint>> {
    if source == sink {
        return Ok(vec![source]);
    }
    let mut pts = raw.to_vec();
    remove_duplicates(&mut pts);
    let pts = remove_collinear(&pts);
    let pts = attach_endpoints(&pts, source, sink);
    let pts = force_manhattan(&pts, source_orientation);
    let pts = simplify(&pts, min_segment);
    validate(&pts)?;
    Ok(pts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i64, y: i64) -> DbuPoint {
        DbuPoint::new(x, y)
    }

    #[test]
    fn collinear_and_backtracking_points_go() {
        let pts = [p(0, 0), p(5, 0), p(10, 0), p(10, 5), p(10, 3), p(20, 3)];
        assert_eq!(remove_collinear(&pts), vec![p(0, 0), p(10, 0), p(10, 3), p(20, 3)]);
        assert_eq!(remove_collinear(&[p(0, 0), p(0, 5), p(0, 0)]), vec![p(0, 0)]);
    }

    #[test]
    fn endpoints_slide_neighbouring_corners() {
        let coarse = [p(1000, 2000), p(6000, 2000), p(6000, 8000)];
        let out = attach_endpoints(&coarse, p(900, 2100), p(6050, 8000));
        assert_eq!(out, vec![p(900, 2100), p(6050, 2100), p(6050, 8000)]);
        assert_eq!(attach_endpoints(&[p(0, 0)], p(1, 1), p(2, 2)), vec![p(1, 1), p(2, 2)]);
    }

    #[test]
    fn manhattan_corners_follow_orientation_and_previous_segment() {
        let out = force_manhattan(&[p(0, 0), p(10, 10)], Orientation::North);
        assert_eq!(out, vec![p(0, 0), p(0, 10), p(10, 10)]);
        let out = force_manhattan(&[p(0, 0), p(10, 10)], Orientation::Omni);
        assert_eq!(out, vec![p(0, 0), p(10, 0), p(10, 10)]);
        // Incoming vertical segment means the next corner goes horizontal.
        let out = force_manhattan(&[p(0, 0), p(0, 10), p(20, 30)], Orientation::East);
        assert_eq!(out, vec![p(0, 0), p(0, 10), p(20, 10), p(20, 30)]);
    }

    #[test]
    fn short_merge_keeps_manhattan() {
        let mut pts = vec![p(0, 0), p(0, 100), p(0, 50), p(500, 50)];
        assert!(merge_short_segments(&mut pts, 100));
        assert_eq!(pts, vec![p(0, 0), p(0, 50), p(500, 50)]);
        let mut l = vec![p(0, 0), p(0, 10), p(500, 10)];
        assert!(!merge_short_segments(&mut l, 100));
    }

    #[test]
    fn zigzag_at_ends_is_removed() {
        let mut pts = vec![p(0, 0), p(0, 40), p(0, 20), p(1000, 20), p(1000, 900)];
        assert!(remove_end_zigzags(&mut pts, 50));
        assert_eq!(pts[..2], [p(0, 0), p(0, 20)]);
    }

    #[test]
    fn validation_rejects_broken_lists() {
        assert!(validate(&[p(0, 0), p(0, 5), p(4, 5)]).is_ok());
        assert!(matches!(
            validate(&[p(0, 0), p(3, 5)]),
            Err(RouteError::PathInvariantViolated(_))
        ));
        assert!(validate(&[p(0, 0), p(0, 5), p(0, 9)]).is_err());
        assert!(validate(&[p(0, 0), p(0, 0)]).is_err());
    }

    #[test]
    fn finalize_pins_ports_and_is_idempotent() {
        let raw = [p(0, 0), p(1000, 0), p(2000, 0), p(2000, 1000), p(2000, 3000)];
        let out = finalize(&raw, p(-120, 40), p(2010, 3125), Orientation::West, 500).unwrap();
        assert_eq!(out.first(), Some(&p(-120, 40)));
        assert_eq!(out.last(), Some(&p(2010, 3125)));
        validate(&out).unwrap();
        assert_eq!(simplify(&out, 500), out);
    }

    #[test]
    fn straight_connection_collapses_to_two_points() {
        let raw = [p(0, 0), p(0, 1000), p(0, 2000)];
        let out = finalize(&raw, p(0, -30), p(0, 2040), Orientation::North, 500).unwrap();
        assert_eq!(out, vec![p(0, -30), p(0, 2040)]);
    }
}
