use sky130_common::geom::coord::GridCoord;
use sky130_common::geom::point::DbuPoint;

/// Maps DBU coordinates onto a uniform grid and back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridConverter {
    origin: DbuPoint,
    step: i64,
    grid_w: u32,
    grid_h: u32,
}

impl GridConverter {
    pub fn new(origin: DbuPoint, step: i64, grid_w: u32, grid_h: u32) -> Self {
        debug_assert!(step > 0 && grid_w > 0 && grid_h > 0);
        Self {
            origin,
            step,
            grid_w,
            grid_h,
        }
    }

    pub fn width(&self) -> u32 {
        self.grid_w
    }

    pub fn height(&self) -> u32 {
        self.grid_h
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    pub fn origin(&self) -> DbuPoint {
        self.origin
    }

    /// Nearest cell, clamped into the grid.
    pub fn to_grid(&self, p: DbuPoint) -> GridCoord {
        let x = round_div(p.x - self.origin.x, self.step).clamp(0, self.grid_w as i64 - 1);
        let y = round_div(p.y - self.origin.y, self.step).clamp(0, self.grid_h as i64 - 1);
        GridCoord::new(x as u32, y as u32)
    }

    /// Nearest cell, or `None` if `p` is more than half a step outside the grid.
    pub fn to_grid_checked(&self, p: DbuPoint) -> Option<GridCoord> {
        let x = round_div(p.x - self.origin.x, self.step);
        let y = round_div(p.y - self.origin.y, self.step);
        let inside = (0..self.grid_w as i64).contains(&x) && (0..self.grid_h as i64).contains(&y);
        inside.then(|| GridCoord::new(x as u32, y as u32))
    }

    pub fn to_world(&self, g: GridCoord) -> DbuPoint {
        DbuPoint::new(
            self.origin.x + g.x as i64 * self.step,
            self.origin.y + g.y as i64 * self.step,
        )
    }

    /// Conservative cover of `[lo, hi]` on the x axis: floor of the low edge to
    /// ceil of the high edge, clamped. `None` when entirely off-grid.
    pub fn x_cover(&self, lo: i64, hi: i64) -> Option<(u32, u32)> {
        cover(lo - self.origin.x, hi - self.origin.x, self.step, self.grid_w)
    }

    pub fn y_cover(&self, lo: i64, hi: i64) -> Option<(u32, u32)> {
        cover(lo - self.origin.y, hi - self.origin.y, self.step, self.grid_h)
    }

    /// Cells whose grid point lies inside `[lo, hi]` on the x axis; a span thinner
    /// than one step maps to the cell nearest its centre.
    pub fn x_inside(&self, lo: i64, hi: i64) -> Option<(u32, u32)> {
        inside(lo - self.origin.x, hi - self.origin.x, self.step, self.grid_w)
    }

    pub fn y_inside(&self, lo: i64, hi: i64) -> Option<(u32, u32)> {
        inside(lo - self.origin.y, hi - self.origin.y, self.step, self.grid_h)
    }
}

pub fn floor_div(a: i64, b: i64) -> i64 {
    a.div_euclid(b)
}

pub fn ceil_div(a: i64, b: i64) -> i64 {
    -(-a).div_euclid(b)
}

/// Round half up.
pub fn round_div(a: i64, b: i64) -> i64 {
    (2 * a + b).div_euclid(2 * b)
}

fn clamp_span(lo: i64, hi: i64, len: u32) -> Option<(u32, u32)> {
    let max = len as i64 - 1;
    if hi < 0 || lo > max || lo > hi {
        return None;
    }
    Some((lo.max(0) as u32, hi.min(max) as u32))
}

fn cover(lo: i64, hi: i64, step: i64, len: u32) -> Option<(u32, u32)> {
    clamp_span(floor_div(lo, step), ceil_div(hi, step), len)
}

fn inside(lo: i64, hi: i64, step: i64, len: u32) -> Option<(u32, u32)> {
    let first = ceil_div(lo, step);
    let last = floor_div(hi, step);
    if first <= last {
        clamp_span(first, last, len)
    } else {
        let mid = round_div(lo + hi, 2 * step);
        clamp_span(mid, mid, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv() -> GridConverter {
        GridConverter::new(DbuPoint::new(-12_000, -12_000), 1_000, 30, 30)
    }

    #[test]
    fn round_trip_on_grid_points() {
        let c = conv();
        let g = c.to_grid(DbuPoint::new(2_000, 0));
        assert_eq!(g, GridCoord::new(14, 12));
        assert_eq!(c.to_world(g), DbuPoint::new(2_000, 0));
    }

    #[test]
    fn rounding_is_half_up_and_clamped() {
        let c = conv();
        assert_eq!(c.to_grid(DbuPoint::new(1_500, -500)), GridCoord::new(14, 12));
        assert_eq!(c.to_grid(DbuPoint::new(-50_000, 90_000)), GridCoord::new(0, 29));
        assert!(c.to_grid_checked(DbuPoint::new(-50_000, 0)).is_none());
        assert!(c.to_grid_checked(DbuPoint::new(17_000, 17_000)).is_some());
    }

    #[test]
    fn cover_is_conservative() {
        let c = conv();
        // [1.0, 2.0] um and [1.07, 1.93] um both touch cells 13..=14.
        assert_eq!(c.x_cover(1_000, 2_000), Some((13, 14)));
        assert_eq!(c.x_cover(1_070, 1_930), Some((13, 14)));
        assert_eq!(c.x_cover(-30_000, -20_000), None);
    }

    #[test]
    fn inside_falls_back_to_centre() {
        let c = conv();
        assert_eq!(c.y_inside(-125, 125), Some((12, 12)));
        assert_eq!(c.x_inside(2_000, 8_000), Some((14, 20)));
        assert_eq!(c.x_inside(2_100, 2_300), Some((14, 14)));
    }
}
