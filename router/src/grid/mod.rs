pub mod dense;

pub use dense::DenseGrid;

use sky130_common::geom::coord::GridCoord;

/// Read-only view the pathfinder searches over.
pub trait RoutingGrid {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    fn is_blocked(&self, coord: GridCoord) -> bool;
    /// Reserved by a net of another electrical group.
    fn is_reserved(&self, coord: GridCoord) -> bool;

    fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width() as i64 && y < self.height() as i64
    }

    fn is_free(&self, coord: GridCoord) -> bool {
        !self.is_blocked(coord) && !self.is_reserved(coord)
    }
}
