use super::RoutingGrid;
use crate::utils::conversion::GridConverter;
use sky130_common::db::indices::GroupId;
use sky130_common::geom::coord::GridCoord;
use sky130_common::geom::rect::BBox;

const FREE: u32 = 0;

/// Obstruction counters of one cell before a journaled edit.
#[derive(Clone, Copy, Debug)]
struct CellEdit {
    index: usize,
    halo: u16,
    core: u16,
}

/// Dense blocked/reserved bitfield over one routing grid.
///
/// Every obstruction is rasterised twice: its clearance halo decides whether a
/// cell is blocked, its core (the part a wire or via pad would physically
/// overlap) is what survives when an endpoint window is opened.
#[derive(Clone)]
pub struct DenseGrid {
    converter: GridConverter,
    halo: Vec<u16>,
    core: Vec<u16>,
    /// `FREE` or owning group id + 1.
    reserved: Vec<u32>,
    owner: Option<GroupId>,
    /// Prior counters of every cell touched since `begin_edits`.
    journal: Option<Vec<CellEdit>>,
}

impl DenseGrid {
    pub fn new(converter: GridConverter) -> Self {
        let size = converter.width() as usize * converter.height() as usize;
        if size > 50_000_000 {
            log::warn!(
                "Allocating large DenseGrid: {} cells. Ensure sufficient RAM.",
                size
            );
        }
        Self {
            converter,
            halo: vec![0; size],
            core: vec![0; size],
            reserved: vec![FREE; size],
            owner: None,
            journal: None,
        }
    }

    pub fn converter(&self) -> &GridConverter {
        &self.converter
    }

    #[inline(always)]
    fn index(&self, coord: GridCoord) -> usize {
        coord.y as usize * self.converter.width() as usize + coord.x as usize
    }

    fn for_cover(&self, bbox: BBox, mut f: impl FnMut(usize)) {
        let Some((x0, x1)) = self.converter.x_cover(bbox.west, bbox.east) else {
            return;
        };
        let Some((y0, y1)) = self.converter.y_cover(bbox.south, bbox.north) else {
            return;
        };
        for y in y0..=y1 {
            for x in x0..=x1 {
                f(self.index(GridCoord::new(x, y)));
            }
        }
    }

    fn record(&mut self, index: usize) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(CellEdit {
                index,
                halo: self.halo[index],
                core: self.core[index],
            });
        }
    }

    /// Starts journaling obstruction edits so `rollback_edits` can undo them.
    pub fn begin_edits(&mut self) {
        self.journal = Some(Vec::new());
    }

    /// Restores every cell touched since `begin_edits` and clears the owner.
    pub fn rollback_edits(&mut self) {
        if let Some(journal) = self.journal.take() {
            for edit in journal.into_iter().rev() {
                self.halo[edit.index] = edit.halo;
                self.core[edit.index] = edit.core;
            }
        }
        self.owner = None;
    }

    /// Marks an obstruction: `halo` cells become blocked, `core` cells stay
    /// blocked even inside endpoint windows.
    pub fn add_obstruction(&mut self, bbox: &BBox, halo: i64, core: i64) {
        let mut cells = Vec::new();
        self.for_cover(bbox.inflate(halo.max(core)), |i| cells.push(i));
        for i in cells.drain(..) {
            self.halo[i] = self.halo[i].saturating_add(1);
        }
        self.for_cover(bbox.inflate(core), |i| cells.push(i));
        for i in cells {
            self.core[i] = self.core[i].saturating_add(1);
        }
    }

    /// Undoes `add_obstruction` for a polygon exempted at an endpoint.
    pub fn remove_obstruction(&mut self, bbox: &BBox, halo: i64, core: i64) {
        let mut cells = Vec::new();
        self.for_cover(bbox.inflate(halo.max(core)), |i| cells.push(i));
        for i in cells.drain(..) {
            self.record(i);
            self.halo[i] = self.halo[i].saturating_sub(1);
        }
        self.for_cover(bbox.inflate(core), |i| cells.push(i));
        for i in cells {
            self.record(i);
            self.core[i] = self.core[i].saturating_sub(1);
        }
    }

    /// Clears the clearance halo in a square of `radius` cells around `center`.
    pub fn open_window(&mut self, center: GridCoord, radius: u32) {
        let w = self.converter.width();
        let h = self.converter.height();
        let x0 = center.x.saturating_sub(radius);
        let x1 = (center.x + radius).min(w - 1);
        let y0 = center.y.saturating_sub(radius);
        let y1 = (center.y + radius).min(h - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let i = self.index(GridCoord::new(x, y));
                if self.halo[i] != self.core[i] {
                    self.record(i);
                    self.halo[i] = self.core[i];
                }
            }
        }
    }

    /// The group whose own reservations count as free.
    pub fn set_owner(&mut self, owner: Option<GroupId>) {
        self.owner = owner;
    }

    /// Reserves the cells a wire rectangle passes over, plus `buffer` cells on
    /// both sides across the wire.
    pub fn reserve_wire(&mut self, bbox: &BBox, horizontal: bool, buffer: u32, group: GroupId) {
        let c = self.converter;
        let (Some((mut x0, mut x1)), Some((mut y0, mut y1))) = (
            c.x_inside(bbox.west, bbox.east),
            c.y_inside(bbox.south, bbox.north),
        ) else {
            return;
        };
        if horizontal {
            y0 = y0.saturating_sub(buffer);
            y1 = (y1 + buffer).min(c.height() - 1);
        } else {
            x0 = x0.saturating_sub(buffer);
            x1 = (x1 + buffer).min(c.width() - 1);
        }
        let tag = group.0 + 1;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let i = self.index(GridCoord::new(x, y));
                if self.reserved[i] == FREE {
                    self.reserved[i] = tag;
                }
            }
        }
    }

    /// Reservation tags, for snapshot and restore around a multi-net run.
    pub fn reservations(&self) -> Vec<u32> {
        self.reserved.clone()
    }

    pub fn restore_reservations(&mut self, saved: Vec<u32>) {
        debug_assert_eq!(saved.len(), self.reserved.len());
        self.reserved = saved;
    }

    /// Hands every cell reserved by `from` over to `into`.
    pub fn relabel_group(&mut self, from: GroupId, into: GroupId) {
        let (old, new) = (from.0 + 1, into.0 + 1);
        for tag in self.reserved.iter_mut().filter(|t| **t == old) {
            *tag = new;
        }
    }

    pub fn blocked_count(&self) -> usize {
        self.halo.iter().filter(|&&h| h > 0).count()
    }
}

impl RoutingGrid for DenseGrid {
    fn width(&self) -> u32 {
        self.converter.width()
    }

    fn height(&self) -> u32 {
        self.converter.height()
    }

    fn is_blocked(&self, coord: GridCoord) -> bool {
        if coord.x >= self.width() || coord.y >= self.height() {
            return true;
        }
        self.halo[self.index(coord)] > 0
    }

    fn is_reserved(&self, coord: GridCoord) -> bool {
        if coord.x >= self.width() || coord.y >= self.height() {
            return true;
        }
        match self.reserved[self.index(coord)] {
            FREE => false,
            tag => self.owner.is_none_or(|g| g.0 + 1 != tag),
        }
    }
}
