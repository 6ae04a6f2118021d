//! Sparse occupancy index over integer grid coordinates.
//!
//! The grid keeps one reference count per cell and per layer: stationary
//! occupants (buildings, obstacles) live on the static layer, mobile agents
//! on the dynamic layer. Everything that moves or is placed registers its
//! footprint here, and movement/placement queries go through the free-cell
//! and line-of-sight predicates below.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::grid_pos::GridPos;

pub mod obstacles;

pub use obstacles::ObstacleAnalyzer;

/// Occupancy partition an occupant registers on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layer {
    /// Buildings and other immovable blockers
    Static,
    /// Mobile agents
    Dynamic,
}

/// Which layers a query treats as blocking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerMask {
    /// Only static occupants block (used for route planning, so that
    /// moving agents do not block each other's paths)
    StaticOnly,
    /// Both layers block (used for placement)
    All,
}

/// Square region of cells an occupant reserves on the grid.
///
/// An occupant of radius `r` occupies the `(2r+1)²` square around its cell.
#[derive(Component, Debug, Clone)]
pub struct Footprint {
    pub cell: GridPos,
    pub radius: i32,
    pub layer: Layer,
}

impl Footprint {
    pub fn stationary(cell: GridPos, radius: i32) -> Self {
        Self {
            cell,
            radius,
            layer: Layer::Static,
        }
    }

    pub fn mobile(cell: GridPos) -> Self {
        Self {
            cell,
            radius: 0,
            layer: Layer::Dynamic,
        }
    }
}

/// Continuous world position of a simulated entity
#[derive(Component, Debug, Clone, Copy)]
pub struct Position(pub Vec2);

impl Position {
    pub fn cell(&self) -> GridPos {
        GridPos::from_world(self.0)
    }
}

/// Raised by [`SpatialGrid::nearest_free`] when the search square holds no
/// free cell. Distinct from path failure: it concerns placement, and the
/// caller reacts by widening the radius or abandoning the placement.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("no free cell within {radius} cells of {pos}")]
pub struct PlacementError {
    pub pos: GridPos,
    pub radius: i32,
}

/// Per-cell occupancy reference counts, split by layer.
///
/// Counts transition 0→1 by inserting the key and 1→0 by removing it; a
/// decrement on an absent key is a lifecycle bug and panics.
#[derive(Resource, Debug, Default)]
pub struct SpatialGrid {
    static_cells: HashMap<GridPos, u32>,
    dynamic_cells: HashMap<GridPos, u32>,
}

impl SpatialGrid {
    /// True iff no occupant footprint covers `pos` on the masked layers
    pub fn is_free(&self, pos: GridPos, mask: LayerMask) -> bool {
        match mask {
            LayerMask::StaticOnly => !self.static_cells.contains_key(&pos),
            LayerMask::All => {
                !self.static_cells.contains_key(&pos) && !self.dynamic_cells.contains_key(&pos)
            }
        }
    }

    /// True iff every cell of the `(2*radius+1)²` square around `center` is free
    pub fn area_is_free(&self, center: GridPos, radius: i32, mask: LayerMask) -> bool {
        center.square(radius).all(|p| self.is_free(p, mask))
    }

    /// Strict line of sight: at every step along the major axis, both the
    /// floor- and ceil-rounded minor-axis samples must be free. No diagonal
    /// squeeze is tolerated.
    pub fn segment_is_free(&self, a: GridPos, b: GridPos, mask: LayerMask) -> bool {
        scan_line(a, b, |p1, p2| {
            self.is_free(p1, mask) && self.is_free(p2, mask)
        })
    }

    /// Permissive line of sight: at every step, either the floor or the ceil
    /// sample may be free. Used to validate and simplify already-discrete
    /// paths, where cutting a corner is acceptable.
    pub fn path_is_free(&self, a: GridPos, b: GridPos, mask: LayerMask) -> bool {
        scan_line(a, b, |p1, p2| {
            self.is_free(p1, mask) || self.is_free(p2, mask)
        })
    }

    /// Register an occupant's footprint on its declared layer
    pub fn add(&mut self, footprint: &Footprint) {
        let cells = self.layer_mut(footprint.layer);
        for p in footprint.cell.square(footprint.radius) {
            *cells.entry(p).or_insert(0) += 1;
        }
    }

    /// Release an occupant's footprint from its declared layer
    pub fn remove(&mut self, footprint: &Footprint) {
        let cells = self.layer_mut(footprint.layer);
        for p in footprint.cell.square(footprint.radius) {
            match cells.get_mut(&p) {
                Some(count) if *count > 1 => *count -= 1,
                Some(_) => {
                    cells.remove(&p);
                }
                None => panic!("occupancy count underflow at {p}"),
            }
        }
    }

    /// Re-bucket an occupant whose continuous position may have crossed into
    /// a new cell. A no-op while the rounded cell is unchanged, so calling
    /// this every tick causes no churn.
    pub fn update(&mut self, footprint: &mut Footprint, world_pos: Vec2) {
        let cell = GridPos::from_world(world_pos);
        if cell != footprint.cell {
            self.remove(footprint);
            footprint.cell = cell;
            self.add(footprint);
        }
    }

    /// The free cell nearest to `pos` (Euclidean) within the
    /// `(2*radius+1)²` search square. Ties break toward the smaller cell so
    /// the result is reproducible.
    pub fn nearest_free(
        &self,
        pos: GridPos,
        radius: i32,
        mask: LayerMask,
    ) -> Result<GridPos, PlacementError> {
        pos.square(radius)
            .filter(|p| self.is_free(*p, mask))
            .min_by(|a, b| {
                pos.dist(*a)
                    .total_cmp(&pos.dist(*b))
                    .then_with(|| a.cmp(b))
            })
            .ok_or(PlacementError { pos, radius })
    }

    /// Number of occupied cells on a layer (diagnostics)
    pub fn occupied_cells(&self, layer: Layer) -> usize {
        match layer {
            Layer::Static => self.static_cells.len(),
            Layer::Dynamic => self.dynamic_cells.len(),
        }
    }

    fn layer_mut(&mut self, layer: Layer) -> &mut HashMap<GridPos, u32> {
        match layer {
            Layer::Static => &mut self.static_cells,
            Layer::Dynamic => &mut self.dynamic_cells,
        }
    }
}

/// Walk the digital line from `a` to `b` along its major axis, visiting the
/// floor- and ceil-rounded minor-axis sample pair at each step. Returns
/// false as soon as `visit` rejects a pair.
pub(crate) fn scan_line(
    a: GridPos,
    b: GridPos,
    mut visit: impl FnMut(GridPos, GridPos) -> bool,
) -> bool {
    if a == b {
        return true;
    }
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    if dy.abs() >= dx.abs() {
        let k = dx as f32 / dy as f32;
        let start = if a.y > b.y { b } else { a };
        for i in 0..=dy.abs() {
            let x = start.x as f32 + k * i as f32;
            let p1 = GridPos::new(x.floor() as i32, start.y + i);
            let p2 = GridPos::new(x.ceil() as i32, start.y + i);
            if !visit(p1, p2) {
                return false;
            }
        }
    } else {
        let k = dy as f32 / dx as f32;
        let start = if a.x > b.x { b } else { a };
        for i in 0..=dx.abs() {
            let y = start.y as f32 + k * i as f32;
            let p1 = GridPos::new(start.x + i, y.floor() as i32);
            let p2 = GridPos::new(start.x + i, y.ceil() as i32);
            if !visit(p1, p2) {
                return false;
            }
        }
    }
    true
}
