use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Integer address of a unit cell on the simulation surface.
///
/// Canonical key for all occupancy and pathing. Derives `Ord` so that
/// collections of cells can be iterated in a reproducible order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Component,
)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Round a continuous world position to its containing cell
    pub fn from_world(pos: Vec2) -> Self {
        Self {
            x: pos.x.round() as i32,
            y: pos.y.round() as i32,
        }
    }

    /// Center of this cell in world coordinates
    pub fn to_world(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    /// Euclidean distance between cell centers
    pub fn dist(self, other: GridPos) -> f32 {
        self.to_world().distance(other.to_world())
    }

    /// Cells of the `(2*radius+1)²` square centered here, row-major
    pub fn square(self, radius: i32) -> impl Iterator<Item = GridPos> {
        (-radius..=radius).flat_map(move |dx| {
            (-radius..=radius).map(move |dy| GridPos::new(self.x + dx, self.y + dy))
        })
    }

    /// The four edge-adjacent cells, in fixed enumeration order
    pub fn neighbors4(self) -> [GridPos; 4] {
        let GridPos { x, y } = self;
        [
            GridPos::new(x + 1, y),
            GridPos::new(x, y - 1),
            GridPos::new(x - 1, y),
            GridPos::new(x, y + 1),
        ]
    }

    /// The eight surrounding cells, edge neighbors first.
    ///
    /// The order is load-bearing: wavefront reconstruction picks the first
    /// qualifying neighbor, so changing it changes tie-breaks.
    pub fn neighbors8(self) -> [GridPos; 8] {
        let GridPos { x, y } = self;
        [
            GridPos::new(x + 1, y),
            GridPos::new(x, y - 1),
            GridPos::new(x - 1, y),
            GridPos::new(x, y + 1),
            GridPos::new(x + 1, y + 1),
            GridPos::new(x + 1, y - 1),
            GridPos::new(x - 1, y - 1),
            GridPos::new(x - 1, y + 1),
        ]
    }

    /// True if `other` is one of this cell's eight neighbors
    pub fn is_adjacent8(self, other: GridPos) -> bool {
        self != other && (self.x - other.x).abs() <= 1 && (self.y - other.y).abs() <= 1
    }
}

impl std::fmt::Display for GridPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_world_rounds_to_nearest_cell() {
        assert_eq!(GridPos::from_world(Vec2::new(1.4, -0.6)), GridPos::new(1, -1));
        assert_eq!(GridPos::from_world(Vec2::new(2.6, 0.2)), GridPos::new(3, 0));
    }

    #[test]
    fn square_has_expected_cell_count() {
        assert_eq!(GridPos::new(0, 0).square(0).count(), 1);
        assert_eq!(GridPos::new(0, 0).square(1).count(), 9);
        assert_eq!(GridPos::new(5, -3).square(2).count(), 25);
    }

    #[test]
    fn neighbors_are_adjacent() {
        let p = GridPos::new(2, 2);
        for n in p.neighbors8() {
            assert!(p.is_adjacent8(n));
        }
        assert!(!p.is_adjacent8(p));
        assert!(!p.is_adjacent8(GridPos::new(4, 2)));
    }

    #[test]
    fn dist_is_euclidean() {
        let d = GridPos::new(0, 0).dist(GridPos::new(3, 4));
        assert!((d - 5.0).abs() < f32::EPSILON);
    }
}
