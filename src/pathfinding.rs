//! Grid pathfinding: direct-segment shortcut, bounded wavefront (Lee)
//! search, and string-pulling simplification.
//!
//! An empty path is a first-class result meaning "currently unreachable".
//! Movers treat it as "stay put, retry later"; it is never an error.

use std::collections::HashMap;

use crate::constants::MAX_WAVE_DISTANCE;
use crate::grid::{LayerMask, SpatialGrid};
use crate::grid_pos::GridPos;

/// Borrowing view over the grid for route queries
pub struct Pathfinder<'g> {
    grid: &'g SpatialGrid,
    max_distance: u32,
}

impl<'g> Pathfinder<'g> {
    pub fn new(grid: &'g SpatialGrid) -> Self {
        Self::with_max_distance(grid, MAX_WAVE_DISTANCE)
    }

    /// Override the wavefront expansion cap (mainly for tests and for
    /// embedders that want a tighter per-tick budget)
    pub fn with_max_distance(grid: &'g SpatialGrid, max_distance: u32) -> Self {
        Self { grid, max_distance }
    }

    /// Shortest route from `start` to `goal`, start and goal inclusive.
    ///
    /// When permissive line of sight already holds, the route is the two
    /// endpoints and no search runs. Otherwise the bounded wavefront search
    /// runs and its result is simplified: any interior waypoint whose
    /// neighbors two apart still see each other strictly is dropped,
    /// repeatedly, until no removal applies.
    pub fn full_path(&self, start: GridPos, goal: GridPos, mask: LayerMask) -> Vec<GridPos> {
        if self.grid.path_is_free(start, goal, mask) {
            if start == goal {
                return vec![goal];
            }
            return vec![start, goal];
        }
        let mut path = self.wave_path(start, goal, mask);
        if path.is_empty() {
            return path;
        }
        loop {
            let mut removed = false;
            let mut i = 1;
            while i + 1 < path.len() {
                if self.grid.segment_is_free(path[i - 1], path[i + 1], mask) {
                    path.remove(i);
                    removed = true;
                } else {
                    i += 1;
                }
            }
            if !removed {
                break;
            }
        }
        path
    }

    /// Single-source wavefront (Lee) search over free cells.
    ///
    /// Breadth-first distance labeling with 8-neighborhood expansion;
    /// stops when the goal is labeled, the frontier empties, or the ring
    /// index reaches the cap. Reconstruction walks from the goal back to
    /// distance zero, taking the first neighbor of the next lower label in
    /// enumeration order, so tie-breaks are deterministic.
    pub fn wave_path(&self, start: GridPos, goal: GridPos, mask: LayerMask) -> Vec<GridPos> {
        if start == goal {
            return vec![goal];
        }
        let mut labels: HashMap<GridPos, u32> = HashMap::new();
        labels.insert(start, 0);
        let mut frontier = vec![start];
        let mut ring = 0;
        while !labels.contains_key(&goal) && ring < self.max_distance && !frontier.is_empty() {
            let mut next = Vec::new();
            for pos in &frontier {
                for n in pos.neighbors8() {
                    if self.grid.is_free(n, mask) && !labels.contains_key(&n) {
                        labels.insert(n, ring + 1);
                        next.push(n);
                    }
                }
            }
            frontier = next;
            ring += 1;
        }

        let Some(&goal_label) = labels.get(&goal) else {
            return Vec::new();
        };
        let mut path = vec![goal];
        let mut current = goal;
        let mut wanted = goal_label;
        while wanted > 0 {
            wanted -= 1;
            let Some(prev) = current
                .neighbors8()
                .into_iter()
                .find(|n| labels.get(n) == Some(&wanted))
            else {
                return Vec::new();
            };
            path.push(prev);
            current = prev;
        }
        path.reverse();
        path
    }
}
