//! Obstacle cluster extraction and tangent-point computation.
//!
//! A cluster is the maximal 4-connected set of blocked cells reachable from
//! a seed. Clusters are computed on demand from the live grid and never
//! cached, so they always reflect the occupancy at query time.

use std::collections::{BTreeSet, VecDeque};

use crate::constants::CONTACT_CLEARANCE;
use crate::grid::{LayerMask, SpatialGrid, scan_line};
use crate::grid_pos::GridPos;

/// Borrowing view over the grid for obstacle queries
pub struct ObstacleAnalyzer<'g> {
    grid: &'g SpatialGrid,
}

impl<'g> ObstacleAnalyzer<'g> {
    pub fn new(grid: &'g SpatialGrid) -> Self {
        Self { grid }
    }

    /// The obstacle cluster containing `seed`, or an empty set when the
    /// seed cell is free.
    ///
    /// Iterative flood fill with an explicit frontier; clusters can span
    /// hundreds of cells and must not recurse.
    pub fn obstacle_at(&self, seed: GridPos, mask: LayerMask) -> BTreeSet<GridPos> {
        let mut cluster = BTreeSet::new();
        if self.grid.is_free(seed, mask) {
            return cluster;
        }
        let mut frontier = VecDeque::new();
        cluster.insert(seed);
        frontier.push_back(seed);
        while let Some(pos) = frontier.pop_front() {
            for n in pos.neighbors4() {
                if !self.grid.is_free(n, mask) && cluster.insert(n) {
                    frontier.push_back(n);
                }
            }
        }
        cluster
    }

    /// Distinct obstacle clusters intersecting the straight digital line
    /// from `a` to `b`, in the order the line first touches them.
    pub fn obstacles_between(
        &self,
        a: GridPos,
        b: GridPos,
        mask: LayerMask,
    ) -> Vec<BTreeSet<GridPos>> {
        let mut blocked = Vec::new();
        scan_line(a, b, |p1, p2| {
            for p in [p1, p2] {
                if !self.grid.is_free(p, mask) {
                    blocked.push(p);
                }
            }
            true
        });

        let mut clusters: Vec<BTreeSet<GridPos>> = Vec::new();
        for point in blocked {
            if clusters.iter().all(|c| !c.contains(&point)) {
                clusters.push(self.obstacle_at(point, mask));
            }
        }
        clusters
    }

    /// Two bypass waypoints "around" `obstacle` as seen from `origin`.
    ///
    /// Picks the cluster cells with extremal bearing relative to the
    /// origin (the tangent contact points), then offsets each perpendicular
    /// to the origin→cell direction by [`CONTACT_CLEARANCE`] so the result
    /// rounds into a cell outside the cluster footprint. Returns `None`
    /// for an empty cluster.
    pub fn contacts(&self, origin: GridPos, obstacle: &BTreeSet<GridPos>) -> Option<(GridPos, GridPos)> {
        let bearing = |p: &GridPos| {
            let v = p.to_world() - origin.to_world();
            v.x.atan2(v.y)
        };
        let dist = |p: &GridPos| origin.dist(*p);

        let clockwise_most = obstacle.iter().max_by(|a, b| {
            bearing(a)
                .total_cmp(&bearing(b))
                .then_with(|| dist(b).total_cmp(&dist(a)))
                .then_with(|| a.cmp(b))
        })?;
        let counter_most = obstacle.iter().min_by(|a, b| {
            bearing(a)
                .total_cmp(&bearing(b))
                .then_with(|| dist(a).total_cmp(&dist(b)))
                .then_with(|| a.cmp(b))
        })?;

        let shift = |cell: &GridPos, outward_sign: f32| {
            let dir = (cell.to_world() - origin.to_world()).normalize_or_zero();
            GridPos::from_world(cell.to_world() + dir.perp() * outward_sign * CONTACT_CLEARANCE)
        };
        // perp() rotates counterclockwise; the clockwise-most contact is
        // pushed further clockwise, the other one further counterclockwise.
        Some((shift(clockwise_most, -1.0), shift(counter_most, 1.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Footprint;

    fn grid_with(cells: &[(i32, i32)]) -> SpatialGrid {
        let mut grid = SpatialGrid::default();
        for &(x, y) in cells {
            grid.add(&Footprint::stationary(GridPos::new(x, y), 0));
        }
        grid
    }

    #[test]
    fn free_seed_yields_empty_cluster() {
        let grid = grid_with(&[]);
        let analyzer = ObstacleAnalyzer::new(&grid);
        assert!(
            analyzer
                .obstacle_at(GridPos::new(0, 0), LayerMask::All)
                .is_empty()
        );
    }

    #[test]
    fn flood_fill_collects_four_connected_cluster() {
        // Plus shape around (5,5); the diagonal cell (7,7) is a separate cluster
        let grid = grid_with(&[(5, 5), (6, 5), (4, 5), (5, 6), (5, 4), (7, 7)]);
        let analyzer = ObstacleAnalyzer::new(&grid);

        let cluster = analyzer.obstacle_at(GridPos::new(5, 5), LayerMask::All);
        assert_eq!(cluster.len(), 5);
        assert!(!cluster.contains(&GridPos::new(7, 7)));
    }

    #[test]
    fn flood_fill_handles_long_walls_iteratively() {
        let wall: Vec<(i32, i32)> = (0..500).map(|x| (x, 0)).collect();
        let grid = grid_with(&wall);
        let analyzer = ObstacleAnalyzer::new(&grid);

        let cluster = analyzer.obstacle_at(GridPos::new(250, 0), LayerMask::All);
        assert_eq!(cluster.len(), 500);
    }

    #[test]
    fn obstacles_between_groups_distinct_clusters() {
        // Two one-cell blockers on the line from (0,0) to (6,0)
        let grid = grid_with(&[(2, 0), (5, 0)]);
        let analyzer = ObstacleAnalyzer::new(&grid);

        let clusters =
            analyzer.obstacles_between(GridPos::new(0, 0), GridPos::new(6, 0), LayerMask::All);
        assert_eq!(clusters.len(), 2);
        assert!(clusters[0].contains(&GridPos::new(2, 0)));
        assert!(clusters[1].contains(&GridPos::new(5, 0)));
    }

    #[test]
    fn obstacles_between_reports_each_cluster_once() {
        // A 3-cell wall crossed by the line; one cluster, not three
        let grid = grid_with(&[(3, -1), (3, 0), (3, 1)]);
        let analyzer = ObstacleAnalyzer::new(&grid);

        let clusters =
            analyzer.obstacles_between(GridPos::new(0, 0), GridPos::new(6, 0), LayerMask::All);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 3);
    }

    #[test]
    fn contacts_land_outside_the_obstacle() {
        let grid = grid_with(&[(3, -1), (3, 0), (3, 1)]);
        let analyzer = ObstacleAnalyzer::new(&grid);
        let cluster = analyzer.obstacle_at(GridPos::new(3, 0), LayerMask::All);

        let (around_south, around_north) = analyzer
            .contacts(GridPos::new(0, 0), &cluster)
            .expect("non-empty cluster must yield contacts");

        assert_ne!(around_south, around_north);
        assert!(!cluster.contains(&around_south));
        assert!(!cluster.contains(&around_north));
        // One waypoint passes each end of the wall
        assert!(around_south.y < -1);
        assert!(around_north.y > 1);
    }

    #[test]
    fn contacts_of_empty_cluster_is_none() {
        let grid = grid_with(&[]);
        let analyzer = ObstacleAnalyzer::new(&grid);
        assert!(
            analyzer
                .contacts(GridPos::new(0, 0), &BTreeSet::new())
                .is_none()
        );
    }
}
