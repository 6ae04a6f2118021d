use criterion::{Criterion, criterion_group, criterion_main};
use thorpe::grid::{Footprint, LayerMask, SpatialGrid};
use thorpe::grid_pos::GridPos;
use thorpe::pathfinding::Pathfinder;

/// A field of wall segments the search has to weave through
fn setup_grid() -> SpatialGrid {
    let mut grid = SpatialGrid::default();
    for wall in 0..10 {
        let x = wall * 6 + 3;
        // Staggered vertical walls with alternating gaps
        let (lo, hi) = if wall % 2 == 0 { (-20, 15) } else { (-15, 20) };
        for y in lo..=hi {
            grid.add(&Footprint::stationary(GridPos::new(x, y), 0));
        }
    }
    grid
}

fn bench_full_path(c: &mut Criterion) {
    let grid = setup_grid();
    let start = GridPos::new(0, 0);
    let goal = GridPos::new(60, 0);

    c.bench_function("full_path_through_wall_maze", |b| {
        b.iter(|| {
            let finder = Pathfinder::new(&grid);
            let path = finder.full_path(start, goal, LayerMask::All);
            assert!(!path.is_empty());
            path
        })
    });

    c.bench_function("full_path_direct_line", |b| {
        b.iter(|| {
            let finder = Pathfinder::new(&grid);
            finder.full_path(GridPos::new(0, 30), GridPos::new(60, 30), LayerMask::All)
        })
    });
}

criterion_group!(benches, bench_full_path);
criterion_main!(benches);
