//! Deterministic simulation clock and tick phase ordering.
//!
//! One `app.update()` is one tick. The clock advances by a fixed `dt`
//! before anything else runs, so every system in the tick observes the
//! same timestamp and two runs over the same inputs produce the same
//! trace.

use bevy::prelude::*;

use crate::constants::DEFAULT_TICK_SECONDS;
use crate::grid::SpatialGrid;

#[derive(Resource, Debug, Clone, Copy)]
pub struct SimClock {
    /// Simulated seconds since the world started
    pub now: f64,
    /// Seconds added per tick
    pub dt: f64,
}

impl Default for SimClock {
    fn default() -> Self {
        Self {
            now: 0.0,
            dt: DEFAULT_TICK_SECONDS,
        }
    }
}

/// Phases of a tick. Scheduler work (matching, dispatch) runs first,
/// then building work (production, ordering, demolition), then agents
/// (carrier behavior and movement).
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimSet {
    Scheduler,
    Buildings,
    Agents,
}

pub struct TickPlugin;

impl Plugin for TickPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SimClock>()
            .init_resource::<SpatialGrid>()
            .configure_sets(
                Update,
                (SimSet::Scheduler, SimSet::Buildings, SimSet::Agents).chain(),
            )
            .add_systems(Update, advance_clock.before(SimSet::Scheduler));
    }
}

fn advance_clock(mut clock: ResMut<SimClock>) {
    clock.now += clock.dt;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_advances_once_per_update() {
        let mut app = App::new();
        app.add_plugins(TickPlugin);

        app.update();
        app.update();
        app.update();
        assert_eq!(app.world().resource::<SimClock>().now, 3.0);
    }
}
