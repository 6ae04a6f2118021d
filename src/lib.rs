//! Thorpe - a headless settlement economy simulation
//!
//! Buildings produce and consume goods, a scheduler matches standing
//! orders against supplier surplus, and carriers walk the resulting
//! deliveries across a shared occupancy grid. Everything runs on a
//! deterministic fixed-step clock; one `app.update()` is one tick.

use bevy::app::{PluginGroup, PluginGroupBuilder};

pub mod constants;
pub mod grid;
pub mod grid_pos;
pub mod logistics;
pub mod messages;
pub mod pathfinding;
pub mod settlement;
pub mod tick;

/// Everything needed for a headless simulation, in tick order
pub struct SimulationPlugins;

impl PluginGroup for SimulationPlugins {
    fn build(self) -> PluginGroupBuilder {
        PluginGroupBuilder::start::<Self>()
            .add(tick::TickPlugin)
            .add(logistics::LogisticsPlugin)
            .add(settlement::SettlementPlugin)
    }
}
