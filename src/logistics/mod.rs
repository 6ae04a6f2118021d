//! Logistics: goods, inventories, and the order/delivery scheduler.

use bevy::prelude::*;

use crate::messages::{BuildingRemoved, DeliveryCompleted, OrderBooked};
use crate::tick::SimSet;

pub mod goods;
pub mod inventory;
pub mod scheduler;

pub use goods::{ConfigError, Good, SupplyTable};
pub use inventory::Inventory;
pub use scheduler::{Delivery, LogisticsScheduler, PendingOrder};

pub struct LogisticsPlugin;

impl Plugin for LogisticsPlugin {
    fn build(&self, app: &mut App) {
        let table = SupplyTable::standard();
        if let Err(e) = table.validate() {
            panic!("supply table rejected: {e}");
        }
        app.insert_resource(table)
            .init_resource::<LogisticsScheduler>()
            .add_message::<OrderBooked>()
            .add_message::<DeliveryCompleted>()
            .add_message::<BuildingRemoved>()
            .add_systems(
                Update,
                (
                    scheduler::purge_removed_buildings,
                    scheduler::match_deliveries,
                    scheduler::dispatch_deliveries,
                )
                    .chain()
                    .in_set(SimSet::Scheduler),
            );
    }
}
