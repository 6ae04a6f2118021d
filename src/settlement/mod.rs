//! Settlement contents: buildings and the carriers that serve them.

use bevy::prelude::*;

use crate::tick::SimSet;

pub mod buildings;
pub mod carrier;

pub use buildings::{
    Building, BuildingKind, BuildingSpec, Health, ProductionClock, spawn_building,
};
pub use carrier::{
    Carrier, CarrierState, Travel, cancel_assignment, despawn_carrier, release_assignment,
    spawn_carrier,
};

pub struct SettlementPlugin;

impl Plugin for SettlementPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (
                buildings::produce_goods,
                buildings::book_input_orders,
                buildings::demolish_buildings,
            )
                .chain()
                .in_set(SimSet::Buildings),
        )
        .add_systems(
            Update,
            (carrier::carrier_behavior, carrier::carrier_movement)
                .chain()
                .in_set(SimSet::Agents),
        );
    }
}
