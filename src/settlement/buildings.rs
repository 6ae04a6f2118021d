//! Building kinds, placement, production, input ordering, and demolition.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::NEAR_FREE_RADIUS;
use crate::grid::{Footprint, LayerMask, PlacementError, Position, SpatialGrid};
use crate::grid_pos::GridPos;
use crate::logistics::{Good, Inventory, LogisticsScheduler};
use crate::messages::{BuildingRemoved, OrderBooked};
use crate::tick::SimClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    Storage,
    Farm,
    Mill,
    Bakery,
    Sawmill,
    Quarry,
    ForesterHut,
}

/// Static per-kind parameters. Production turns one unit of every input
/// into one unit of every output per cycle.
#[derive(Debug)]
pub struct BuildingSpec {
    pub inputs: &'static [Good],
    pub outputs: &'static [Good],
    /// Target level for the reserved ledger of each input; ordering stops
    /// once promises reach it
    pub buffer_cap: u32,
    /// Base priority for this kind's input orders
    pub order_priority: f32,
    pub max_health: f32,
    pub radius: i32,
    /// Simulated seconds between production cycles
    pub production_interval: f64,
}

impl BuildingKind {
    pub fn spec(self) -> &'static BuildingSpec {
        match self {
            BuildingKind::Storage => &BuildingSpec {
                inputs: &[],
                outputs: &[],
                buffer_cap: 999,
                order_priority: 0.0,
                max_health: 200.0,
                radius: 2,
                production_interval: 0.0,
            },
            BuildingKind::Farm => &BuildingSpec {
                inputs: &[],
                outputs: &[Good::Wheat],
                buffer_cap: 5,
                order_priority: 1.0,
                max_health: 100.0,
                radius: 1,
                production_interval: 10.0,
            },
            BuildingKind::Mill => &BuildingSpec {
                inputs: &[Good::Wheat],
                outputs: &[Good::Flour],
                buffer_cap: 5,
                order_priority: 2.0,
                max_health: 100.0,
                radius: 1,
                production_interval: 8.0,
            },
            BuildingKind::Bakery => &BuildingSpec {
                inputs: &[Good::Flour],
                outputs: &[Good::Bread],
                buffer_cap: 5,
                order_priority: 3.0,
                max_health: 100.0,
                radius: 1,
                production_interval: 6.0,
            },
            BuildingKind::Sawmill => &BuildingSpec {
                inputs: &[Good::Wood],
                outputs: &[Good::Plank],
                buffer_cap: 5,
                order_priority: 2.0,
                max_health: 100.0,
                radius: 1,
                production_interval: 8.0,
            },
            BuildingKind::Quarry => &BuildingSpec {
                inputs: &[],
                outputs: &[Good::Stone],
                buffer_cap: 5,
                order_priority: 1.0,
                max_health: 150.0,
                radius: 1,
                production_interval: 12.0,
            },
            BuildingKind::ForesterHut => &BuildingSpec {
                inputs: &[],
                outputs: &[Good::Wood],
                buffer_cap: 5,
                order_priority: 1.0,
                max_health: 100.0,
                radius: 0,
                production_interval: 10.0,
            },
        }
    }
}

/// A placed building. `door` is the free cell carriers walk to for
/// pickups and dropoffs, chosen below the footprint at placement time.
#[derive(Component, Debug, Clone, Copy)]
pub struct Building {
    pub kind: BuildingKind,
    pub door: GridPos,
}

#[derive(Component, Debug, Clone, Copy)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn full(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn damage(&mut self, amount: f32) {
        self.current = (self.current - amount).max(0.0);
    }
}

/// Tracks when a producer last completed a cycle
#[derive(Component, Debug, Clone, Copy)]
pub struct ProductionClock {
    pub last_run: f64,
}

/// Place a building: claim its footprint on the static layer, pick a door
/// cell, and spawn the entity with an empty inventory.
pub fn spawn_building(
    world: &mut World,
    kind: BuildingKind,
    cell: GridPos,
) -> Result<Entity, PlacementError> {
    let spec = kind.spec();
    let footprint = Footprint::stationary(cell, spec.radius);
    let door = {
        let mut grid = world.resource_mut::<SpatialGrid>();
        if !grid.area_is_free(cell, spec.radius, LayerMask::All) {
            return Err(PlacementError {
                pos: cell,
                radius: spec.radius,
            });
        }
        grid.add(&footprint);
        let below = GridPos::new(cell.x, cell.y - spec.radius - 1);
        match grid.nearest_free(below, NEAR_FREE_RADIUS, LayerMask::StaticOnly) {
            Ok(door) => door,
            Err(e) => {
                grid.remove(&footprint);
                return Err(e);
            }
        }
    };
    let now = world.resource::<SimClock>().now;
    let entity = world
        .spawn((
            Building { kind, door },
            footprint,
            Position(cell.to_world()),
            Inventory::default(),
            Health::full(spec.max_health),
            ProductionClock { last_run: now },
        ))
        .id();
    info!("placed {kind:?} at {cell}, door {door}");
    Ok(entity)
}

/// Run production cycles: once the interval has elapsed and inputs are on
/// the shelf, consume one of each input and shelve one of each output.
/// Output stalls while the output buffer is full of promises.
pub fn produce_goods(
    clock: Res<SimClock>,
    mut producers: Query<(&Building, &mut Inventory, &mut ProductionClock)>,
) {
    for (building, mut inventory, mut production) in &mut producers {
        let spec = building.kind.spec();
        if spec.outputs.is_empty() {
            continue;
        }
        if clock.now - production.last_run < spec.production_interval {
            continue;
        }
        if spec.inputs.iter().any(|g| inventory.actual(*g) == 0) {
            continue;
        }
        if spec.outputs.iter().any(|g| inventory.reserved(*g) >= spec.buffer_cap) {
            continue;
        }
        for g in spec.inputs {
            inventory.consume_input(*g, 1);
        }
        for g in spec.outputs {
            inventory.add_stock(*g, 1);
        }
        production.last_run = clock.now;
        debug!("{:?} produced {:?}", building.kind, spec.outputs);
    }
}

/// Keep every consumer's input buffers topped up with standing orders.
/// Booking reserves the unit as incoming, so repeated runs never order
/// past the buffer cap.
pub fn book_input_orders(
    clock: Res<SimClock>,
    mut scheduler: ResMut<LogisticsScheduler>,
    mut booked: MessageWriter<OrderBooked>,
    mut consumers: Query<(Entity, &Building, &mut Inventory)>,
) {
    let mut entities: Vec<Entity> = consumers.iter().map(|(e, _, _)| e).collect();
    entities.sort();
    for entity in entities {
        let Ok((_, building, mut inventory)) = consumers.get_mut(entity) else {
            continue;
        };
        let spec = building.kind.spec();
        for good in spec.inputs {
            while inventory.reserved(*good) < spec.buffer_cap {
                inventory.reserve_incoming(*good, 1);
                scheduler.book_order(*good, entity, spec.order_priority, clock.now);
                booked.write(OrderBooked {
                    good: *good,
                    requester: entity,
                    base_priority: spec.order_priority,
                });
            }
        }
    }
}

/// Tear down buildings whose health reached zero: clear the footprint,
/// despawn, and announce the removal so the scheduler can unwind promises.
pub fn demolish_buildings(
    mut commands: Commands,
    mut grid: ResMut<SpatialGrid>,
    mut removed: MessageWriter<BuildingRemoved>,
    buildings: Query<(Entity, &Building, &Health, &Footprint)>,
) {
    for (entity, building, health, footprint) in &buildings {
        if health.current > 0.0 {
            continue;
        }
        grid.remove(footprint);
        commands.entity(entity).despawn();
        removed.write(BuildingRemoved {
            building: entity,
            kind: building.kind,
        });
        info!("demolished {:?} at {}", building.kind, footprint.cell);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;

    fn bare_world() -> World {
        let mut world = World::new();
        world.init_resource::<SpatialGrid>();
        world.init_resource::<SimClock>();
        world
    }

    #[test]
    fn placement_claims_footprint_and_door() {
        let mut world = bare_world();
        let entity = spawn_building(&mut world, BuildingKind::Mill, GridPos::new(5, 5)).unwrap();

        let building = *world.get::<Building>(entity).unwrap();
        let grid = world.resource::<SpatialGrid>();
        for p in GridPos::new(5, 5).square(1) {
            assert!(!grid.is_free(p, LayerMask::All));
        }
        // The door is walkable and sits outside the footprint
        assert!(grid.is_free(building.door, LayerMask::StaticOnly));
        assert!(!GridPos::new(5, 5).square(1).any(|p| p == building.door));
    }

    #[test]
    fn overlapping_placement_is_rejected() {
        let mut world = bare_world();
        spawn_building(&mut world, BuildingKind::Farm, GridPos::new(0, 0)).unwrap();
        let err = spawn_building(&mut world, BuildingKind::Farm, GridPos::new(1, 1)).unwrap_err();
        assert_eq!(err.pos, GridPos::new(1, 1));
    }

    #[test]
    fn production_consumes_inputs_and_respects_cap() {
        let mut world = bare_world();
        world.resource_mut::<SimClock>().now = 100.0;
        let mill = spawn_building(&mut world, BuildingKind::Mill, GridPos::new(0, 0)).unwrap();
        world.get_mut::<Inventory>(mill).unwrap().add_stock(Good::Wheat, 3);
        world.get_mut::<ProductionClock>(mill).unwrap().last_run = 0.0;

        world.run_system_once(produce_goods).unwrap();
        let inv = world.get::<Inventory>(mill).unwrap();
        assert_eq!(inv.actual(Good::Wheat), 2);
        assert_eq!(inv.actual(Good::Flour), 1);

        // Interval gate: an immediate second run does nothing
        world.run_system_once(produce_goods).unwrap();
        assert_eq!(world.get::<Inventory>(mill).unwrap().actual(Good::Flour), 1);

        // Full output buffer stalls production
        world.resource_mut::<SimClock>().now = 1000.0;
        world
            .get_mut::<Inventory>(mill)
            .unwrap()
            .add_stock(Good::Flour, 10);
        world.run_system_once(produce_goods).unwrap();
        assert_eq!(world.get::<Inventory>(mill).unwrap().actual(Good::Wheat), 2);
    }

    #[test]
    fn ordering_stops_at_the_buffer_cap() {
        let mut world = bare_world();
        world.init_resource::<LogisticsScheduler>();
        world.init_resource::<Messages<OrderBooked>>();
        let bakery = spawn_building(&mut world, BuildingKind::Bakery, GridPos::new(0, 0)).unwrap();

        world.run_system_once(book_input_orders).unwrap();
        let cap = BuildingKind::Bakery.spec().buffer_cap;
        assert_eq!(
            world.resource::<LogisticsScheduler>().pending_orders(Good::Flour).len(),
            cap as usize
        );
        assert_eq!(
            world.get::<Inventory>(bakery).unwrap().reserved(Good::Flour),
            cap
        );

        // A second pass books nothing further
        world.run_system_once(book_input_orders).unwrap();
        assert_eq!(
            world.resource::<LogisticsScheduler>().pending_orders(Good::Flour).len(),
            cap as usize
        );
    }
}
