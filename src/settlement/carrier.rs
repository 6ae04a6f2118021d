//! Carriers: the agents that physically move goods between buildings.
//!
//! A carrier is a small state machine. Idle carriers wait for the
//! dispatcher; an Assigned carrier walks to the source's door and picks
//! up; a Loaded carrier walks to the destination's door and drops off.
//! All ledger movement happens at the doors, never mid-route.

use std::collections::VecDeque;

use bevy::prelude::*;

use crate::constants::{CARRIER_SPEED, ENTER_DISTANCE};
use crate::grid::{Footprint, LayerMask, Position, SpatialGrid};
use crate::grid_pos::GridPos;
use crate::logistics::{Delivery, Inventory, LogisticsScheduler};
use crate::messages::DeliveryCompleted;
use crate::pathfinding::Pathfinder;
use crate::settlement::Building;
use crate::tick::SimClock;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CarrierState {
    Idle,
    /// Walking to the source door, hands empty
    Assigned(Delivery),
    /// Walking to the destination door, cargo on back
    Loaded(Delivery),
}

#[derive(Component, Debug, Clone)]
pub struct Carrier {
    pub speed: f32,
    pub state: CarrierState,
}

/// Current walking goal and the remaining waypoints toward it
#[derive(Component, Debug, Default)]
pub struct Travel {
    pub goal: Option<GridPos>,
    pub path: VecDeque<GridPos>,
}

impl Travel {
    pub fn clear(&mut self) {
        self.goal = None;
        self.path.clear();
    }

    /// Point at a goal; keeps the existing path if the goal is unchanged
    pub fn set_goal(&mut self, goal: GridPos) {
        if self.goal != Some(goal) {
            self.goal = Some(goal);
            self.path.clear();
        }
    }
}

/// Spawn an idle carrier at a cell and register it with the dispatcher
pub fn spawn_carrier(world: &mut World, cell: GridPos) -> Entity {
    let footprint = Footprint::mobile(cell);
    world.resource_mut::<SpatialGrid>().add(&footprint);
    let entity = world
        .spawn((
            Carrier {
                speed: CARRIER_SPEED,
                state: CarrierState::Idle,
            },
            Travel::default(),
            footprint,
            Position(cell.to_world()),
        ))
        .id();
    world
        .resource_mut::<LogisticsScheduler>()
        .register_idle(entity);
    entity
}

/// Remove a carrier from the world, unwinding whatever it was doing: an
/// assigned delivery goes back in the queue; loaded cargo is lost and its
/// incoming promise cancelled at the destination.
pub fn despawn_carrier(world: &mut World, entity: Entity) {
    let Some(state) = world.get::<Carrier>(entity).map(|c| c.state) else {
        return;
    };
    match state {
        CarrierState::Idle => {}
        CarrierState::Assigned(delivery) => {
            world
                .resource_mut::<LogisticsScheduler>()
                .requeue_delivery(delivery);
        }
        CarrierState::Loaded(delivery) => {
            warn!("carrier died in transit, {} lost", delivery.good);
            if let Some(mut inv) = world.get_mut::<Inventory>(delivery.dest) {
                inv.cancel_incoming(delivery.good, 1);
            }
        }
    }
    world
        .resource_mut::<LogisticsScheduler>()
        .deregister_idle(entity);
    if let Some(footprint) = world.get::<Footprint>(entity).cloned() {
        world.resource_mut::<SpatialGrid>().remove(&footprint);
    }
    world.despawn(entity);
}

/// Take an Assigned carrier off its delivery without abandoning the
/// promise: the delivery goes back in the queue for another carrier.
/// Loaded carriers are never redirected; cargo already on a back rides
/// to its destination.
pub fn release_assignment(world: &mut World, entity: Entity) {
    let Some(CarrierState::Assigned(delivery)) = world.get::<Carrier>(entity).map(|c| c.state)
    else {
        return;
    };
    world
        .resource_mut::<LogisticsScheduler>()
        .requeue_delivery(delivery);
    if let Some(mut carrier) = world.get_mut::<Carrier>(entity) {
        carrier.state = CarrierState::Idle;
    }
    if let Some(mut travel) = world.get_mut::<Travel>(entity) {
        travel.clear();
    }
    world
        .resource_mut::<LogisticsScheduler>()
        .register_idle(entity);
}

/// Cancel an Assigned carrier's delivery outright: the promised unit
/// returns to the source's offerable pool, the requester's order goes
/// back on the book, and the carrier idles. A no-op for Loaded carriers.
pub fn cancel_assignment(world: &mut World, entity: Entity) {
    let Some(CarrierState::Assigned(delivery)) = world.get::<Carrier>(entity).map(|c| c.state)
    else {
        return;
    };
    let now = world.resource::<SimClock>().now;
    if let Some(mut inv) = world.get_mut::<Inventory>(delivery.source) {
        inv.release_outgoing(delivery.good, 1);
    }
    world.resource_mut::<LogisticsScheduler>().book_order(
        delivery.good,
        delivery.dest,
        delivery.priority,
        now,
    );
    if let Some(mut carrier) = world.get_mut::<Carrier>(entity) {
        carrier.state = CarrierState::Idle;
    }
    if let Some(mut travel) = world.get_mut::<Travel>(entity) {
        travel.clear();
    }
    world
        .resource_mut::<LogisticsScheduler>()
        .register_idle(entity);
}

/// Drive the carrier state machine: pick goals, pick up at source doors,
/// drop off at destination doors, and unwind deliveries whose endpoint
/// buildings vanished mid-route.
pub fn carrier_behavior(
    clock: Res<SimClock>,
    mut scheduler: ResMut<LogisticsScheduler>,
    mut completed: MessageWriter<DeliveryCompleted>,
    mut carriers: Query<(Entity, &Position, &mut Carrier, &mut Travel)>,
    buildings: Query<&Building>,
    mut inventories: Query<&mut Inventory>,
) {
    for (entity, pos, mut carrier, mut travel) in &mut carriers {
        match carrier.state {
            CarrierState::Idle => {}
            CarrierState::Assigned(delivery) => {
                let Ok(source) = buildings.get(delivery.source) else {
                    // Pickup point vanished; the outgoing promise died with
                    // it, but the requester's slot is still held, so the
                    // order goes back to the book without re-reserving
                    warn!("pickup point for {} vanished", delivery.good);
                    if buildings.get(delivery.dest).is_ok() {
                        scheduler.book_order(
                            delivery.good,
                            delivery.dest,
                            delivery.priority,
                            clock.now,
                        );
                    }
                    carrier.state = CarrierState::Idle;
                    travel.clear();
                    scheduler.register_idle(entity);
                    continue;
                };
                if buildings.get(delivery.dest).is_err() {
                    if let Ok(mut inv) = inventories.get_mut(delivery.source) {
                        inv.release_outgoing(delivery.good, 1);
                    }
                    carrier.state = CarrierState::Idle;
                    travel.clear();
                    scheduler.register_idle(entity);
                    continue;
                }
                if pos.0.distance(source.door.to_world()) <= ENTER_DISTANCE {
                    if let Ok(mut inv) = inventories.get_mut(delivery.source) {
                        inv.commit_pickup(delivery.good, 1);
                    }
                    carrier.state = CarrierState::Loaded(delivery);
                    travel.clear();
                } else {
                    travel.set_goal(source.door);
                }
            }
            CarrierState::Loaded(delivery) => match buildings.get(delivery.dest) {
                Ok(dest) => {
                    if pos.0.distance(dest.door.to_world()) <= ENTER_DISTANCE {
                        if let Ok(mut inv) = inventories.get_mut(delivery.dest) {
                            inv.commit_dropoff(delivery.good, 1);
                        }
                        completed.write(DeliveryCompleted {
                            delivery,
                            carrier: entity,
                        });
                        carrier.state = CarrierState::Idle;
                        travel.clear();
                        scheduler.register_idle(entity);
                    } else {
                        travel.set_goal(dest.door);
                    }
                }
                Err(_) => {
                    warn!("destination for {} vanished, cargo lost", delivery.good);
                    carrier.state = CarrierState::Idle;
                    travel.clear();
                    scheduler.register_idle(entity);
                }
            },
        }
    }
}

/// Walk carriers along their paths. Planning routes around the static
/// layer only, so carriers pass through each other instead of deadlocking;
/// an empty planning result means "stay put, retry next tick".
pub fn carrier_movement(
    clock: Res<SimClock>,
    mut grid: ResMut<SpatialGrid>,
    mut carriers: Query<(&Carrier, &mut Position, &mut Travel, &mut Footprint)>,
) {
    for (carrier, mut pos, mut travel, mut footprint) in &mut carriers {
        let Some(goal) = travel.goal else {
            continue;
        };
        if travel.path.is_empty() {
            let path = Pathfinder::new(&grid).full_path(pos.cell(), goal, LayerMask::StaticOnly);
            if path.is_empty() {
                continue;
            }
            travel.path = path.into_iter().collect();
            if travel.path.front() == Some(&pos.cell()) {
                travel.path.pop_front();
            }
        }
        let mut budget = carrier.speed * clock.dt as f32;
        while budget > 0.0 {
            let Some(&next) = travel.path.front() else {
                travel.goal = None;
                break;
            };
            let target = next.to_world();
            let distance = pos.0.distance(target);
            if distance <= budget {
                pos.0 = target;
                budget -= distance;
                travel.path.pop_front();
            } else {
                let step = (target - pos.0) / distance * budget;
                pos.0 += step;
                budget = 0.0;
            }
        }
        grid.update(&mut footprint, pos.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;
    use crate::grid::Layer;

    fn bare_world() -> World {
        let mut world = World::new();
        world.init_resource::<SpatialGrid>();
        world.init_resource::<SimClock>();
        world.init_resource::<LogisticsScheduler>();
        world
    }

    #[test]
    fn spawned_carrier_is_idle_and_registered() {
        let mut world = bare_world();
        let carrier = spawn_carrier(&mut world, GridPos::new(0, 0));
        assert_eq!(
            world.get::<Carrier>(carrier).unwrap().state,
            CarrierState::Idle
        );
        assert_eq!(
            world.resource::<LogisticsScheduler>().idle_carriers(),
            &[carrier]
        );
        assert_eq!(
            world.resource::<SpatialGrid>().occupied_cells(Layer::Dynamic),
            1
        );
    }

    #[test]
    fn movement_advances_along_a_straight_path() {
        let mut world = bare_world();
        let carrier = spawn_carrier(&mut world, GridPos::new(0, 0));
        world.get_mut::<Travel>(carrier).unwrap().set_goal(GridPos::new(5, 0));

        // speed 1.0, dt 1.0: one cell per tick along a clear line
        world.run_system_once(carrier_movement).unwrap();
        assert_eq!(world.get::<Position>(carrier).unwrap().0, Vec2::new(1.0, 0.0));

        for _ in 0..4 {
            world.run_system_once(carrier_movement).unwrap();
        }
        assert_eq!(world.get::<Position>(carrier).unwrap().0, Vec2::new(5.0, 0.0));
        // The goal flag clears on the tick after arrival
        world.run_system_once(carrier_movement).unwrap();
        assert_eq!(world.get::<Travel>(carrier).unwrap().goal, None);
        // The dynamic footprint followed the walk
        let grid = world.resource::<SpatialGrid>();
        assert!(grid.is_free(GridPos::new(0, 0), LayerMask::All));
        assert!(!grid.is_free(GridPos::new(5, 0), LayerMask::All));
    }

    #[test]
    fn slow_carrier_takes_partial_steps() {
        let mut world = bare_world();
        let carrier = spawn_carrier(&mut world, GridPos::new(0, 0));
        world.get_mut::<Carrier>(carrier).unwrap().speed = 0.4;
        world.get_mut::<Travel>(carrier).unwrap().set_goal(GridPos::new(2, 0));

        // 0.4 of a cell per tick: the waypoint at (1,0) is crossed
        // mid-budget on the third tick
        world.run_system_once(carrier_movement).unwrap();
        assert_eq!(world.get::<Position>(carrier).unwrap().0, Vec2::new(0.4, 0.0));
        world.run_system_once(carrier_movement).unwrap();
        world.run_system_once(carrier_movement).unwrap();
        let pos = world.get::<Position>(carrier).unwrap().0;
        assert!((pos.x - 1.2).abs() < 1e-5);
        assert_eq!(pos.y, 0.0);
    }

    #[test]
    fn despawn_requeues_an_assigned_delivery() {
        let mut world = bare_world();
        let source = world.spawn_empty().id();
        let dest = world.spawn_empty().id();
        let carrier = spawn_carrier(&mut world, GridPos::new(0, 0));
        let delivery = Delivery::new(crate::logistics::Good::Wood, source, dest, 1.0, 0.0);
        world.get_mut::<Carrier>(carrier).unwrap().state = CarrierState::Assigned(delivery);
        world
            .resource_mut::<LogisticsScheduler>()
            .deregister_idle(carrier);

        despawn_carrier(&mut world, carrier);
        assert!(world.get_entity(carrier).is_err());
        assert_eq!(
            world.resource::<LogisticsScheduler>().delivery_queue(),
            &[delivery]
        );
        assert_eq!(
            world.resource::<SpatialGrid>().occupied_cells(Layer::Dynamic),
            0
        );
    }

    #[test]
    fn cancelling_an_assignment_restores_surplus_in_place() {
        use crate::logistics::Good;
        let mut world = bare_world();
        let source = world.spawn(Inventory::default()).id();
        let dest = world.spawn_empty().id();
        {
            let mut inv = world.get_mut::<Inventory>(source).unwrap();
            inv.add_stock(Good::Stone, 1);
            inv.reserve_outgoing(Good::Stone, 1);
        }
        let carrier = spawn_carrier(&mut world, GridPos::new(0, 0));
        world.get_mut::<Carrier>(carrier).unwrap().state =
            CarrierState::Assigned(Delivery::new(Good::Stone, source, dest, 2.0, 0.0));
        world
            .resource_mut::<LogisticsScheduler>()
            .deregister_idle(carrier);

        cancel_assignment(&mut world, carrier);

        // Synchronous: the unit is offerable again immediately
        assert_eq!(world.get::<Inventory>(source).unwrap().surplus(Good::Stone), 1);
        assert_eq!(
            world.get::<Carrier>(carrier).unwrap().state,
            CarrierState::Idle
        );
        let scheduler = world.resource::<LogisticsScheduler>();
        assert_eq!(scheduler.pending_orders(Good::Stone).len(), 1);
        assert!(scheduler.idle_carriers().contains(&carrier));
    }

    #[test]
    fn released_assignment_goes_back_in_the_queue() {
        use crate::logistics::Good;
        let mut world = bare_world();
        let source = world.spawn_empty().id();
        let dest = world.spawn_empty().id();
        let carrier = spawn_carrier(&mut world, GridPos::new(0, 0));
        let delivery = Delivery::new(Good::Wood, source, dest, 1.0, 0.0);
        world.get_mut::<Carrier>(carrier).unwrap().state = CarrierState::Assigned(delivery);
        world
            .resource_mut::<LogisticsScheduler>()
            .deregister_idle(carrier);

        release_assignment(&mut world, carrier);

        assert_eq!(
            world.resource::<LogisticsScheduler>().delivery_queue(),
            &[delivery]
        );
        assert_eq!(
            world.get::<Carrier>(carrier).unwrap().state,
            CarrierState::Idle
        );
    }

    #[test]
    fn lost_cargo_frees_the_destination_buffer() {
        let mut world = bare_world();
        use crate::logistics::Good;
        let source = world.spawn_empty().id();
        let dest = world.spawn(Inventory::default()).id();
        world
            .get_mut::<Inventory>(dest)
            .unwrap()
            .reserve_incoming(Good::Bread, 1);
        let carrier = spawn_carrier(&mut world, GridPos::new(0, 0));
        world.get_mut::<Carrier>(carrier).unwrap().state =
            CarrierState::Loaded(Delivery::new(Good::Bread, source, dest, 1.0, 0.0));

        despawn_carrier(&mut world, carrier);
        assert_eq!(world.get::<Inventory>(dest).unwrap().reserved(Good::Bread), 0);
    }
}
