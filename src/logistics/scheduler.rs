//! Order booking, priority-decayed matching, and carrier dispatch.
//!
//! Orders age: an order's effective priority is its base priority plus
//! `decay_rate` per simulated second since booking, so a cheap request
//! can never starve behind a steady stream of expensive ones.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use bevy::prelude::*;

use crate::constants::{PRIORITY_DECAY_PER_SECOND, STORAGE_DRAIN_PRIORITY};
use crate::grid::Position;
use crate::messages::BuildingRemoved;
use crate::settlement::{Building, BuildingKind, Carrier, CarrierState};
use crate::tick::SimClock;

use super::goods::{Good, SupplyTable};
use super::inventory::Inventory;

/// A building's standing request for one unit of a good
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingOrder {
    pub good: Good,
    pub requester: Entity,
    pub base_priority: f32,
    pub booked_at: f64,
}

impl PendingOrder {
    pub fn effective_priority(&self, now: f64, decay_rate: f32) -> f32 {
        self.base_priority + decay_rate * (now - self.booked_at) as f32
    }
}

/// A matched promise: one unit of `good` moves from `source` to `dest`.
///
/// The source's outgoing reservation is taken the moment the delivery is
/// created and held until pickup or cancellation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delivery {
    pub good: Good,
    pub source: Entity,
    pub dest: Entity,
    pub priority: f32,
    pub created_at: f64,
}

impl Delivery {
    pub fn new(good: Good, source: Entity, dest: Entity, priority: f32, created_at: f64) -> Self {
        assert_ne!(source, dest, "delivery of {good} from a building to itself");
        Self {
            good,
            source,
            dest,
            priority,
            created_at,
        }
    }

    /// Queued deliveries age the same way orders do
    pub fn effective_priority(&self, now: f64, decay_rate: f32) -> f32 {
        self.priority + decay_rate * (now - self.created_at) as f32
    }
}

#[derive(Resource, Debug)]
pub struct LogisticsScheduler {
    pub decay_rate: f32,
    orders: BTreeMap<Good, Vec<PendingOrder>>,
    queue: Vec<Delivery>,
    idle_carriers: Vec<Entity>,
}

impl Default for LogisticsScheduler {
    fn default() -> Self {
        Self {
            decay_rate: PRIORITY_DECAY_PER_SECOND,
            orders: BTreeMap::new(),
            queue: Vec::new(),
            idle_carriers: Vec::new(),
        }
    }
}

impl LogisticsScheduler {
    /// Queue a standing request. Ledger-neutral: the requester's incoming
    /// reservation is the caller's business.
    pub fn book_order(&mut self, good: Good, requester: Entity, base_priority: f32, now: f64) {
        self.orders.entry(good).or_default().push(PendingOrder {
            good,
            requester,
            base_priority,
            booked_at: now,
        });
    }

    pub fn pending_orders(&self, good: Good) -> &[PendingOrder] {
        self.orders.get(&good).map_or(&[], Vec::as_slice)
    }

    pub fn delivery_queue(&self) -> &[Delivery] {
        &self.queue
    }

    pub fn idle_carriers(&self) -> &[Entity] {
        &self.idle_carriers
    }

    pub fn register_idle(&mut self, carrier: Entity) {
        if !self.idle_carriers.contains(&carrier) {
            self.idle_carriers.push(carrier);
        }
    }

    pub fn deregister_idle(&mut self, carrier: Entity) {
        self.idle_carriers.retain(|c| *c != carrier);
    }

    /// Put an already-promised delivery back in the queue (its carrier
    /// went away before pickup). The queue is re-sorted on the next
    /// matching pass.
    pub fn requeue_delivery(&mut self, delivery: Delivery) {
        self.queue.push(delivery);
    }

    /// Abandon a not-yet-loaded promise entirely: the unit returns to the
    /// source's offerable pool and the requester's order goes back on the
    /// book, carrying the delivery's priority as its new base. The
    /// requester's incoming reservation was taken at the original booking
    /// and still holds, so re-booking must not reserve again.
    pub fn cancel_delivery(
        &mut self,
        delivery: Delivery,
        source_inventory: &mut Inventory,
        now: f64,
    ) {
        if let Some(i) = self.queue.iter().position(|d| *d == delivery) {
            self.queue.remove(i);
        }
        source_inventory.release_outgoing(delivery.good, 1);
        self.book_order(delivery.good, delivery.dest, delivery.priority, now);
    }

    fn sorted_orders(&mut self, good: Good, now: f64) -> Vec<PendingOrder> {
        let decay = self.decay_rate;
        let mut orders = self.orders.remove(&good).unwrap_or_default();
        // Stable sort: equal priorities keep booking order
        orders.sort_by(|a, b| {
            b.effective_priority(now, decay)
                .partial_cmp(&a.effective_priority(now, decay))
                .unwrap_or(Ordering::Equal)
        });
        orders
    }
}

fn sort_queue(queue: &mut [Delivery], now: f64, decay_rate: f32) {
    queue.sort_by(|a, b| {
        b.effective_priority(now, decay_rate)
            .partial_cmp(&a.effective_priority(now, decay_rate))
            .unwrap_or(Ordering::Equal)
    });
}

/// Match pending orders to supplier surplus, then drain unclaimed
/// producer surplus toward storage.
///
/// Candidates are collected and sorted by entity before matching, so the
/// outcome never depends on query iteration order. Each order goes to the
/// Euclidean-nearest supplier with surplus left, ties toward the lower
/// entity id.
pub fn match_deliveries(
    clock: Res<SimClock>,
    table: Res<SupplyTable>,
    mut scheduler: ResMut<LogisticsScheduler>,
    mut buildings: Query<(Entity, &Building, &Position, &mut Inventory)>,
) {
    let now = clock.now;
    let decay = scheduler.decay_rate;

    for good in Good::ALL {
        let supplier_kinds = table.suppliers(good);

        // (entity, position, offerable units, kind), entity-sorted
        let mut candidates: Vec<(Entity, Vec2, u32, BuildingKind)> = buildings
            .iter()
            .filter(|(_, b, _, _)| supplier_kinds.contains(&b.kind))
            .map(|(e, b, p, inv)| (e, p.0, inv.surplus(good), b.kind))
            .filter(|(_, _, surplus, _)| *surplus > 0)
            .collect();
        candidates.sort_by_key(|(e, _, _, _)| *e);

        let orders = scheduler.sorted_orders(good, now);
        let mut unmatched = Vec::new();
        for order in orders {
            let Ok((_, _, req_pos, _)) = buildings.get(order.requester) else {
                // Requester vanished since booking; the order dies with it
                continue;
            };
            let req_pos = req_pos.0;
            let best = candidates
                .iter_mut()
                .filter(|(e, _, surplus, _)| *surplus > 0 && *e != order.requester)
                .min_by(|a, b| {
                    req_pos
                        .distance(a.1)
                        .partial_cmp(&req_pos.distance(b.1))
                        .unwrap_or(Ordering::Equal)
                        .then(a.0.cmp(&b.0))
                });
            match best {
                Some((source, _, surplus, _)) => {
                    *surplus -= 1;
                    let source = *source;
                    if let Ok((_, _, _, mut inv)) = buildings.get_mut(source) {
                        inv.reserve_outgoing(good, 1);
                    }
                    scheduler.queue.push(Delivery::new(
                        good,
                        source,
                        order.requester,
                        order.effective_priority(now, decay),
                        now,
                    ));
                }
                None => unmatched.push(order),
            }
        }
        if !unmatched.is_empty() {
            scheduler.orders.insert(good, unmatched);
        }

        // Producers push what nobody asked for into the nearest warehouse
        let storages: Vec<(Entity, Vec2)> = {
            let mut s: Vec<(Entity, Vec2)> = buildings
                .iter()
                .filter(|(_, b, _, _)| b.kind == BuildingKind::Storage)
                .map(|(e, _, p, _)| (e, p.0))
                .collect();
            s.sort_by_key(|(e, _)| *e);
            s
        };
        if storages.is_empty() {
            continue;
        }
        for (source, pos, surplus, kind) in &mut candidates {
            if *kind == BuildingKind::Storage || *surplus == 0 {
                continue;
            }
            let Some((store, _)) = storages
                .iter()
                .filter(|(e, _)| *e != *source)
                .min_by(|a, b| {
                    pos.distance(a.1)
                        .partial_cmp(&pos.distance(b.1))
                        .unwrap_or(Ordering::Equal)
                        .then(a.0.cmp(&b.0))
                })
                .copied()
            else {
                continue;
            };
            let amount = *surplus;
            *surplus = 0;
            if let Ok((_, _, _, mut inv)) = buildings.get_mut(*source) {
                inv.reserve_outgoing(good, amount);
            }
            if let Ok((_, _, _, mut inv)) = buildings.get_mut(store) {
                inv.reserve_incoming(good, amount);
            }
            for _ in 0..amount {
                scheduler
                    .queue
                    .push(Delivery::new(good, *source, store, STORAGE_DRAIN_PRIORITY, now));
            }
        }
    }

    sort_queue(&mut scheduler.queue, now, decay);
}

/// Hand queued deliveries to idle carriers, highest priority first.
/// Each delivery goes to the idle carrier nearest the pickup point.
pub fn dispatch_deliveries(
    clock: Res<SimClock>,
    mut scheduler: ResMut<LogisticsScheduler>,
    buildings: Query<(&Building, &Position), Without<Carrier>>,
    mut carriers: Query<(Entity, &Position, &mut Carrier)>,
    mut inventories: Query<&mut Inventory>,
) {
    let mut remaining = Vec::new();
    let queue = std::mem::take(&mut scheduler.queue);
    for delivery in queue {
        if scheduler.idle_carriers.is_empty() {
            remaining.push(delivery);
            continue;
        }
        let Ok((_, src_pos)) = buildings.get(delivery.source) else {
            // The requester's incoming reservation still stands; put the
            // order back so a new supplier can be matched to it
            warn!("re-booking {} delivery from vanished source", delivery.good);
            scheduler.book_order(delivery.good, delivery.dest, delivery.priority, clock.now);
            continue;
        };
        if buildings.get(delivery.dest).is_err() {
            if let Ok(mut inv) = inventories.get_mut(delivery.source) {
                inv.release_outgoing(delivery.good, 1);
            }
            continue;
        }
        let src_pos = src_pos.0;
        let best = scheduler
            .idle_carriers
            .iter()
            .filter_map(|e| carriers.get(*e).ok().map(|(e, p, _)| (e, p.0)))
            .min_by(|a, b| {
                src_pos
                    .distance(a.1)
                    .partial_cmp(&src_pos.distance(b.1))
                    .unwrap_or(Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
        let Some((chosen, _)) = best else {
            remaining.push(delivery);
            continue;
        };
        scheduler.deregister_idle(chosen);
        if let Ok((_, _, mut carrier)) = carriers.get_mut(chosen) {
            carrier.state = CarrierState::Assigned(delivery);
        }
    }
    scheduler.queue = remaining;
}

/// Unwind the scheduler's view of a demolished building: its own orders
/// die, deliveries it would have received release the source's promise,
/// and deliveries it would have sent are re-booked by their requesters.
pub fn purge_removed_buildings(
    mut removed: MessageReader<BuildingRemoved>,
    clock: Res<SimClock>,
    mut scheduler: ResMut<LogisticsScheduler>,
    mut inventories: Query<&mut Inventory>,
) {
    for msg in removed.read() {
        let gone = msg.building;
        for orders in scheduler.orders.values_mut() {
            orders.retain(|o| o.requester != gone);
        }
        let queue = std::mem::take(&mut scheduler.queue);
        for d in queue {
            if d.source == gone {
                // The requester's incoming reservation still stands, so the
                // re-booked order must not reserve again
                scheduler.book_order(d.good, d.dest, d.priority, clock.now);
            } else if d.dest == gone {
                if let Ok(mut inv) = inventories.get_mut(d.source) {
                    inv.release_outgoing(d.good, 1);
                }
            } else {
                scheduler.queue.push(d);
            }
        }
        let decay = scheduler.decay_rate;
        sort_queue(&mut scheduler.queue, clock.now, decay);
    }
}
