//! Domain messages emitted by the simulation for observers (UI layers,
//! tests, logging). The core never reads its own messages except for
//! [`BuildingRemoved`], which drives scheduler cleanup.

use bevy::prelude::*;

use crate::logistics::{Delivery, Good};
use crate::settlement::BuildingKind;

/// A building queued a standing request for one unit of a good
#[derive(Message, Debug, Clone, Copy)]
pub struct OrderBooked {
    pub good: Good,
    pub requester: Entity,
    pub base_priority: f32,
}

/// A carrier finished a dropoff
#[derive(Message, Debug, Clone, Copy)]
pub struct DeliveryCompleted {
    pub delivery: Delivery,
    pub carrier: Entity,
}

/// A building left the world (demolition). Sent the same tick the entity
/// despawns and its footprint clears.
#[derive(Message, Debug, Clone, Copy)]
pub struct BuildingRemoved {
    pub building: Entity,
    pub kind: BuildingKind,
}
