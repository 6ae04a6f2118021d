//! Simulation constants and tuning values
//!
//! This module centralizes all magic numbers used throughout the simulation core.

// ============================================================================
// CLOCK
// ============================================================================

/// Simulated seconds advanced by one tick unless the embedder overrides it
pub const DEFAULT_TICK_SECONDS: f64 = 1.0;

// ============================================================================
// PATHFINDING
// ============================================================================

/// Wavefront expansion cap: rings expanded before the search gives up.
/// Bounds per-tick cost when the goal is unreachable or very far away.
pub const MAX_WAVE_DISTANCE: u32 = 1_000;

/// Perpendicular offset applied to obstacle contact points so the bypass
/// waypoint always rounds into the next grid cell (sqrt(2) < 1.45 < 1.5).
pub const CONTACT_CLEARANCE: f32 = 1.45;

/// Default search radius for `nearest_free`
pub const NEAR_FREE_RADIUS: i32 = 5;

// ============================================================================
// LOGISTICS
// ============================================================================

/// Effective priority gained per simulated second while an order or
/// delivery waits in a queue. Guarantees eventual service.
pub const PRIORITY_DECAY_PER_SECOND: f32 = 0.1;

/// Priority assigned to proactive surplus drains toward storage
pub const STORAGE_DRAIN_PRIORITY: f32 = 1.0;

// ============================================================================
// CARRIERS
// ============================================================================

/// Carrier walking speed in cells per simulated second
pub const CARRIER_SPEED: f32 = 1.0;

/// Distance at which a carrier is considered to have reached a door
pub const ENTER_DISTANCE: f32 = 0.1;
