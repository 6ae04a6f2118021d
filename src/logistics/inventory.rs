//! Two-ledger building inventory.
//!
//! `actual` counts goods physically on the shelf. `reserved` is the
//! promise-adjusted ledger: it rises when an incoming delivery is booked
//! or stock arrives, and falls when an outgoing delivery is promised or an
//! input is consumed. Matching only ever offers `min(actual, reserved)`,
//! so a unit that is merely promised to us, or already promised away,
//! cannot be promised twice.

use std::collections::BTreeMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::goods::Good;

#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    actual: BTreeMap<Good, u32>,
    reserved: BTreeMap<Good, u32>,
}

impl Inventory {
    /// Physical stock on the shelf
    pub fn actual(&self, good: Good) -> u32 {
        self.actual.get(&good).copied().unwrap_or(0)
    }

    /// Promise-adjusted stock
    pub fn reserved(&self, good: Good) -> u32 {
        self.reserved.get(&good).copied().unwrap_or(0)
    }

    /// Units that may be offered to the matcher right now
    pub fn surplus(&self, good: Good) -> u32 {
        self.actual(good).min(self.reserved(good))
    }

    /// Stock appearing from nowhere (production, initial seeding).
    /// Raises both ledgers.
    pub fn add_stock(&mut self, good: Good, amount: u32) {
        *self.actual.entry(good).or_insert(0) += amount;
        *self.reserved.entry(good).or_insert(0) += amount;
    }

    /// A delivery headed our way was booked; count it as promised-in
    pub fn reserve_incoming(&mut self, good: Good, amount: u32) {
        *self.reserved.entry(good).or_insert(0) += amount;
    }

    /// A delivery from our shelf was promised; the unit is no longer
    /// offerable even though it has not been picked up yet
    pub fn reserve_outgoing(&mut self, good: Good, amount: u32) {
        let r = self.reserved.entry(good).or_insert(0);
        assert!(
            *r >= amount,
            "outgoing reservation of {amount} {good} exceeds reserved ledger {r}"
        );
        *r -= amount;
    }

    /// An outgoing promise was cancelled before pickup
    pub fn release_outgoing(&mut self, good: Good, amount: u32) {
        *self.reserved.entry(good).or_insert(0) += amount;
    }

    /// An incoming promise will never arrive (cargo lost in transit).
    /// Frees the buffer slot so the good can be re-ordered.
    pub fn cancel_incoming(&mut self, good: Good, amount: u32) {
        let r = self.reserved.entry(good).or_insert(0);
        assert!(
            *r >= amount,
            "cancelling {amount} incoming {good} against reserved ledger {r}"
        );
        *r -= amount;
    }

    /// A carrier physically takes a unit off the shelf
    pub fn commit_pickup(&mut self, good: Good, amount: u32) {
        let a = self.actual.entry(good).or_insert(0);
        assert!(*a >= amount, "pickup of {amount} {good} from actual stock {a}");
        *a -= amount;
    }

    /// A carrier physically drops a unit on the shelf. The matching
    /// incoming reservation was taken at booking time, so only `actual`
    /// moves here.
    pub fn commit_dropoff(&mut self, good: Good, amount: u32) {
        *self.actual.entry(good).or_insert(0) += amount;
    }

    /// Production eats an input: gone from the shelf and from the ledger
    pub fn consume_input(&mut self, good: Good, amount: u32) {
        let a = self.actual.entry(good).or_insert(0);
        assert!(*a >= amount, "consuming {amount} {good} from actual stock {a}");
        *a -= amount;
        let r = self.reserved.entry(good).or_insert(0);
        assert!(*r >= amount, "consuming {amount} {good} from reserved ledger {r}");
        *r -= amount;
    }
}
