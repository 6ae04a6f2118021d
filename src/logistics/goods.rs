//! Goods catalogue and the supply table mapping each good to the
//! building kinds allowed to offer it.

use std::collections::BTreeMap;
use std::fmt;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settlement::BuildingKind;

/// Everything that can sit in an inventory or ride on a carrier's back
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Good {
    Wood,
    Plank,
    Stone,
    Wheat,
    Flour,
    Bread,
}

impl Good {
    /// Canonical matching order; schedulers iterate this, never hash order
    pub const ALL: [Good; 6] = [
        Good::Wood,
        Good::Plank,
        Good::Stone,
        Good::Wheat,
        Good::Flour,
        Good::Bread,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Good::Wood => "wood",
            Good::Plank => "plank",
            Good::Stone => "stone",
            Good::Wheat => "wheat",
            Good::Flour => "flour",
            Good::Bread => "bread",
        }
    }
}

impl fmt::Display for Good {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static routing configuration rejected at startup
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no supplier registered for {0}")]
    NoSupplier(Good),
    #[error("duplicate supplier {kind:?} for {good}")]
    DuplicateSupplier { good: Good, kind: BuildingKind },
}

/// Which building kinds may serve as sources for each good.
///
/// Storage appears for every good: warehouses re-offer whatever has been
/// drained into them.
#[derive(Resource, Debug, Clone)]
pub struct SupplyTable {
    sources: BTreeMap<Good, Vec<BuildingKind>>,
}

impl SupplyTable {
    /// Default production chain: wood -> plank, wheat -> flour -> bread
    pub fn standard() -> Self {
        let mut sources = BTreeMap::new();
        sources.insert(Good::Wood, vec![BuildingKind::ForesterHut, BuildingKind::Storage]);
        sources.insert(Good::Plank, vec![BuildingKind::Sawmill, BuildingKind::Storage]);
        sources.insert(Good::Stone, vec![BuildingKind::Quarry, BuildingKind::Storage]);
        sources.insert(Good::Wheat, vec![BuildingKind::Farm, BuildingKind::Storage]);
        sources.insert(Good::Flour, vec![BuildingKind::Mill, BuildingKind::Storage]);
        sources.insert(Good::Bread, vec![BuildingKind::Bakery, BuildingKind::Storage]);
        Self { sources }
    }

    /// Fail-fast validation: every good has at least one supplier and no
    /// supplier is listed twice. Runs once at plugin build.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for good in Good::ALL {
            let kinds = self
                .sources
                .get(&good)
                .filter(|k| !k.is_empty())
                .ok_or(ConfigError::NoSupplier(good))?;
            for (i, kind) in kinds.iter().enumerate() {
                if kinds[..i].contains(kind) {
                    return Err(ConfigError::DuplicateSupplier { good, kind: *kind });
                }
            }
        }
        Ok(())
    }

    pub fn suppliers(&self, good: Good) -> &[BuildingKind] {
        self.sources.get(&good).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_is_valid() {
        assert_eq!(SupplyTable::standard().validate(), Ok(()));
    }

    #[test]
    fn missing_supplier_is_rejected() {
        let mut table = SupplyTable::standard();
        table.sources.remove(&Good::Bread);
        assert_eq!(table.validate(), Err(ConfigError::NoSupplier(Good::Bread)));
    }

    #[test]
    fn duplicate_supplier_is_rejected() {
        let mut table = SupplyTable::standard();
        table
            .sources
            .get_mut(&Good::Wood)
            .unwrap()
            .push(BuildingKind::Storage);
        assert_eq!(
            table.validate(),
            Err(ConfigError::DuplicateSupplier {
                good: Good::Wood,
                kind: BuildingKind::Storage,
            })
        );
    }

    #[test]
    fn storage_backs_every_good() {
        let table = SupplyTable::standard();
        for good in Good::ALL {
            assert!(table.suppliers(good).contains(&BuildingKind::Storage));
        }
    }
}
