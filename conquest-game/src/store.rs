//! The single state-access capability the engine components depend on.
use serde::{Deserialize, Serialize};

use crate::ids::{PlayerId, TerritoryId};
use crate::map::Continent;
use crate::state::Territory;

/// Territory lookups and mutation plus the current player.
///
/// [`crate::state::GameState`] implements this; hosts that keep world state
/// elsewhere can implement it themselves and drive the validation, reinforcement
/// and combat components directly.
pub trait GameStore {
    fn territory(&self, id: &TerritoryId) -> Option<&Territory>;

    fn territory_mut(&mut self, id: &TerritoryId) -> Option<&mut Territory>;

    fn territories(&self) -> impl Iterator<Item = &Territory>;

    fn continents(&self) -> &[Continent];

    fn current_player(&self) -> Option<&PlayerId>;

    /// Overwrite a territory's owner and armies, returning what changed.
    fn update_territory(
        &mut self,
        id: &TerritoryId,
        owner: Option<PlayerId>,
        armies: u32,
    ) -> Option<TerritoryChange> {
        let territory = self.territory_mut(id)?;
        let change = TerritoryChange {
            territory: id.clone(),
            owner_before: territory.owner.clone(),
            owner_after: owner.clone(),
            armies_before: territory.armies,
            armies_after: armies,
        };
        territory.owner = owner;
        territory.armies = armies;
        Some(change)
    }

    /// Overwrite a territory's armies, keeping its owner.
    fn set_armies(&mut self, id: &TerritoryId, armies: u32) -> Option<TerritoryChange> {
        let owner = self.territory(id)?.owner.clone();
        self.update_territory(id, owner, armies)
    }
}

/// Delta applied to one territory by an engine operation.
///
/// Presentation layers redraw from these instead of diffing the whole state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryChange {
    pub territory: TerritoryId,
    pub owner_before: Option<PlayerId>,
    pub owner_after: Option<PlayerId>,
    pub armies_before: u32,
    pub armies_after: u32,
}

impl TerritoryChange {
    #[must_use]
    pub fn owner_changed(&self) -> bool {
        self.owner_before != self.owner_after
    }
}
