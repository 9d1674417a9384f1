//! Per-turn reinforcement allotment from territory count and continent control.
use serde::{Deserialize, Serialize};

use crate::config::ReinforcementConfig;
use crate::ids::{ContinentId, PlayerId};
use crate::map::Continent;
use crate::store::GameStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinentBonus {
    pub continent: ContinentId,
    pub bonus: u32,
}

/// How a player's allotment was derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReinforcementBreakdown {
    pub player: PlayerId,
    pub territories: u32,
    pub base: u32,
    pub continent_bonuses: Vec<ContinentBonus>,
    pub total: u32,
}

#[must_use]
pub fn owned_territory_count<S: GameStore>(store: &S, player: &PlayerId) -> u32 {
    let count = store.territories().filter(|t| t.is_owned_by(player)).count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Continents in which `player` owns every member territory.
#[must_use]
pub fn controlled_continents<'a, S: GameStore>(
    store: &'a S,
    player: &PlayerId,
) -> Vec<&'a Continent> {
    store
        .continents()
        .iter()
        .filter(|continent| {
            !continent.territories.is_empty()
                && continent
                    .territories
                    .iter()
                    .all(|id| store.territory(id).is_some_and(|t| t.is_owned_by(player)))
        })
        .collect()
}

#[must_use]
pub fn reinforcement_breakdown<S: GameStore>(
    store: &S,
    player: &PlayerId,
    cfg: &ReinforcementConfig,
) -> ReinforcementBreakdown {
    let territories = owned_territory_count(store, player);
    let base = territories
        .checked_div(cfg.territory_divisor)
        .unwrap_or(0)
        .max(cfg.minimum);
    let continent_bonuses: Vec<ContinentBonus> = controlled_continents(store, player)
        .into_iter()
        .map(|continent| ContinentBonus {
            continent: continent.id.clone(),
            bonus: continent.bonus,
        })
        .collect();
    let total = continent_bonuses
        .iter()
        .fold(base, |acc, entry| acc.saturating_add(entry.bonus));

    ReinforcementBreakdown {
        player: player.clone(),
        territories,
        base,
        continent_bonuses,
        total,
    }
}

/// Armies `player` receives at the start of their reinforcement phase.
#[must_use]
pub fn calculate_reinforcements<S: GameStore>(
    store: &S,
    player: &PlayerId,
    cfg: &ReinforcementConfig,
) -> u32 {
    reinforcement_breakdown(store, player, cfg).total
}
