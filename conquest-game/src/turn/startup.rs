//! Initial placement: players take turns dropping single armies until every
//! startup allotment is spent.
use crate::config::{RulesConfig, StartupConfig};
use crate::error::{EngineError, SetupError};
use crate::ids::{PlayerId, TerritoryId};
use crate::state::{GameState, Phase};
use crate::store::GameStore;
use crate::validation::Rejection;

/// Seat every player with their startup allotment and hand control to the
/// first player.
pub(super) fn seed_allotments(
    state: &mut GameState,
    cfg: &StartupConfig,
) -> Result<u32, SetupError> {
    let armies = cfg
        .armies_for(state.players.len())
        .ok_or(SetupError::UnsupportedPlayerCount(state.players.len()))?;
    state.remaining_reinforcements = state
        .players
        .iter()
        .map(|p| (p.id.clone(), armies))
        .collect();
    state.phase = Phase::Startup;
    state.phase_cycle = vec![Phase::Startup];
    state.current_player_index = 0;
    state.turn_number = 0;
    state.startup_visit_placements = 0;
    state.fortification_used = false;
    Ok(armies)
}

/// Check a startup placement on `territory` for `player` without applying it.
///
/// Returns the garrison the territory would hold afterwards.
pub(super) fn check_placement(
    state: &GameState,
    cfg: &StartupConfig,
    player: &PlayerId,
    territory: &TerritoryId,
) -> Result<u32, EngineError> {
    let target = state
        .territory(territory)
        .ok_or_else(|| Rejection::UnknownTerritory {
            territory: territory.clone(),
        })?;
    let claimable = state.claimable_count(player);
    match &target.owner {
        Some(owner) if owner != player => Err(EngineError::HeldByOpponent {
            territory: territory.clone(),
            owner: owner.clone(),
        }),
        Some(_) if cfg.claim_before_reinforce && claimable > 0 => {
            Err(EngineError::MustClaimFirst {
                territory: territory.clone(),
            })
        }
        None if claimable == 0 => Err(EngineError::ClaimReserved {
            territory: territory.clone(),
        }),
        _ => target
            .armies
            .checked_add(1)
            .ok_or_else(|| EngineError::ArmyOverflow {
                territory: territory.clone(),
            }),
    }
}

pub(super) fn all_allotments_spent(state: &GameState) -> bool {
    state.remaining_reinforcements.values().all(|&n| n == 0)
}

/// Pass control to the next player that still has armies to place.
///
/// Returns `false` when nobody does.
pub(super) fn rotate(state: &mut GameState) -> bool {
    let count = state.players.len();
    for step in 1..=count {
        let idx = (state.current_player_index + step) % count;
        if state.remaining_for(&state.players[idx].id) > 0 {
            state.current_player_index = idx;
            state.startup_visit_placements = 0;
            return true;
        }
    }
    false
}

/// Whether the current player has used up this visit.
pub(super) fn visit_over(state: &GameState, cfg: &StartupConfig, player: &PlayerId) -> bool {
    if state.remaining_for(player) == 0 {
        return true;
    }
    cfg.placements_per_visit
        .is_some_and(|limit| state.startup_visit_placements >= limit)
}

/// One-time switch from startup into regular turns.
///
/// Returns the first player's turn-one allotment.
pub(super) fn complete(state: &mut GameState, rules: &RulesConfig) -> u32 {
    for remaining in state.remaining_reinforcements.values_mut() {
        *remaining = 0;
    }
    state.turn_number = 1;
    state.phase_cycle = Phase::TURN_CYCLE.to_vec();
    state.startup_visit_placements = 0;
    state.current_player_index = state
        .players
        .iter()
        .position(|p| state.territories.values().any(|t| t.is_owned_by(&p.id)))
        .unwrap_or(0);
    let allotment = super::start_turn(state, rules);
    log::info!(
        "startup complete; turn 1 begins with {} placing {allotment}",
        state
            .active_player()
            .map_or_else(String::new, |p| p.id.to_string())
    );
    allotment
}

