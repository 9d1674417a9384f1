//! Turn/Phase State Machine
//!
//! Drives the one-time startup placement and then the per-player cycle of
//! reinforcement, attack and fortification. The controller itself only keeps
//! the player's pending map selections; everything else lives on
//! [`GameState`].
mod clicks;
mod startup;

pub use clicks::ClickOutcome;

use serde::{Deserialize, Serialize};

use crate::config::RulesConfig;
use crate::constants::MIN_GARRISON;
use crate::error::{EngineError, SetupError};
use crate::ids::{PlayerId, TerritoryId};
use crate::reinforcement::calculate_reinforcements;
use crate::state::{GameState, Phase};
use crate::store::{GameStore, TerritoryChange};
use crate::validation::{Rejection, validate_fortify};

/// Territories the current player has picked on the map but not acted on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub attack_source: Option<TerritoryId>,
    pub fortify_source: Option<TerritoryId>,
    pub fortify_destination: Option<TerritoryId>,
}

impl Selection {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementReport {
    pub player: PlayerId,
    pub territory: TerritoryId,
    pub armies_placed: u32,
    /// Armies `player` still has to place.
    pub remaining: u32,
    /// Player in control after the placement.
    pub next_player: PlayerId,
    pub phase: Phase,
    pub startup_complete: bool,
    pub changes: Vec<TerritoryChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseChange {
    pub from: Phase,
    pub to: Phase,
    pub player: PlayerId,
    pub turn_number: u32,
    pub turn_ended: bool,
    /// Allotment granted when the change opened a reinforcement phase.
    pub reinforcements: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FortifyReport {
    pub player: PlayerId,
    pub from: TerritoryId,
    pub to: TerritoryId,
    pub armies_moved: u32,
    pub changes: Vec<TerritoryChange>,
}

/// Reset per-turn state for the current player and grant their allotment.
fn start_turn(state: &mut GameState, rules: &RulesConfig) -> u32 {
    state.phase = Phase::Reinforcement;
    state.fortification_used = false;
    let Some(player) = state.active_player().map(|p| p.id.clone()) else {
        return 0;
    };
    let allotment = calculate_reinforcements(state, &player, &rules.reinforcement);
    state.remaining_reinforcements.insert(player, allotment);
    allotment
}

fn ensure_in_play(state: &GameState) -> Result<(), EngineError> {
    match state.winner() {
        Some(winner) => Err(EngineError::GameOver {
            winner: winner.clone(),
        }),
        None => Ok(()),
    }
}

fn ensure_phase(state: &GameState, expected: Phase) -> Result<(), EngineError> {
    if state.phase == expected {
        Ok(())
    } else {
        log::warn!("{expected} action attempted during the {} phase", state.phase);
        Err(EngineError::WrongPhase {
            expected,
            actual: state.phase,
        })
    }
}

fn current_player(state: &GameState) -> Result<PlayerId, EngineError> {
    state
        .active_player()
        .map(|p| p.id.clone())
        .ok_or_else(|| Rejection::NoCurrentPlayer.into())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnController {
    selection: Selection,
}

impl TurnController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Hand out startup allotments and put the board into the startup phase.
    ///
    /// # Errors
    ///
    /// Returns an error if no allotment is configured for the seated player
    /// count.
    pub fn begin_startup(
        &mut self,
        state: &mut GameState,
        rules: &RulesConfig,
    ) -> Result<u32, SetupError> {
        let armies = startup::seed_allotments(state, &rules.startup)?;
        self.selection.clear();
        log::info!(
            "startup: {} players with {armies} armies each",
            state.players.len()
        );
        Ok(armies)
    }

    /// Place one startup army, claiming `territory` if it is unowned.
    ///
    /// # Errors
    ///
    /// Fails outside startup, on unknown or opponent-held territories, and when
    /// reinforcing is not yet allowed because territories remain unclaimed.
    pub fn place_startup_army(
        &mut self,
        state: &mut GameState,
        rules: &RulesConfig,
        territory: &TerritoryId,
    ) -> Result<PlacementReport, EngineError> {
        ensure_phase(state, Phase::Startup)?;
        let player = current_player(state)?;
        let remaining = state.remaining_for(&player);
        if remaining == 0 {
            return Err(EngineError::NoArmiesLeft { player });
        }
        let garrison = startup::check_placement(state, &rules.startup, &player, territory)?;

        let changes: Vec<TerritoryChange> = state
            .update_territory(territory, Some(player.clone()), garrison)
            .into_iter()
            .collect();
        let left = remaining - 1;
        state.remaining_reinforcements.insert(player.clone(), left);
        state.startup_visit_placements = state.startup_visit_placements.saturating_add(1);
        log::debug!("startup: {player} places on {territory} ({left} left)");

        let mut startup_complete = false;
        if startup::all_allotments_spent(state) {
            startup::complete(state, rules);
            startup_complete = true;
        } else if startup::visit_over(state, &rules.startup, &player) {
            startup::rotate(state);
        }

        Ok(PlacementReport {
            player,
            territory: territory.clone(),
            armies_placed: 1,
            remaining: left,
            next_player: current_player(state)?,
            phase: state.phase,
            startup_complete,
            changes,
        })
    }

    /// Put `count` of the current player's reinforcements on `territory`.
    ///
    /// # Errors
    ///
    /// Fails outside the reinforcement phase, on territories the player does
    /// not own, and when `count` is zero or more than remains.
    pub fn place_reinforcement(
        &mut self,
        state: &mut GameState,
        territory: &TerritoryId,
        count: u32,
    ) -> Result<PlacementReport, EngineError> {
        ensure_in_play(state)?;
        ensure_phase(state, Phase::Reinforcement)?;
        let player = current_player(state)?;
        let remaining = state.remaining_for(&player);
        if remaining == 0 {
            return Err(EngineError::NoArmiesLeft { player });
        }
        if count == 0 {
            return Err(EngineError::EmptyPlacement);
        }
        if count > remaining {
            return Err(EngineError::ExceedsAllotment {
                requested: count,
                remaining,
            });
        }
        let target = state
            .territory(territory)
            .ok_or_else(|| Rejection::UnknownTerritory {
                territory: territory.clone(),
            })?;
        if !target.is_owned_by(&player) {
            return Err(Rejection::NotOwnedByCurrentPlayer {
                territory: territory.clone(),
                player,
            }
            .into());
        }
        let garrison = target
            .armies
            .checked_add(count)
            .ok_or_else(|| EngineError::ArmyOverflow {
                territory: territory.clone(),
            })?;

        let changes: Vec<TerritoryChange> = state
            .set_armies(territory, garrison)
            .into_iter()
            .collect();
        let left = remaining - count;
        state.remaining_reinforcements.insert(player.clone(), left);
        log::debug!("{player} reinforces {territory} with {count} ({left} left)");

        Ok(PlacementReport {
            next_player: player.clone(),
            player,
            territory: territory.clone(),
            armies_placed: count,
            remaining: left,
            phase: state.phase,
            startup_complete: false,
            changes,
        })
    }

    /// Whether the current phase's completion condition holds.
    ///
    /// Placement phases need the current player's allotment spent; attack and
    /// fortification may always be left.
    #[must_use]
    pub fn can_advance_phase(&self, state: &GameState) -> bool {
        match state.phase {
            Phase::Startup => startup::all_allotments_spent(state),
            Phase::Reinforcement => state
                .active_player()
                .is_none_or(|p| state.remaining_for(&p.id) == 0),
            Phase::Attack | Phase::Fortification => true,
        }
    }

    /// Move to the next phase, ending the turn after fortification.
    ///
    /// `battle_in_flight` is the id of an open battle, if any; phases cannot
    /// change while one is open.
    ///
    /// # Errors
    ///
    /// Fails once the game is won, while a battle is open, and while armies
    /// remain to be placed.
    pub fn advance_phase(
        &mut self,
        state: &mut GameState,
        rules: &RulesConfig,
        battle_in_flight: Option<u64>,
    ) -> Result<PhaseChange, EngineError> {
        ensure_in_play(state)?;
        if let Some(id) = battle_in_flight {
            log::warn!("phase change refused: battle {id} is open");
            return Err(EngineError::BattleInProgress(id));
        }
        if !self.can_advance_phase(state) {
            let remaining = if state.phase == Phase::Startup {
                state.remaining_reinforcements.values().sum()
            } else {
                state
                    .active_player()
                    .map_or(0, |p| state.remaining_for(&p.id))
            };
            log::warn!("cannot leave {} with {remaining} armies unplaced", state.phase);
            return Err(EngineError::ArmiesRemaining {
                phase: state.phase,
                remaining,
            });
        }

        self.selection.clear();
        let from = state.phase;
        if from == Phase::Startup {
            let allotment = startup::complete(state, rules);
            return Ok(PhaseChange {
                from,
                to: state.phase,
                player: current_player(state)?,
                turn_number: state.turn_number,
                turn_ended: false,
                reinforcements: Some(allotment),
            });
        }

        let next = state
            .phase_cycle
            .iter()
            .position(|&p| p == from)
            .and_then(|idx| state.phase_cycle.get(idx + 1))
            .copied();
        if let Some(to) = next {
            state.phase = to;
            log::debug!("{from} -> {to}");
            return Ok(PhaseChange {
                from,
                to,
                player: current_player(state)?,
                turn_number: state.turn_number,
                turn_ended: false,
                reinforcements: None,
            });
        }

        let allotment = Self::end_turn(state, rules);
        Ok(PhaseChange {
            from,
            to: state.phase,
            player: current_player(state)?,
            turn_number: state.turn_number,
            turn_ended: true,
            reinforcements: Some(allotment),
        })
    }

    /// Like [`Self::advance_phase`], for optional phases only.
    ///
    /// # Errors
    ///
    /// Fails on mandatory phases, and for every reason `advance_phase` does.
    pub fn skip_phase(
        &mut self,
        state: &mut GameState,
        rules: &RulesConfig,
        battle_in_flight: Option<u64>,
    ) -> Result<PhaseChange, EngineError> {
        if !state.phase.rules().can_skip {
            log::warn!("the {} phase cannot be skipped", state.phase);
            return Err(EngineError::PhaseNotSkippable { phase: state.phase });
        }
        self.advance_phase(state, rules, battle_in_flight)
    }

    /// Pass play to the next player still holding territory.
    fn end_turn(state: &mut GameState, rules: &RulesConfig) -> u32 {
        let count = state.players.len();
        let current = state.current_player_index;
        for step in 1..=count {
            let idx = (current + step) % count;
            let holds_ground = state
                .territories
                .values()
                .any(|t| t.is_owned_by(&state.players[idx].id));
            if holds_ground {
                if current + step >= count {
                    state.turn_number = state.turn_number.saturating_add(1);
                }
                state.current_player_index = idx;
                break;
            }
        }
        let allotment = start_turn(state, rules);
        log::info!(
            "turn {}: {} to play with {allotment} reinforcements",
            state.turn_number,
            state
                .active_player()
                .map_or_else(String::new, |p| p.id.to_string())
        );
        allotment
    }

    /// Move `armies` from `from` to `to` through the player's own territory.
    ///
    /// # Errors
    ///
    /// Fails outside fortification, after this turn's move was made, when the
    /// move is not legal, or when `armies` would empty `from` or is zero.
    pub fn fortify(
        &mut self,
        state: &mut GameState,
        from: &TerritoryId,
        to: &TerritoryId,
        armies: u32,
    ) -> Result<FortifyReport, EngineError> {
        ensure_in_play(state)?;
        ensure_phase(state, Phase::Fortification)?;
        if state.fortification_used {
            return Err(EngineError::FortificationUsed);
        }
        validate_fortify(state, from, to)?;
        let (source, target) = match (state.territory(from), state.territory(to)) {
            (Some(s), Some(t)) => (s.armies, t.armies),
            _ => {
                return Err(Rejection::UnknownTerritory {
                    territory: from.clone(),
                }
                .into());
            }
        };
        let max = source.saturating_sub(MIN_GARRISON);
        if armies < 1 || armies > max {
            return Err(EngineError::InvalidTransfer {
                requested: armies,
                min: 1,
                max,
            });
        }
        let arriving = target
            .checked_add(armies)
            .ok_or_else(|| EngineError::ArmyOverflow {
                territory: to.clone(),
            })?;

        let changes: Vec<TerritoryChange> = [
            state.set_armies(from, source - armies),
            state.set_armies(to, arriving),
        ]
        .into_iter()
        .flatten()
        .collect();
        state.fortification_used = true;
        self.selection.clear();
        let player = current_player(state)?;
        log::debug!("{player} fortifies {to} from {from} with {armies}");

        Ok(FortifyReport {
            player,
            from: from.clone(),
            to: to.clone(),
            armies_moved: armies,
            changes,
        })
    }

    /// Perform the fortification picked on the map.
    ///
    /// # Errors
    ///
    /// Fails if no source and destination are selected, and for every reason
    /// [`Self::fortify`] does.
    pub fn complete_fortification(
        &mut self,
        state: &mut GameState,
        armies: u32,
    ) -> Result<FortifyReport, EngineError> {
        let (Some(from), Some(to)) = (
            self.selection.fortify_source.clone(),
            self.selection.fortify_destination.clone(),
        ) else {
            return Err(EngineError::NoFortificationSelected);
        };
        self.fortify(state, &from, &to, armies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MapData;
    use crate::state::Player;

    fn tid(id: &str) -> TerritoryId {
        TerritoryId::from(id)
    }

    fn pid(id: &str) -> PlayerId {
        PlayerId::from(id)
    }

    fn seated(count: usize) -> GameState {
        let players = ["red", "blue", "green", "gold", "grey", "pink"]
            .iter()
            .take(count)
            .map(|id| Player::new(*id, *id, ""))
            .collect();
        GameState::new(&MapData::classic(), players).unwrap()
    }

    /// A two-player board mid-game: red holds the Americas, blue the rest.
    fn in_turn(phase: Phase) -> GameState {
        let mut state = seated(2);
        let americas = ["north_america", "south_america"];
        for territory in state.territories.values_mut() {
            let owner = if americas.contains(&territory.continent.as_str()) {
                "red"
            } else {
                "blue"
            };
            territory.owner = Some(pid(owner));
            territory.armies = 2;
        }
        state.phase = phase;
        state.phase_cycle = Phase::TURN_CYCLE.to_vec();
        state.turn_number = 1;
        state
    }

    #[test]
    fn startup_rotates_one_placement_per_visit() {
        let rules = RulesConfig::default();
        let mut state = seated(3);
        let mut turn = TurnController::new();
        assert_eq!(turn.begin_startup(&mut state, &rules).unwrap(), 35);

        let report = turn
            .place_startup_army(&mut state, &rules, &tid("alaska"))
            .unwrap();
        assert_eq!(report.player, pid("red"));
        assert_eq!(report.remaining, 34);
        assert_eq!(report.next_player, pid("blue"));
        assert_eq!(state.territories[&tid("alaska")].owner, Some(pid("red")));

        assert_eq!(
            turn.place_startup_army(&mut state, &rules, &tid("alaska"))
                .unwrap_err(),
            EngineError::HeldByOpponent {
                territory: tid("alaska"),
                owner: pid("red"),
            }
        );
        turn.place_startup_army(&mut state, &rules, &tid("peru"))
            .unwrap();
        let report = turn
            .place_startup_army(&mut state, &rules, &tid("egypt"))
            .unwrap();
        assert_eq!(report.next_player, pid("red"));

        let report = turn
            .place_startup_army(&mut state, &rules, &tid("alaska"))
            .unwrap();
        assert_eq!(state.territories[&tid("alaska")].armies, 2);
        assert_eq!(report.remaining, 33);
    }

    #[test]
    fn unsupported_player_count_is_refused() {
        let mut state = seated(1);
        let err = TurnController::new()
            .begin_startup(&mut state, &RulesConfig::default())
            .unwrap_err();
        assert_eq!(err, SetupError::UnsupportedPlayerCount(1));
    }

    #[test]
    fn claim_before_reinforce_blocks_stacking() {
        let mut rules = RulesConfig::default();
        rules.startup.claim_before_reinforce = true;
        rules.startup.placements_per_visit = None;
        let mut state = seated(2);
        let mut turn = TurnController::new();
        turn.begin_startup(&mut state, &rules).unwrap();
        turn.place_startup_army(&mut state, &rules, &tid("alaska"))
            .unwrap();
        assert_eq!(
            turn.place_startup_army(&mut state, &rules, &tid("alaska"))
                .unwrap_err(),
            EngineError::MustClaimFirst {
                territory: tid("alaska"),
            }
        );
        // Whole-allotment visits keep red in control.
        assert_eq!(state.current_player(), Some(&pid("red")));
    }

    /// Plays startup with every player claiming land whenever allowed and
    /// stacking on their own ground otherwise. Returns refused claims.
    fn greedy_startup(state: &mut GameState, rules: &RulesConfig) -> usize {
        let mut turn = TurnController::new();
        turn.begin_startup(state, rules).unwrap();
        let mut refused = 0;
        for _ in 0..500 {
            if state.phase != Phase::Startup {
                break;
            }
            let player = state.current_player().cloned().unwrap();
            let unclaimed = state
                .territories
                .values()
                .find(|t| t.owner.is_none())
                .map(|t| t.id.clone());
            if let Some(target) = unclaimed {
                match turn.place_startup_army(state, rules, &target) {
                    Ok(_) => continue,
                    Err(EngineError::ClaimReserved { .. }) => refused += 1,
                    Err(err) => panic!("{player} claiming {target}: {err}"),
                }
            }
            let own = state.owned_by(&player).next().map(|t| t.id.clone());
            let own = own.unwrap_or_else(|| panic!("{player} holds nothing"));
            turn.place_startup_army(state, rules, &own).unwrap();
        }
        refused
    }

    #[test]
    fn whole_visit_startup_leaves_land_for_every_player() {
        let mut rules = RulesConfig::default();
        rules.startup.placements_per_visit = None;
        for count in [3, 4, 6] {
            let mut state = seated(count);
            let refused = greedy_startup(&mut state, &rules);
            assert!(refused > 0, "{count} players never hit a reserved claim");
            assert_eq!(state.phase, Phase::Reinforcement, "{count} players");
            assert_eq!(state.turn_number, 1);
            assert_eq!(state.unclaimed_count(), 0);
            assert_eq!(state.surviving_players().len(), count);
        }
    }

    #[test]
    fn reserved_claim_is_refused_without_changes() {
        let mut rules = RulesConfig::default();
        rules.startup.placements_per_visit = None;
        let mut state = seated(3);
        let mut turn = TurnController::new();
        turn.begin_startup(&mut state, &rules).unwrap();
        let ids: Vec<TerritoryId> = state.territories.keys().cloned().collect();
        for id in &ids[..35] {
            turn.place_startup_army(&mut state, &rules, id).unwrap();
        }
        assert_eq!(state.current_player(), Some(&pid("blue")));
        for id in &ids[35..41] {
            turn.place_startup_army(&mut state, &rules, id).unwrap();
        }
        let before = state.clone();
        assert_eq!(
            turn.place_startup_army(&mut state, &rules, &ids[41])
                .unwrap_err(),
            EngineError::ClaimReserved {
                territory: ids[41].clone(),
            }
        );
        assert_eq!(state, before);
        turn.place_startup_army(&mut state, &rules, &ids[35])
            .unwrap();
    }

    #[test]
    fn startup_completes_once_into_turn_one() {
        let mut rules = RulesConfig::default();
        rules.startup.armies_by_player_count.insert(2, 3);
        let mut state = seated(2);
        let mut turn = TurnController::new();
        turn.begin_startup(&mut state, &rules).unwrap();

        let picks = ["alaska", "peru", "alberta", "brazil", "ontario"];
        for id in picks {
            let report = turn
                .place_startup_army(&mut state, &rules, &tid(id))
                .unwrap();
            assert!(!report.startup_complete);
            assert_eq!(state.turn_number, 0);
        }
        assert!(!turn.can_advance_phase(&state));

        let report = turn
            .place_startup_army(&mut state, &rules, &tid("venezuela"))
            .unwrap();
        assert!(report.startup_complete);
        assert_eq!(report.phase, Phase::Reinforcement);
        assert_eq!(state.turn_number, 1);
        assert_eq!(state.phase_cycle, Phase::TURN_CYCLE.to_vec());
        assert_eq!(state.current_player(), Some(&pid("red")));
        assert_eq!(state.remaining_for(&pid("red")), 1);
        assert_eq!(state.remaining_for(&pid("blue")), 0);

        assert!(matches!(
            turn.place_startup_army(&mut state, &rules, &tid("egypt")),
            Err(EngineError::WrongPhase { .. })
        ));
    }

    #[test]
    fn reinforcement_must_be_spent_before_attacking() {
        let rules = RulesConfig::default();
        let mut state = in_turn(Phase::Reinforcement);
        state.remaining_reinforcements.insert(pid("red"), 5);
        let mut turn = TurnController::new();

        assert!(!turn.can_advance_phase(&state));
        assert_eq!(
            turn.advance_phase(&mut state, &rules, None).unwrap_err(),
            EngineError::ArmiesRemaining {
                phase: Phase::Reinforcement,
                remaining: 5,
            }
        );
        assert!(matches!(
            turn.skip_phase(&mut state, &rules, None),
            Err(EngineError::PhaseNotSkippable { .. })
        ));
        assert_eq!(
            turn.place_reinforcement(&mut state, &tid("peru"), 6)
                .unwrap_err(),
            EngineError::ExceedsAllotment {
                requested: 6,
                remaining: 5,
            }
        );
        assert_eq!(
            turn.place_reinforcement(&mut state, &tid("peru"), 0)
                .unwrap_err(),
            EngineError::EmptyPlacement
        );
        assert!(matches!(
            turn.place_reinforcement(&mut state, &tid("egypt"), 1),
            Err(EngineError::Rejected(Rejection::NotOwnedByCurrentPlayer { .. }))
        ));

        let report = turn
            .place_reinforcement(&mut state, &tid("peru"), 5)
            .unwrap();
        assert_eq!(report.remaining, 0);
        assert_eq!(state.territories[&tid("peru")].armies, 7);

        let change = turn.advance_phase(&mut state, &rules, None).unwrap();
        assert_eq!((change.from, change.to), (Phase::Reinforcement, Phase::Attack));
        assert!(!change.turn_ended);
    }

    #[test]
    fn oversized_garrisons_do_not_wrap() {
        let mut state = in_turn(Phase::Reinforcement);
        state.remaining_reinforcements.insert(pid("red"), 5);
        state.territory_mut(&tid("alaska")).unwrap().armies = u32::MAX;
        let before = state.clone();
        let mut turn = TurnController::new();
        assert_eq!(
            turn.place_reinforcement(&mut state, &tid("alaska"), 1)
                .unwrap_err(),
            EngineError::ArmyOverflow {
                territory: tid("alaska"),
            }
        );
        assert_eq!(state, before);

        state.phase = Phase::Fortification;
        state.remaining_reinforcements.insert(pid("red"), 0);
        state.territory_mut(&tid("alberta")).unwrap().armies = 3;
        assert_eq!(
            turn.fortify(&mut state, &tid("alberta"), &tid("alaska"), 2)
                .unwrap_err(),
            EngineError::ArmyOverflow {
                territory: tid("alaska"),
            }
        );
        assert!(!state.fortification_used);
    }

    #[test]
    fn open_battle_blocks_phase_change() {
        let rules = RulesConfig::default();
        let mut state = in_turn(Phase::Attack);
        let mut turn = TurnController::new();
        assert_eq!(
            turn.advance_phase(&mut state, &rules, Some(4)).unwrap_err(),
            EngineError::BattleInProgress(4)
        );
        assert_eq!(state.phase, Phase::Attack);
    }

    #[test]
    fn turn_ends_after_fortification_and_wraps() {
        let rules = RulesConfig::default();
        let mut state = in_turn(Phase::Attack);
        let mut turn = TurnController::new();

        let change = turn.skip_phase(&mut state, &rules, None).unwrap();
        assert_eq!(change.to, Phase::Fortification);

        let change = turn.skip_phase(&mut state, &rules, None).unwrap();
        assert!(change.turn_ended);
        assert_eq!(change.player, pid("blue"));
        assert_eq!(change.to, Phase::Reinforcement);
        assert_eq!(change.turn_number, 1);
        // 29 territories: 9 base, plus Europe 5, Africa 3, Asia 7, Australia 2.
        assert_eq!(change.reinforcements, Some(26));
        assert_eq!(state.remaining_for(&pid("blue")), 26);

        state.remaining_reinforcements.insert(pid("blue"), 0);
        turn.advance_phase(&mut state, &rules, None).unwrap();
        turn.advance_phase(&mut state, &rules, None).unwrap();
        let change = turn.advance_phase(&mut state, &rules, None).unwrap();
        assert_eq!(change.player, pid("red"));
        assert_eq!(change.turn_number, 2);
        // 13 territories: 4 base, plus North America 5 and South America 2.
        assert_eq!(change.reinforcements, Some(11));
    }

    #[test]
    fn eliminated_players_are_skipped() {
        let rules = RulesConfig::default();
        let mut state = seated(3);
        for territory in state.territories.values_mut() {
            territory.owner = Some(pid(if territory.id.as_str() == "peru" {
                "green"
            } else {
                "red"
            }));
            territory.armies = 1;
        }
        state.phase = Phase::Fortification;
        state.phase_cycle = Phase::TURN_CYCLE.to_vec();
        state.turn_number = 3;

        let change = TurnController::new()
            .advance_phase(&mut state, &rules, None)
            .unwrap();
        assert_eq!(change.player, pid("green"));
        assert_eq!(change.turn_number, 3);
    }

    #[test]
    fn fortify_once_per_turn_through_owned_land() {
        let mut state = in_turn(Phase::Fortification);
        state.set_armies(&tid("alaska"), 6);
        let mut turn = TurnController::new();

        assert_eq!(
            turn.fortify(&mut state, &tid("alaska"), &tid("argentina"), 6)
                .unwrap_err(),
            EngineError::InvalidTransfer {
                requested: 6,
                min: 1,
                max: 5,
            }
        );
        let report = turn
            .fortify(&mut state, &tid("alaska"), &tid("argentina"), 5)
            .unwrap();
        assert_eq!(report.changes.len(), 2);
        assert_eq!(state.territories[&tid("alaska")].armies, 1);
        assert_eq!(state.territories[&tid("argentina")].armies, 7);

        assert_eq!(
            turn.fortify(&mut state, &tid("argentina"), &tid("peru"), 1)
                .unwrap_err(),
            EngineError::FortificationUsed
        );
    }

    #[test]
    fn fortify_cannot_cross_enemy_ground() {
        let mut state = in_turn(Phase::Fortification);
        state.update_territory(&tid("central_america"), Some(pid("blue")), 2);
        let err = TurnController::new()
            .fortify(&mut state, &tid("alaska"), &tid("argentina"), 1)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Rejected(Rejection::NotConnected { .. })
        ));
        assert!(!state.fortification_used);
    }

    #[test]
    fn won_game_rejects_turn_actions() {
        let rules = RulesConfig::default();
        let mut state = in_turn(Phase::Attack);
        for territory in state.territories.values_mut() {
            territory.owner = Some(pid("red"));
        }
        assert_eq!(
            TurnController::new()
                .advance_phase(&mut state, &rules, None)
                .unwrap_err(),
            EngineError::GameOver { winner: pid("red") }
        );
    }
}
