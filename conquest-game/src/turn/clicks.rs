//! Map click dispatch: one entry point that does whatever a click on a
//! territory means in the current phase.
use serde::{Deserialize, Serialize};

use super::{PlacementReport, TurnController, current_player, ensure_in_play};
use crate::clock::Clock;
use crate::combat::{BattleStatus, CombatEngine, CombatView};
use crate::config::RulesConfig;
use crate::constants::{MIN_ATTACK_ARMIES, MIN_GARRISON};
use crate::error::EngineError;
use crate::ids::TerritoryId;
use crate::state::{GameState, Phase};
use crate::store::GameStore;
use crate::validation::{
    Rejection, fortify_destinations, valid_attack_targets, validate_fortify,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClickOutcome {
    Placed(PlacementReport),
    AttackSourceSelected {
        territory: TerritoryId,
        targets: Vec<TerritoryId>,
    },
    AttackSourceCleared {
        territory: TerritoryId,
    },
    CombatStarted(CombatView),
    FortifySourceSelected {
        territory: TerritoryId,
        destinations: Vec<TerritoryId>,
    },
    FortifySourceCleared {
        territory: TerritoryId,
    },
    FortifyDestinationSelected {
        from: TerritoryId,
        to: TerritoryId,
        max_armies: u32,
    },
}

impl TurnController {
    /// Act on a click on `territory`.
    ///
    /// Startup and reinforcement place one army. In the attack phase the
    /// first click picks a source and the next click on an enemy neighbor
    /// opens a battle. In fortification the first click picks a source and the
    /// next picks a destination; [`Self::complete_fortification`] then moves
    /// the armies.
    ///
    /// # Errors
    ///
    /// Fails with whatever rule the click would break; the selection is left
    /// as it was.
    pub fn handle_territory_click<C: Clock>(
        &mut self,
        state: &mut GameState,
        rules: &RulesConfig,
        combat: &mut CombatEngine<C>,
        territory: &TerritoryId,
    ) -> Result<ClickOutcome, EngineError> {
        ensure_in_play(state)?;
        match state.phase {
            Phase::Startup => self
                .place_startup_army(state, rules, territory)
                .map(ClickOutcome::Placed),
            Phase::Reinforcement => self
                .place_reinforcement(state, territory, 1)
                .map(ClickOutcome::Placed),
            Phase::Attack => self.attack_click(state, combat, territory),
            Phase::Fortification => self.fortify_click(state, territory),
        }
    }

    fn attack_click<C: Clock>(
        &mut self,
        state: &GameState,
        combat: &mut CombatEngine<C>,
        territory: &TerritoryId,
    ) -> Result<ClickOutcome, EngineError> {
        if let Some(battle) = combat.current_battle() {
            return Err(match battle.status {
                BattleStatus::Conquest => EngineError::ConquestPending(battle.id),
                _ => EngineError::BattleInProgress(battle.id),
            });
        }
        let player = current_player(state)?;
        let clicked = state
            .territory(territory)
            .ok_or_else(|| Rejection::UnknownTerritory {
                territory: territory.clone(),
            })?;

        match self.selection.attack_source.clone() {
            Some(source) if &source == territory => {
                self.selection.attack_source = None;
                Ok(ClickOutcome::AttackSourceCleared { territory: source })
            }
            Some(source) if !clicked.is_owned_by(&player) => {
                let view = combat.initiate_combat(state, &source, territory)?;
                self.selection.attack_source = None;
                Ok(ClickOutcome::CombatStarted(view))
            }
            _ => {
                if !clicked.is_owned_by(&player) {
                    return Err(EngineError::NoSourceSelected);
                }
                if clicked.armies < MIN_ATTACK_ARMIES {
                    return Err(Rejection::TooFewArmiesToAttack {
                        territory: territory.clone(),
                        armies: clicked.armies,
                    }
                    .into());
                }
                self.selection.attack_source = Some(territory.clone());
                Ok(ClickOutcome::AttackSourceSelected {
                    territory: territory.clone(),
                    targets: valid_attack_targets(state, territory),
                })
            }
        }
    }

    fn fortify_click(
        &mut self,
        state: &GameState,
        territory: &TerritoryId,
    ) -> Result<ClickOutcome, EngineError> {
        if state.fortification_used {
            return Err(EngineError::FortificationUsed);
        }
        let player = current_player(state)?;
        let clicked = state
            .territory(territory)
            .ok_or_else(|| Rejection::UnknownTerritory {
                territory: territory.clone(),
            })?;

        match self.selection.fortify_source.clone() {
            Some(source) if &source == territory => {
                self.selection.fortify_source = None;
                self.selection.fortify_destination = None;
                Ok(ClickOutcome::FortifySourceCleared { territory: source })
            }
            Some(source) => {
                validate_fortify(state, &source, territory)?;
                let max_armies = state
                    .territory(&source)
                    .map_or(0, |t| t.armies.saturating_sub(MIN_GARRISON));
                self.selection.fortify_destination = Some(territory.clone());
                Ok(ClickOutcome::FortifyDestinationSelected {
                    from: source,
                    to: territory.clone(),
                    max_armies,
                })
            }
            None => {
                if !clicked.is_owned_by(&player) {
                    return Err(Rejection::NotOwnedByCurrentPlayer {
                        territory: territory.clone(),
                        player,
                    }
                    .into());
                }
                if clicked.armies <= MIN_GARRISON {
                    return Err(Rejection::MustKeepOneArmy {
                        territory: territory.clone(),
                        armies: clicked.armies,
                    }
                    .into());
                }
                self.selection.fortify_source = Some(territory.clone());
                self.selection.fortify_destination = None;
                Ok(ClickOutcome::FortifySourceSelected {
                    territory: territory.clone(),
                    destinations: fortify_destinations(state, territory),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SteppingClock;
    use crate::ids::PlayerId;
    use crate::map::MapData;
    use crate::state::Player;

    fn tid(id: &str) -> TerritoryId {
        TerritoryId::from(id)
    }

    fn board(phase: Phase) -> GameState {
        let mut state = GameState::new(
            &MapData::classic(),
            vec![Player::new("red", "Red", ""), Player::new("blue", "Blue", "")],
        )
        .unwrap();
        for territory in state.territories.values_mut() {
            territory.owner = Some(PlayerId::from("blue"));
            territory.armies = 1;
        }
        for id in ["alaska", "alberta", "northwest_territory"] {
            state.update_territory(&tid(id), Some(PlayerId::from("red")), 3);
        }
        state.phase = phase;
        state.phase_cycle = Phase::TURN_CYCLE.to_vec();
        state.turn_number = 1;
        state
    }

    fn combat() -> CombatEngine<SteppingClock> {
        CombatEngine::with_clock(SteppingClock::from_epoch(10))
    }

    #[test]
    fn attack_clicks_select_then_open_battle() {
        let rules = RulesConfig::default();
        let mut state = board(Phase::Attack);
        let mut combat = combat();
        let mut turn = TurnController::new();

        assert_eq!(
            turn.handle_territory_click(&mut state, &rules, &mut combat, &tid("kamchatka"))
                .unwrap_err(),
            EngineError::NoSourceSelected
        );

        let outcome = turn
            .handle_territory_click(&mut state, &rules, &mut combat, &tid("alaska"))
            .unwrap();
        assert_eq!(
            outcome,
            ClickOutcome::AttackSourceSelected {
                territory: tid("alaska"),
                targets: vec![tid("kamchatka")],
            }
        );

        // Clicking another owned territory moves the selection.
        turn.handle_territory_click(&mut state, &rules, &mut combat, &tid("alberta"))
            .unwrap();
        assert_eq!(turn.selection().attack_source, Some(tid("alberta")));

        let outcome = turn
            .handle_territory_click(&mut state, &rules, &mut combat, &tid("ontario"))
            .unwrap();
        let ClickOutcome::CombatStarted(view) = outcome else {
            panic!("expected a battle, got {outcome:?}");
        };
        assert_eq!(view.attacker, tid("alberta"));
        assert_eq!(turn.selection().attack_source, None);
        assert!(matches!(
            turn.handle_territory_click(&mut state, &rules, &mut combat, &tid("alaska")),
            Err(EngineError::BattleInProgress(_))
        ));
    }

    #[test]
    fn clicking_the_source_again_clears_it() {
        let rules = RulesConfig::default();
        let mut state = board(Phase::Attack);
        let mut combat = combat();
        let mut turn = TurnController::new();
        turn.handle_territory_click(&mut state, &rules, &mut combat, &tid("alaska"))
            .unwrap();
        assert_eq!(
            turn.handle_territory_click(&mut state, &rules, &mut combat, &tid("alaska"))
                .unwrap(),
            ClickOutcome::AttackSourceCleared {
                territory: tid("alaska"),
            }
        );
    }

    #[test]
    fn invalid_target_keeps_selection() {
        let rules = RulesConfig::default();
        let mut state = board(Phase::Attack);
        let mut combat = combat();
        let mut turn = TurnController::new();
        turn.handle_territory_click(&mut state, &rules, &mut combat, &tid("alaska"))
            .unwrap();
        assert!(matches!(
            turn.handle_territory_click(&mut state, &rules, &mut combat, &tid("peru")),
            Err(EngineError::Rejected(Rejection::NotAdjacent { .. }))
        ));
        assert_eq!(turn.selection().attack_source, Some(tid("alaska")));
        assert!(combat.current_battle().is_none());
    }

    #[test]
    fn fortification_clicks_pick_source_and_destination() {
        let rules = RulesConfig::default();
        let mut state = board(Phase::Fortification);
        let mut combat = combat();
        let mut turn = TurnController::new();

        assert_eq!(
            turn.complete_fortification(&mut state, 1).unwrap_err(),
            EngineError::NoFortificationSelected
        );
        let outcome = turn
            .handle_territory_click(&mut state, &rules, &mut combat, &tid("alaska"))
            .unwrap();
        assert_eq!(
            outcome,
            ClickOutcome::FortifySourceSelected {
                territory: tid("alaska"),
                destinations: vec![tid("alberta"), tid("northwest_territory")],
            }
        );
        assert!(matches!(
            turn.handle_territory_click(&mut state, &rules, &mut combat, &tid("kamchatka")),
            Err(EngineError::Rejected(Rejection::NotOwnedByCurrentPlayer { .. }))
        ));
        assert_eq!(
            turn.handle_territory_click(&mut state, &rules, &mut combat, &tid("alberta"))
                .unwrap(),
            ClickOutcome::FortifyDestinationSelected {
                from: tid("alaska"),
                to: tid("alberta"),
                max_armies: 2,
            }
        );

        let report = turn.complete_fortification(&mut state, 2).unwrap();
        assert_eq!(report.armies_moved, 2);
        assert_eq!(state.territories[&tid("alberta")].armies, 5);
        assert_eq!(
            turn.handle_territory_click(&mut state, &rules, &mut combat, &tid("alberta"))
                .unwrap_err(),
            EngineError::FortificationUsed
        );
    }

    #[test]
    fn reinforcement_click_places_one_army() {
        let rules = RulesConfig::default();
        let mut state = board(Phase::Reinforcement);
        state
            .remaining_reinforcements
            .insert(PlayerId::from("red"), 2);
        let mut combat = combat();
        let mut turn = TurnController::new();
        let outcome = turn
            .handle_territory_click(&mut state, &rules, &mut combat, &tid("alaska"))
            .unwrap();
        let ClickOutcome::Placed(report) = outcome else {
            panic!("expected a placement, got {outcome:?}");
        };
        assert_eq!(report.remaining, 1);
        assert_eq!(state.territories[&tid("alaska")].armies, 4);
    }
}
