//! Host-facing facade binding one game's state, combat engine, turn
//! controller and rules.
use crate::clock::{Clock, SystemClock};
use crate::combat::{
    Battle, BattleOptions, BattleSummary, CombatEngine, CombatStatistics, CombatView,
    ConquestReport, DeclaredOutcome, OutcomeStrategy, PlayerCombatStats, RoundReport,
};
use crate::config::RulesConfig;
use crate::error::{EngineError, SetupError};
use crate::ids::{PlayerId, TerritoryId};
use crate::map::MapData;
use crate::reinforcement::{ReinforcementBreakdown, reinforcement_breakdown};
use crate::state::{GameState, Phase, Player};
use crate::turn::{ClickOutcome, FortifyReport, PhaseChange, PlacementReport, TurnController};
use crate::validation::{self, Validation};

/// One running game.
///
/// Every mutating method validates completely before touching state, so a
/// returned error means nothing changed.
#[derive(Debug, Clone)]
pub struct GameSession<C: Clock = SystemClock> {
    state: GameState,
    combat: CombatEngine<C>,
    turn: TurnController,
    rules: RulesConfig,
}

impl GameSession<SystemClock> {
    /// Seat `players` on `map` and begin startup placement.
    ///
    /// # Errors
    ///
    /// Returns an error if the map is invalid, the seating is invalid, or no
    /// startup allotment exists for the player count.
    pub fn new(
        map: &MapData,
        players: Vec<Player>,
        rules: RulesConfig,
    ) -> Result<Self, SetupError> {
        Self::with_clock(map, players, rules, SystemClock)
    }

    /// Resume a game from a snapshot.
    #[must_use]
    pub fn from_state(state: GameState, rules: RulesConfig) -> Self {
        Self::from_state_with_clock(state, rules, SystemClock)
    }
}

impl<C: Clock> GameSession<C> {
    /// Like [`GameSession::new`] with a caller-supplied clock.
    ///
    /// # Errors
    ///
    /// Same as [`GameSession::new`].
    pub fn with_clock(
        map: &MapData,
        players: Vec<Player>,
        rules: RulesConfig,
        clock: C,
    ) -> Result<Self, SetupError> {
        let mut state = GameState::new(map, players)?;
        let mut turn = TurnController::new();
        turn.begin_startup(&mut state, &rules)?;
        Ok(Self {
            state,
            combat: CombatEngine::with_clock(clock),
            turn,
            rules,
        })
    }

    #[must_use]
    pub fn from_state_with_clock(state: GameState, rules: RulesConfig, clock: C) -> Self {
        Self {
            state,
            combat: CombatEngine::with_clock(clock),
            turn: TurnController::new(),
            rules,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    #[must_use]
    pub const fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    #[must_use]
    pub const fn combat(&self) -> &CombatEngine<C> {
        &self.combat
    }

    #[must_use]
    pub const fn turn(&self) -> &TurnController {
        &self.turn
    }

    /// Consume the session, returning the snapshot.
    #[must_use]
    pub fn into_state(self) -> GameState {
        self.state
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.state.phase
    }

    #[must_use]
    pub const fn turn_number(&self) -> u32 {
        self.state.turn_number
    }

    #[must_use]
    pub fn current_player(&self) -> Option<&PlayerId> {
        self.state.active_player().map(|p| &p.id)
    }

    #[must_use]
    pub fn winner(&self) -> Option<&PlayerId> {
        self.state.winner()
    }

    // -- turn flow --

    /// # Errors
    ///
    /// See [`TurnController::place_startup_army`].
    pub fn place_startup_army(
        &mut self,
        territory: &TerritoryId,
    ) -> Result<PlacementReport, EngineError> {
        self.turn
            .place_startup_army(&mut self.state, &self.rules, territory)
    }

    /// # Errors
    ///
    /// See [`TurnController::place_reinforcement`].
    pub fn place_reinforcement(
        &mut self,
        territory: &TerritoryId,
        count: u32,
    ) -> Result<PlacementReport, EngineError> {
        self.turn
            .place_reinforcement(&mut self.state, territory, count)
    }

    #[must_use]
    pub fn can_advance_phase(&self) -> bool {
        self.combat.current_battle().is_none() && self.turn.can_advance_phase(&self.state)
    }

    /// # Errors
    ///
    /// See [`TurnController::advance_phase`].
    pub fn advance_phase(&mut self) -> Result<PhaseChange, EngineError> {
        let battle = self.combat.current_battle_id();
        self.turn
            .advance_phase(&mut self.state, &self.rules, battle)
    }

    /// # Errors
    ///
    /// See [`TurnController::skip_phase`].
    pub fn skip_phase(&mut self) -> Result<PhaseChange, EngineError> {
        let battle = self.combat.current_battle_id();
        self.turn.skip_phase(&mut self.state, &self.rules, battle)
    }

    /// # Errors
    ///
    /// See [`TurnController::fortify`].
    pub fn fortify(
        &mut self,
        from: &TerritoryId,
        to: &TerritoryId,
        armies: u32,
    ) -> Result<FortifyReport, EngineError> {
        self.turn.fortify(&mut self.state, from, to, armies)
    }

    /// # Errors
    ///
    /// See [`TurnController::complete_fortification`].
    pub fn complete_fortification(&mut self, armies: u32) -> Result<FortifyReport, EngineError> {
        self.turn.complete_fortification(&mut self.state, armies)
    }

    /// # Errors
    ///
    /// See [`TurnController::handle_territory_click`].
    pub fn handle_territory_click(
        &mut self,
        territory: &TerritoryId,
    ) -> Result<ClickOutcome, EngineError> {
        self.turn.handle_territory_click(
            &mut self.state,
            &self.rules,
            &mut self.combat,
            territory,
        )
    }

    // -- combat --

    fn ensure_attack_phase(&self) -> Result<(), EngineError> {
        if let Some(winner) = self.state.winner() {
            return Err(EngineError::GameOver {
                winner: winner.clone(),
            });
        }
        if self.state.phase != Phase::Attack {
            log::warn!("attack attempted during the {} phase", self.state.phase);
            return Err(EngineError::WrongPhase {
                expected: Phase::Attack,
                actual: self.state.phase,
            });
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Fails outside the attack phase, and for every reason
    /// [`CombatEngine::initiate_combat`] does.
    pub fn initiate_combat(
        &mut self,
        attacker: &TerritoryId,
        defender: &TerritoryId,
    ) -> Result<CombatView, EngineError> {
        self.ensure_attack_phase()?;
        let view = self.combat.initiate_combat(&self.state, attacker, defender)?;
        self.turn.clear_selection();
        Ok(view)
    }

    /// # Errors
    ///
    /// See [`CombatEngine::process_battle`].
    pub fn process_battle(&mut self, outcome: DeclaredOutcome) -> Result<RoundReport, EngineError> {
        self.combat.process_battle(&mut self.state, outcome)
    }

    /// # Errors
    ///
    /// See [`CombatEngine::process_with`].
    pub fn process_with<O: OutcomeStrategy>(
        &mut self,
        strategy: &mut O,
    ) -> Result<RoundReport, EngineError> {
        self.combat.process_with(&mut self.state, strategy)
    }

    /// # Errors
    ///
    /// See [`CombatEngine::complete_conquest`].
    pub fn complete_conquest(
        &mut self,
        armies_to_move: u32,
    ) -> Result<ConquestReport, EngineError> {
        let report = self.combat.complete_conquest(&mut self.state, armies_to_move)?;
        if let Some(winner) = self.state.winner() {
            log::info!("game over: {winner} controls every territory");
        }
        Ok(report)
    }

    /// # Errors
    ///
    /// See [`CombatEngine::end_combat`].
    pub fn end_combat(&mut self) -> Result<BattleSummary, EngineError> {
        self.combat.end_combat(&mut self.state)
    }

    #[must_use]
    pub fn current_combat_state(&self) -> Option<CombatView> {
        self.combat.current_combat_state()
    }

    #[must_use]
    pub fn battle_options(&self) -> Option<BattleOptions> {
        self.combat.battle_options()
    }

    #[must_use]
    pub fn player_combat_stats(&self, player: &PlayerId) -> PlayerCombatStats {
        self.combat.player_combat_stats(player)
    }

    #[must_use]
    pub fn combat_statistics(&self) -> CombatStatistics {
        self.combat.statistics()
    }

    pub fn reset_combat_statistics(&mut self) {
        self.combat.reset_statistics();
    }

    #[must_use]
    pub fn battle_history(&self) -> &[Battle] {
        self.combat.history()
    }

    // -- queries --

    #[must_use]
    pub fn validate_attack(&self, from: &TerritoryId, to: &TerritoryId) -> Validation {
        validation::validate_attack(&self.state, from, to).into()
    }

    #[must_use]
    pub fn validate_fortify(&self, from: &TerritoryId, to: &TerritoryId) -> Validation {
        validation::validate_fortify(&self.state, from, to).into()
    }

    #[must_use]
    pub fn attack_targets(&self, from: &TerritoryId) -> Vec<TerritoryId> {
        validation::valid_attack_targets(&self.state, from)
    }

    #[must_use]
    pub fn fortify_destinations(&self, from: &TerritoryId) -> Vec<TerritoryId> {
        validation::fortify_destinations(&self.state, from)
    }

    #[must_use]
    pub fn reinforcement_breakdown(&self, player: &PlayerId) -> ReinforcementBreakdown {
        reinforcement_breakdown(&self.state, player, &self.rules.reinforcement)
    }

    #[must_use]
    pub fn remaining_reinforcements(&self, player: &PlayerId) -> u32 {
        self.state.remaining_for(player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SteppingClock;

    fn tid(id: &str) -> TerritoryId {
        TerritoryId::from(id)
    }

    fn two_players() -> Vec<Player> {
        vec![
            Player::new("red", "Red", "#c0392b"),
            Player::new("blue", "Blue", "#2980b9"),
        ]
    }

    #[test]
    fn new_session_opens_startup() {
        let session =
            GameSession::new(&MapData::classic(), two_players(), RulesConfig::default()).unwrap();
        assert_eq!(session.phase(), Phase::Startup);
        assert_eq!(session.turn_number(), 0);
        assert_eq!(session.remaining_reinforcements(&PlayerId::from("blue")), 40);
        assert!(!session.can_advance_phase());
    }

    #[test]
    fn attacks_only_in_attack_phase() {
        let mut session =
            GameSession::new(&MapData::classic(), two_players(), RulesConfig::default()).unwrap();
        assert!(matches!(
            session.initiate_combat(&tid("alaska"), &tid("kamchatka")),
            Err(EngineError::WrongPhase {
                expected: Phase::Attack,
                actual: Phase::Startup,
            })
        ));
    }

    #[test]
    fn resumed_session_plays_on() {
        let mut state = GameState::new(&MapData::classic(), two_players()).unwrap();
        for territory in state.territories.values_mut() {
            territory.owner = Some(PlayerId::from("blue"));
            territory.armies = 2;
        }
        state.territories.get_mut(&tid("alaska")).unwrap().owner = Some(PlayerId::from("red"));
        state.territories.get_mut(&tid("alaska")).unwrap().armies = 5;
        state.phase = Phase::Attack;
        state.phase_cycle = Phase::TURN_CYCLE.to_vec();
        state.turn_number = 4;

        let mut session = GameSession::from_state_with_clock(
            state,
            RulesConfig::default(),
            SteppingClock::from_epoch(50),
        );
        assert!(!session.validate_attack(&tid("alaska"), &tid("peru")).valid);
        assert!(session.validate_attack(&tid("alaska"), &tid("kamchatka")).valid);

        session
            .initiate_combat(&tid("alaska"), &tid("kamchatka"))
            .unwrap();
        assert!(!session.can_advance_phase());
        assert!(matches!(
            session.advance_phase(),
            Err(EngineError::BattleInProgress(1))
        ));
        session.process_battle(DeclaredOutcome::new(5, 0)).unwrap();
        let conquest = session.complete_conquest(4).unwrap();
        assert_eq!(conquest.armies_moved, 4);
        assert_eq!(session.battle_history().len(), 1);

        let change = session.skip_phase().unwrap();
        assert_eq!(change.to, Phase::Fortification);
        assert_eq!(session.turn_number(), 4);
        assert_eq!(session.combat_statistics().average_battle_duration_ms, Some(100.0));
    }
}
