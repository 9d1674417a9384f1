//! Scripted players that drive whole games through [`GameSession`] and check
//! the engine's invariants after every step.
use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use conquest_game::{
    BattleOptions, CombatStatistics, DeclaredOutcome, DiceStrategy, GameSession, GameState,
    MapData, Phase, Player, PlayerId, RoundReport, RulesConfig, SteppingClock, TerritoryId,
};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

const SEATS: [(&str, &str, &str); 6] = [
    ("red", "Red", "#c0392b"),
    ("blue", "Blue", "#2980b9"),
    ("green", "Green", "#27ae60"),
    ("gold", "Gold", "#f1c40f"),
    ("black", "Black", "#2c3e50"),
    ("pink", "Pink", "#e84393"),
];
const STARTUP_PLACEMENT_CAP: u32 = 10_000;
const BATTLES_PER_TURN: usize = 12;
const ROUNDS_PER_BATTLE: u32 = 40;
const DEFAULT_MAX_TURNS: u32 = 60;
const CLOCK_STEP_MS: i64 = 50;

/// How the scripted player picks its moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverStyle {
    /// Stack the strongest front and attack whenever it is not outnumbered.
    Aggressive,
    /// Shore up the weakest front and attack only with a clear edge.
    Cautious,
    /// Uniformly random legal moves.
    Random,
}

impl DriverStyle {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Aggressive => "aggressive",
            Self::Cautious => "cautious",
            Self::Random => "random",
        }
    }
}

/// Where round results come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeSource {
    /// Seeded dice.
    Dice,
    /// Random picks inside the ranges the engine offers, as a physical board
    /// host would declare them.
    Declared,
}

/// Assertion hook run after a game completes.
type GameExpectationFn = Arc<dyn Fn(&GameSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct GameExpectation(GameExpectationFn);

impl std::fmt::Debug for GameExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameExpectation").finish()
    }
}

impl GameExpectation {
    /// # Errors
    ///
    /// Returns the expectation's failure.
    pub fn evaluate(&self, summary: &GameSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for GameExpectation
where
    F: Fn(&GameSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// Everything needed to play one scripted game.
#[derive(Debug, Clone)]
pub struct GamePlan {
    pub players: usize,
    pub style: DriverStyle,
    pub outcomes: OutcomeSource,
    /// Turn cap; `Some(0)` stops right after startup.
    pub max_turns: Option<u32>,
    pub rules: RulesConfig,
    /// Replay every game from the same seed and compare the final boards.
    pub replay_check: bool,
    pub expectations: Vec<GameExpectation>,
}

impl GamePlan {
    #[must_use]
    pub fn new(players: usize, style: DriverStyle) -> Self {
        Self {
            players,
            style,
            outcomes: OutcomeSource::Dice,
            max_turns: None,
            rules: RulesConfig::default(),
            replay_check: false,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    #[must_use]
    pub const fn with_outcomes(mut self, outcomes: OutcomeSource) -> Self {
        self.outcomes = outcomes;
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: RulesConfig) -> Self {
        self.rules = rules;
        self
    }

    #[must_use]
    pub const fn with_replay_check(mut self) -> Self {
        self.replay_check = true;
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<GameExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

/// Complete record of a scripted game.
#[derive(Debug, Clone)]
pub struct GameSummary {
    pub seed: u64,
    pub style: DriverStyle,
    pub startup_placements: u32,
    pub turns_played: u32,
    pub battles: usize,
    pub conquests: usize,
    pub vacated: usize,
    pub eliminated: Vec<PlayerId>,
    pub winner: Option<PlayerId>,
    /// Invariant breaches observed while playing.
    pub violations: Vec<String>,
    pub statistics: CombatStatistics,
    pub final_state: GameState,
}

impl GameSummary {
    #[must_use]
    pub const fn finished(&self) -> bool {
        self.winner.is_some()
    }
}

/// Plays scripted games on one map.
#[derive(Debug, Clone)]
pub struct GameTester {
    map: Arc<MapData>,
    verbose: bool,
}

impl GameTester {
    #[must_use]
    pub const fn new(map: Arc<MapData>, verbose: bool) -> Self {
        Self { map, verbose }
    }

    /// Play `plan` from `seed`.
    ///
    /// # Errors
    ///
    /// Fails when the players cannot be seated or the engine rejects a move
    /// the driver only makes when the engine itself reported it legal.
    pub fn run_plan(&self, plan: &GamePlan, seed: u64) -> Result<GameSummary> {
        let mut summary = self.play(plan, seed)?;
        if plan.replay_check {
            let replay = self.play(plan, seed)?;
            if replay.final_state != summary.final_state {
                summary
                    .violations
                    .push(format!("seed {seed} replayed to a different board"));
            }
            if replay.battles != summary.battles {
                summary.violations.push(format!(
                    "seed {seed} replayed {} battles, first run fought {}",
                    replay.battles, summary.battles
                ));
            }
        }
        Ok(summary)
    }

    fn play(&self, plan: &GamePlan, seed: u64) -> Result<GameSummary> {
        let seats = seat_players(plan.players)?;
        let session = GameSession::with_clock(
            &self.map,
            seats,
            plan.rules.clone(),
            SteppingClock::from_epoch(CLOCK_STEP_MS),
        )
        .with_context(|| format!("seating {} players", plan.players))?;

        let mut driver = Driver {
            session,
            style: plan.style,
            outcomes: plan.outcomes,
            rng: ChaCha20Rng::seed_from_u64(seed),
            dice: DiceStrategy::seeded(seed.rotate_left(17), plan.rules.combat),
            violations: Vec::new(),
            conquests: 0,
            vacated: 0,
            eliminated: Vec::new(),
            verbose: self.verbose,
        };

        let startup_placements = driver.play_startup()?;
        let max_turns = plan.max_turns.unwrap_or(DEFAULT_MAX_TURNS);
        while max_turns > 0
            && driver.session.winner().is_none()
            && driver.session.turn_number() <= max_turns
        {
            driver.play_turn()?;
        }

        let statistics = driver.session.combat_statistics();
        if statistics.total_battles != driver.session.battle_history().len() {
            driver.violations.push(format!(
                "statistics count {} battles, history holds {}",
                statistics.total_battles,
                driver.session.battle_history().len()
            ));
        }
        if statistics.battle_in_progress {
            driver
                .violations
                .push(String::from("a battle was left open at the end of play"));
        }

        let winner = driver.session.winner().cloned();
        if self.verbose {
            let status = winner
                .as_ref()
                .map_or_else(|| String::from("no winner"), |w| format!("won by {w}"));
            println!(
                "    🎲 seed {seed}: {} turns, {} battles, {status}",
                driver.session.turn_number(),
                statistics.total_battles
            );
        }

        Ok(GameSummary {
            seed,
            style: plan.style,
            startup_placements,
            turns_played: driver.session.turn_number(),
            battles: statistics.total_battles,
            conquests: driver.conquests,
            vacated: driver.vacated,
            eliminated: driver.eliminated,
            winner,
            violations: driver.violations,
            statistics,
            final_state: driver.session.into_state(),
        })
    }
}

fn seat_players(count: usize) -> Result<Vec<Player>> {
    if count > SEATS.len() {
        bail!("at most {} players can be seated, asked for {count}", SEATS.len());
    }
    Ok(SEATS
        .iter()
        .take(count)
        .map(|(id, name, color)| Player::new(*id, *name, *color))
        .collect())
}

struct Driver {
    session: GameSession<SteppingClock>,
    style: DriverStyle,
    outcomes: OutcomeSource,
    rng: ChaCha20Rng,
    dice: DiceStrategy,
    violations: Vec<String>,
    conquests: usize,
    vacated: usize,
    eliminated: Vec<PlayerId>,
    verbose: bool,
}

impl Driver {
    fn play_startup(&mut self) -> Result<u32> {
        let mut placements = 0;
        while self.session.phase() == Phase::Startup {
            if placements >= STARTUP_PLACEMENT_CAP {
                bail!("startup still running after {placements} placements");
            }
            let player = self.player()?;
            let state = self.session.state();
            let unclaimed: Vec<TerritoryId> = if state.claimable_count(&player) > 0 {
                state
                    .territories
                    .values()
                    .filter(|t| t.owner.is_none())
                    .map(|t| t.id.clone())
                    .collect()
            } else {
                Vec::new()
            };
            let pool = if unclaimed.is_empty() {
                self.owned(&player)
            } else {
                unclaimed
            };
            let pick = pool
                .choose(&mut self.rng)
                .cloned()
                .context("no territory to place on")?;
            let before = board_total(self.session.state());
            let report = self
                .session
                .place_startup_army(&pick)
                .with_context(|| format!("{player} placing on {pick}"))?;
            placements += 1;
            self.expect_total(before + 1, "startup placement");
            if report.startup_complete {
                self.check_startup_complete();
            }
        }
        Ok(placements)
    }

    fn check_startup_complete(&mut self) {
        let state = self.session.state();
        if state.turn_number != 1 {
            self.violations.push(format!(
                "turn number is {} right after startup",
                state.turn_number
            ));
        }
        if state.unclaimed_count() != 0 {
            self.violations.push(format!(
                "{} territories unclaimed after startup",
                state.unclaimed_count()
            ));
        }
        if let Some(player) = self.session.current_player().cloned() {
            let expected = self.session.reinforcement_breakdown(&player).total;
            let granted = self.session.remaining_reinforcements(&player);
            if expected != granted {
                self.violations.push(format!(
                    "{player} opened turn 1 with {granted} reinforcements, expected {expected}"
                ));
            }
        }
        self.check_board("startup");
    }

    fn play_turn(&mut self) -> Result<()> {
        let player = self.player()?;
        self.reinforce(&player)?;
        self.session
            .advance_phase()
            .with_context(|| format!("{player} leaving reinforcement"))?;

        self.attack(&player)?;
        if self.session.winner().is_some() {
            return Ok(());
        }
        self.session
            .advance_phase()
            .with_context(|| format!("{player} leaving attack"))?;

        self.fortify(&player)?;
        let change = self
            .session
            .skip_phase()
            .with_context(|| format!("{player} ending the turn"))?;
        if !change.turn_ended {
            self.violations
                .push(format!("{player}'s turn did not end after fortification"));
        }
        let expected = self.session.reinforcement_breakdown(&change.player).total;
        if change.reinforcements != Some(expected) {
            self.violations.push(format!(
                "{} was granted {:?} reinforcements, expected {expected}",
                change.player, change.reinforcements
            ));
        }
        Ok(())
    }

    fn reinforce(&mut self, player: &PlayerId) -> Result<()> {
        while self.session.remaining_reinforcements(player) > 0 {
            let remaining = self.session.remaining_reinforcements(player);
            let target = self
                .reinforcement_target(player)
                .context("player holds no territory to reinforce")?;
            let count = match self.style {
                DriverStyle::Random => self.rng.gen_range(1..=remaining),
                DriverStyle::Aggressive | DriverStyle::Cautious => remaining,
            };
            let before = board_total(self.session.state());
            let report = self
                .session
                .place_reinforcement(&target, count)
                .with_context(|| format!("{player} reinforcing {target} with {count}"))?;
            self.expect_total(before + count, "reinforcement");
            if report.remaining != remaining - count {
                self.violations.push(format!(
                    "placing {count} of {remaining} left {} to place",
                    report.remaining
                ));
            }
        }
        if !self.session.can_advance_phase() {
            self.violations
                .push(format!("{player} spent the allotment but cannot advance"));
        }
        Ok(())
    }

    fn reinforcement_target(&mut self, player: &PlayerId) -> Option<TerritoryId> {
        let frontier = self.frontier(player);
        let pool = if frontier.is_empty() {
            self.owned(player)
        } else {
            frontier
        };
        let state = self.session.state();
        let armies = |id: &TerritoryId| state.territories.get(id).map_or(0, |t| t.armies);
        match self.style {
            DriverStyle::Aggressive => pool.iter().max_by_key(|id| armies(*id)).cloned(),
            DriverStyle::Cautious => pool.iter().min_by_key(|id| armies(*id)).cloned(),
            DriverStyle::Random => pool.choose(&mut self.rng).cloned(),
        }
    }

    fn attack(&mut self, player: &PlayerId) -> Result<()> {
        for _ in 0..BATTLES_PER_TURN {
            let Some((from, to)) = self.pick_attack(player) else {
                break;
            };
            self.fight(player, &from, &to)?;
            if self.session.winner().is_some() {
                if self.verbose {
                    println!("    🏆 {}", format!("{player} holds the whole board").green());
                }
                break;
            }
        }
        Ok(())
    }

    fn pick_attack(&mut self, player: &PlayerId) -> Option<(TerritoryId, TerritoryId)> {
        let state = self.session.state();
        let armies = |id: &TerritoryId| state.territories.get(id).map_or(0, |t| t.armies);
        let mut options: Vec<(TerritoryId, TerritoryId)> = Vec::new();
        for from in state.owned_by(player) {
            for to in self.session.attack_targets(&from.id) {
                let edge = match self.style {
                    DriverStyle::Aggressive => from.armies >= armies(&to),
                    DriverStyle::Cautious => from.armies >= armies(&to) + 3,
                    DriverStyle::Random => true,
                };
                if edge {
                    options.push((from.id.clone(), to));
                }
            }
        }
        match self.style {
            DriverStyle::Random => {
                if self.rng.gen_bool(0.3) {
                    None
                } else {
                    options.choose(&mut self.rng).cloned()
                }
            }
            DriverStyle::Aggressive | DriverStyle::Cautious => options
                .into_iter()
                .max_by_key(|(from, to)| i64::from(armies(from)) - i64::from(armies(to))),
        }
    }

    fn fight(&mut self, player: &PlayerId, from: &TerritoryId, to: &TerritoryId) -> Result<()> {
        let defender_owner = self
            .session
            .state()
            .territories
            .get(to)
            .and_then(|t| t.owner.clone());
        self.session
            .initiate_combat(from, to)
            .with_context(|| format!("{player} attacking {to} from {from}"))?;

        for _ in 0..ROUNDS_PER_BATTLE {
            let before = self.pair(from, to);
            let total = board_total(self.session.state());
            let round = self.next_round()?;
            self.check_round(&round, before, total);

            if round.is_conquest {
                return self.conquer(player, from, to, defender_owner, &round);
            }
            let retreat = match self.style {
                DriverStyle::Aggressive => false,
                DriverStyle::Cautious => round.attacker_remaining <= round.defender_remaining,
                DriverStyle::Random => self.rng.gen_bool(0.15),
            };
            if !round.can_continue || retreat {
                break;
            }
        }
        self.session.end_combat().context("ending a battle")?;
        self.check_board("battle");
        Ok(())
    }

    fn next_round(&mut self) -> Result<RoundReport> {
        match self.outcomes {
            OutcomeSource::Dice => self
                .session
                .process_with(&mut self.dice)
                .context("rolling a round"),
            OutcomeSource::Declared => {
                let outcome = self.declare()?;
                self.session
                    .process_battle(outcome)
                    .with_context(|| format!("declaring {outcome:?}"))
            }
        }
    }

    fn declare(&mut self) -> Result<DeclaredOutcome> {
        let Some(BattleOptions::Round {
            attacker_remaining,
            defender_remaining,
            suggestions,
            ..
        }) = self.session.battle_options()
        else {
            bail!("no round can be declared");
        };
        if self.rng.gen_bool(0.5)
            && let Some(pick) = suggestions.choose(&mut self.rng)
        {
            return Ok(pick.outcome);
        }
        let attacker = attacker_remaining.map_or(1, |range| {
            self.rng.gen_range(range.min..=range.max)
        });
        let defender = self
            .rng
            .gen_range(defender_remaining.min..=defender_remaining.max);
        Ok(DeclaredOutcome::new(
            i64::from(attacker),
            i64::from(defender),
        ))
    }

    fn conquer(
        &mut self,
        player: &PlayerId,
        from: &TerritoryId,
        to: &TerritoryId,
        defender_owner: Option<PlayerId>,
        round: &RoundReport,
    ) -> Result<()> {
        let spare = round.attacker_remaining.saturating_sub(1);
        if spare == 0 {
            // Nothing can move in, so the ground is abandoned.
            self.session.end_combat().context("abandoning a conquest")?;
            self.vacated += 1;
            let abandoned = self.session.state().territories.get(to);
            if abandoned.is_some_and(|t| t.owner.is_some() || t.armies != 0) {
                self.violations
                    .push(format!("{to} was not vacated after an empty conquest"));
            }
            self.check_board("vacated conquest");
            return Ok(());
        }

        let moving = match self.style {
            DriverStyle::Aggressive => spare,
            DriverStyle::Cautious => spare.div_ceil(2),
            DriverStyle::Random => self.rng.gen_range(1..=spare),
        };
        if self.session.complete_conquest(spare + 1).is_ok() {
            self.violations
                .push(format!("moving {} armies emptied {from}", spare + 1));
        }
        let total = board_total(self.session.state());
        let report = self
            .session
            .complete_conquest(moving)
            .with_context(|| format!("{player} moving {moving} into {to}"))?;
        self.conquests += 1;
        self.expect_total(total, "conquest transfer");

        let state = self.session.state();
        let taken = state.territories.get(to);
        if taken.is_none_or(|t| !t.is_owned_by(player) || t.armies != moving) {
            self.violations
                .push(format!("{to} does not hold {player}'s {moving} armies"));
        }
        if report.previous_owner_eliminated
            && let Some(loser) = defender_owner
        {
            if self.verbose {
                println!("    💀 {loser} eliminated by {player}");
            }
            self.eliminated.push(loser);
        }
        if self.session.current_combat_state().is_some() {
            self.violations
                .push(String::from("battle still open after the transfer"));
        }
        self.check_board("conquest");
        Ok(())
    }

    fn fortify(&mut self, player: &PlayerId) -> Result<()> {
        if matches!(self.style, DriverStyle::Random) && self.rng.gen_bool(0.5) {
            return Ok(());
        }
        let frontier = self.frontier(player);
        let state = self.session.state();
        let mut moves: Vec<(TerritoryId, TerritoryId, u32)> = Vec::new();
        for source in state.owned_by(player).filter(|t| t.armies > 1) {
            for to in self.session.fortify_destinations(&source.id) {
                if frontier.contains(&to) {
                    moves.push((source.id.clone(), to, source.armies - 1));
                }
            }
        }
        let Some((from, to, spare)) = (match self.style {
            DriverStyle::Random => moves.choose(&mut self.rng).cloned(),
            DriverStyle::Aggressive | DriverStyle::Cautious => {
                moves.into_iter().max_by_key(|(_, _, spare)| *spare)
            }
        }) else {
            return Ok(());
        };

        let armies = match self.style {
            DriverStyle::Random => self.rng.gen_range(1..=spare),
            DriverStyle::Aggressive | DriverStyle::Cautious => spare,
        };
        let total = board_total(self.session.state());
        self.session
            .fortify(&from, &to, armies)
            .with_context(|| format!("{player} fortifying {to} from {from}"))?;
        self.expect_total(total, "fortification");
        if self.session.fortify(&to, &from, 1).is_ok() {
            self.violations
                .push(format!("{player} fortified twice in one turn"));
        }
        self.check_board("fortification");
        Ok(())
    }

    fn check_round(&mut self, round: &RoundReport, before: (u32, u32), total: u32) {
        let after = (round.attacker_remaining, round.defender_remaining);
        if after.0 > before.0 || after.1 > before.1 {
            self.violations.push(format!(
                "round {} of battle {} grew armies: {before:?} -> {after:?}",
                round.round, round.battle_id
            ));
        }
        if round.attacker_remaining < 1 {
            self.violations.push(format!(
                "battle {} left the attacker empty",
                round.battle_id
            ));
        }
        if round.is_conquest != (round.defender_remaining == 0) {
            self.violations.push(format!(
                "battle {} flagged conquest {} with {} defenders",
                round.battle_id, round.is_conquest, round.defender_remaining
            ));
        }
        let lost = round.attacker_losses + round.defender_losses;
        self.expect_total(total.saturating_sub(lost), "battle round");
    }

    fn check_board(&mut self, after: &str) {
        let pending = self.session.current_combat_state().map(|c| c.defender);
        let state = self.session.state();
        let mut breaches = Vec::new();
        for territory in state.territories.values() {
            match &territory.owner {
                Some(owner) if territory.armies == 0 && pending.as_ref() != Some(&territory.id) => {
                    breaches.push(format!("{} held by {owner} with no armies", territory.id));
                }
                None if territory.armies != 0 => {
                    breaches.push(format!(
                        "{} is unowned with {} armies",
                        territory.id, territory.armies
                    ));
                }
                _ => {}
            }
        }
        self.violations
            .extend(breaches.into_iter().map(|b| format!("after {after}: {b}")));
    }

    fn expect_total(&mut self, expected: u32, after: &str) {
        let actual = board_total(self.session.state());
        if actual != expected {
            self.violations.push(format!(
                "after {after}: {actual} armies on the board, expected {expected}"
            ));
        }
    }

    fn pair(&self, from: &TerritoryId, to: &TerritoryId) -> (u32, u32) {
        let territories = &self.session.state().territories;
        (
            territories.get(from).map_or(0, |t| t.armies),
            territories.get(to).map_or(0, |t| t.armies),
        )
    }

    fn player(&self) -> Result<PlayerId> {
        self.session
            .current_player()
            .cloned()
            .context("no player to act")
    }

    fn owned(&self, player: &PlayerId) -> Vec<TerritoryId> {
        self.session
            .state()
            .owned_by(player)
            .map(|t| t.id.clone())
            .collect()
    }

    /// Owned territories touching anything the player does not hold.
    fn frontier(&self, player: &PlayerId) -> Vec<TerritoryId> {
        let state = self.session.state();
        state
            .owned_by(player)
            .filter(|t| {
                t.neighbors
                    .iter()
                    .any(|n| state.territories.get(n).is_none_or(|o| !o.is_owned_by(player)))
            })
            .map(|t| t.id.clone())
            .collect()
    }
}

fn board_total(state: &GameState) -> u32 {
    state.territories.values().map(|t| t.armies).sum()
}

/// Armies per player, for reports.
#[must_use]
pub fn army_tally(state: &GameState) -> BTreeMap<PlayerId, u32> {
    state
        .players
        .iter()
        .map(|p| (p.id.clone(), state.total_armies(&p.id)))
        .collect()
}
