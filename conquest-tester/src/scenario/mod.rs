//! Catalog of scripted-game scenarios.
use anyhow::{Result, ensure};
use conquest_game::{Phase, RulesConfig};

use crate::logic::game_tester::army_tally;
use crate::logic::{DriverStyle, GamePlan, GameSummary, OutcomeSource};

#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub plan: GamePlan,
}

impl TestScenario {
    #[must_use]
    pub fn new(name: impl Into<String>, plan: GamePlan) -> Self {
        Self {
            name: name.into(),
            plan,
        }
    }
}

const CATALOG: [(&str, &str); 9] = [
    ("smoke", "Smoke Test"),
    ("startup", "Startup Placement"),
    ("whole-visit-startup", "Startup With Whole-Allotment Visits"),
    ("aggressive", "Aggressive Drivers"),
    ("cautious", "Cautious Drivers"),
    ("declared-outcomes", "Declared Round Outcomes"),
    ("six-players", "Six Player Table"),
    ("deterministic", "Deterministic Replay"),
    ("full-game", "Full Game To A Winner"),
];

fn startup_finished(summary: &GameSummary) -> Result<()> {
    let state = &summary.final_state;
    ensure!(
        state.is_startup_complete(),
        "startup never finished after {} placements",
        summary.startup_placements
    );
    ensure!(state.turn_number >= 1, "turn number never started");
    Ok(())
}

fn even_startup(summary: &GameSummary) -> Result<()> {
    startup_finished(summary)?;
    let state = &summary.final_state;
    ensure!(
        state.phase == Phase::Reinforcement && state.turn_number == 1,
        "expected turn 1 reinforcement, found turn {} {}",
        state.turn_number,
        state.phase
    );
    let tally = army_tally(state);
    let mut counts = tally.values();
    if let Some(first) = counts.next() {
        ensure!(
            counts.all(|c| c == first),
            "players left startup with uneven armies: {tally:?}"
        );
    }
    ensure!(
        state.players.iter().all(|p| state.owned_by(&p.id).next().is_some()),
        "a player left startup without territory"
    );
    Ok(())
}

fn battles_fought(summary: &GameSummary) -> Result<()> {
    startup_finished(summary)?;
    ensure!(
        summary.battles > 0 || summary.winner.is_some(),
        "no battle fought in {} turns",
        summary.turns_played
    );
    Ok(())
}

fn statistics_consistent(summary: &GameSummary) -> Result<()> {
    let stats = &summary.statistics;
    ensure!(
        (0.0..=1.0).contains(&stats.conquest_rate),
        "conquest rate {} out of range",
        stats.conquest_rate
    );
    ensure!(
        stats.conquests + stats.retreats == stats.total_battles,
        "{} conquests and {} retreats do not add up to {} battles",
        stats.conquests,
        stats.retreats,
        stats.total_battles
    );
    ensure!(
        stats.conquests == summary.conquests,
        "engine counted {} conquests, driver completed {}",
        stats.conquests,
        summary.conquests
    );
    Ok(())
}

fn winner_holds_everything(summary: &GameSummary) -> Result<()> {
    statistics_consistent(summary)?;
    if let Some(winner) = &summary.winner {
        let state = &summary.final_state;
        ensure!(
            state.territories.values().all(|t| t.is_owned_by(winner)),
            "{winner} won without holding the whole board"
        );
        ensure!(
            summary.eliminated.len() + 1 == state.players.len(),
            "{winner} won but only {} players were eliminated",
            summary.eliminated.len()
        );
    }
    Ok(())
}

fn whole_visit_rules() -> RulesConfig {
    let mut rules = RulesConfig::default();
    rules.startup.placements_per_visit = None;
    rules
}

#[must_use]
pub fn get_scenario(name: &str) -> Option<TestScenario> {
    let key = name.to_lowercase();
    let (_, title) = CATALOG.iter().find(|(k, _)| *k == key)?;
    let plan = match key.as_str() {
        "smoke" => GamePlan::new(2, DriverStyle::Random)
            .with_max_turns(3)
            .with_expectation(startup_finished),
        "startup" => GamePlan::new(4, DriverStyle::Random)
            .with_max_turns(0)
            .with_expectation(even_startup),
        "whole-visit-startup" => GamePlan::new(3, DriverStyle::Random)
            .with_max_turns(0)
            .with_rules(whole_visit_rules())
            .with_expectation(even_startup),
        "aggressive" => GamePlan::new(3, DriverStyle::Aggressive)
            .with_max_turns(40)
            .with_expectation(battles_fought)
            .with_expectation(statistics_consistent),
        "cautious" => GamePlan::new(4, DriverStyle::Cautious)
            .with_max_turns(30)
            .with_expectation(statistics_consistent),
        "declared-outcomes" => GamePlan::new(2, DriverStyle::Random)
            .with_outcomes(OutcomeSource::Declared)
            .with_max_turns(15)
            .with_expectation(statistics_consistent),
        "six-players" => GamePlan::new(6, DriverStyle::Random)
            .with_max_turns(10)
            .with_expectation(startup_finished),
        "deterministic" => GamePlan::new(3, DriverStyle::Aggressive)
            .with_max_turns(10)
            .with_replay_check(),
        "full-game" => GamePlan::new(2, DriverStyle::Aggressive)
            .with_max_turns(200)
            .with_expectation(winner_holds_everything),
        _ => return None,
    };
    Some(TestScenario::new(*title, plan))
}

#[must_use]
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    CATALOG.to_vec()
}

/// Every catalog key, in listing order.
#[must_use]
pub fn all_scenario_keys() -> Vec<String> {
    CATALOG.iter().map(|(key, _)| (*key).to_string()).collect()
}
