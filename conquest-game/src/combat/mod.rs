//! Combat Engine
//!
//! Runs one battle at a time through `active → {conquest | ended}`, with
//! conquest finishing as `completed` once armies move in. Finished battles are
//! archived to an append-only history, and per-player loss/kill statistics are
//! accumulated as rounds are applied.
mod outcome;

pub use outcome::{DeclaredOutcome, Dice, DiceRoll, DiceStrategy, OutcomeStrategy};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clock::{Clock, SystemClock};
use crate::constants::MIN_GARRISON;
use crate::error::EngineError;
use crate::ids::{PlayerId, TerritoryId};
use crate::store::{GameStore, TerritoryChange};
use crate::validation::{
    ArmyInputErrors, ArmyRole, Rejection, validate_army_input, validate_attack,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleStatus {
    Active,
    /// Defender wiped out; waiting for the attacker to move armies in.
    Conquest,
    Completed,
    /// Stopped before a conquest was finalized.
    Ended,
}

impl BattleStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Ended)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRound {
    pub round: u32,
    pub attacker_before: u32,
    pub defender_before: u32,
    pub attacker_after: u32,
    pub defender_after: u32,
    pub attacker_losses: u32,
    pub defender_losses: u32,
    pub conquest: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battle {
    pub id: u64,
    pub attacker: TerritoryId,
    pub defender: TerritoryId,
    pub attacker_owner: PlayerId,
    /// `None` when the target was unclaimed.
    pub defender_owner: Option<PlayerId>,
    pub attacker_initial: u32,
    pub defender_initial: u32,
    pub attacker_armies: u32,
    pub defender_armies: u32,
    pub rounds: Vec<BattleRound>,
    pub status: BattleStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Battle {
    #[must_use]
    pub fn attacker_losses(&self) -> u32 {
        self.rounds.iter().map(|r| r.attacker_losses).sum()
    }

    #[must_use]
    pub fn defender_losses(&self) -> u32 {
        self.rounds.iter().map(|r| r.defender_losses).sum()
    }

    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    #[must_use]
    pub const fn can_continue(&self) -> bool {
        matches!(self.status, BattleStatus::Active) && self.attacker_armies > MIN_GARRISON
    }
}

/// Cumulative combat record of one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerCombatStats {
    pub units_lost: u32,
    pub units_killed: u32,
    pub battles_as_attacker: u32,
    pub battles_as_defender: u32,
    pub territories_conquered: u32,
}

/// Aggregate figures over the battle history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatStatistics {
    pub total_battles: usize,
    pub conquests: usize,
    pub retreats: usize,
    pub total_rounds: usize,
    pub total_units_lost: u64,
    /// Share of archived battles that ended in a conquest, in `[0, 1]`.
    pub conquest_rate: f64,
    pub average_battle_duration_ms: Option<f64>,
    pub battle_in_progress: bool,
}

/// Snapshot of the in-flight battle for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatView {
    pub battle_id: u64,
    pub attacker: TerritoryId,
    pub defender: TerritoryId,
    pub attacker_owner: PlayerId,
    pub defender_owner: Option<PlayerId>,
    pub attacker_armies: u32,
    pub defender_armies: u32,
    pub status: BattleStatus,
    pub rounds: usize,
    pub can_continue: bool,
}

impl From<&Battle> for CombatView {
    fn from(battle: &Battle) -> Self {
        Self {
            battle_id: battle.id,
            attacker: battle.attacker.clone(),
            defender: battle.defender.clone(),
            attacker_owner: battle.attacker_owner.clone(),
            defender_owner: battle.defender_owner.clone(),
            attacker_armies: battle.attacker_armies,
            defender_armies: battle.defender_armies,
            status: battle.status,
            rounds: battle.rounds.len(),
            can_continue: battle.can_continue(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundReport {
    pub battle_id: u64,
    pub round: u32,
    pub attacker_losses: u32,
    pub defender_losses: u32,
    pub attacker_remaining: u32,
    pub defender_remaining: u32,
    pub is_conquest: bool,
    pub can_continue: bool,
    pub changes: Vec<TerritoryChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConquestReport {
    pub battle_id: u64,
    pub territory: TerritoryId,
    pub new_owner: PlayerId,
    pub previous_owner: Option<PlayerId>,
    pub armies_moved: u32,
    /// The previous owner holds no territory any more.
    pub previous_owner_eliminated: bool,
    pub changes: Vec<TerritoryChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleSummary {
    pub battle_id: u64,
    pub attacker: TerritoryId,
    pub defender: TerritoryId,
    pub status: BattleStatus,
    pub rounds: usize,
    pub attacker_losses: u32,
    pub defender_losses: u32,
    pub changes: Vec<TerritoryChange>,
}

impl BattleSummary {
    fn of(battle: &Battle, changes: Vec<TerritoryChange>) -> Self {
        Self {
            battle_id: battle.id,
            attacker: battle.attacker.clone(),
            defender: battle.defender.clone(),
            status: battle.status,
            rounds: battle.rounds.len(),
            attacker_losses: battle.attacker_losses(),
            defender_losses: battle.defender_losses(),
            changes,
        }
    }
}

/// Inclusive bounds of an acceptable army count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmyRange {
    pub min: u32,
    pub max: u32,
}

impl ArmyRange {
    #[must_use]
    pub const fn contains(self, value: u32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Illustrative outcome offered to the player. Not authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedOutcome {
    pub label: String,
    pub outcome: DeclaredOutcome,
}

/// What the player may enter next for the in-flight battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum BattleOptions {
    Round {
        battle_id: u64,
        /// `None` once the attacker is down to its garrison.
        attacker_remaining: Option<ArmyRange>,
        defender_remaining: ArmyRange,
        suggestions: Vec<SuggestedOutcome>,
    },
    Conquest {
        battle_id: u64,
        /// `None` when no army can be spared for the move.
        transfer: Option<ArmyRange>,
    },
}

fn suggestions_for(attacker: u32, defender: u32) -> Vec<SuggestedOutcome> {
    let a = i64::from(attacker);
    let d = i64::from(defender);
    let mut out = Vec::new();
    if attacker <= MIN_GARRISON {
        return out;
    }
    if defender > 0 {
        out.push(SuggestedOutcome {
            label: String::from("attacker wins the round"),
            outcome: DeclaredOutcome::new(a, d - 1),
        });
    }
    out.push(SuggestedOutcome {
        label: String::from("defender holds"),
        outcome: DeclaredOutcome::new(a - 1, d),
    });
    if defender > 0 {
        out.push(SuggestedOutcome {
            label: String::from("even trade"),
            outcome: DeclaredOutcome::new(a - 1, d - 1),
        });
        out.push(SuggestedOutcome {
            label: String::from("defender falls"),
            outcome: DeclaredOutcome::new(a, 0),
        });
    }
    out
}

fn transfer_range(attacker_armies: u32) -> Option<ArmyRange> {
    let max = attacker_armies.saturating_sub(MIN_GARRISON);
    (max >= 1).then_some(ArmyRange { min: 1, max })
}

fn ensure_known<S: GameStore>(store: &S, id: &TerritoryId) -> Result<(), Rejection> {
    if store.territory(id).is_some() {
        Ok(())
    } else {
        Err(Rejection::UnknownTerritory {
            territory: id.clone(),
        })
    }
}

/// Battle lifecycle, history and statistics.
#[derive(Debug, Clone)]
pub struct CombatEngine<C: Clock = SystemClock> {
    current: Option<Battle>,
    history: Vec<Battle>,
    stats: BTreeMap<PlayerId, PlayerCombatStats>,
    next_id: u64,
    clock: C,
}

impl Default for CombatEngine<SystemClock> {
    fn default() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl CombatEngine<SystemClock> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Clock> CombatEngine<C> {
    #[must_use]
    pub const fn with_clock(clock: C) -> Self {
        Self {
            current: None,
            history: Vec::new(),
            stats: BTreeMap::new(),
            next_id: 1,
            clock,
        }
    }

    /// Open a battle from `attacker` against `defender`.
    ///
    /// # Errors
    ///
    /// Fails if a battle is already in flight or the attack is not legal.
    pub fn initiate_combat<S: GameStore>(
        &mut self,
        store: &S,
        attacker: &TerritoryId,
        defender: &TerritoryId,
    ) -> Result<CombatView, EngineError> {
        if let Some(battle) = &self.current {
            log::warn!("attack on {defender} refused: battle {} still open", battle.id);
            return Err(match battle.status {
                BattleStatus::Conquest => EngineError::ConquestPending(battle.id),
                _ => EngineError::BattleInProgress(battle.id),
            });
        }
        validate_attack(store, attacker, defender)?;

        let attacker_owner = store
            .current_player()
            .cloned()
            .ok_or(Rejection::NoCurrentPlayer)?;
        let (attacker_armies, defender_armies, defender_owner) =
            match (store.territory(attacker), store.territory(defender)) {
                (Some(from), Some(to)) => (from.armies, to.armies, to.owner.clone()),
                _ => {
                    return Err(Rejection::UnknownTerritory {
                        territory: attacker.clone(),
                    }
                    .into());
                }
            };

        let id = self.next_id;
        self.next_id += 1;
        self.stats
            .entry(attacker_owner.clone())
            .or_default()
            .battles_as_attacker += 1;
        if let Some(owner) = &defender_owner {
            self.stats.entry(owner.clone()).or_default().battles_as_defender += 1;
        }

        let battle = Battle {
            id,
            attacker: attacker.clone(),
            defender: defender.clone(),
            attacker_owner,
            defender_owner,
            attacker_initial: attacker_armies,
            defender_initial: defender_armies,
            attacker_armies,
            defender_armies,
            rounds: Vec::new(),
            status: BattleStatus::Active,
            started_at: self.clock.now(),
            ended_at: None,
        };
        log::debug!(
            "battle {id}: {attacker} ({attacker_armies}) attacks {defender} ({defender_armies})"
        );
        let view = CombatView::from(&battle);
        self.current = Some(battle);
        Ok(view)
    }

    /// Apply a declared round outcome to the in-flight battle.
    ///
    /// # Errors
    ///
    /// Fails if no battle is active, the battle awaits a conquest transfer, or
    /// the outcome breaks any army rule (every broken rule is reported).
    pub fn process_battle<S: GameStore>(
        &mut self,
        store: &mut S,
        outcome: DeclaredOutcome,
    ) -> Result<RoundReport, EngineError> {
        let Some(battle) = self.current.as_mut() else {
            log::warn!("round declared with no battle in progress");
            return Err(EngineError::NoActiveBattle);
        };
        if battle.status != BattleStatus::Active {
            return Err(EngineError::ConquestPending(battle.id));
        }

        let attacker_before = battle.attacker_armies;
        let defender_before = battle.defender_armies;
        let mut violations = Vec::new();
        if let Err(errors) =
            validate_army_input(attacker_before, outcome.attacker_remaining, ArmyRole::Attacker)
        {
            violations.extend(errors.0);
        }
        if let Err(errors) =
            validate_army_input(defender_before, outcome.defender_remaining, ArmyRole::Defender)
        {
            violations.extend(errors.0);
        }
        if !violations.is_empty() {
            log::warn!("battle {}: rejected outcome {outcome:?}", battle.id);
            return Err(EngineError::InvalidOutcome(ArmyInputErrors(violations)));
        }
        ensure_known(store, &battle.attacker)?;
        ensure_known(store, &battle.defender)?;

        let attacker_after = u32::try_from(outcome.attacker_remaining).unwrap_or(attacker_before);
        let defender_after = u32::try_from(outcome.defender_remaining).unwrap_or(defender_before);
        let attacker_losses = attacker_before - attacker_after;
        let defender_losses = defender_before - defender_after;
        let conquest = defender_after == 0;

        let changes: Vec<TerritoryChange> = [
            store.set_armies(&battle.attacker, attacker_after),
            store.set_armies(&battle.defender, defender_after),
        ]
        .into_iter()
        .flatten()
        .collect();

        let round = u32::try_from(battle.rounds.len()).map_or(u32::MAX, |n| n.saturating_add(1));
        battle.rounds.push(BattleRound {
            round,
            attacker_before,
            defender_before,
            attacker_after,
            defender_after,
            attacker_losses,
            defender_losses,
            conquest,
            at: self.clock.now(),
        });
        battle.attacker_armies = attacker_after;
        battle.defender_armies = defender_after;
        if conquest {
            battle.status = BattleStatus::Conquest;
        }

        let attacker_stats = self.stats.entry(battle.attacker_owner.clone()).or_default();
        attacker_stats.units_lost += attacker_losses;
        attacker_stats.units_killed += defender_losses;
        if let Some(owner) = &battle.defender_owner {
            let defender_stats = self.stats.entry(owner.clone()).or_default();
            defender_stats.units_lost += defender_losses;
            defender_stats.units_killed += attacker_losses;
        }

        if conquest {
            log::info!(
                "battle {}: {} wiped out, awaiting conquest transfer",
                battle.id,
                battle.defender
            );
        } else {
            log::debug!(
                "battle {} round {round}: attacker -{attacker_losses}, defender -{defender_losses}",
                battle.id
            );
        }

        Ok(RoundReport {
            battle_id: battle.id,
            round,
            attacker_losses,
            defender_losses,
            attacker_remaining: attacker_after,
            defender_remaining: defender_after,
            is_conquest: conquest,
            can_continue: battle.can_continue(),
            changes,
        })
    }

    /// Fight one round with an outcome produced by `strategy`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::process_battle`].
    pub fn process_with<S: GameStore, O: OutcomeStrategy>(
        &mut self,
        store: &mut S,
        strategy: &mut O,
    ) -> Result<RoundReport, EngineError> {
        let battle = self.current.as_ref().ok_or(EngineError::NoActiveBattle)?;
        if battle.status != BattleStatus::Active {
            return Err(EngineError::ConquestPending(battle.id));
        }
        let outcome = strategy.resolve(battle.attacker_armies, battle.defender_armies);
        self.process_battle(store, outcome)
    }

    /// Move `armies_to_move` into the conquered territory and close the battle.
    ///
    /// # Errors
    ///
    /// Fails if no battle awaits a transfer, or the move would take every army
    /// or none.
    pub fn complete_conquest<S: GameStore>(
        &mut self,
        store: &mut S,
        armies_to_move: u32,
    ) -> Result<ConquestReport, EngineError> {
        let battle = self.current.as_ref().ok_or(EngineError::NoActiveBattle)?;
        if battle.status != BattleStatus::Conquest {
            return Err(EngineError::NotInConquest(battle.id));
        }
        let max = battle.attacker_armies.saturating_sub(MIN_GARRISON);
        if armies_to_move < 1 || armies_to_move > max {
            log::warn!(
                "battle {}: cannot move {armies_to_move} armies (1..={max})",
                battle.id
            );
            return Err(EngineError::InvalidTransfer {
                requested: armies_to_move,
                min: 1,
                max,
            });
        }
        let source_armies = store
            .territory(&battle.attacker)
            .map(|t| t.armies)
            .ok_or_else(|| Rejection::UnknownTerritory {
                territory: battle.attacker.clone(),
            })?;
        ensure_known(store, &battle.defender)?;

        let Some(mut battle) = self.current.take() else {
            return Err(EngineError::NoActiveBattle);
        };
        let changes: Vec<TerritoryChange> = [
            store.set_armies(&battle.attacker, source_armies.saturating_sub(armies_to_move)),
            store.update_territory(
                &battle.defender,
                Some(battle.attacker_owner.clone()),
                armies_to_move,
            ),
        ]
        .into_iter()
        .flatten()
        .collect();

        let previous_owner = battle.defender_owner.clone();
        let previous_owner_eliminated = previous_owner
            .as_ref()
            .is_some_and(|owner| !store.territories().any(|t| t.is_owned_by(owner)));
        self.stats
            .entry(battle.attacker_owner.clone())
            .or_default()
            .territories_conquered += 1;

        battle.status = BattleStatus::Completed;
        battle.ended_at = Some(self.clock.now());
        log::info!(
            "{} conquers {} with {armies_to_move} armies",
            battle.attacker_owner,
            battle.defender
        );
        if let Some(owner) = previous_owner.as_ref().filter(|_| previous_owner_eliminated) {
            log::info!("{owner} has been eliminated");
        }

        let report = ConquestReport {
            battle_id: battle.id,
            territory: battle.defender.clone(),
            new_owner: battle.attacker_owner.clone(),
            previous_owner,
            armies_moved: armies_to_move,
            previous_owner_eliminated,
            changes,
        };
        self.history.push(battle);
        Ok(report)
    }

    /// Stop the in-flight battle without a conquest.
    ///
    /// A battle abandoned during its conquest step leaves the emptied
    /// territory unowned.
    ///
    /// # Errors
    ///
    /// Fails if no battle is in flight.
    pub fn end_combat<S: GameStore>(
        &mut self,
        store: &mut S,
    ) -> Result<BattleSummary, EngineError> {
        let Some(mut battle) = self.current.take() else {
            log::warn!("end of combat requested with no battle in progress");
            return Err(EngineError::NoActiveBattle);
        };
        let mut changes = Vec::new();
        if battle.status == BattleStatus::Conquest {
            changes.extend(store.update_territory(&battle.defender, None, 0));
            log::info!(
                "battle {}: conquest of {} abandoned, territory left empty",
                battle.id,
                battle.defender
            );
        }
        battle.status = BattleStatus::Ended;
        battle.ended_at = Some(self.clock.now());
        log::debug!("battle {} ended after {} rounds", battle.id, battle.rounds.len());

        let summary = BattleSummary::of(&battle, changes);
        self.history.push(battle);
        Ok(summary)
    }

    #[must_use]
    pub fn current_combat_state(&self) -> Option<CombatView> {
        self.current.as_ref().map(CombatView::from)
    }

    #[must_use]
    pub const fn current_battle(&self) -> Option<&Battle> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn current_battle_id(&self) -> Option<u64> {
        self.current.as_ref().map(|b| b.id)
    }

    #[must_use]
    pub fn battle_options(&self) -> Option<BattleOptions> {
        let battle = self.current.as_ref()?;
        Some(match battle.status {
            BattleStatus::Conquest => BattleOptions::Conquest {
                battle_id: battle.id,
                transfer: transfer_range(battle.attacker_armies),
            },
            _ => BattleOptions::Round {
                battle_id: battle.id,
                attacker_remaining: (battle.attacker_armies > MIN_GARRISON).then_some(
                    ArmyRange {
                        min: MIN_GARRISON,
                        max: battle.attacker_armies,
                    },
                ),
                defender_remaining: ArmyRange {
                    min: 0,
                    max: battle.defender_armies,
                },
                suggestions: suggestions_for(battle.attacker_armies, battle.defender_armies),
            },
        })
    }

    #[must_use]
    pub fn player_combat_stats(&self, player: &PlayerId) -> PlayerCombatStats {
        self.stats.get(player).copied().unwrap_or_default()
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn statistics(&self) -> CombatStatistics {
        let total_battles = self.history.len();
        let conquests = self
            .history
            .iter()
            .filter(|b| b.status == BattleStatus::Completed)
            .count();
        let durations: Vec<i64> = self.history.iter().filter_map(Battle::duration_ms).collect();
        let average_battle_duration_ms = (!durations.is_empty())
            .then(|| durations.iter().sum::<i64>() as f64 / durations.len() as f64);

        CombatStatistics {
            total_battles,
            conquests,
            retreats: total_battles - conquests,
            total_rounds: self.history.iter().map(|b| b.rounds.len()).sum(),
            total_units_lost: self
                .history
                .iter()
                .map(|b| u64::from(b.attacker_losses()) + u64::from(b.defender_losses()))
                .sum(),
            conquest_rate: if total_battles == 0 {
                0.0
            } else {
                conquests as f64 / total_battles as f64
            },
            average_battle_duration_ms,
            battle_in_progress: self.current.is_some(),
        }
    }

    /// Forget every player's accumulated figures. History is kept.
    pub fn reset_statistics(&mut self) {
        self.stats.clear();
        log::debug!("combat statistics reset");
    }

    #[must_use]
    pub fn history(&self) -> &[Battle] {
        &self.history
    }
}
