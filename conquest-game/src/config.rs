//! Rules configuration.
//!
//! Every table has a default matching the classic rules and can be overridden
//! from JSON, field by field.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{
    DEFAULT_MAX_ATTACKER_DICE, DEFAULT_MAX_DEFENDER_DICE, DEFAULT_MIN_REINFORCEMENT,
    DEFAULT_PLACEMENTS_PER_VISIT, DEFAULT_STARTUP_ARMIES, DEFAULT_TERRITORY_DIVISOR,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RulesConfig {
    #[serde(default)]
    pub startup: StartupConfig,
    #[serde(default)]
    pub reinforcement: ReinforcementConfig,
    #[serde(default)]
    pub combat: CombatConfig,
}

impl RulesConfig {
    /// Load rules from a JSON string. Missing sections fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn default_config() -> Self {
        Self::default()
    }
}

/// Initial placement rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupConfig {
    /// Armies each player places during startup, keyed by seated player count.
    #[serde(default = "StartupConfig::default_armies")]
    pub armies_by_player_count: BTreeMap<usize, u32>,
    /// Placements a player makes before control rotates. `None` lets a player
    /// place their whole allotment in one visit.
    #[serde(default = "StartupConfig::default_placements_per_visit")]
    pub placements_per_visit: Option<u32>,
    /// Forbid reinforcing an owned territory while any territory is unclaimed.
    #[serde(default)]
    pub claim_before_reinforce: bool,
}

impl StartupConfig {
    fn default_armies() -> BTreeMap<usize, u32> {
        DEFAULT_STARTUP_ARMIES.into_iter().collect()
    }

    #[allow(clippy::unnecessary_wraps)]
    const fn default_placements_per_visit() -> Option<u32> {
        Some(DEFAULT_PLACEMENTS_PER_VISIT)
    }

    #[must_use]
    pub fn armies_for(&self, players: usize) -> Option<u32> {
        self.armies_by_player_count.get(&players).copied()
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            armies_by_player_count: Self::default_armies(),
            placements_per_visit: Self::default_placements_per_visit(),
            claim_before_reinforce: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReinforcementConfig {
    #[serde(default = "ReinforcementConfig::default_minimum")]
    pub minimum: u32,
    #[serde(default = "ReinforcementConfig::default_divisor")]
    pub territory_divisor: u32,
}

impl ReinforcementConfig {
    const fn default_minimum() -> u32 {
        DEFAULT_MIN_REINFORCEMENT
    }

    const fn default_divisor() -> u32 {
        DEFAULT_TERRITORY_DIVISOR
    }
}

impl Default for ReinforcementConfig {
    fn default() -> Self {
        Self {
            minimum: Self::default_minimum(),
            territory_divisor: Self::default_divisor(),
        }
    }
}

/// Dice limits for the dice outcome strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatConfig {
    #[serde(default = "CombatConfig::default_attacker_dice")]
    pub max_attacker_dice: u8,
    #[serde(default = "CombatConfig::default_defender_dice")]
    pub max_defender_dice: u8,
}

impl CombatConfig {
    const fn default_attacker_dice() -> u8 {
        DEFAULT_MAX_ATTACKER_DICE
    }

    const fn default_defender_dice() -> u8 {
        DEFAULT_MAX_DEFENDER_DICE
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            max_attacker_dice: Self::default_attacker_dice(),
            max_defender_dice: Self::default_defender_dice(),
        }
    }
}
