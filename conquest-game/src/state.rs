use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::SetupError;
use crate::ids::{ContinentId, PlayerId, TerritoryId};
use crate::map::{Continent, MapData, MapError};
use crate::store::GameStore;

/// A node in the territory graph with its live owner and garrison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Territory {
    pub id: TerritoryId,
    #[serde(default)]
    pub name: String,
    pub continent: ContinentId,
    #[serde(default)]
    pub neighbors: BTreeSet<TerritoryId>,
    #[serde(default)]
    pub owner: Option<PlayerId>,
    #[serde(default)]
    pub armies: u32,
}

impl Territory {
    #[must_use]
    pub fn is_adjacent(&self, other: &TerritoryId) -> bool {
        self.neighbors.contains(other)
    }

    #[must_use]
    pub fn is_owned_by(&self, player: &PlayerId) -> bool {
        self.owner.as_ref() == Some(player)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub color: String,
}

impl Player {
    #[must_use]
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: color.into(),
        }
    }
}

/// Phases of play, in the order they occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// One-time initial placement, rotating through every player
    Startup,
    /// Placing the turn's reinforcement allotment
    Reinforcement,
    /// Optional attacks on adjacent enemy territories
    Attack,
    /// Optional single troop movement through owned territory
    Fortification,
}

/// Sequencing flags attached to each phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRules {
    pub mandatory: bool,
    pub one_time: bool,
    pub can_skip: bool,
}

impl Phase {
    /// Phase cycle every player runs through once startup is over.
    pub const TURN_CYCLE: [Self; 3] = [Self::Reinforcement, Self::Attack, Self::Fortification];

    #[must_use]
    pub const fn rules(self) -> PhaseRules {
        match self {
            Self::Startup => PhaseRules {
                mandatory: true,
                one_time: true,
                can_skip: false,
            },
            Self::Reinforcement => PhaseRules {
                mandatory: true,
                one_time: false,
                can_skip: false,
            },
            Self::Attack | Self::Fortification => PhaseRules {
                mandatory: false,
                one_time: false,
                can_skip: true,
            },
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Reinforcement => "reinforcement",
            Self::Attack => "attack",
            Self::Fortification => "fortification",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Complete world state of one game.
///
/// This is the opaque snapshot handed to persistence. Only the engine's
/// operations mutate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub map_name: String,
    pub territories: BTreeMap<TerritoryId, Territory>,
    pub continents: Vec<Continent>,
    pub players: Vec<Player>,
    #[serde(default)]
    pub current_player_index: usize,
    pub phase: Phase,
    #[serde(default = "default_phase_cycle")]
    pub phase_cycle: Vec<Phase>,
    /// Zero until startup completes.
    #[serde(default)]
    pub turn_number: u32,
    #[serde(default)]
    pub remaining_reinforcements: BTreeMap<PlayerId, u32>,
    #[serde(default)]
    pub fortification_used: bool,
    /// Placements made by the current player since control last passed to them.
    #[serde(default)]
    pub startup_visit_placements: u32,
}

fn default_phase_cycle() -> Vec<Phase> {
    vec![Phase::Startup]
}

impl GameState {
    /// Build an unclaimed board for the given players.
    ///
    /// # Errors
    ///
    /// Returns an error if the map is invalid, no players are given, a
    /// player id repeats, or there are more players than territories.
    pub fn new(map: &MapData, players: Vec<Player>) -> Result<Self, SetupError> {
        map.validate()?;
        if players.is_empty() {
            return Err(SetupError::NoPlayers);
        }
        if players.len() > map.territories.len() {
            return Err(SetupError::TooFewTerritories {
                players: players.len(),
                territories: map.territories.len(),
            });
        }
        let mut seen = BTreeSet::new();
        for player in &players {
            if !seen.insert(&player.id) {
                return Err(SetupError::DuplicatePlayer(player.id.clone()));
            }
        }

        let territories = map
            .territories
            .iter()
            .map(|def| {
                (
                    def.id.clone(),
                    Territory {
                        id: def.id.clone(),
                        name: def.name.clone(),
                        continent: def.continent.clone(),
                        neighbors: def.neighbors.clone(),
                        owner: None,
                        armies: 0,
                    },
                )
            })
            .collect();
        let remaining_reinforcements = players.iter().map(|p| (p.id.clone(), 0)).collect();

        Ok(Self {
            map_name: map.name.clone(),
            territories,
            continents: map.continents.clone(),
            players,
            current_player_index: 0,
            phase: Phase::Startup,
            phase_cycle: default_phase_cycle(),
            turn_number: 0,
            remaining_reinforcements,
            fortification_used: false,
            startup_visit_placements: 0,
        })
    }

    /// Restore static board data from the map after loading a snapshot.
    ///
    /// Owners and army counts are kept from the snapshot; names, borders and
    /// continents come from the map.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot and the map do not define the same
    /// territories.
    pub fn rehydrate(mut self, map: &MapData) -> Result<Self, MapError> {
        map.validate()?;
        if let Some(extra) = self
            .territories
            .keys()
            .find(|id| map.territory(id).is_none())
        {
            return Err(MapError::SnapshotMismatch(extra.clone()));
        }
        for def in &map.territories {
            let Some(territory) = self.territories.get_mut(&def.id) else {
                return Err(MapError::SnapshotMismatch(def.id.clone()));
            };
            territory.name.clone_from(&def.name);
            territory.continent = def.continent.clone();
            territory.neighbors.clone_from(&def.neighbors);
        }
        self.continents = map.continents.clone();
        self.map_name.clone_from(&map.name);
        Ok(self)
    }

    /// Serialize the snapshot to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Restore a snapshot from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not a valid snapshot.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn active_player(&self) -> Option<&Player> {
        self.players.get(self.current_player_index)
    }

    #[must_use]
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    #[must_use]
    pub fn remaining_for(&self, player: &PlayerId) -> u32 {
        self.remaining_reinforcements
            .get(player)
            .copied()
            .unwrap_or(0)
    }

    pub fn owned_by<'a>(&'a self, player: &'a PlayerId) -> impl Iterator<Item = &'a Territory> {
        self.territories
            .values()
            .filter(move |t| t.is_owned_by(player))
    }

    #[must_use]
    pub fn unclaimed_count(&self) -> usize {
        self.territories
            .values()
            .filter(|t| t.owner.is_none())
            .count()
    }

    /// Unclaimed territories `player` may take during startup.
    ///
    /// One unclaimed territory stays reserved for every other player that
    /// holds nothing yet but still has armies to place.
    #[must_use]
    pub fn claimable_count(&self, player: &PlayerId) -> usize {
        let reserved = self
            .players
            .iter()
            .filter(|p| &p.id != player && self.remaining_for(&p.id) > 0)
            .filter(|p| !self.territories.values().any(|t| t.is_owned_by(&p.id)))
            .count();
        self.unclaimed_count().saturating_sub(reserved)
    }

    #[must_use]
    pub fn total_armies(&self, player: &PlayerId) -> u32 {
        self.owned_by(player).map(|t| t.armies).sum()
    }

    #[must_use]
    pub fn is_startup_complete(&self) -> bool {
        self.phase != Phase::Startup
    }

    /// Players that still hold at least one territory.
    #[must_use]
    pub fn surviving_players(&self) -> Vec<&PlayerId> {
        self.players
            .iter()
            .map(|p| &p.id)
            .filter(|id| self.territories.values().any(|t| t.is_owned_by(id)))
            .collect()
    }

    /// The player holding every territory, once startup is over.
    #[must_use]
    pub fn winner(&self) -> Option<&PlayerId> {
        if !self.is_startup_complete() {
            return None;
        }
        let mut owners = self.territories.values().map(|t| t.owner.as_ref());
        let first = owners.next()??;
        owners.all(|owner| owner == Some(first)).then_some(first)
    }
}

impl GameStore for GameState {
    fn territory(&self, id: &TerritoryId) -> Option<&Territory> {
        self.territories.get(id)
    }

    fn territory_mut(&mut self, id: &TerritoryId) -> Option<&mut Territory> {
        self.territories.get_mut(id)
    }

    fn territories(&self) -> impl Iterator<Item = &Territory> {
        self.territories.values()
    }

    fn continents(&self) -> &[Continent] {
        &self.continents
    }

    fn current_player(&self) -> Option<&PlayerId> {
        self.active_player().map(|p| &p.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> Vec<Player> {
        vec![
            Player::new("red", "Red", "#c0392b"),
            Player::new("blue", "Blue", "#2980b9"),
        ]
    }

    #[test]
    fn new_state_starts_unclaimed_in_startup() {
        let state = GameState::new(&MapData::classic(), players()).unwrap();
        assert_eq!(state.phase, Phase::Startup);
        assert_eq!(state.turn_number, 0);
        assert_eq!(state.unclaimed_count(), 42);
        assert_eq!(state.current_player(), Some(&PlayerId::from("red")));
        assert!(state.winner().is_none());
    }

    #[test]
    fn rejects_empty_and_duplicate_seating() {
        let map = MapData::classic();
        assert_eq!(
            GameState::new(&map, Vec::new()).unwrap_err(),
            SetupError::NoPlayers
        );
        let dup = vec![
            Player::new("red", "Red", ""),
            Player::new("red", "Also Red", ""),
        ];
        assert_eq!(
            GameState::new(&map, dup).unwrap_err(),
            SetupError::DuplicatePlayer(PlayerId::from("red"))
        );
    }

    #[test]
    fn phase_rules_match_turn_structure() {
        assert!(!Phase::Startup.rules().can_skip);
        assert!(Phase::Startup.rules().one_time);
        assert!(Phase::Reinforcement.rules().mandatory);
        assert!(Phase::Attack.rules().can_skip);
        assert!(!Phase::Fortification.rules().mandatory);
        assert_eq!(Phase::Fortification.to_string(), "fortification");
    }

    #[test]
    fn winner_requires_full_control_after_startup() {
        let mut state = GameState::new(&MapData::classic(), players()).unwrap();
        let red = PlayerId::from("red");
        for territory in state.territories.values_mut() {
            territory.owner = Some(red.clone());
            territory.armies = 1;
        }
        assert!(state.winner().is_none());
        state.phase = Phase::Reinforcement;
        assert_eq!(state.winner(), Some(&red));
        assert_eq!(state.surviving_players(), vec![&red]);
        assert_eq!(state.total_armies(&red), 42);
    }

    #[test]
    fn snapshot_roundtrip_and_rehydrate() {
        let map = MapData::classic();
        let mut state = GameState::new(&map, players()).unwrap();
        let alaska = TerritoryId::from("alaska");
        if let Some(t) = state.territory_mut(&alaska) {
            t.owner = Some(PlayerId::from("blue"));
            t.armies = 4;
        }
        let json = state.to_json().unwrap();
        let mut restored = GameState::from_json(&json).unwrap();
        restored.territories.get_mut(&alaska).unwrap().neighbors.clear();
        let restored = restored.rehydrate(&map).unwrap();
        assert_eq!(restored, state);

        let mut partial = state.clone();
        partial.territories.remove(&alaska);
        assert_eq!(
            partial.rehydrate(&map).unwrap_err(),
            MapError::SnapshotMismatch(alaska.clone())
        );

        let mut extra = state.clone();
        let atlantis = TerritoryId::from("atlantis");
        let mut ghost = extra.territories[&alaska].clone();
        ghost.id = atlantis.clone();
        extra.territories.insert(atlantis.clone(), ghost);
        assert_eq!(
            extra.rehydrate(&map).unwrap_err(),
            MapError::SnapshotMismatch(atlantis)
        );
    }

    #[test]
    fn more_players_than_territories_cannot_be_seated() {
        let map = MapData::from_json(
            r#"{
                "name": "pair",
                "territories": [
                    { "id": "a", "name": "A", "continent": "c", "neighbors": ["b"] },
                    { "id": "b", "name": "B", "continent": "c", "neighbors": ["a"] }
                ],
                "continents": [
                    { "id": "c", "name": "C", "bonus": 1, "territories": ["a", "b"] }
                ]
            }"#,
        )
        .unwrap();
        let three = vec![
            Player::new("red", "Red", ""),
            Player::new("blue", "Blue", ""),
            Player::new("green", "Green", ""),
        ];
        assert_eq!(
            GameState::new(&map, three).unwrap_err(),
            SetupError::TooFewTerritories {
                players: 3,
                territories: 2,
            }
        );
    }

    #[test]
    fn unclaimed_territory_is_reserved_for_landless_players() {
        let mut state = GameState::new(&MapData::classic(), players()).unwrap();
        let red = PlayerId::from("red");
        let blue = PlayerId::from("blue");
        state.remaining_reinforcements.insert(red.clone(), 5);
        state.remaining_reinforcements.insert(blue.clone(), 5);
        let ids: Vec<TerritoryId> = state.territories.keys().cloned().collect();
        for id in &ids[..41] {
            let t = state.territory_mut(id).unwrap();
            t.owner = Some(red.clone());
            t.armies = 1;
        }
        assert_eq!(state.claimable_count(&red), 0);
        assert_eq!(state.claimable_count(&blue), 1);

        state.remaining_reinforcements.insert(blue, 0);
        assert_eq!(state.claimable_count(&red), 1);
    }
}
