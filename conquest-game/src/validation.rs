//! Legality checks for attacks, troop movement and declared battle outcomes.
//!
//! Every check here is a pure function over a [`GameStore`]; nothing mutates.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use thiserror::Error;

use crate::constants::{MIN_ATTACK_ARMIES, MIN_GARRISON};
use crate::ids::{PlayerId, TerritoryId};
use crate::state::Territory;
use crate::store::GameStore;

/// Reasons an attack or fortification request is refused.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    #[error("unknown territory `{territory}`")]
    UnknownTerritory { territory: TerritoryId },
    #[error("there is no current player")]
    NoCurrentPlayer,
    #[error("`{territory}` is not controlled by {player}")]
    NotOwnedByCurrentPlayer {
        territory: TerritoryId,
        player: PlayerId,
    },
    #[error("`{to}` belongs to the same player as `{from}`")]
    SameOwner { from: TerritoryId, to: TerritoryId },
    #[error("`{territory}` needs at least 2 armies to attack (has {armies})")]
    TooFewArmiesToAttack { territory: TerritoryId, armies: u32 },
    #[error("`{to}` does not border `{from}`")]
    NotAdjacent { from: TerritoryId, to: TerritoryId },
    #[error("`{territory}` must keep at least one army (has {armies})")]
    MustKeepOneArmy { territory: TerritoryId, armies: u32 },
    #[error("cannot move armies from `{territory}` to itself")]
    SameTerritory { territory: TerritoryId },
    #[error("no path of {player}'s territories connects `{from}` to `{to}`")]
    NotConnected {
        from: TerritoryId,
        to: TerritoryId,
        player: PlayerId,
    },
}

/// Serializable pass/fail view of a check for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl<E: fmt::Display> From<Result<(), E>> for Validation {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self {
                valid: true,
                reason: None,
            },
            Err(err) => Self {
                valid: false,
                reason: Some(err.to_string()),
            },
        }
    }
}

/// Side of a battle a declared army count belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmyRole {
    Attacker,
    Defender,
}

impl fmt::Display for ArmyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attacker => f.write_str("attacker"),
            Self::Defender => f.write_str("defender"),
        }
    }
}

/// One broken rule in a declared army count.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArmyInputViolation {
    #[error("{role} cannot gain armies ({proposed} declared, {current} present)")]
    Gained {
        role: ArmyRole,
        current: u32,
        proposed: i64,
    },
    #[error("{role} armies cannot be negative ({proposed} declared)")]
    Negative { role: ArmyRole, proposed: i64 },
    #[error("attacker must leave at least one army behind ({proposed} declared)")]
    AttackerMustKeepOne { proposed: i64 },
    #[error("attacker needed at least 2 armies to attack ({current} present)")]
    AttackerTooFew { current: u32 },
}

/// Every rule a declared outcome broke.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{}", join_violations(.0))]
pub struct ArmyInputErrors(pub Vec<ArmyInputViolation>);

impl ArmyInputErrors {
    #[must_use]
    pub fn violations(&self) -> &[ArmyInputViolation] {
        &self.0
    }
}

fn join_violations(violations: &[ArmyInputViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn lookup<'a, S: GameStore>(store: &'a S, id: &TerritoryId) -> Result<&'a Territory, Rejection> {
    store
        .territory(id)
        .ok_or_else(|| Rejection::UnknownTerritory {
            territory: id.clone(),
        })
}

fn require_owner(territory: &Territory, player: &PlayerId) -> Result<(), Rejection> {
    if territory.is_owned_by(player) {
        Ok(())
    } else {
        Err(Rejection::NotOwnedByCurrentPlayer {
            territory: territory.id.clone(),
            player: player.clone(),
        })
    }
}

/// Check that the current player may attack `to` from `from`.
///
/// # Errors
///
/// Returns the first failed rule: unknown territory, source not held by the
/// current player, same owner on both sides, fewer than two armies, or no
/// shared border.
pub fn validate_attack<S: GameStore>(
    store: &S,
    from: &TerritoryId,
    to: &TerritoryId,
) -> Result<(), Rejection> {
    let source = lookup(store, from)?;
    let target = lookup(store, to)?;
    let player = store.current_player().ok_or(Rejection::NoCurrentPlayer)?;
    require_owner(source, player)?;
    if source.owner == target.owner {
        return Err(Rejection::SameOwner {
            from: from.clone(),
            to: to.clone(),
        });
    }
    if source.armies < MIN_ATTACK_ARMIES {
        return Err(Rejection::TooFewArmiesToAttack {
            territory: from.clone(),
            armies: source.armies,
        });
    }
    if !source.is_adjacent(to) {
        return Err(Rejection::NotAdjacent {
            from: from.clone(),
            to: to.clone(),
        });
    }
    Ok(())
}

/// Neighbors of `from` that the current player may attack right now.
#[must_use]
pub fn valid_attack_targets<S: GameStore>(store: &S, from: &TerritoryId) -> Vec<TerritoryId> {
    let Some(source) = store.territory(from) else {
        return Vec::new();
    };
    source
        .neighbors
        .iter()
        .filter(|to| validate_attack(store, from, to).is_ok())
        .cloned()
        .collect()
}

/// Check that the current player may move armies from `from` to `to`.
///
/// # Errors
///
/// Returns the first failed rule: unknown territory, either side not held by
/// the current player, nothing spare to move, identical endpoints, or no
/// connecting path through the player's own territories.
pub fn validate_fortify<S: GameStore>(
    store: &S,
    from: &TerritoryId,
    to: &TerritoryId,
) -> Result<(), Rejection> {
    let source = lookup(store, from)?;
    let target = lookup(store, to)?;
    let player = store.current_player().ok_or(Rejection::NoCurrentPlayer)?;
    require_owner(source, player)?;
    require_owner(target, player)?;
    if source.armies <= MIN_GARRISON {
        return Err(Rejection::MustKeepOneArmy {
            territory: from.clone(),
            armies: source.armies,
        });
    }
    if from == to {
        return Err(Rejection::SameTerritory {
            territory: from.clone(),
        });
    }
    if !connected_through_owned(store, player, from, to) {
        return Err(Rejection::NotConnected {
            from: from.clone(),
            to: to.clone(),
            player: player.clone(),
        });
    }
    Ok(())
}

/// Every territory the current player could fortify from `from`.
#[must_use]
pub fn fortify_destinations<S: GameStore>(store: &S, from: &TerritoryId) -> Vec<TerritoryId> {
    let Some(player) = store.current_player() else {
        return Vec::new();
    };
    let Some(source) = store.territory(from) else {
        return Vec::new();
    };
    if !source.is_owned_by(player) || source.armies <= MIN_GARRISON {
        return Vec::new();
    }
    reachable_through_owned(store, player, from)
        .into_iter()
        .filter(|id| id != from)
        .collect()
}

/// Whether `to` can be reached from `from` stepping only on `player`'s territories.
#[must_use]
pub fn connected_through_owned<S: GameStore>(
    store: &S,
    player: &PlayerId,
    from: &TerritoryId,
    to: &TerritoryId,
) -> bool {
    reachable_through_owned(store, player, from).contains(to)
}

/// Breadth-first search over the subgraph of territories owned by `player`.
///
/// The start territory is included when it is owned by `player`.
#[must_use]
pub fn reachable_through_owned<S: GameStore>(
    store: &S,
    player: &PlayerId,
    from: &TerritoryId,
) -> BTreeSet<TerritoryId> {
    let mut visited = BTreeSet::new();
    if !store.territory(from).is_some_and(|t| t.is_owned_by(player)) {
        return visited;
    }
    let mut queue = VecDeque::from([from.clone()]);
    visited.insert(from.clone());

    while let Some(current) = queue.pop_front() {
        let Some(territory) = store.territory(&current) else {
            continue;
        };
        for neighbor in &territory.neighbors {
            if visited.contains(neighbor) {
                continue;
            }
            if store
                .territory(neighbor)
                .is_some_and(|t| t.is_owned_by(player))
            {
                visited.insert(neighbor.clone());
                queue.push_back(neighbor.clone());
            }
        }
    }

    visited
}

/// Sanity-check a declared post-round army count for one side of a battle.
///
/// # Errors
///
/// Returns every violated rule: armies gained, a negative count, and for the
/// attacker, not leaving one army behind or having had too few to attack.
pub fn validate_army_input(
    current: u32,
    proposed: i64,
    role: ArmyRole,
) -> Result<(), ArmyInputErrors> {
    let mut violations = Vec::new();
    if proposed > i64::from(current) {
        violations.push(ArmyInputViolation::Gained {
            role,
            current,
            proposed,
        });
    }
    if proposed < 0 {
        violations.push(ArmyInputViolation::Negative { role, proposed });
    }
    if role == ArmyRole::Attacker {
        if proposed < i64::from(MIN_GARRISON) {
            violations.push(ArmyInputViolation::AttackerMustKeepOne { proposed });
        }
        if current < MIN_ATTACK_ARMIES {
            violations.push(ArmyInputViolation::AttackerTooFew { current });
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ArmyInputErrors(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MapData;
    use crate::state::{GameState, Phase, Player};

    fn board() -> GameState {
        let mut state = GameState::new(
            &MapData::classic(),
            vec![Player::new("red", "Red", ""), Player::new("blue", "Blue", "")],
        )
        .unwrap();
        state.phase = Phase::Attack;
        for territory in state.territories.values_mut() {
            territory.owner = Some(PlayerId::from("blue"));
            territory.armies = 1;
        }
        state
    }

    fn own(state: &mut GameState, id: &str, player: &str, armies: u32) {
        state.update_territory(&TerritoryId::from(id), Some(PlayerId::from(player)), armies);
    }

    fn tid(id: &str) -> TerritoryId {
        TerritoryId::from(id)
    }

    #[test]
    fn attack_requires_ownership_armies_and_border() {
        let mut state = board();
        own(&mut state, "alaska", "red", 3);

        assert!(validate_attack(&state, &tid("alaska"), &tid("kamchatka")).is_ok());
        assert_eq!(
            validate_attack(&state, &tid("alaska"), &tid("peru")),
            Err(Rejection::NotAdjacent {
                from: tid("alaska"),
                to: tid("peru"),
            })
        );
        assert!(matches!(
            validate_attack(&state, &tid("kamchatka"), &tid("alaska")),
            Err(Rejection::NotOwnedByCurrentPlayer { .. })
        ));
        assert!(matches!(
            validate_attack(&state, &tid("alaska"), &tid("atlantis")),
            Err(Rejection::UnknownTerritory { .. })
        ));

        own(&mut state, "alberta", "red", 1);
        assert!(matches!(
            validate_attack(&state, &tid("alaska"), &tid("alberta")),
            Err(Rejection::SameOwner { .. })
        ));

        own(&mut state, "alaska", "red", 1);
        assert_eq!(
            validate_attack(&state, &tid("alaska"), &tid("kamchatka")),
            Err(Rejection::TooFewArmiesToAttack {
                territory: tid("alaska"),
                armies: 1,
            })
        );
    }

    #[test]
    fn attack_targets_are_hostile_neighbors() {
        let mut state = board();
        own(&mut state, "alaska", "red", 4);
        own(&mut state, "alberta", "red", 1);
        assert_eq!(
            valid_attack_targets(&state, &tid("alaska")),
            vec![tid("kamchatka"), tid("northwest_territory")]
        );
        assert!(valid_attack_targets(&state, &tid("alberta")).is_empty());
    }

    #[test]
    fn fortify_blocked_by_enemy_intermediate() {
        let mut state = board();
        own(&mut state, "alaska", "red", 5);
        own(&mut state, "alberta", "blue", 2);
        own(&mut state, "western_united_states", "red", 1);

        assert_eq!(
            validate_fortify(&state, &tid("alaska"), &tid("western_united_states")),
            Err(Rejection::NotConnected {
                from: tid("alaska"),
                to: tid("western_united_states"),
                player: PlayerId::from("red"),
            })
        );

        own(&mut state, "alberta", "red", 1);
        assert!(validate_fortify(&state, &tid("alaska"), &tid("western_united_states")).is_ok());
    }

    #[test]
    fn fortify_needs_spare_armies_and_distinct_owned_ends() {
        let mut state = board();
        own(&mut state, "alaska", "red", 1);
        own(&mut state, "alberta", "red", 1);
        assert!(matches!(
            validate_fortify(&state, &tid("alaska"), &tid("alberta")),
            Err(Rejection::MustKeepOneArmy { .. })
        ));
        own(&mut state, "alaska", "red", 2);
        assert!(matches!(
            validate_fortify(&state, &tid("alaska"), &tid("alaska")),
            Err(Rejection::SameTerritory { .. })
        ));
        assert!(matches!(
            validate_fortify(&state, &tid("alaska"), &tid("kamchatka")),
            Err(Rejection::NotOwnedByCurrentPlayer { .. })
        ));
    }

    #[test]
    fn search_handles_cycles_and_long_chains() {
        let mut state = board();
        // Ring around the north: alaska - nwt - ontario - alberta - alaska
        for id in ["alaska", "northwest_territory", "ontario", "alberta", "quebec"] {
            own(&mut state, id, "red", 2);
        }
        let reach = reachable_through_owned(&state, &PlayerId::from("red"), &tid("alaska"));
        assert_eq!(reach.len(), 5);
        assert_eq!(
            fortify_destinations(&state, &tid("alaska")),
            vec![
                tid("alberta"),
                tid("northwest_territory"),
                tid("ontario"),
                tid("quebec"),
            ]
        );
        assert!(
            reachable_through_owned(&state, &PlayerId::from("red"), &tid("peru")).is_empty()
        );
    }

    #[test]
    fn army_input_lists_every_violation() {
        assert!(validate_army_input(5, 4, ArmyRole::Attacker).is_ok());
        assert!(validate_army_input(3, 0, ArmyRole::Defender).is_ok());
        assert!(validate_army_input(3, 3, ArmyRole::Defender).is_ok());

        let err = validate_army_input(3, 4, ArmyRole::Defender).unwrap_err();
        assert_eq!(
            err.violations(),
            &[ArmyInputViolation::Gained {
                role: ArmyRole::Defender,
                current: 3,
                proposed: 4,
            }]
        );

        let err = validate_army_input(1, -1, ArmyRole::Attacker).unwrap_err();
        assert_eq!(err.violations().len(), 3);
        let message = err.to_string();
        assert!(message.contains("cannot be negative"));
        assert!(message.contains("at least one army behind"));
        assert!(message.contains("at least 2 armies"));
        assert_eq!(message.matches("; ").count(), 2);

        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert_eq!(boxed.to_string(), message);
    }

    #[test]
    fn validation_view_carries_reason() {
        let view = Validation::from(Err::<(), _>(Rejection::NoCurrentPlayer));
        assert!(!view.valid);
        assert_eq!(view.reason.as_deref(), Some("there is no current player"));
        assert!(Validation::from(Ok::<(), Rejection>(())).valid);
    }
}
