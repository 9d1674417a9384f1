//! Operation and setup errors.
use thiserror::Error;

use crate::ids::{PlayerId, TerritoryId};
use crate::map::MapError;
use crate::state::Phase;
use crate::validation::{ArmyInputErrors, Rejection};

/// Why an engine operation was refused. Nothing is mutated when one of
/// these is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error("invalid battle outcome: {0}")]
    InvalidOutcome(ArmyInputErrors),
    #[error("no battle is in progress")]
    NoActiveBattle,
    #[error("battle {0} is still in progress")]
    BattleInProgress(u64),
    #[error("battle {0} is awaiting a conquest transfer")]
    ConquestPending(u64),
    #[error("battle {0} is not awaiting a conquest transfer")]
    NotInConquest(u64),
    #[error("must move between {min} and {max} armies (requested {requested})")]
    InvalidTransfer { requested: u32, min: u32, max: u32 },
    #[error("the {phase} phase cannot be skipped")]
    PhaseNotSkippable { phase: Phase },
    #[error("the {phase} phase cannot end with {remaining} armies left to place")]
    ArmiesRemaining { phase: Phase, remaining: u32 },
    #[error("action requires the {expected} phase (current phase is {actual})")]
    WrongPhase { expected: Phase, actual: Phase },
    #[error("{player} has no armies left to place")]
    NoArmiesLeft { player: PlayerId },
    #[error("cannot place {requested} armies, only {remaining} remain")]
    ExceedsAllotment { requested: u32, remaining: u32 },
    #[error("must place at least one army")]
    EmptyPlacement,
    #[error("`{territory}` is held by {owner}")]
    HeldByOpponent {
        territory: TerritoryId,
        owner: PlayerId,
    },
    #[error("unclaimed territories must be claimed before reinforcing `{territory}`")]
    MustClaimFirst { territory: TerritoryId },
    #[error("`{territory}` is held back for players who own no territory yet")]
    ClaimReserved { territory: TerritoryId },
    #[error("army count overflow on `{territory}`")]
    ArmyOverflow { territory: TerritoryId },
    #[error("fortification has already been used this turn")]
    FortificationUsed,
    #[error("select a source territory first")]
    NoSourceSelected,
    #[error("no fortification move is selected")]
    NoFortificationSelected,
    #[error("the game is over: {winner} controls every territory")]
    GameOver { winner: PlayerId },
}

/// Failures while seating players on a board.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error(transparent)]
    Map(#[from] MapError),
    #[error("a game needs at least one player")]
    NoPlayers,
    #[error("player `{0}` is seated more than once")]
    DuplicatePlayer(PlayerId),
    #[error("no startup allotment is configured for {0} players")]
    UnsupportedPlayerCount(usize),
    #[error("{players} players cannot share {territories} territories")]
    TooFewTerritories { players: usize, territories: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{ArmyInputViolation, ArmyRole};

    #[test]
    fn rejection_messages_pass_through() {
        let err = EngineError::from(Rejection::NoCurrentPlayer);
        assert_eq!(err.to_string(), "there is no current player");
    }

    #[test]
    fn outcome_errors_list_every_rule() {
        let err = EngineError::InvalidOutcome(ArmyInputErrors(vec![
            ArmyInputViolation::Negative {
                role: ArmyRole::Defender,
                proposed: -2,
            },
            ArmyInputViolation::AttackerTooFew { current: 1 },
        ]));
        let message = err.to_string();
        assert!(message.starts_with("invalid battle outcome: "));
        assert!(message.contains("defender armies cannot be negative"));
        assert!(message.contains("; attacker needed at least 2 armies"));
    }
}
