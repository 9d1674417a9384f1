//! Ways of producing a battle round's outcome.
//!
//! The combat engine only ever consumes a [`DeclaredOutcome`]; a strategy is
//! anything that can produce one from the pre-round army counts.
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::config::CombatConfig;
use crate::constants::{DIE_FACES, MIN_GARRISON};

/// Army counts both sides are left with after a round.
///
/// Signed so that malformed outside input reaches validation intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredOutcome {
    pub attacker_remaining: i64,
    pub defender_remaining: i64,
}

impl DeclaredOutcome {
    #[must_use]
    pub const fn new(attacker_remaining: i64, defender_remaining: i64) -> Self {
        Self {
            attacker_remaining,
            defender_remaining,
        }
    }
}

pub trait OutcomeStrategy {
    /// Produce the post-round counts for a round fought at these armies.
    fn resolve(&mut self, attacker: u32, defender: u32) -> DeclaredOutcome;
}

impl OutcomeStrategy for DeclaredOutcome {
    fn resolve(&mut self, _attacker: u32, _defender: u32) -> DeclaredOutcome {
        *self
    }
}

pub type Dice = SmallVec<[u8; 3]>;

/// Faces rolled by both sides, highest first, and the losses they caused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    pub attacker: Dice,
    pub defender: Dice,
    pub attacker_losses: u32,
    pub defender_losses: u32,
}

/// Classic dice comparison driven by a seeded RNG.
///
/// The attacker rolls one die per army beyond the garrison up to the
/// configured cap; the defender rolls one per army up to its cap. Dice are
/// paired highest to highest and the defender wins ties.
#[derive(Debug, Clone)]
pub struct DiceStrategy {
    rng: ChaCha20Rng,
    config: CombatConfig,
    last_roll: Option<DiceRoll>,
}

impl DiceStrategy {
    #[must_use]
    pub fn seeded(seed: u64, config: CombatConfig) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            config,
            last_roll: None,
        }
    }

    #[must_use]
    pub const fn last_roll(&self) -> Option<&DiceRoll> {
        self.last_roll.as_ref()
    }

    #[must_use]
    pub fn attacker_dice(&self, attacker: u32) -> usize {
        let usable = attacker.saturating_sub(MIN_GARRISON);
        usize::try_from(usable.min(u32::from(self.config.max_attacker_dice))).unwrap_or(0)
    }

    #[must_use]
    pub fn defender_dice(&self, defender: u32) -> usize {
        usize::try_from(defender.min(u32::from(self.config.max_defender_dice))).unwrap_or(0)
    }

    fn throw(&mut self, count: usize) -> Dice {
        let mut dice: Dice = (0..count)
            .map(|_| self.rng.gen_range(1..=DIE_FACES))
            .collect();
        dice.sort_unstable_by(|a, b| b.cmp(a));
        dice
    }

    /// Roll one round at the given army counts.
    pub fn roll(&mut self, attacker: u32, defender: u32) -> DiceRoll {
        let attacker_dice = self.throw(self.attacker_dice(attacker));
        let defender_dice = self.throw(self.defender_dice(defender));

        let mut attacker_losses = 0;
        let mut defender_losses = 0;
        for (a, d) in attacker_dice.iter().zip(defender_dice.iter()) {
            if a > d {
                defender_losses += 1;
            } else {
                attacker_losses += 1;
            }
        }

        DiceRoll {
            attacker: attacker_dice,
            defender: defender_dice,
            attacker_losses,
            defender_losses,
        }
    }
}

impl OutcomeStrategy for DiceStrategy {
    fn resolve(&mut self, attacker: u32, defender: u32) -> DeclaredOutcome {
        let roll = self.roll(attacker, defender);
        let outcome = DeclaredOutcome::new(
            i64::from(attacker) - i64::from(roll.attacker_losses),
            i64::from(defender) - i64::from(roll.defender_losses),
        );
        self.last_roll = Some(roll);
        outcome
    }
}
