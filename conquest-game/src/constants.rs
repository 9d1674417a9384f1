//! Rule constants shared across the engine.

/// Armies a territory needs before it may launch an attack.
pub const MIN_ATTACK_ARMIES: u32 = 2;
/// Armies that must stay behind on any owned territory.
pub const MIN_GARRISON: u32 = 1;

pub const DEFAULT_TERRITORY_DIVISOR: u32 = 3;
pub const DEFAULT_MIN_REINFORCEMENT: u32 = 1;

pub const DEFAULT_MAX_ATTACKER_DICE: u8 = 3;
pub const DEFAULT_MAX_DEFENDER_DICE: u8 = 2;
pub const DIE_FACES: u8 = 6;

/// Startup allotment per player, keyed by seated player count.
pub const DEFAULT_STARTUP_ARMIES: [(usize, u32); 5] =
    [(2, 40), (3, 35), (4, 30), (5, 25), (6, 20)];
pub const DEFAULT_PLACEMENTS_PER_VISIT: u32 = 1;
