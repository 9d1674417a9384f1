//! Conquest Game Engine
//!
//! Rules engine for a territory-conquest strategy game: the turn and phase
//! state machine, battle resolution, reinforcement allotment and move
//! validation. This crate has no UI, storage or platform dependencies; hosts
//! plug those in through [`MapLoader`] and [`GameStorage`].

pub mod clock;
pub mod combat;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod map;
pub mod reinforcement;
pub mod response;
pub mod session;
pub mod state;
pub mod store;
pub mod turn;
pub mod validation;

// Re-export commonly used types
pub use clock::{Clock, SteppingClock, SystemClock};
pub use combat::{
    ArmyRange, Battle, BattleOptions, BattleRound, BattleStatus, BattleSummary, CombatEngine,
    CombatStatistics, CombatView, ConquestReport, DeclaredOutcome, DiceRoll, DiceStrategy,
    OutcomeStrategy, PlayerCombatStats, RoundReport, SuggestedOutcome,
};
pub use config::{CombatConfig, ReinforcementConfig, RulesConfig, StartupConfig};
pub use error::{EngineError, SetupError};
pub use ids::{ContinentId, PlayerId, TerritoryId};
pub use map::{Continent, MapData, MapError, TerritoryDef};
pub use reinforcement::{
    ContinentBonus, ReinforcementBreakdown, calculate_reinforcements, controlled_continents,
    owned_territory_count, reinforcement_breakdown,
};
pub use response::Response;
pub use session::GameSession;
pub use state::{GameState, Phase, PhaseRules, Player, Territory};
pub use store::{GameStore, TerritoryChange};
pub use turn::{
    ClickOutcome, FortifyReport, PhaseChange, PlacementReport, Selection, TurnController,
};
pub use validation::{
    ArmyInputErrors, ArmyInputViolation, ArmyRole, Rejection, Validation, connected_through_owned,
    fortify_destinations, valid_attack_targets, validate_army_input, validate_attack,
    validate_fortify,
};

/// Trait for abstracting map and rules loading
/// Platform-specific implementations should provide this
pub trait MapLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the board a new game is played on
    ///
    /// # Errors
    ///
    /// Returns an error if the map data cannot be loaded.
    fn load_map(&self) -> Result<MapData, Self::Error>;

    /// Load the rules configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or parsed.
    fn load_rules(&self) -> Result<RulesConfig, Self::Error>;
}

/// Trait for abstracting save/load operations
/// Platform-specific implementations should provide this
pub trait GameStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save game state
    ///
    /// # Errors
    ///
    /// Returns an error if the game state cannot be saved.
    fn save_game(&self, save_name: &str, game_state: &GameState) -> Result<(), Self::Error>;

    /// Load game state
    ///
    /// # Errors
    ///
    /// Returns an error if the game state cannot be loaded.
    fn load_game(&self, save_name: &str) -> Result<Option<GameState>, Self::Error>;

    /// Delete saved game
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    fn delete_save(&self, save_name: &str) -> Result<(), Self::Error>;
}

/// Main game engine for managing game instances
pub struct GameEngine<L, S>
where
    L: MapLoader,
    S: GameStorage,
{
    map_loader: L,
    storage: S,
}

impl<L, S> GameEngine<L, S>
where
    L: MapLoader,
    S: GameStorage,
{
    /// Create a new game engine with the provided map loader and storage
    pub const fn new(map_loader: L, storage: S) -> Self {
        Self {
            map_loader,
            storage,
        }
    }

    /// Seat `players` on the loaded map and begin startup placement.
    ///
    /// # Errors
    ///
    /// Returns an error if the map or rules cannot be loaded, or the players
    /// cannot be seated.
    pub fn create_session(&self, players: Vec<Player>) -> Result<GameSession, anyhow::Error>
    where
        L::Error: Into<anyhow::Error>,
    {
        let map = self.map_loader.load_map().map_err(Into::into)?;
        let rules = self.map_loader.load_rules().map_err(Into::into)?;
        Ok(GameSession::new(&map, players, rules)?)
    }

    /// Save a game state
    ///
    /// # Errors
    ///
    /// Returns an error if the game state cannot be saved.
    pub fn save_game(&self, save_name: &str, game_state: &GameState) -> Result<(), S::Error> {
        self.storage.save_game(save_name, game_state)
    }

    /// Load a game state
    ///
    /// # Errors
    ///
    /// Returns an error if the game state cannot be loaded or rehydrated.
    pub fn load_game(&self, save_name: &str) -> Result<Option<GameState>, anyhow::Error>
    where
        L::Error: Into<anyhow::Error>,
        S::Error: Into<anyhow::Error>,
    {
        if let Some(game_state) = self.storage.load_game(save_name).map_err(Into::into)? {
            // Rehydrate static board data from the current map
            let map = self.map_loader.load_map().map_err(Into::into)?;
            Ok(Some(game_state.rehydrate(&map)?))
        } else {
            Ok(None)
        }
    }

    /// Load a saved game and resume it as a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the save, map or rules cannot be loaded.
    pub fn resume_session(&self, save_name: &str) -> Result<Option<GameSession>, anyhow::Error>
    where
        L::Error: Into<anyhow::Error>,
        S::Error: Into<anyhow::Error>,
    {
        let Some(state) = self.load_game(save_name)? else {
            return Ok(None);
        };
        let rules = self.map_loader.load_rules().map_err(Into::into)?;
        Ok(Some(GameSession::from_state(state, rules)))
    }

    /// Delete a saved game
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    pub fn delete_game(&self, save_name: &str) -> Result<(), S::Error> {
        self.storage.delete_save(save_name)
    }
}
