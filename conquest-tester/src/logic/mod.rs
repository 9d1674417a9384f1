pub mod game_tester;
pub mod reports;
pub mod tester;

pub use game_tester::{DriverStyle, GamePlan, GameSummary, GameTester, OutcomeSource};
pub use tester::*;
