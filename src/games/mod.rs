//! Bingo round engine
//!
//! Leaf-first: cards, draws and the win evaluator are pure building blocks;
//! the scheduler and session drive a round's lifecycle; settlement pays it
//! out; the manager keeps every live round behind its id.

pub mod card;
pub mod draw_pool;
pub mod evaluator;
pub mod events;
pub mod manager;
pub mod round;
pub mod scheduler;
pub mod session;
pub mod settlement;
pub mod types;

pub use card::{Card, CardGenerator};
pub use draw_pool::{DrawPool, DrawnNumber};
pub use evaluator::{evaluate, AcknowledgedSet, WinCheck};
pub use events::{EventPublisher, RoundEvent};
pub use manager::{RoundManager, RoundOptions};
pub use round::{CardMarks, CardSummary, MarkOutcome, PlayerSummary, RoundSnapshot};
pub use scheduler::{DrawTrigger, RoundScheduler};
pub use session::{GameSession, RoundRules};
pub use settlement::{split_pool, Leaderboard, LeaderboardEntry, Settlement, SettlementConfig, SettlementRecord};
pub use types::*;
