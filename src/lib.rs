//! Bingo Engine - real-time numbers-bingo rounds
//!
//! Generates deterministic cards, draws 1..=75 without replacement on a
//! manual or timed cadence, tracks what each player has marked, detects
//! completed patterns and settles the prize pool net of commission.
//!
//! Transport, persistence and payments belong to the caller: the engine
//! takes join/mark/call requests through [`RoundManager`] and hands back
//! snapshots, [`RoundEvent`]s and [`SettlementRecord`]s.

pub mod config;
pub mod errors;
pub mod games;
pub mod metrics;

pub use config::{ConfigBuilder, ConfigLoader, EngineConfig};
pub use errors::{ConfigurationError, EngineError, EngineResult, RoundError, RoundResult};
pub use games::{
    Card, DrawMode, FinishReason, PlayerId, RoundEvent, RoundId, RoundManager, RoundOptions, RoundSnapshot,
    RoundStatus, SettlementRecord, WinPattern, WinResult,
};
pub use metrics::{EngineMetrics, MetricsSnapshot};
