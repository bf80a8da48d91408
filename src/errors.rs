//! Error types for the bingo engine
//!
//! Every failure the engine reports is local and recoverable. The outer
//! layers (chat bot, HTTP) translate a `RoundError` one-to-one into a user
//! message using its stable `code()`.

use crate::games::types::{PlayerId, RoundId, RoundStatus};

/// Root error type for all engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Round lifecycle errors
    #[error("Round error: {0}")]
    Round(#[from] RoundError),
}

/// Configuration and validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

/// Errors raised by card generation, draws, marks and settlement
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoundError {
    #[error("Card number {number} is outside 1..={max}")]
    InvalidCardNumber { number: u32, max: u32 },

    #[error("Invalid card layout: {0}")]
    InvalidCardLayout(String),

    #[error("Card {0} is already taken in this round")]
    CardAlreadyTaken(u32),

    #[error("Round is full ({capacity} cards)")]
    RoundFull { capacity: usize },

    #[error("Player {player} already holds {limit} cards")]
    CardLimitReached { player: PlayerId, limit: usize },

    #[error("Round cannot be joined while {0}")]
    RoundNotJoinable(RoundStatus),

    #[error("Round is not active (status: {0})")]
    RoundNotActive(RoundStatus),

    #[error("Player {0} has no card in this round")]
    PlayerNotInRound(PlayerId),

    #[error("Number {0} has not been drawn")]
    NumberNotDrawn(u8),

    #[error("Number {0} is outside 1..=75")]
    NumberOutOfRange(u8),

    #[error("Number {0} has already been drawn")]
    NumberAlreadyDrawn(u8),

    #[error("Round draws automatically; manual calls are disabled")]
    ManualDrawDisabled,

    #[error("Round {0} has already been settled")]
    AlreadySettled(RoundId),

    #[error("Round {0} not found")]
    RoundNotFound(RoundId),
}

impl RoundError {
    /// Stable machine-readable code for collaborators
    pub fn code(&self) -> &'static str {
        match self {
            RoundError::InvalidCardNumber { .. } => "INVALID_CARD_NUMBER",
            RoundError::InvalidCardLayout(_) => "INVALID_CARD_LAYOUT",
            RoundError::CardAlreadyTaken(_) => "CARD_ALREADY_TAKEN",
            RoundError::RoundFull { .. } => "ROUND_FULL",
            RoundError::CardLimitReached { .. } => "CARD_LIMIT_REACHED",
            RoundError::RoundNotJoinable(_) => "ROUND_NOT_JOINABLE",
            RoundError::RoundNotActive(_) => "ROUND_NOT_ACTIVE",
            RoundError::PlayerNotInRound(_) => "PLAYER_NOT_IN_ROUND",
            RoundError::NumberNotDrawn(_) => "NUMBER_NOT_DRAWN",
            RoundError::NumberOutOfRange(_) => "NUMBER_OUT_OF_RANGE",
            RoundError::NumberAlreadyDrawn(_) => "NUMBER_ALREADY_DRAWN",
            RoundError::ManualDrawDisabled => "MANUAL_DRAW_DISABLED",
            RoundError::AlreadySettled(_) => "ALREADY_SETTLED",
            RoundError::RoundNotFound(_) => "ROUND_NOT_FOUND",
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Configuration(ConfigurationError::LoadFailed(e.to_string()))
    }
}

// Convenience type alias for Results
pub type EngineResult<T> = Result<T, EngineError>;

/// Result alias for round-level operations
pub type RoundResult<T> = Result<T, RoundError>;
