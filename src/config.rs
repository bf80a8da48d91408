//! Engine configuration
//!
//! Defaults, optional TOML file, `BINGO_*` environment overrides and
//! validation, in that order.

use crate::errors::{ConfigurationError, EngineResult};
use crate::games::settlement::{SettlementConfig, BPS_DENOMINATOR};
use crate::games::types::DrawMode;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rounds: RoundConfig,
    pub draws: DrawConfig,
    pub settlement: SettlementConfig,
    pub events: EventConfig,
}

/// Joining rules applied to every round
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Cards that must be sold before a round activates
    pub min_players: usize,
    /// Cards a single round can hold
    pub max_cards: usize,
    pub max_cards_per_player: usize,
    /// Highest card number a player can request
    pub card_number_max: u32,
    /// Accept joins while a round is already drawing
    pub allow_late_join: bool,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            min_players: 1,
            max_cards: 100,
            max_cards_per_player: 5,
            card_number_max: 100,
            allow_late_join: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    /// New rounds draw on a timer unless created with an explicit mode
    pub auto_draw: bool,
    pub call_interval_ms: u64,
    /// Fixed seed for reproducible draw orders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            auto_draw: true,
            call_interval_ms: 3_500,
            seed: None,
        }
    }
}

impl DrawConfig {
    /// Draw mode for rounds created without an explicit one
    pub fn default_mode(&self) -> DrawMode {
        if self.auto_draw {
            DrawMode::automatic(Duration::from_millis(self.call_interval_ms))
        } else {
            DrawMode::Manual
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Per-round broadcast buffer; slow subscribers lag past this
    pub channel_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> EngineResult<EngineConfig> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Same as `load`, reading overrides through `lookup` instead of the process environment
    pub fn load_with<F>(&self, lookup: F) -> EngineResult<EngineConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => EngineConfig::default(),
        };

        apply_overrides(&mut config, lookup)?;
        self.validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> EngineResult<EngineConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    /// Validate configuration values
    pub fn validate(&self, config: &EngineConfig) -> EngineResult<()> {
        let rounds = &config.rounds;

        if rounds.min_players == 0 {
            return Err(invalid("rounds.min_players", 0, "At least one card must be sold to start").into());
        }
        if rounds.min_players > rounds.max_cards {
            return Err(invalid(
                "rounds.min_players",
                rounds.min_players,
                "Cannot exceed rounds.max_cards",
            )
            .into());
        }
        if rounds.max_cards as u64 > rounds.card_number_max as u64 {
            return Err(invalid(
                "rounds.max_cards",
                rounds.max_cards,
                "Cannot exceed rounds.card_number_max",
            )
            .into());
        }
        if rounds.max_cards_per_player == 0 {
            return Err(invalid("rounds.max_cards_per_player", 0, "Must allow at least one card").into());
        }
        if config.draws.call_interval_ms < 10 {
            return Err(invalid(
                "draws.call_interval_ms",
                config.draws.call_interval_ms,
                "Interval must be at least 10ms",
            )
            .into());
        }
        if config.settlement.commission_bps > BPS_DENOMINATOR {
            return Err(invalid(
                "settlement.commission_bps",
                config.settlement.commission_bps,
                "Commission cannot exceed 10000 bps",
            )
            .into());
        }
        if config.events.channel_capacity == 0 {
            return Err(invalid("events.channel_capacity", 0, "Capacity cannot be zero").into());
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &EngineConfig, path: &str) -> EngineResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_var<T: FromStr>(key: &str, raw: String, reason: &str) -> Result<T, ConfigurationError> {
    raw.parse().map_err(|_| invalid(key, raw.clone(), reason))
}

fn apply_overrides<F>(config: &mut EngineConfig, lookup: F) -> Result<(), ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup("BINGO_MIN_PLAYERS") {
        config.rounds.min_players = parse_var("BINGO_MIN_PLAYERS", raw, "Invalid player count")?;
    }
    if let Some(raw) = lookup("BINGO_MAX_CARDS") {
        config.rounds.max_cards = parse_var("BINGO_MAX_CARDS", raw, "Invalid card count")?;
    }
    if let Some(raw) = lookup("BINGO_MAX_CARDS_PER_PLAYER") {
        config.rounds.max_cards_per_player =
            parse_var("BINGO_MAX_CARDS_PER_PLAYER", raw, "Invalid card count")?;
    }
    if let Some(raw) = lookup("BINGO_ALLOW_LATE_JOIN") {
        config.rounds.allow_late_join = parse_var("BINGO_ALLOW_LATE_JOIN", raw, "Invalid boolean value")?;
    }
    if let Some(raw) = lookup("BINGO_AUTO_DRAW") {
        config.draws.auto_draw = parse_var("BINGO_AUTO_DRAW", raw, "Invalid boolean value")?;
    }
    if let Some(raw) = lookup("BINGO_CALL_INTERVAL_MS") {
        config.draws.call_interval_ms = parse_var("BINGO_CALL_INTERVAL_MS", raw, "Invalid interval")?;
    }
    if let Some(raw) = lookup("BINGO_DRAW_SEED") {
        config.draws.seed = Some(parse_var("BINGO_DRAW_SEED", raw, "Invalid seed")?);
    }
    if let Some(raw) = lookup("BINGO_COMMISSION_BPS") {
        config.settlement.commission_bps = parse_var("BINGO_COMMISSION_BPS", raw, "Invalid basis points")?;
    }

    Ok(())
}

/// Builder pattern for creating configurations
pub struct ConfigBuilder {
    config: EngineConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn rounds(mut self, rounds: RoundConfig) -> Self {
        self.config.rounds = rounds;
        self
    }

    pub fn draws(mut self, draws: DrawConfig) -> Self {
        self.config.draws = draws;
        self
    }

    pub fn settlement(mut self, settlement: SettlementConfig) -> Self {
        self.config.settlement = settlement;
        self
    }

    pub fn events(mut self, events: EventConfig) -> Self {
        self.config.events = events;
        self
    }

    pub fn min_players(mut self, min_players: usize) -> Self {
        self.config.rounds.min_players = min_players;
        self
    }

    /// Rounds created without an explicit mode draw only on request
    pub fn manual_draws(mut self) -> Self {
        self.config.draws.auto_draw = false;
        self
    }

    pub fn call_interval(mut self, interval: Duration) -> Self {
        self.config.draws.auto_draw = true;
        self.config.draws.call_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.draws.seed = Some(seed);
        self
    }

    pub fn commission_bps(mut self, bps: u32) -> Self {
        self.config.settlement.commission_bps = bps;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }

    /// Build and run the loader's validation
    pub fn build_validated(self) -> EngineResult<EngineConfig> {
        ConfigLoader::new().validate(&self.config)?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config(path: &str) -> EngineResult<()> {
    ConfigLoader::new().save(&EngineConfig::default(), path)
}
