//! Bingo round simulator
//!
//! Runs automatic rounds with simulated players who mark every call and
//! claim as soon as a card completes, then prints the results as JSON.

use bingo_engine::{
    config::{generate_sample_config, ConfigLoader, EngineConfig},
    errors::{ConfigurationError, EngineResult},
    games::{PlayerId, RoundEvent, RoundId, RoundManager, RoundOptions, SettlementRecord},
    DrawMode,
};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::{path::PathBuf, time::Duration};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "bingo-sim")]
#[command(about = "Simulate numbers-bingo rounds")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play rounds to completion
    Run {
        /// Simulated players per round
        #[arg(short, long, default_value = "10")]
        players: u64,

        /// Cards each player buys
        #[arg(long, default_value = "1")]
        cards: usize,

        /// Entry price per card in minor units
        #[arg(short, long, default_value = "10")]
        entry_price: u64,

        /// Rounds to play back to back
        #[arg(short, long, default_value = "1")]
        rounds: usize,

        /// Milliseconds between calls; overrides the configured interval
        #[arg(short, long)]
        interval_ms: Option<u64>,
    },

    /// Write a default configuration file
    SampleConfig {
        #[arg(short, long, default_value = "bingo.toml")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> EngineResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bingo_engine=info,bingo_sim=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::SampleConfig { output } => {
            generate_sample_config(&output)?;
            info!("Wrote default configuration to {}", output);
        }
        Commands::Run {
            players,
            cards,
            entry_price,
            rounds,
            interval_ms,
        } => {
            let loader = match cli.config {
                Some(path) => ConfigLoader::new().with_path(path),
                None => ConfigLoader::new(),
            };
            let config = loader.load()?;
            check_seats(players, cards, &config)?;
            let interval = Duration::from_millis(interval_ms.unwrap_or(config.draws.call_interval_ms));
            let manager = RoundManager::new(config);

            let mut results = Vec::with_capacity(rounds);
            for _ in 0..rounds {
                let options = RoundOptions::new(entry_price).draw_mode(DrawMode::automatic(interval));
                let round = manager.create_round_with(options);
                let settlement = play_round(&manager, round, players, cards).await?;
                let snapshot = manager.snapshot(round).await?;

                results.push(json!({
                    "round_id": round,
                    "finish_reason": snapshot.finish_reason,
                    "calls": snapshot.draw_history.len(),
                    "last_call": snapshot.last_call,
                    "settlement": settlement,
                }));
            }
            manager.prune_finished().await;

            let report = json!({
                "rounds": results,
                "leaderboard": manager.top_players(10),
                "metrics": manager.metrics(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&report).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
            );
        }
    }

    Ok(())
}

/// A round only starts once enough cards are sold; fewer seats would wait forever
fn check_seats(players: u64, cards: usize, config: &EngineConfig) -> EngineResult<()> {
    let seats = players.saturating_mul(cards as u64);
    let needed = config.rounds.min_players as u64;
    if seats < needed {
        return Err(ConfigurationError::InvalidValue {
            field: "players".to_string(),
            value: seats.to_string(),
            reason: format!("{} players x {} cards cannot reach min_players = {}", players, cards, needed),
        }
        .into());
    }
    Ok(())
}

async fn play_round(
    manager: &RoundManager,
    round: RoundId,
    players: u64,
    cards: usize,
) -> EngineResult<Option<SettlementRecord>> {
    let mut events = manager.subscribe(round)?;
    let players: Vec<PlayerId> = (1..=players).map(PlayerId).collect();

    for player in &players {
        for _ in 0..cards {
            manager.join(round, *player, None).await?;
        }
    }
    info!(round_id = %round, players = players.len(), "all players seated");

    loop {
        let number = match events.recv().await {
            Ok(RoundEvent::NumberDrawn { number, label, .. }) => {
                info!(round_id = %round, "called {}", label);
                number
            }
            Ok(RoundEvent::RoundFinished { settlement, .. }) => return Ok(settlement),
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                warn!(round_id = %round, skipped, "simulator fell behind the call stream");
                continue;
            }
            Err(RecvError::Closed) => return Ok(None),
        };

        for player in &players {
            if manager.mark(round, *player, number).await.is_err() {
                // Round ended between the call and the mark
                return Ok(manager.snapshot(round).await?.settlement);
            }
            if let Some(record) = manager.claim_win(round, *player).await.ok().flatten() {
                info!(
                    round_id = %round,
                    player_id = %player,
                    payout = record.payout,
                    "BINGO"
                );
                return Ok(Some(record));
            }
        }
    }
}
