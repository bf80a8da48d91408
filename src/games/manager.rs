//! Round registry
//!
//! Owns every live round behind its id. Sessions are handed out as `Arc`s so
//! no registry shard lock is held across an `.await`.

use crate::config::EngineConfig;
use crate::errors::{RoundError, RoundResult};
use crate::games::card::Card;
use crate::games::draw_pool::{DrawPool, DrawnNumber};
use crate::games::events::{EventPublisher, RoundEvent};
use crate::games::round::{MarkOutcome, PlayerSummary, RoundSnapshot};
use crate::games::session::{GameSession, RoundRules};
use crate::games::settlement::{Leaderboard, LeaderboardEntry, Settlement, SettlementRecord};
use crate::games::types::{DrawMode, PlayerId, RoundId, RoundStatus, WinResult};
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Per-round overrides for `create_round_with`
#[derive(Debug, Clone, Default)]
pub struct RoundOptions {
    pub entry_price: u64,
    /// Falls back to the configured default mode
    pub draw_mode: Option<DrawMode>,
    /// Fixed draw order for this round
    pub seed: Option<u64>,
}

impl RoundOptions {
    pub fn new(entry_price: u64) -> Self {
        Self {
            entry_price,
            ..Self::default()
        }
    }

    pub fn manual(mut self) -> Self {
        self.draw_mode = Some(DrawMode::Manual);
        self
    }

    pub fn draw_mode(mut self, mode: DrawMode) -> Self {
        self.draw_mode = Some(mode);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

pub struct RoundManager {
    config: Arc<EngineConfig>,
    rounds: DashMap<RoundId, Arc<GameSession>>,
    leaderboard: Arc<Leaderboard>,
    metrics: Arc<EngineMetrics>,
    /// Rounds created so far; offsets the configured seed per round
    sequence: AtomicU64,
}

impl RoundManager {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
            rounds: DashMap::new(),
            leaderboard: Arc::new(Leaderboard::new()),
            metrics: Arc::new(EngineMetrics::new()),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// New round in the configured draw mode
    pub fn create_round(&self, entry_price: u64) -> RoundId {
        self.create_round_with(RoundOptions::new(entry_price))
    }

    pub fn create_round_with(&self, options: RoundOptions) -> RoundId {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let draw_mode = options
            .draw_mode
            .unwrap_or_else(|| self.config.draws.default_mode());

        let draws = match options.seed {
            Some(seed) => DrawPool::with_seed(seed),
            None => match self.config.draws.seed {
                Some(seed) => DrawPool::with_seed(seed.wrapping_add(sequence)),
                None => DrawPool::new(),
            },
        };

        let rounds = &self.config.rounds;
        let rules = RoundRules {
            entry_price: options.entry_price,
            min_players: rounds.min_players,
            max_cards: rounds.max_cards,
            max_cards_per_player: rounds.max_cards_per_player,
            card_number_max: rounds.card_number_max,
            allow_late_join: rounds.allow_late_join,
        };

        let session = GameSession::new(
            rules,
            draw_mode,
            draws,
            Settlement::new(self.config.settlement.clone(), self.leaderboard.clone()),
            EventPublisher::new(self.config.events.channel_capacity),
            self.metrics.clone(),
        );
        let id = session.id();

        self.rounds.insert(id, Arc::new(session));
        self.metrics.record_round_created();
        info!(round_id = %id, entry_price = options.entry_price, mode = ?draw_mode, "round created");

        id
    }

    /// Look up a live round
    pub fn session(&self, round: RoundId) -> RoundResult<Arc<GameSession>> {
        self.rounds
            .get(&round)
            .map(|entry| entry.value().clone())
            .ok_or(RoundError::RoundNotFound(round))
    }

    pub fn round_ids(&self) -> Vec<RoundId> {
        self.rounds.iter().map(|entry| *entry.key()).collect()
    }

    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    pub async fn join(&self, round: RoundId, player: PlayerId, card_number: Option<u32>) -> RoundResult<Card> {
        self.session(round)?.join(player, card_number).await
    }

    pub async fn draw(&self, round: RoundId) -> RoundResult<Option<DrawnNumber>> {
        self.session(round)?.draw().await
    }

    pub async fn draw_number(&self, round: RoundId, number: u8) -> RoundResult<DrawnNumber> {
        self.session(round)?.draw_number(number).await
    }

    pub async fn mark(&self, round: RoundId, player: PlayerId, number: u8) -> RoundResult<MarkOutcome> {
        self.session(round)?.mark(player, number).await
    }

    pub async fn check_win(&self, round: RoundId, player: PlayerId) -> RoundResult<Option<WinResult>> {
        self.session(round)?.check_win(player).await
    }

    pub async fn claim_win(&self, round: RoundId, player: PlayerId) -> RoundResult<Option<SettlementRecord>> {
        self.session(round)?.claim_win(player).await
    }

    pub async fn end_round(&self, round: RoundId, winner: PlayerId) -> RoundResult<SettlementRecord> {
        self.session(round)?.end_game(winner).await
    }

    pub async fn close_round(&self, round: RoundId) -> RoundResult<()> {
        self.session(round)?.close().await
    }

    pub async fn snapshot(&self, round: RoundId) -> RoundResult<RoundSnapshot> {
        Ok(self.session(round)?.snapshot().await)
    }

    pub async fn player_summary(&self, round: RoundId, player: PlayerId) -> RoundResult<PlayerSummary> {
        self.session(round)?.player_summary(player).await
    }

    pub fn subscribe(&self, round: RoundId) -> RoundResult<broadcast::Receiver<RoundEvent>> {
        Ok(self.session(round)?.subscribe())
    }

    /// Drop finished rounds from the registry and return their final snapshots
    pub async fn prune_finished(&self) -> Vec<RoundSnapshot> {
        let sessions: Vec<Arc<GameSession>> = self.rounds.iter().map(|e| e.value().clone()).collect();

        let mut pruned = Vec::new();
        for session in sessions {
            let snapshot = session.snapshot().await;
            if snapshot.status == RoundStatus::Finished {
                self.rounds.remove(&session.id());
                pruned.push(snapshot);
            }
        }

        if !pruned.is_empty() {
            info!(pruned = pruned.len(), live = self.rounds.len(), "pruned finished rounds");
        }
        pruned
    }

    pub fn leaderboard(&self) -> &Arc<Leaderboard> {
        &self.leaderboard
    }

    pub fn top_players(&self, n: usize) -> Vec<LeaderboardEntry> {
        self.leaderboard.top(n)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl Default for RoundManager {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
