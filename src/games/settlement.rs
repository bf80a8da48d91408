//! Settlement Module
//!
//! Splits a finished round's pool into operator commission and winner payout,
//! and keeps the cross-round leaderboard.

use crate::errors::{RoundError, RoundResult};
use crate::games::round::RoundState;
use crate::games::types::{PlayerId, RoundId, WinPattern, WinResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Basis points in 100%
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Settlement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Operator cut of the pool in basis points (2000 = 20%)
    pub commission_bps: u32,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            commission_bps: 2_000,
        }
    }
}

/// Leaderboard change applied by one settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardDelta {
    pub wins: u64,
    pub earnings: u64,
}

/// Payout record created once per won round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub settlement_id: Uuid,
    pub round_id: RoundId,
    pub winner: PlayerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<WinPattern>,
    pub pool: u64,
    pub commission_bps: u32,
    pub commission: u64,
    pub payout: u64,
    pub leaderboard_delta: LeaderboardDelta,
    pub settled_at: DateTime<Utc>,
}

/// Split `pool` into (commission, payout); the two always add up to `pool`
pub fn split_pool(pool: u64, commission_bps: u32) -> (u64, u64) {
    let commission = (pool as u128 * commission_bps as u128 / BPS_DENOMINATOR as u128) as u64;
    (commission, pool - commission)
}

/// Cumulative results for one player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub player: PlayerId,
    pub wins: u64,
    pub earnings: u64,
}

/// Wins and earnings across rounds
#[derive(Default)]
pub struct Leaderboard {
    entries: DashMap<PlayerId, LeaderboardEntry>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, player: PlayerId, delta: LeaderboardDelta) -> LeaderboardEntry {
        let mut entry = self.entries.entry(player).or_insert(LeaderboardEntry {
            player,
            wins: 0,
            earnings: 0,
        });
        entry.wins += delta.wins;
        entry.earnings += delta.earnings;
        *entry
    }

    pub fn entry(&self, player: PlayerId) -> Option<LeaderboardEntry> {
        self.entries.get(&player).map(|e| *e)
    }

    /// Best `n` players by earnings, then wins
    pub fn top(&self, n: usize) -> Vec<LeaderboardEntry> {
        let mut all: Vec<LeaderboardEntry> = self.entries.iter().map(|e| *e.value()).collect();
        all.sort_by(|a, b| {
            b.earnings
                .cmp(&a.earnings)
                .then(b.wins.cmp(&a.wins))
                .then(a.player.cmp(&b.player))
        });
        all.truncate(n);
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Computes settlements and feeds the leaderboard
#[derive(Clone)]
pub struct Settlement {
    config: SettlementConfig,
    leaderboard: Arc<Leaderboard>,
}

impl Settlement {
    pub fn new(config: SettlementConfig, leaderboard: Arc<Leaderboard>) -> Self {
        Self { config, leaderboard }
    }

    pub fn leaderboard(&self) -> &Arc<Leaderboard> {
        &self.leaderboard
    }

    /// Settle `round` in favour of `winner`. Fails if the round already has a record.
    pub fn settle(
        &self,
        round: &mut RoundState,
        winner: PlayerId,
        win: Option<WinResult>,
    ) -> RoundResult<SettlementRecord> {
        if round.settlement().is_some() {
            return Err(RoundError::AlreadySettled(round.id()));
        }

        let pool = round.pool();
        let (commission, payout) = split_pool(pool, self.config.commission_bps);
        let delta = LeaderboardDelta {
            wins: 1,
            earnings: payout,
        };

        let record = SettlementRecord {
            settlement_id: Uuid::new_v4(),
            round_id: round.id(),
            winner,
            card_number: win.map(|w| w.card_number),
            pattern: win.map(|w| w.pattern),
            pool,
            commission_bps: self.config.commission_bps,
            commission,
            payout,
            leaderboard_delta: delta,
            settled_at: Utc::now(),
        };

        round.record_settlement(record.clone());
        let standing = self.leaderboard.record(winner, delta);

        info!(
            round_id = %record.round_id,
            player_id = %winner,
            pool,
            commission,
            payout,
            total_wins = standing.wins,
            "round settled"
        );

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::draw_pool::DrawPool;
    use crate::games::types::DrawMode;

    fn round_with_pool(entry_price: u64, cards: u32) -> RoundState {
        let mut round = RoundState::new(RoundId::new(), entry_price, DrawMode::Manual, DrawPool::new());
        for _ in 0..cards {
            round.add_pool_entry();
        }
        round
    }

    #[test]
    fn test_split_pool() {
        assert_eq!(split_pool(100, 2_000), (20, 80));
        assert_eq!(split_pool(0, 2_000), (0, 0));
        assert_eq!(split_pool(15, 2_000), (3, 12));
        assert_eq!(split_pool(7, 2_000), (1, 6));
        assert_eq!(split_pool(u64::MAX, 10_000), (u64::MAX, 0));
    }

    #[test]
    fn test_settlement_processing() {
        let leaderboard = Arc::new(Leaderboard::new());
        let settlement = Settlement::new(SettlementConfig::default(), leaderboard.clone());
        let mut round = round_with_pool(10, 10);

        let record = settlement.settle(&mut round, PlayerId(1), None).unwrap();
        assert_eq!(record.pool, 100);
        assert_eq!(record.commission, 20);
        assert_eq!(record.payout, 80);
        assert_eq!(record.commission + record.payout, record.pool);
        assert_eq!(round.settlement(), Some(&record));

        let entry = leaderboard.entry(PlayerId(1)).unwrap();
        assert_eq!(entry.wins, 1);
        assert_eq!(entry.earnings, 80);
    }

    #[test]
    fn test_double_settlement_is_rejected() {
        let leaderboard = Arc::new(Leaderboard::new());
        let settlement = Settlement::new(SettlementConfig::default(), leaderboard.clone());
        let mut round = round_with_pool(10, 2);

        settlement.settle(&mut round, PlayerId(1), None).unwrap();
        let err = settlement.settle(&mut round, PlayerId(1), None).unwrap_err();
        assert_eq!(err, RoundError::AlreadySettled(round.id()));

        // No double payout
        assert_eq!(leaderboard.entry(PlayerId(1)).unwrap().earnings, 16);
    }

    #[test]
    fn test_leaderboard_ordering() {
        let leaderboard = Leaderboard::new();
        leaderboard.record(PlayerId(1), LeaderboardDelta { wins: 1, earnings: 50 });
        leaderboard.record(PlayerId(2), LeaderboardDelta { wins: 1, earnings: 80 });
        leaderboard.record(PlayerId(3), LeaderboardDelta { wins: 1, earnings: 20 });
        leaderboard.record(PlayerId(3), LeaderboardDelta { wins: 1, earnings: 30 });

        let top = leaderboard.top(10);
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].player, PlayerId(2));
        // Tie on earnings: more wins first
        assert_eq!(top[1].player, PlayerId(3));
        assert_eq!(top[1].wins, 2);
        assert_eq!(top[2].player, PlayerId(1));

        assert_eq!(leaderboard.top(1).len(), 1);
    }
}
