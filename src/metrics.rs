//! Engine counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub struct EngineMetrics {
    start_time: Instant,
    rounds_created: AtomicU64,
    rounds_started: AtomicU64,
    rounds_finished: AtomicU64,
    cards_sold: AtomicU64,
    draws: AtomicU64,
    marks: AtomicU64,
    wins: AtomicU64,
    pool_settled: AtomicU64,
    commission_collected: AtomicU64,
}

/// Serializable copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub rounds_created: u64,
    pub rounds_started: u64,
    pub rounds_finished: u64,
    pub cards_sold: u64,
    pub draws: u64,
    pub marks: u64,
    pub wins: u64,
    pub pool_settled: u64,
    pub commission_collected: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            rounds_created: AtomicU64::new(0),
            rounds_started: AtomicU64::new(0),
            rounds_finished: AtomicU64::new(0),
            cards_sold: AtomicU64::new(0),
            draws: AtomicU64::new(0),
            marks: AtomicU64::new(0),
            wins: AtomicU64::new(0),
            pool_settled: AtomicU64::new(0),
            commission_collected: AtomicU64::new(0),
        }
    }

    pub fn record_round_created(&self) {
        self.rounds_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_round_started(&self) {
        self.rounds_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_round_finished(&self) {
        self.rounds_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_card_sold(&self) {
        self.cards_sold.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_draw(&self) {
        self.draws.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mark(&self) {
        self.marks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_settlement(&self, pool: u64, commission: u64) {
        self.wins.fetch_add(1, Ordering::Relaxed);
        self.pool_settled.fetch_add(pool, Ordering::Relaxed);
        self.commission_collected.fetch_add(commission, Ordering::Relaxed);
    }

    pub fn total_runtime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.total_runtime().as_secs(),
            rounds_created: self.rounds_created.load(Ordering::Relaxed),
            rounds_started: self.rounds_started.load(Ordering::Relaxed),
            rounds_finished: self.rounds_finished.load(Ordering::Relaxed),
            cards_sold: self.cards_sold.load(Ordering::Relaxed),
            draws: self.draws.load(Ordering::Relaxed),
            marks: self.marks.load(Ordering::Relaxed),
            wins: self.wins.load(Ordering::Relaxed),
            pool_settled: self.pool_settled.load(Ordering::Relaxed),
            commission_collected: self.commission_collected.load(Ordering::Relaxed),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = EngineMetrics::new();
        metrics.record_round_created();
        metrics.record_draw();
        metrics.record_draw();
        metrics.record_settlement(100, 20);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rounds_created, 1);
        assert_eq!(snapshot.draws, 2);
        assert_eq!(snapshot.wins, 1);
        assert_eq!(snapshot.pool_settled, 100);
        assert_eq!(snapshot.commission_collected, 20);
        assert_eq!(snapshot.marks, 0);
    }
}
