//! Round events for collaborators to relay or persist
//!
//! Each round owns a broadcast channel. Publishing never blocks and never
//! fails the engine operation that produced the event; a round with no
//! subscribers simply drops its events.

use crate::games::draw_pool::DrawnNumber;
use crate::games::round::RoundState;
use crate::games::settlement::SettlementRecord;
use crate::games::types::{FinishReason, PlayerId, RoundId, WinResult, WinPattern};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Events emitted over a round's lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundEvent {
    RoundStarted {
        round_id: RoundId,
        participants: usize,
        pool: u64,
        at: DateTime<Utc>,
    },

    NumberDrawn {
        round_id: RoundId,
        number: u8,
        label: String,
        sequence: usize,
        remaining: usize,
        at: DateTime<Utc>,
    },

    PlayerWon {
        round_id: RoundId,
        player_id: PlayerId,
        card_number: u32,
        pattern: WinPattern,
    },

    RoundFinished {
        round_id: RoundId,
        reason: FinishReason,
        winner: Option<PlayerId>,
        settlement: Option<SettlementRecord>,
        at: DateTime<Utc>,
    },
}

impl RoundEvent {
    pub fn round_id(&self) -> RoundId {
        match self {
            RoundEvent::RoundStarted { round_id, .. }
            | RoundEvent::NumberDrawn { round_id, .. }
            | RoundEvent::PlayerWon { round_id, .. }
            | RoundEvent::RoundFinished { round_id, .. } => *round_id,
        }
    }
}

/// Sending half of a round's event channel
#[derive(Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<RoundEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn publish(&self, event: RoundEvent) {
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            trace!(round_id = %event.round_id(), "no subscribers for round event");
        }
    }

    pub(crate) fn round_started(&self, round: &RoundState) {
        self.publish(RoundEvent::RoundStarted {
            round_id: round.id(),
            participants: round.participant_count(),
            pool: round.pool(),
            at: Utc::now(),
        });
    }

    pub(crate) fn number_drawn(&self, round: &RoundState, drawn: &DrawnNumber) {
        self.publish(RoundEvent::NumberDrawn {
            round_id: round.id(),
            number: drawn.number,
            label: drawn.label(),
            sequence: drawn.sequence,
            remaining: round.draws().remaining(),
            at: drawn.drawn_at,
        });
    }

    pub(crate) fn player_won(&self, round: &RoundState, player: PlayerId, win: WinResult) {
        self.publish(RoundEvent::PlayerWon {
            round_id: round.id(),
            player_id: player,
            card_number: win.card_number,
            pattern: win.pattern,
        });
    }

    pub(crate) fn round_finished(&self, round: &RoundState) {
        let Some(reason) = round.finish_reason() else {
            return;
        };
        self.publish(RoundEvent::RoundFinished {
            round_id: round.id(),
            reason,
            winner: round.winner(),
            settlement: round.settlement().cloned(),
            at: Utc::now(),
        });
    }
}
