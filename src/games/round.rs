//! Per-round state: participants, their cards and marks, the draw history,
//! status timestamps and the settlement record.

use crate::games::card::Card;
use crate::games::draw_pool::DrawPool;
use crate::games::evaluator::{self, AcknowledgedSet, WinCheck};
use crate::games::settlement::SettlementRecord;
use crate::games::types::{DrawMode, FinishReason, PlayerId, RoundId, RoundStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tokio::task::AbortHandle;

/// A card held by a player together with what they have marked on it
#[derive(Debug, Clone)]
pub struct PlayerCard {
    card: Card,
    acknowledged: AcknowledgedSet,
}

impl PlayerCard {
    pub fn new(card: Card) -> Self {
        Self {
            card,
            acknowledged: AcknowledgedSet::new(),
        }
    }

    pub fn card(&self) -> &Card {
        &self.card
    }

    pub fn acknowledged(&self) -> &AcknowledgedSet {
        &self.acknowledged
    }

    /// Mark `number` if it is on this card. Returns whether the card has it.
    fn acknowledge(&mut self, number: u8) -> bool {
        if !self.card.contains(number) {
            return false;
        }
        self.acknowledged.insert(number);
        true
    }

    pub fn check(&self) -> WinCheck {
        evaluator::evaluate(&self.card, &self.acknowledged)
    }
}

/// One player's seat in a round
#[derive(Debug, Clone)]
pub struct PlayerInRound {
    player_id: PlayerId,
    joined_at: DateTime<Utc>,
    cards: Vec<PlayerCard>,
}

impl PlayerInRound {
    fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            joined_at: Utc::now(),
            cards: Vec::new(),
        }
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    pub fn cards(&self) -> &[PlayerCard] {
        &self.cards
    }

    pub fn card_numbers(&self) -> Vec<u32> {
        self.cards.iter().map(|c| c.card.number()).collect()
    }

    /// Mark `number` on every held card containing it.
    /// Returns true if at least one card has the number.
    pub(crate) fn acknowledge(&mut self, number: u8) -> bool {
        let mut on_any = false;
        for card in &mut self.cards {
            on_any |= card.acknowledge(number);
        }
        on_any
    }

    fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            player_id: self.player_id,
            joined_at: self.joined_at,
            cards: self.cards.iter().map(CardSummary::from).collect(),
        }
    }
}

/// Aborts the auto-draw task when dropped
pub(crate) struct TimerGuard(AbortHandle);

impl TimerGuard {
    pub(crate) fn new(handle: AbortHandle) -> Self {
        Self(handle)
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Mutable state of one round, guarded by the session's lock
pub struct RoundState {
    id: RoundId,
    entry_price: u64,
    pool: u64,
    status: RoundStatus,
    draw_mode: DrawMode,
    draws: DrawPool,
    players: BTreeMap<PlayerId, PlayerInRound>,
    taken_cards: BTreeSet<u32>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    winner: Option<PlayerId>,
    finish_reason: Option<FinishReason>,
    settlement: Option<SettlementRecord>,
    timer: Option<TimerGuard>,
}

impl RoundState {
    pub fn new(id: RoundId, entry_price: u64, draw_mode: DrawMode, draws: DrawPool) -> Self {
        Self {
            id,
            entry_price,
            pool: 0,
            status: RoundStatus::Waiting,
            draw_mode,
            draws,
            players: BTreeMap::new(),
            taken_cards: BTreeSet::new(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            winner: None,
            finish_reason: None,
            settlement: None,
            timer: None,
        }
    }

    pub fn id(&self) -> RoundId {
        self.id
    }

    pub fn entry_price(&self) -> u64 {
        self.entry_price
    }

    pub fn pool(&self) -> u64 {
        self.pool
    }

    pub fn status(&self) -> RoundStatus {
        self.status
    }

    pub fn draw_mode(&self) -> DrawMode {
        self.draw_mode
    }

    pub fn draws(&self) -> &DrawPool {
        &self.draws
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn settlement(&self) -> Option<&SettlementRecord> {
        self.settlement.as_ref()
    }

    pub fn player(&self, player: PlayerId) -> Option<&PlayerInRound> {
        self.players.get(&player)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerInRound> {
        self.players.values()
    }

    /// Cards sold so far; each card is one entry into the pool
    pub fn participant_count(&self) -> usize {
        self.taken_cards.len()
    }

    pub fn is_card_taken(&self, card_number: u32) -> bool {
        self.taken_cards.contains(&card_number)
    }

    pub fn has_auto_draw(&self) -> bool {
        self.timer.is_some()
    }

    pub(crate) fn player_mut(&mut self, player: PlayerId) -> Option<&mut PlayerInRound> {
        self.players.get_mut(&player)
    }

    pub(crate) fn draws_mut(&mut self) -> &mut DrawPool {
        &mut self.draws
    }

    pub(crate) fn add_pool_entry(&mut self) {
        self.pool += self.entry_price;
    }

    /// Seat `card` for `player` and collect the entry price
    pub(crate) fn seat_card(&mut self, player: PlayerId, card: Card) {
        self.taken_cards.insert(card.number());
        self.players
            .entry(player)
            .or_insert_with(|| PlayerInRound::new(player))
            .cards
            .push(PlayerCard::new(card));
        self.add_pool_entry();
    }

    pub(crate) fn mark_started(&mut self) {
        self.status = RoundStatus::Active;
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn set_timer(&mut self, timer: TimerGuard) {
        self.timer = Some(timer);
    }

    /// Terminal transition. Drops the timer guard, which aborts any pending auto-draw.
    pub(crate) fn mark_finished(&mut self, reason: FinishReason, winner: Option<PlayerId>) {
        self.status = RoundStatus::Finished;
        self.finished_at = Some(Utc::now());
        self.finish_reason = Some(reason);
        self.winner = winner;
        self.timer = None;
    }

    pub(crate) fn record_settlement(&mut self, record: SettlementRecord) {
        self.settlement = Some(record);
    }

    pub fn player_summary(&self, player: PlayerId) -> Option<PlayerSummary> {
        self.players.get(&player).map(PlayerInRound::summary)
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            round_id: self.id,
            status: self.status,
            draw_mode: self.draw_mode,
            entry_price: self.entry_price,
            pool: self.pool,
            card_count: self.participant_count(),
            participants: self
                .players
                .values()
                .map(|p| ParticipantSummary {
                    player_id: p.player_id,
                    card_numbers: p.card_numbers(),
                    joined_at: p.joined_at,
                })
                .collect(),
            draw_history: self.draws.numbers(),
            last_call: self.draws.last().map(|d| d.label()),
            winner: self.winner,
            finish_reason: self.finish_reason,
            settlement: self.settlement.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Per-card marks as returned to collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardMarks {
    pub card_number: u32,
    pub acknowledged: Vec<u8>,
}

impl From<&PlayerCard> for CardMarks {
    fn from(card: &PlayerCard) -> Self {
        Self {
            card_number: card.card.number(),
            acknowledged: card.acknowledged.to_vec(),
        }
    }
}

/// Result of a mark request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkOutcome {
    pub number: u8,
    /// At least one of the player's cards holds the number
    pub acknowledged: bool,
    pub cards: Vec<CardMarks>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardSummary {
    pub card_number: u32,
    pub cells: Vec<u8>,
    pub free_number: u8,
    pub acknowledged: Vec<u8>,
}

impl From<&PlayerCard> for CardSummary {
    fn from(card: &PlayerCard) -> Self {
        Self {
            card_number: card.card.number(),
            cells: card.card.cells().to_vec(),
            free_number: card.card.free_number(),
            acknowledged: card.acknowledged.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub player_id: PlayerId,
    pub joined_at: DateTime<Utc>,
    pub cards: Vec<CardSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub player_id: PlayerId,
    pub card_numbers: Vec<u32>,
    pub joined_at: DateTime<Utc>,
}

/// Point-in-time view of a round for collaborators to persist or render
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub round_id: RoundId,
    pub status: RoundStatus,
    pub draw_mode: DrawMode,
    pub entry_price: u64,
    pub pool: u64,
    pub card_count: usize,
    pub participants: Vec<ParticipantSummary>,
    pub draw_history: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_call: Option<String>,
    pub winner: Option<PlayerId>,
    pub finish_reason: Option<FinishReason>,
    pub settlement: Option<SettlementRecord>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}
