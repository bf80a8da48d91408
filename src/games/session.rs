//! Game Session
//!
//! Entry point for everything players and operators do to a single round.
//! Every mutation runs under the round's write lock, and the checks for an
//! operation all happen before it changes any state.

use crate::errors::{RoundError, RoundResult};
use crate::games::card::{Card, CardGenerator};
use crate::games::draw_pool::{DrawPool, DrawnNumber};
use crate::games::events::{EventPublisher, RoundEvent};
use crate::games::round::{CardMarks, CardSummary, MarkOutcome, PlayerSummary, RoundSnapshot, RoundState};
use crate::games::scheduler::{DrawTrigger, RoundScheduler};
use crate::games::settlement::{Settlement, SettlementRecord};
use crate::games::types::{DrawMode, FinishReason, PlayerId, RoundId, RoundStatus, WinResult};
use crate::metrics::EngineMetrics;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// Joining rules for one round
#[derive(Debug, Clone)]
pub struct RoundRules {
    pub entry_price: u64,
    pub min_players: usize,
    pub max_cards: usize,
    pub max_cards_per_player: usize,
    pub card_number_max: u32,
    pub allow_late_join: bool,
}

impl Default for RoundRules {
    fn default() -> Self {
        Self {
            entry_price: 0,
            min_players: 1,
            max_cards: 100,
            max_cards_per_player: 5,
            card_number_max: 100,
            allow_late_join: true,
        }
    }
}

pub struct GameSession {
    id: RoundId,
    rules: RoundRules,
    generator: CardGenerator,
    state: Arc<RwLock<RoundState>>,
    scheduler: RoundScheduler,
    settlement: Settlement,
    events: EventPublisher,
    metrics: Arc<EngineMetrics>,
}

impl GameSession {
    pub fn new(
        rules: RoundRules,
        draw_mode: DrawMode,
        draws: DrawPool,
        settlement: Settlement,
        events: EventPublisher,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        let id = RoundId::new();
        let state = RoundState::new(id, rules.entry_price, draw_mode, draws);
        let scheduler = RoundScheduler::new(rules.min_players, events.clone(), metrics.clone());

        Self {
            id,
            generator: CardGenerator::new(rules.card_number_max),
            rules,
            state: Arc::new(RwLock::new(state)),
            scheduler,
            settlement,
            events,
            metrics,
        }
    }

    pub fn id(&self) -> RoundId {
        self.id
    }

    pub fn rules(&self) -> &RoundRules {
        &self.rules
    }

    pub async fn status(&self) -> RoundStatus {
        self.state.read().await.status()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.events.subscribe()
    }

    /// Seat `player` with `card_number`, or with a random free card when none is requested
    pub async fn join(&self, player: PlayerId, card_number: Option<u32>) -> RoundResult<Card> {
        let mut state = self.state.write().await;

        match state.status() {
            RoundStatus::Waiting => {}
            RoundStatus::Active if self.rules.allow_late_join => {}
            status => return Err(RoundError::RoundNotJoinable(status)),
        }

        if state.participant_count() >= self.rules.max_cards {
            return Err(RoundError::RoundFull {
                capacity: self.rules.max_cards,
            });
        }

        let held = state.player(player).map_or(0, |p| p.cards().len());
        if held >= self.rules.max_cards_per_player {
            return Err(RoundError::CardLimitReached {
                player,
                limit: self.rules.max_cards_per_player,
            });
        }

        let card = match card_number {
            Some(number) => {
                let card = self.generator.generate(number)?;
                if state.is_card_taken(number) {
                    return Err(RoundError::CardAlreadyTaken(number));
                }
                card
            }
            None => self.generator.generate(self.pick_free_card(&state)?)?,
        };

        state.seat_card(player, card.clone());
        self.metrics.record_card_sold();

        info!(
            round_id = %self.id,
            player_id = %player,
            card_number = card.number(),
            pool = state.pool(),
            "player joined"
        );

        self.scheduler.try_activate(&mut state, Arc::downgrade(&self.state));
        Ok(card)
    }

    fn pick_free_card(&self, state: &RoundState) -> RoundResult<u32> {
        let free: Vec<u32> = (1..=self.generator.max_card_number())
            .filter(|n| !state.is_card_taken(*n))
            .collect();

        free.choose(&mut rand::thread_rng())
            .copied()
            .ok_or(RoundError::RoundFull {
                capacity: self.rules.max_cards,
            })
    }

    /// Acknowledge a drawn number on every card `player` holds
    pub async fn mark(&self, player: PlayerId, number: u8) -> RoundResult<MarkOutcome> {
        let mut state = self.state.write().await;

        if state.status() != RoundStatus::Active {
            return Err(RoundError::RoundNotActive(state.status()));
        }
        if state.player(player).is_none() {
            return Err(RoundError::PlayerNotInRound(player));
        }
        if !state.draws().is_drawn(number) {
            return Err(RoundError::NumberNotDrawn(number));
        }

        let seat = state
            .player_mut(player)
            .ok_or(RoundError::PlayerNotInRound(player))?;
        let acknowledged = seat.acknowledge(number);
        let cards = seat.cards().iter().map(CardMarks::from).collect();

        self.metrics.record_mark();
        debug!(round_id = %self.id, player_id = %player, number, acknowledged, "number marked");

        Ok(MarkOutcome {
            number,
            acknowledged,
            cards,
        })
    }

    /// First winning card `player` holds, in join order
    pub async fn check_win(&self, player: PlayerId) -> RoundResult<Option<WinResult>> {
        let state = self.state.read().await;
        find_win(&state, player)
    }

    /// Settle the round for `winner` on the operator's word
    pub async fn end_game(&self, winner: PlayerId) -> RoundResult<SettlementRecord> {
        let mut state = self.state.write().await;
        ensure_settleable(&state, winner)?;
        let win = find_win(&state, winner)?;
        self.settle_locked(&mut state, winner, win)
    }

    /// Verify `player`'s cards and settle in their favour if one has won.
    /// The check and the settlement happen under one lock.
    pub async fn claim_win(&self, player: PlayerId) -> RoundResult<Option<SettlementRecord>> {
        let mut state = self.state.write().await;
        ensure_settleable(&state, player)?;

        match find_win(&state, player)? {
            Some(win) => self.settle_locked(&mut state, player, Some(win)).map(Some),
            None => Ok(None),
        }
    }

    fn settle_locked(
        &self,
        state: &mut RoundState,
        winner: PlayerId,
        win: Option<WinResult>,
    ) -> RoundResult<SettlementRecord> {
        self.scheduler.finish(state, FinishReason::Won, Some(winner))?;
        let record = self.settlement.settle(state, winner, win)?;
        self.metrics.record_settlement(record.pool, record.commission);

        if let Some(win) = win {
            self.events.player_won(state, winner, win);
        }
        self.events.round_finished(state);

        Ok(record)
    }

    /// Operator close; finishes the round with no winner and no settlement
    pub async fn close(&self) -> RoundResult<()> {
        let mut state = self.state.write().await;
        self.scheduler.finish(&mut state, FinishReason::Closed, None)?;
        self.events.round_finished(&state);
        Ok(())
    }

    /// Manual draw of the next random number
    pub async fn draw(&self) -> RoundResult<Option<DrawnNumber>> {
        let mut state = self.state.write().await;
        self.scheduler.draw(&mut state, DrawTrigger::Manual)
    }

    /// Manual call of a specific number
    pub async fn draw_number(&self, number: u8) -> RoundResult<DrawnNumber> {
        let mut state = self.state.write().await;
        self.scheduler.call_number(&mut state, number)
    }

    pub async fn snapshot(&self) -> RoundSnapshot {
        self.state.read().await.snapshot()
    }

    pub async fn player_summary(&self, player: PlayerId) -> RoundResult<PlayerSummary> {
        self.state
            .read()
            .await
            .player_summary(player)
            .ok_or(RoundError::PlayerNotInRound(player))
    }

    /// The winner's card as it stood at settlement
    pub async fn winner_card(&self) -> Option<CardSummary> {
        let state = self.state.read().await;
        let settlement = state.settlement()?;
        let seat = state.player(settlement.winner)?;

        let card = match settlement.card_number {
            Some(number) => seat.cards().iter().find(|c| c.card().number() == number)?,
            None => seat.cards().first()?,
        };
        Some(CardSummary::from(card))
    }

    /// Labelled call history, oldest first
    pub async fn call_history(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .draws()
            .history()
            .iter()
            .map(DrawnNumber::label)
            .collect()
    }
}

fn ensure_settleable(state: &RoundState, player: PlayerId) -> RoundResult<()> {
    if state.settlement().is_some() {
        return Err(RoundError::AlreadySettled(state.id()));
    }
    if state.status() != RoundStatus::Active {
        return Err(RoundError::RoundNotActive(state.status()));
    }
    if state.player(player).is_none() {
        return Err(RoundError::PlayerNotInRound(player));
    }
    Ok(())
}

fn find_win(state: &RoundState, player: PlayerId) -> RoundResult<Option<WinResult>> {
    let seat = state
        .player(player)
        .ok_or(RoundError::PlayerNotInRound(player))?;

    Ok(seat.cards().iter().find_map(|card| {
        card.check().pattern.map(|pattern| WinResult {
            card_number: card.card().number(),
            pattern,
        })
    }))
}
