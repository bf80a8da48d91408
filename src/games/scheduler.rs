//! Round Scheduler
//!
//! Owns every status transition and every append to the draw history. All
//! entry points take the round's state by `&mut`, so callers must hold the
//! round's write lock; that lock is what serializes timer draws against
//! manual calls.
//!
//! Automatic rounds get one tokio task that ticks at the configured interval.
//! The task only holds a weak reference to the round and re-checks the status
//! under the write lock before every draw. Terminal transitions drop the
//! task's abort guard inside the same critical section.

use crate::errors::{RoundError, RoundResult};
use crate::games::draw_pool::DrawnNumber;
use crate::games::events::EventPublisher;
use crate::games::round::{RoundState, TimerGuard};
use crate::games::types::{FinishReason, PlayerId, RoundStatus};
use crate::metrics::EngineMetrics;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Floor for the auto-draw period
const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Who asked for the next draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawTrigger {
    Manual,
    Timer,
}

#[derive(Clone)]
pub struct RoundScheduler {
    min_players: usize,
    events: EventPublisher,
    metrics: Arc<EngineMetrics>,
}

impl RoundScheduler {
    pub fn new(min_players: usize, events: EventPublisher, metrics: Arc<EngineMetrics>) -> Self {
        Self {
            min_players: min_players.max(1),
            events,
            metrics,
        }
    }

    pub fn min_players(&self) -> usize {
        self.min_players
    }

    /// Move a waiting round to active once enough cards are sold.
    /// Starts the auto-draw task for automatic rounds. Returns true on transition.
    pub fn try_activate(&self, state: &mut RoundState, round: Weak<RwLock<RoundState>>) -> bool {
        if state.status() != RoundStatus::Waiting || state.participant_count() < self.min_players {
            return false;
        }

        state.mark_started();
        self.metrics.record_round_started();

        if let Some(interval) = state.draw_mode().interval() {
            let timer = self.spawn_auto_draw(round, interval);
            state.set_timer(timer);
        }

        info!(
            round_id = %state.id(),
            participants = state.participant_count(),
            pool = state.pool(),
            mode = ?state.draw_mode(),
            "round started"
        );
        self.events.round_started(state);
        true
    }

    /// Draw the next random number.
    ///
    /// Returns `Ok(None)` when every number has already been called; the round
    /// is finished with no winner in that case.
    pub fn draw(&self, state: &mut RoundState, trigger: DrawTrigger) -> RoundResult<Option<DrawnNumber>> {
        self.ensure_can_draw(state, trigger)?;

        match state.draws_mut().draw_next() {
            Some(drawn) => {
                self.after_draw(state, &drawn, trigger);
                Ok(Some(drawn))
            }
            None => {
                info!(round_id = %state.id(), "all numbers drawn without a winner");
                self.finish(state, FinishReason::Exhausted, None)?;
                self.events.round_finished(state);
                Ok(None)
            }
        }
    }

    /// Call a specific number (operator draw on a manual round)
    pub fn call_number(&self, state: &mut RoundState, number: u8) -> RoundResult<DrawnNumber> {
        self.ensure_can_draw(state, DrawTrigger::Manual)?;
        let drawn = state.draws_mut().draw_specific(number)?;
        self.after_draw(state, &drawn, DrawTrigger::Manual);
        Ok(drawn)
    }

    /// Terminal transition; rejects rounds that are already finished
    pub fn finish(
        &self,
        state: &mut RoundState,
        reason: FinishReason,
        winner: Option<PlayerId>,
    ) -> RoundResult<()> {
        if state.status() == RoundStatus::Finished {
            return Err(RoundError::RoundNotActive(RoundStatus::Finished));
        }

        state.mark_finished(reason, winner);
        self.metrics.record_round_finished();

        info!(
            round_id = %state.id(),
            reason = %reason,
            winner = ?winner,
            draws = state.draws().len(),
            "round finished"
        );
        Ok(())
    }

    fn ensure_can_draw(&self, state: &RoundState, trigger: DrawTrigger) -> RoundResult<()> {
        if state.status() != RoundStatus::Active {
            return Err(RoundError::RoundNotActive(state.status()));
        }
        if trigger == DrawTrigger::Manual && !state.draw_mode().is_manual() {
            return Err(RoundError::ManualDrawDisabled);
        }
        Ok(())
    }

    fn after_draw(&self, state: &RoundState, drawn: &DrawnNumber, trigger: DrawTrigger) {
        self.metrics.record_draw();
        debug!(
            round_id = %state.id(),
            number = drawn.number,
            label = %drawn.label(),
            sequence = drawn.sequence,
            trigger = ?trigger,
            "number drawn"
        );
        self.events.number_drawn(state, drawn);
    }

    fn spawn_auto_draw(&self, round: Weak<RwLock<RoundState>>, interval: Duration) -> TimerGuard {
        let scheduler = self.clone();
        let interval = interval.max(MIN_INTERVAL);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let Some(round) = round.upgrade() else {
                    break;
                };
                let mut state = round.write().await;

                match scheduler.draw(&mut state, DrawTrigger::Timer) {
                    Ok(Some(_)) => {}
                    Ok(None) => break,
                    Err(e) => {
                        debug!(round_id = %state.id(), error = %e, "auto-draw stopped");
                        break;
                    }
                }
            }
        });

        TimerGuard::new(handle.abort_handle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::card::CardGenerator;
    use crate::games::draw_pool::DrawPool;
    use crate::games::events::RoundEvent;
    use crate::games::types::{DrawMode, RoundId};

    fn scheduler(min_players: usize) -> (RoundScheduler, EventPublisher) {
        let events = EventPublisher::new(128);
        let scheduler = RoundScheduler::new(min_players, events.clone(), Arc::new(EngineMetrics::new()));
        (scheduler, events)
    }

    fn shared_round(mode: DrawMode) -> Arc<RwLock<RoundState>> {
        Arc::new(RwLock::new(RoundState::new(RoundId::new(), 10, mode, DrawPool::with_seed(11))))
    }

    async fn seat(round: &Arc<RwLock<RoundState>>, player: u64, card: u32) {
        let card = CardGenerator::new(100).generate(card).unwrap();
        round.write().await.seat_card(PlayerId(player), card);
    }

    #[tokio::test]
    async fn test_activation_waits_for_min_players() {
        let (scheduler, _events) = scheduler(2);
        let round = shared_round(DrawMode::Manual);

        seat(&round, 1, 1).await;
        {
            let mut state = round.write().await;
            assert!(!scheduler.try_activate(&mut state, Arc::downgrade(&round)));
            assert_eq!(state.status(), RoundStatus::Waiting);
            assert_eq!(
                scheduler.draw(&mut state, DrawTrigger::Manual),
                Err(RoundError::RoundNotActive(RoundStatus::Waiting))
            );
        }

        seat(&round, 2, 2).await;
        let mut state = round.write().await;
        assert!(scheduler.try_activate(&mut state, Arc::downgrade(&round)));
        assert_eq!(state.status(), RoundStatus::Active);
        assert!(!scheduler.try_activate(&mut state, Arc::downgrade(&round)));
    }

    #[tokio::test]
    async fn test_manual_round_exhausts_then_finishes() {
        let (scheduler, events) = scheduler(1);
        let mut rx = events.subscribe();
        let round = shared_round(DrawMode::Manual);
        seat(&round, 1, 1).await;

        let mut state = round.write().await;
        scheduler.try_activate(&mut state, Arc::downgrade(&round));

        for _ in 0..75 {
            assert!(scheduler.draw(&mut state, DrawTrigger::Manual).unwrap().is_some());
        }
        // Still active after the 75th number so a last-ball win can be claimed
        assert_eq!(state.status(), RoundStatus::Active);

        assert_eq!(scheduler.draw(&mut state, DrawTrigger::Manual), Ok(None));
        assert_eq!(state.status(), RoundStatus::Finished);
        assert_eq!(state.finish_reason(), Some(FinishReason::Exhausted));
        assert_eq!(
            scheduler.draw(&mut state, DrawTrigger::Manual),
            Err(RoundError::RoundNotActive(RoundStatus::Finished))
        );
        assert_eq!(state.draws().len(), 75);

        let mut finished = false;
        while let Ok(event) = rx.try_recv() {
            if let RoundEvent::RoundFinished { reason, settlement, .. } = event {
                assert_eq!(reason, FinishReason::Exhausted);
                assert!(settlement.is_none());
                finished = true;
            }
        }
        assert!(finished);
    }

    #[tokio::test]
    async fn test_manual_calls_rejected_on_automatic_round() {
        let (scheduler, _events) = scheduler(1);
        let round = shared_round(DrawMode::automatic(Duration::from_secs(60)));
        seat(&round, 1, 1).await;

        let mut state = round.write().await;
        scheduler.try_activate(&mut state, Arc::downgrade(&round));
        assert!(state.has_auto_draw());
        assert_eq!(
            scheduler.draw(&mut state, DrawTrigger::Manual),
            Err(RoundError::ManualDrawDisabled)
        );
        assert_eq!(scheduler.call_number(&mut state, 5), Err(RoundError::ManualDrawDisabled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_draws_on_interval() {
        let (scheduler, _events) = scheduler(1);
        let round = shared_round(DrawMode::automatic(Duration::from_millis(3500)));
        seat(&round, 1, 1).await;
        {
            let mut state = round.write().await;
            scheduler.try_activate(&mut state, Arc::downgrade(&round));
        }

        tokio::time::sleep(Duration::from_millis(3400)).await;
        assert_eq!(round.read().await.draws().len(), 0);

        tokio::time::sleep(Duration::from_millis(3600 + 3000)).await;
        assert_eq!(round.read().await.draws().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_cancels_timer() {
        let (scheduler, _events) = scheduler(1);
        let round = shared_round(DrawMode::automatic(Duration::from_millis(100)));
        seat(&round, 1, 1).await;
        {
            let mut state = round.write().await;
            scheduler.try_activate(&mut state, Arc::downgrade(&round));
        }

        tokio::time::sleep(Duration::from_millis(350)).await;
        let drawn_before = {
            let mut state = round.write().await;
            scheduler.finish(&mut state, FinishReason::Closed, None).unwrap();
            assert!(!state.has_auto_draw());
            state.draws().len()
        };
        assert_eq!(drawn_before, 3);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(round.read().await.draws().len(), drawn_before);

        let mut state = round.write().await;
        assert_eq!(
            scheduler.finish(&mut state, FinishReason::Closed, None),
            Err(RoundError::RoundNotActive(RoundStatus::Finished))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_exhausts_round() {
        let (scheduler, _events) = scheduler(1);
        let round = shared_round(DrawMode::automatic(Duration::from_millis(10)));
        seat(&round, 1, 1).await;
        {
            let mut state = round.write().await;
            scheduler.try_activate(&mut state, Arc::downgrade(&round));
        }

        tokio::time::sleep(Duration::from_secs(2)).await;
        let state = round.read().await;
        assert_eq!(state.draws().len(), 75);
        assert_eq!(state.status(), RoundStatus::Finished);
        assert_eq!(state.finish_reason(), Some(FinishReason::Exhausted));
    }
}
