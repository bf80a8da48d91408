//! End-to-end round lifecycle through the public `RoundManager` API

use bingo_engine::games::{CardGenerator, RoundOptions};
use bingo_engine::{
    ConfigBuilder, DrawMode, EngineConfig, FinishReason, PlayerId, RoundError, RoundEvent, RoundManager, RoundStatus,
    WinPattern,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn manual_manager() -> RoundManager {
    RoundManager::new(ConfigBuilder::new().manual_draws().build())
}

#[tokio::test]
async fn test_manual_round_without_win() {
    let manager = manual_manager();
    let round = manager.create_round(10);

    let card = manager.join(round, PlayerId(1), None).await.unwrap();
    manager.join(round, PlayerId(2), None).await.unwrap();

    let calls = [7, 41, 68];
    for number in calls {
        manager.draw_number(round, number).await.unwrap();
        for player in [PlayerId(1), PlayerId(2)] {
            manager.mark(round, player, number).await.unwrap();
        }
    }

    // The number under the free space can still be called and marked
    let free = card.free_number();
    if !calls.contains(&free) {
        manager.draw_number(round, free).await.unwrap();
    }
    let outcome = manager.mark(round, PlayerId(1), free).await.unwrap();
    assert!(outcome.acknowledged);
    assert!(outcome.cards[0].acknowledged.contains(&free));

    for player in [PlayerId(1), PlayerId(2)] {
        assert_eq!(manager.check_win(round, player).await.unwrap(), None);
    }

    let snapshot = manager.snapshot(round).await.unwrap();
    assert_eq!(snapshot.status, RoundStatus::Active);
    assert_eq!(&snapshot.draw_history[..3], &calls[..]);
    assert_eq!(snapshot.pool, 20);
    assert_eq!(snapshot.participants.len(), 2);
    assert!(snapshot.last_call.is_some());
}

#[tokio::test]
async fn test_top_row_wins() {
    let manager = manual_manager();
    let round = manager.create_round(10);
    let card = manager.join(round, PlayerId(1), Some(42)).await.unwrap();
    manager.join(round, PlayerId(2), None).await.unwrap();

    let top_row: Vec<u8> = card.rows().next().unwrap().to_vec();
    for number in &top_row {
        manager.draw_number(round, *number).await.unwrap();
        manager.mark(round, PlayerId(1), *number).await.unwrap();
    }

    let win = manager.check_win(round, PlayerId(1)).await.unwrap().unwrap();
    assert_eq!(win.card_number, 42);
    assert_eq!(win.pattern, WinPattern::Row(0));
    assert_eq!(win.pattern.label(), "row");

    let record = manager.claim_win(round, PlayerId(1)).await.unwrap().unwrap();
    assert_eq!(record.winner, PlayerId(1));
    assert_eq!(record.card_number, Some(42));
    assert_eq!(record.commission + record.payout, record.pool);
}

#[tokio::test]
async fn test_ten_players_pool_split() {
    let manager = RoundManager::new(EngineConfig::default());
    let round = manager.create_round_with(RoundOptions::new(10).manual());

    for id in 1..=10 {
        manager.join(round, PlayerId(id), None).await.unwrap();
    }
    let record = manager.end_round(round, PlayerId(3)).await.unwrap();

    assert_eq!(record.pool, 100);
    assert_eq!(record.commission, 20);
    assert_eq!(record.payout, 80);
    assert_eq!(record.leaderboard_delta.wins, 1);
    assert_eq!(record.leaderboard_delta.earnings, 80);

    assert_eq!(
        manager.end_round(round, PlayerId(3)).await,
        Err(RoundError::AlreadySettled(round))
    );
    assert_eq!(manager.leaderboard().entry(PlayerId(3)).unwrap().earnings, 80);
}

#[tokio::test]
async fn test_join_after_finish_rejected() {
    let manager = manual_manager();
    let round = manager.create_round(10);
    manager.join(round, PlayerId(1), None).await.unwrap();
    manager.end_round(round, PlayerId(1)).await.unwrap();

    let err = manager.join(round, PlayerId(2), None).await.unwrap_err();
    assert_eq!(err, RoundError::RoundNotJoinable(RoundStatus::Finished));
    assert_eq!(err.code(), "ROUND_NOT_JOINABLE");

    assert_eq!(
        manager.mark(round, PlayerId(1), 5).await,
        Err(RoundError::RoundNotActive(RoundStatus::Finished))
    );
}

#[tokio::test]
async fn test_mark_undrawn_and_repeat() {
    let manager = manual_manager();
    let round = manager.create_round(10);
    let card = manager.join(round, PlayerId(1), None).await.unwrap();
    let number = card.cell(4, 4);

    assert_eq!(
        manager.mark(round, PlayerId(1), number).await,
        Err(RoundError::NumberNotDrawn(number))
    );

    manager.draw_number(round, number).await.unwrap();
    let first = manager.mark(round, PlayerId(1), number).await.unwrap();
    let second = manager.mark(round, PlayerId(1), number).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(second.cards[0].acknowledged, vec![number]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_manual_draws_never_duplicate() {
    let manager = Arc::new(manual_manager());
    let round = manager.create_round(1);
    manager.join(round, PlayerId(1), None).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            let mut drawn = Vec::new();
            let mut exhausted = 0;
            for _ in 0..20 {
                match manager.draw(round).await {
                    Ok(Some(d)) => drawn.push(d.number),
                    Ok(None) => exhausted += 1,
                    Err(e) => assert_eq!(e, RoundError::RoundNotActive(RoundStatus::Finished)),
                }
            }
            (drawn, exhausted)
        }));
    }

    let mut all = Vec::new();
    let mut exhausted = 0;
    for handle in handles {
        let (drawn, hits) = handle.await.unwrap();
        all.extend(drawn);
        exhausted += hits;
    }

    let unique: HashSet<u8> = all.iter().copied().collect();
    assert_eq!(all.len(), 75);
    assert_eq!(unique.len(), 75);
    assert_eq!(exhausted, 1, "exactly one caller observes exhaustion");

    let snapshot = manager.snapshot(round).await.unwrap();
    assert_eq!(snapshot.finish_reason, Some(FinishReason::Exhausted));
    assert!(snapshot.settlement.is_none());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_interleaved_draws_stay_distinct(
        yields in proptest::collection::vec(0usize..4, 2..6),
        calls in 1usize..30,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let numbers = runtime.block_on(async move {
            let manager = Arc::new(manual_manager());
            let round = manager.create_round(1);
            manager.join(round, PlayerId(1), None).await.unwrap();

            let mut handles = Vec::new();
            for pause in yields {
                let manager = manager.clone();
                handles.push(tokio::spawn(async move {
                    for _ in 0..calls {
                        for _ in 0..pause {
                            tokio::task::yield_now().await;
                        }
                        let _ = manager.draw(round).await;
                    }
                }));
            }
            for handle in handles {
                handle.await.unwrap();
            }
            manager.snapshot(round).await.unwrap().draw_history
        });

        let unique: HashSet<u8> = numbers.iter().copied().collect();
        prop_assert_eq!(unique.len(), numbers.len());
        prop_assert!(numbers.len() <= 75);
        prop_assert!(numbers.iter().all(|n| (1..=75).contains(n)));
    }
}

#[tokio::test(start_paused = true)]
async fn test_automatic_round_stops_after_end() {
    let manager = RoundManager::new(
        ConfigBuilder::new()
            .call_interval(Duration::from_millis(3_500))
            .build(),
    );
    let round = manager.create_round(10);
    let mut events = manager.subscribe(round).unwrap();

    manager.join(round, PlayerId(1), None).await.unwrap();
    assert_eq!(
        manager.draw(round).await,
        Err(RoundError::ManualDrawDisabled)
    );

    tokio::time::sleep(Duration::from_millis(3 * 3_500 + 100)).await;
    assert_eq!(manager.snapshot(round).await.unwrap().draw_history.len(), 3);

    let record = manager.end_round(round, PlayerId(1)).await.unwrap();
    assert_eq!(record.pool, 10);

    tokio::time::sleep(Duration::from_secs(60)).await;
    let snapshot = manager.snapshot(round).await.unwrap();
    assert_eq!(snapshot.draw_history.len(), 3);
    assert_eq!(snapshot.status, RoundStatus::Finished);

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(match event {
            RoundEvent::RoundStarted { .. } => "started",
            RoundEvent::NumberDrawn { .. } => "drawn",
            RoundEvent::PlayerWon { .. } => "won",
            RoundEvent::RoundFinished { .. } => "finished",
        });
    }
    assert_eq!(kinds, vec!["started", "drawn", "drawn", "drawn", "finished"]);
}

#[tokio::test]
async fn test_round_waits_for_min_players() {
    let manager = RoundManager::new(ConfigBuilder::new().manual_draws().min_players(2).build());
    let round = manager.create_round_with(RoundOptions::new(10).draw_mode(DrawMode::Manual));

    manager.join(round, PlayerId(1), None).await.unwrap();
    assert_eq!(
        manager.draw(round).await,
        Err(RoundError::RoundNotActive(RoundStatus::Waiting))
    );

    manager.join(round, PlayerId(2), None).await.unwrap();
    assert!(manager.draw(round).await.unwrap().is_some());
}

#[test]
fn test_layout_is_independent_of_generator_instance() {
    let first = CardGenerator::new(100);
    let second = CardGenerator::new(100);
    for number in [1, 17, 58, 100] {
        assert_eq!(first.generate(number).unwrap(), second.generate(number).unwrap());
    }
}
