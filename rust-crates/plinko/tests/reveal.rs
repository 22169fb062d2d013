#![allow(non_snake_case)]
use plinko::{
    Board,
    BoardConfig,
    DropStatus,
    GateDecision,
    RevealEvent,
    RevealSequencer,
    RevealState,
    TriggerError,
    WinnersAvailable,
    physics::MAX_TOTAL_TICKS,
    sequencer::{
        POPUP_FADE,
        POPUP_HOLD,
    },
};
use proptest::prelude::*;
use std::time::Duration;

const FRAME: Duration = Duration::from_millis(16);

fn completed() -> DropStatus {
    DropStatus {
        is_completed: true,
        ..DropStatus::default()
    }
}

fn host_manual() -> DropStatus {
    DropStatus {
        is_host: true,
        is_manual_selection: true,
        is_active: true,
        is_completed: false,
    }
}

fn board(slots: usize) -> Board {
    Board::new(BoardConfig::new(10, slots)).unwrap()
}

#[test]
fn reveal__single_winner_lands_completes_then_fades_to_idle() {
    // given
    let mut seq = RevealSequencer::with_seed(9, board(10), 1, 2024);
    let mut balls_seen = 0;
    let mut last_target = None;

    // when
    seq.offer(&completed(), WinnersAvailable::auto(vec![2]));
    let mut frames = 0;
    while matches!(seq.state(), RevealState::Dropping { .. }) {
        if let Some(ball) = seq.active_ball() {
            if last_target != Some(ball.target_slot) {
                balls_seen += 1;
                last_target = Some(ball.target_slot);
            }
        }
        seq.advance(FRAME);
        frames += 1;
        assert!(frames <= MAX_TOTAL_TICKS + 1);
    }
    let completed_state = seq.state();
    let mut faded_after = Duration::ZERO;
    while !seq.state().is_idle() {
        seq.advance(FRAME);
        faded_after += FRAME;
    }

    // then
    assert_eq!(balls_seen, 1);
    assert_eq!(last_target, Some(2));
    assert!(matches!(completed_state, RevealState::Complete { .. }));
    assert!(faded_after >= POPUP_HOLD + POPUP_FADE);
    let events = seq.drain_events();
    assert!(events.contains(&RevealEvent::Completed {
        summary: "Winner: #3 (1st)!".to_string()
    }));
    assert_eq!(events.last(), Some(&RevealEvent::Faded));
}

#[test]
fn reveal__rank_one_finishes_before_rank_two_begins() {
    // given
    let mut seq = RevealSequencer::with_seed(1, board(10), 2, 7);
    seq.offer(&completed(), WinnersAvailable::auto(vec![3, 7]));

    // when
    let mut trace = Vec::new();
    while matches!(seq.state(), RevealState::Dropping { .. }) {
        if let RevealState::Dropping { rank_index } = seq.state() {
            let target = seq.active_ball().map(|b| b.target_slot);
            if trace.last() != Some(&(rank_index, target)) {
                trace.push((rank_index, target));
            }
        }
        seq.advance(FRAME);
    }

    // then
    assert_eq!(trace, vec![(0, Some(3)), (1, Some(7))]);
    let revealed: Vec<_> = seq.revealed().iter().map(|r| (r.slot, r.rank)).collect();
    assert_eq!(revealed, vec![(3, 1), (7, 2)]);
}

#[test]
fn reveal__manual_selection_with_no_winners_never_animates() {
    // given
    let status = host_manual();
    let mut seq = RevealSequencer::with_seed(4, board(8), 1, 1);
    let ticket = seq.begin_manual(&status).unwrap();

    // when
    let result = seq.finish_manual(ticket, &status, Ok(Vec::new()));
    for _ in 0..10 {
        seq.advance(FRAME);
    }

    // then
    assert_eq!(result, Err(TriggerError::NoWinners));
    assert_eq!(seq.state(), RevealState::Idle);
    assert!(seq.active_ball().is_none());
    assert!(seq.revealed().is_empty());
}

proptest! {
    #[test]
    fn reveal__never_more_than_one_ball_in_flight(
        winners in prop::collection::vec(0usize..12, 1..=3),
        seed in any::<u64>(),
    ) {
        let mut seq = RevealSequencer::with_seed(1, board(12), 3, seed);
        seq.offer(&completed(), WinnersAvailable::auto(winners.clone()));

        let mut frames = 0u32;
        while !seq.state().is_idle() {
            let dropping = matches!(seq.state(), RevealState::Dropping { .. });
            let ball_in_flight = seq.active_ball().map(|b| !b.landed).unwrap_or(false);
            prop_assert_eq!(dropping, ball_in_flight);
            seq.advance(FRAME);
            frames += 1;
            prop_assert!(frames < MAX_TOTAL_TICKS * 4 + 500);
        }
        prop_assert_eq!(seq.revealed().len(), winners.len());
    }

    #[test]
    fn reveal__drop_change_cancels_any_rank(
        stop_after in 0u32..400,
        seed in any::<u64>(),
    ) {
        let mut seq = RevealSequencer::with_seed(1, board(10), 3, seed);
        seq.offer(&completed(), WinnersAvailable::auto(vec![1, 5, 9]));
        for _ in 0..stop_after {
            seq.advance(FRAME);
        }

        seq.reset_for_drop(2, board(6), 1);

        prop_assert_eq!(seq.state(), RevealState::Idle);
        prop_assert!(seq.active_ball().is_none());
    }

    #[test]
    fn reveal__manual_request_while_revealing_is_a_no_op(
        stop_after in 0u32..200,
        seed in any::<u64>(),
    ) {
        let status = host_manual();
        let mut seq = RevealSequencer::with_seed(1, board(10), 2, seed);
        let ticket = seq.begin_manual(&status).unwrap();
        seq.finish_manual(ticket, &status, Ok(vec![2, 6])).unwrap();
        for _ in 0..stop_after {
            seq.advance(FRAME);
        }
        let state_before = seq.state();
        let ball_before = seq.active_ball().cloned();

        let request = seq.begin_manual(&status);
        let offer = seq.offer(&status, WinnersAvailable::manual(vec![0]));

        if !state_before.is_idle() {
            prop_assert!(request.is_err());
            prop_assert!(matches!(offer, GateDecision::Ignore(_)));
            prop_assert_eq!(seq.state(), state_before);
            prop_assert_eq!(seq.active_ball().cloned(), ball_before);
        }
    }
}
