use crate::{
    Slot,
    board::Board,
    physics::{
        Ball,
        Landing,
        TickOutcome,
    },
    summary::winners_summary,
    trigger::{
        self,
        DropStatus,
        GateContext,
        GateDecision,
        IgnoreReason,
        ManualTicket,
        TriggerError,
        WinnerSource,
        WinnersAvailable,
    },
};
use rand::{
    SeedableRng,
    rngs::StdRng,
};
use std::{
    collections::VecDeque,
    time::Duration,
};
use tracing::{
    debug,
    info,
    warn,
};

pub const POPUP_HOLD: Duration = Duration::from_millis(2_000);
pub const POPUP_FADE: Duration = Duration::from_millis(1_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealState {
    Idle,
    Dropping { rank_index: usize },
    Complete { elapsed: Duration },
}

impl RevealState {
    pub fn is_idle(&self) -> bool {
        matches!(self, RevealState::Idle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealedSlot {
    pub slot: Slot,
    /// 1-based prize tier
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub message: String,
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealEvent {
    Started { source: WinnerSource, slots: Vec<Slot> },
    Skipped { slot: Slot },
    BallSpawned { rank: usize, slot: Slot },
    SlotRevealed { rank: usize, slot: Slot },
    Completed { summary: String },
    Faded,
    Cancelled { drop_id: u64 },
}

enum SequencerInput {
    BallLanded(Landing),
    FadeElapsed,
}

/// Reveals a drop's winners one ball at a time.
///
/// Owns the board and the single active ball for one viewed drop. The
/// physics tick reports a landing as an outcome, which is fed back as an
/// input here; observers read the resulting [`RevealEvent`]s from
/// [`RevealSequencer::drain_events`].
pub struct RevealSequencer {
    drop_id: u64,
    board: Board,
    num_winners: usize,
    state: RevealState,
    winners: Vec<Slot>,
    ball: Option<Ball>,
    revealed: Vec<RevealedSlot>,
    last_revealed: Option<Vec<Slot>>,
    summary: Option<String>,
    selection_pending: bool,
    generation: u64,
    events: VecDeque<RevealEvent>,
    rng: StdRng,
}

impl RevealSequencer {
    pub fn new(drop_id: u64, board: Board, num_winners: usize) -> Self {
        Self::with_rng(drop_id, board, num_winners, StdRng::from_os_rng())
    }

    pub fn with_seed(drop_id: u64, board: Board, num_winners: usize, seed: u64) -> Self {
        Self::with_rng(drop_id, board, num_winners, StdRng::seed_from_u64(seed))
    }

    fn with_rng(drop_id: u64, board: Board, num_winners: usize, rng: StdRng) -> Self {
        Self {
            drop_id,
            board,
            num_winners,
            state: RevealState::Idle,
            winners: Vec::new(),
            ball: None,
            revealed: Vec::new(),
            last_revealed: None,
            summary: None,
            selection_pending: false,
            generation: 0,
            events: VecDeque::new(),
            rng,
        }
    }

    pub fn drop_id(&self) -> u64 {
        self.drop_id
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn state(&self) -> RevealState {
        self.state
    }

    pub fn active_ball(&self) -> Option<&Ball> {
        self.ball.as_ref()
    }

    pub fn revealed(&self) -> &[RevealedSlot] {
        &self.revealed
    }

    pub fn winners(&self) -> &[Slot] {
        &self.winners
    }

    pub fn selection_pending(&self) -> bool {
        self.selection_pending
    }

    pub fn popup(&self) -> Option<Popup> {
        let RevealState::Complete { elapsed } = self.state else {
            return None;
        };
        let message = self.summary.clone()?;
        let alpha = if elapsed <= POPUP_HOLD {
            1.0
        } else {
            let faded = (elapsed - POPUP_HOLD).as_secs_f64() / POPUP_FADE.as_secs_f64();
            (1.0 - faded).clamp(0.0, 1.0)
        };
        Some(Popup { message, alpha })
    }

    pub fn manual_block_reason(&self, status: &DropStatus) -> Option<IgnoreReason> {
        trigger::manual_block_reason(&self.state, status, self.selection_pending)
    }

    pub fn manual_drop_enabled(&self, status: &DropStatus) -> bool {
        self.manual_block_reason(status).is_none()
    }

    /// Runs winners through the trigger gate and starts the reveal if admitted.
    pub fn offer(&mut self, status: &DropStatus, event: WinnersAvailable) -> GateDecision {
        let ctx = GateContext {
            state: &self.state,
            status,
            last_revealed: self.last_revealed.as_deref(),
            selection_pending: self.selection_pending,
        };
        match trigger::decide(&ctx, &event) {
            GateDecision::Start(slots) => self.start(event.source, slots),
            GateDecision::Ignore(reason) => {
                debug!(drop_id = self.drop_id, ?reason, source = ?event.source, "winners ignored");
                GateDecision::Ignore(reason)
            }
        }
    }

    /// Marks a manual winner selection as in flight for the current drop.
    pub fn begin_manual(&mut self, status: &DropStatus) -> Result<ManualTicket, TriggerError> {
        if let Some(reason) = self.manual_block_reason(status) {
            return Err(TriggerError::NotAllowed(reason));
        }
        self.selection_pending = true;
        info!(drop_id = self.drop_id, "manual winner selection requested");
        Ok(ManualTicket {
            drop_id: self.drop_id,
            generation: self.generation,
        })
    }

    /// Applies the result of a manual winner selection.
    ///
    /// Returns `Ok(false)` when the ticket belongs to a drop that is no longer
    /// on the board; the result is dropped without touching any state.
    pub fn finish_manual(
        &mut self,
        ticket: ManualTicket,
        status: &DropStatus,
        outcome: Result<Vec<Slot>, String>,
    ) -> Result<bool, TriggerError> {
        if ticket.generation != self.generation || ticket.drop_id != self.drop_id {
            debug!(
                ticket_drop = ticket.drop_id,
                drop_id = self.drop_id,
                "discarding stale manual selection"
            );
            return Ok(false);
        }
        self.selection_pending = false;
        let slots = match outcome {
            Ok(slots) if slots.is_empty() => return Err(TriggerError::NoWinners),
            Ok(slots) => slots,
            Err(reason) => {
                warn!(drop_id = self.drop_id, %reason, "manual winner selection failed");
                return Err(TriggerError::SelectionFailed(reason));
            }
        };
        match self.offer(status, WinnersAvailable::manual(slots)) {
            GateDecision::Start(_) => Ok(true),
            GateDecision::Ignore(IgnoreReason::NoWinners) => Err(TriggerError::NoWinners),
            GateDecision::Ignore(reason) => Err(TriggerError::NotAllowed(reason)),
        }
    }

    /// Discards all in-flight animation and rebinds to another drop's board.
    pub fn reset_for_drop(&mut self, drop_id: u64, board: Board, num_winners: usize) {
        if !self.state.is_idle() || self.selection_pending {
            info!(from = self.drop_id, to = drop_id, "viewed drop changed, cancelling reveal");
            self.events.push_back(RevealEvent::Cancelled {
                drop_id: self.drop_id,
            });
        }
        self.drop_id = drop_id;
        self.board = board;
        self.num_winners = num_winners;
        self.state = RevealState::Idle;
        self.winners.clear();
        self.ball = None;
        self.revealed.clear();
        self.last_revealed = None;
        self.summary = None;
        self.selection_pending = false;
        self.generation = self.generation.wrapping_add(1);
    }

    /// One animation frame.
    pub fn advance(&mut self, dt: Duration) {
        match self.state {
            RevealState::Idle => {}
            RevealState::Dropping { .. } => {
                let Some(ball) = self.ball.as_mut() else {
                    return;
                };
                if let TickOutcome::Landed(landing) = self.board.tick(ball, &mut self.rng) {
                    self.apply(SequencerInput::BallLanded(landing));
                }
            }
            RevealState::Complete { elapsed } => {
                let elapsed = elapsed.saturating_add(dt);
                self.state = RevealState::Complete { elapsed };
                if elapsed >= POPUP_HOLD + POPUP_FADE {
                    self.apply(SequencerInput::FadeElapsed);
                }
            }
        }
    }

    pub fn drain_events(&mut self) -> Vec<RevealEvent> {
        self.events.drain(..).collect()
    }

    fn start(&mut self, source: WinnerSource, slots: Vec<Slot>) -> GateDecision {
        // the replay guard compares against the list as offered, before filtering
        self.last_revealed = Some(slots.clone());
        let mut valid = Vec::with_capacity(slots.len());
        for slot in slots {
            if self.board.contains_slot(slot) {
                valid.push(slot);
            } else {
                warn!(drop_id = self.drop_id, slot, "winner slot outside the board, skipping");
                self.events.push_back(RevealEvent::Skipped { slot });
            }
        }
        valid.truncate(self.num_winners);
        if valid.is_empty() {
            return GateDecision::Ignore(IgnoreReason::NoWinners);
        }

        info!(drop_id = self.drop_id, ?source, slots = ?valid, "starting winner reveal");
        self.revealed.clear();
        self.summary = None;
        self.winners = valid.clone();
        self.events.push_back(RevealEvent::Started {
            source,
            slots: valid.clone(),
        });
        self.spawn(0);
        GateDecision::Start(valid)
    }

    fn spawn(&mut self, rank_index: usize) {
        let slot = self.winners[rank_index];
        // slots are validated against the board in `start`
        self.ball = self.board.spawn_ball(slot, &mut self.rng);
        self.state = RevealState::Dropping { rank_index };
        self.events.push_back(RevealEvent::BallSpawned {
            rank: rank_index + 1,
            slot,
        });
    }

    fn apply(&mut self, input: SequencerInput) {
        match (self.state, input) {
            (RevealState::Dropping { rank_index }, SequencerInput::BallLanded(landing)) => {
                if self.winners.get(rank_index) != Some(&landing.slot) {
                    warn!(?landing, rank_index, "landing for unexpected slot ignored");
                    return;
                }
                let rank = rank_index + 1;
                debug!(slot = landing.slot, rank, ticks = landing.ticks, "ball landed");
                self.ball = None;
                self.revealed.push(RevealedSlot {
                    slot: landing.slot,
                    rank,
                });
                self.events.push_back(RevealEvent::SlotRevealed {
                    rank,
                    slot: landing.slot,
                });
                if rank < self.winners.len() {
                    self.spawn(rank);
                } else {
                    let summary = winners_summary(&self.winners);
                    info!(drop_id = self.drop_id, %summary, "winner reveal complete");
                    self.summary = Some(summary.clone());
                    self.state = RevealState::Complete {
                        elapsed: Duration::ZERO,
                    };
                    self.events.push_back(RevealEvent::Completed { summary });
                }
            }
            (RevealState::Complete { .. }, SequencerInput::FadeElapsed) => {
                self.summary = None;
                self.state = RevealState::Idle;
                self.events.push_back(RevealEvent::Faded);
            }
            (state, _) => {
                debug!(?state, "sequencer input ignored in current state");
            }
        }
    }
}
