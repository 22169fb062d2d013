//! Admission rules for starting a reveal.
//!
//! Winners reach the board from two places: the host pressing "drop ball" on a
//! manual-selection drop, or a data refresh showing a completed drop. Both are
//! expressed as a single [`WinnersAvailable`] input so the decision is a pure
//! function of the current reveal state and the drop's status.

use crate::{
    Slot,
    sequencer::RevealState,
};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropStatus {
    pub is_host: bool,
    pub is_manual_selection: bool,
    pub is_active: bool,
    pub is_completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinnerSource {
    Manual,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinnersAvailable {
    pub slots: Vec<Slot>,
    pub source: WinnerSource,
}

impl WinnersAvailable {
    pub fn manual(slots: Vec<Slot>) -> Self {
        Self {
            slots,
            source: WinnerSource::Manual,
        }
    }

    pub fn auto(slots: Vec<Slot>) -> Self {
        Self {
            slots,
            source: WinnerSource::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    RevealInProgress,
    SelectionPending,
    NoWinners,
    NotHost,
    AutomaticDrop,
    DropInactive,
    AlreadyCompleted,
    NotCompleted,
    AlreadyRevealed,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            IgnoreReason::RevealInProgress => "a reveal is already in progress",
            IgnoreReason::SelectionPending => "winner selection is still pending",
            IgnoreReason::NoWinners => "no winners to reveal",
            IgnoreReason::NotHost => "only the host can drop the ball",
            IgnoreReason::AutomaticDrop => "this drop selects winners automatically",
            IgnoreReason::DropInactive => "drop is not active",
            IgnoreReason::AlreadyCompleted => "drop is already completed",
            IgnoreReason::NotCompleted => "drop is not completed yet",
            IgnoreReason::AlreadyRevealed => "these winners were already revealed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Start(Vec<Slot>),
    Ignore(IgnoreReason),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TriggerError {
    #[error("cannot drop ball: {0}")]
    NotAllowed(IgnoreReason),
    #[error("winner selection failed: {0}")]
    SelectionFailed(String),
    #[error("winner selection returned no winners")]
    NoWinners,
}

/// Proof that a manual selection was started for a particular board lifetime.
/// A ticket issued before the viewed drop changed is stale and gets discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualTicket {
    pub(crate) drop_id: u64,
    pub(crate) generation: u64,
}

impl ManualTicket {
    pub fn drop_id(&self) -> u64 {
        self.drop_id
    }
}

/// Everything the gate looks at besides the incoming event.
#[derive(Debug, Clone, Copy)]
pub struct GateContext<'a> {
    pub state: &'a RevealState,
    pub status: &'a DropStatus,
    pub last_revealed: Option<&'a [Slot]>,
    pub selection_pending: bool,
}

/// Why the host's "drop ball" action is unavailable, if it is.
pub fn manual_block_reason(
    state: &RevealState,
    status: &DropStatus,
    selection_pending: bool,
) -> Option<IgnoreReason> {
    if !status.is_host {
        Some(IgnoreReason::NotHost)
    } else if !status.is_manual_selection {
        Some(IgnoreReason::AutomaticDrop)
    } else if !status.is_active {
        Some(IgnoreReason::DropInactive)
    } else if status.is_completed {
        Some(IgnoreReason::AlreadyCompleted)
    } else if selection_pending {
        Some(IgnoreReason::SelectionPending)
    } else if !state.is_idle() {
        Some(IgnoreReason::RevealInProgress)
    } else {
        None
    }
}

pub fn manual_drop_enabled(
    state: &RevealState,
    status: &DropStatus,
    selection_pending: bool,
) -> bool {
    manual_block_reason(state, status, selection_pending).is_none()
}

pub fn decide(ctx: &GateContext<'_>, event: &WinnersAvailable) -> GateDecision {
    if !ctx.state.is_idle() {
        return GateDecision::Ignore(IgnoreReason::RevealInProgress);
    }
    if event.slots.is_empty() {
        return GateDecision::Ignore(IgnoreReason::NoWinners);
    }
    match event.source {
        WinnerSource::Manual => {
            if !ctx.status.is_manual_selection {
                return GateDecision::Ignore(IgnoreReason::AutomaticDrop);
            }
        }
        WinnerSource::Auto => {
            if ctx.selection_pending {
                return GateDecision::Ignore(IgnoreReason::SelectionPending);
            }
            if !ctx.status.is_completed {
                return GateDecision::Ignore(IgnoreReason::NotCompleted);
            }
            if ctx.last_revealed == Some(event.slots.as_slice()) {
                return GateDecision::Ignore(IgnoreReason::AlreadyRevealed);
            }
        }
    }
    GateDecision::Start(event.slots.clone())
}
