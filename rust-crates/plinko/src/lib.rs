pub mod board;

pub mod physics;

pub mod sequencer;

pub mod summary;

pub mod trigger;

pub use board::{
    Board,
    BoardConfig,
    BoardError,
    Peg,
};
pub use physics::{
    Ball,
    Landing,
    Particle,
    TickOutcome,
};
pub use sequencer::{
    RevealEvent,
    RevealSequencer,
    RevealState,
    RevealedSlot,
};
pub use trigger::{
    DropStatus,
    GateDecision,
    IgnoreReason,
    ManualTicket,
    TriggerError,
    WinnerSource,
    WinnersAvailable,
};

/// Index of a participant position on the reveal board.
pub type Slot = usize;
