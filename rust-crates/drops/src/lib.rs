pub mod address;

pub mod contract;

pub mod leaderboard;

pub mod model;

pub mod neynar;

pub mod notifications;

pub mod profiles;

pub mod simulated;

pub mod winners;

pub use address::Address;
pub use contract::DropContract;
pub use model::{
    DropId,
    DropInfo,
    NewDrop,
    Participant,
    RewardType,
    TokenInfo,
};

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),
    #[error("unknown reward type {0}")]
    UnknownRewardType(u8),
    #[error("drop {0} not found")]
    DropNotFound(DropId),
    #[error("drop {0} is not active")]
    DropInactive(DropId),
    #[error("drop {0} is already completed")]
    DropCompleted(DropId),
    #[error("not enough participants: {current} joined, {required} winners needed")]
    NotEnoughParticipants { current: u64, required: u64 },
    #[error("execution reverted: {0}")]
    Reverted(String),
    #[error("{service} responded with {status}: {body}")]
    UnexpectedStatus {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
