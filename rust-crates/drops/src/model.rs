use crate::{
    Error,
    address::Address,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

pub type DropId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RewardType {
    Eth,
    Erc20,
    Usdc,
    Nft,
}

impl RewardType {
    pub fn is_fungible(self) -> bool {
        !matches!(self, RewardType::Nft)
    }
}

impl TryFrom<u8> for RewardType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RewardType::Eth),
            1 => Ok(RewardType::Erc20),
            2 => Ok(RewardType::Usdc),
            3 => Ok(RewardType::Nft),
            other => Err(Error::UnknownRewardType(other)),
        }
    }
}

impl fmt::Display for RewardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RewardType::Eth => "ETH",
            RewardType::Erc20 => "ERC20",
            RewardType::Usdc => "USDC",
            RewardType::Nft => "NFT",
        };
        write!(f, "{name}")
    }
}

/// Snapshot of one drop as the contract reports it. Amounts are raw token units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropInfo {
    pub id: DropId,
    pub host: Address,
    pub sponsor: Address,
    pub entry_fee: u128,
    pub reward_amount: u128,
    pub reward_token: Address,
    pub reward_type: RewardType,
    pub reward_token_ids: Vec<u64>,
    pub max_participants: u64,
    pub current_participants: u64,
    pub is_active: bool,
    pub is_completed: bool,
    pub is_paid_entry: bool,
    pub is_manual_selection: bool,
    pub is_sponsored: bool,
    pub num_winners: u8,
    /// unix seconds, zero when the drop has no funding window
    pub funding_deadline: u64,
    pub winners: Vec<Address>,
}

impl DropInfo {
    /// Completed without winners means the host cancelled it.
    pub fn is_cancelled(&self) -> bool {
        !self.is_active && self.is_completed && self.winners.is_empty()
    }

    pub fn is_unfunded_sponsored(&self) -> bool {
        self.is_sponsored && self.sponsor.is_zero() && self.is_active
    }

    pub fn is_full(&self) -> bool {
        self.current_participants >= self.max_participants
    }

    pub fn has_winners(&self) -> bool {
        self.is_completed && !self.winners.is_empty()
    }

    pub fn funding_deadline_at(&self) -> Option<DateTime<Utc>> {
        if self.funding_deadline == 0 {
            return None;
        }
        DateTime::from_timestamp(i64::try_from(self.funding_deadline).ok()?, 0)
    }
}

/// Parameters of a new drop, as a host submits them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDrop {
    pub entry_fee: u128,
    pub reward_amount: u128,
    pub reward_token: Address,
    pub reward_type: RewardType,
    pub reward_token_ids: Vec<u64>,
    pub max_participants: u64,
    pub is_paid_entry: bool,
    pub is_manual_selection: bool,
    pub is_sponsored: bool,
    pub num_winners: u8,
    pub funding_deadline: u64,
}

impl NewDrop {
    /// Free-entry drop funded by the host in ETH.
    pub fn host_funded_eth(reward_amount: u128, max_participants: u64, num_winners: u8) -> Self {
        Self {
            entry_fee: 0,
            reward_amount,
            reward_token: Address::ZERO,
            reward_type: RewardType::Eth,
            reward_token_ids: Vec::new(),
            max_participants,
            is_paid_entry: false,
            is_manual_selection: false,
            is_sponsored: false,
            num_winners,
            funding_deadline: 0,
        }
    }

    pub fn manual(mut self) -> Self {
        self.is_manual_selection = true;
        self
    }

    pub fn paid_entry(mut self, entry_fee: u128) -> Self {
        self.is_paid_entry = true;
        self.entry_fee = entry_fee;
        self.reward_amount = 0;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub address: Address,
    pub name: String,
    pub slot: usize,
}

impl Participant {
    pub fn new(address: Address, name: Option<&str>, slot: usize) -> Self {
        let name = match name {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("User-{}", address.tail()),
        };
        Self {
            address,
            name,
            slot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub decimals: u8,
    pub symbol: String,
    pub name: String,
}

impl TokenInfo {
    pub fn eth() -> Self {
        Self {
            decimals: 18,
            symbol: "ETH".to_string(),
            name: "Ethereum".to_string(),
        }
    }

    /// Used when a token's metadata cannot be read.
    pub fn fallback(token: &Address) -> Self {
        let short = token.short();
        Self {
            decimals: 18,
            symbol: short.chars().take(5).collect(),
            name: format!("Token ({short})"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn drop_info() -> DropInfo {
        DropInfo {
            id: 0,
            host: Address::from_low_u64(1),
            sponsor: Address::ZERO,
            entry_fee: 0,
            reward_amount: 1_000,
            reward_token: Address::ZERO,
            reward_type: RewardType::Eth,
            reward_token_ids: Vec::new(),
            max_participants: 4,
            current_participants: 0,
            is_active: true,
            is_completed: false,
            is_paid_entry: false,
            is_manual_selection: false,
            is_sponsored: false,
            num_winners: 1,
            funding_deadline: 0,
            winners: Vec::new(),
        }
    }

    #[test]
    fn is_cancelled__completed_without_winners() {
        // given
        let mut info = drop_info();
        info.is_active = false;
        info.is_completed = true;

        // then
        assert!(info.is_cancelled());
        info.winners.push(Address::from_low_u64(2));
        assert!(!info.is_cancelled());
    }

    #[test]
    fn is_unfunded_sponsored__requires_zero_sponsor_on_active_drop() {
        let mut info = drop_info();
        info.is_sponsored = true;
        assert!(info.is_unfunded_sponsored());
        info.sponsor = Address::from_low_u64(9);
        assert!(!info.is_unfunded_sponsored());
    }

    #[test]
    fn reward_type__decodes_contract_discriminants() {
        assert_eq!(RewardType::try_from(2).unwrap(), RewardType::Usdc);
        assert!(matches!(
            RewardType::try_from(7),
            Err(Error::UnknownRewardType(7))
        ));
    }

    #[test]
    fn participant__defaults_name_from_address_tail() {
        let address = Address::from_low_u64(0xab12);
        assert_eq!(Participant::new(address, None, 0).name, "User-ab12");
        assert_eq!(Participant::new(address, Some("  "), 0).name, "User-ab12");
        assert_eq!(Participant::new(address, Some("alice"), 0).name, "alice");
    }

    #[test]
    fn token_info__fallback_uses_short_address() {
        let token = Address::from_low_u64(0xcafe);
        let info = TokenInfo::fallback(&token);
        assert_eq!(info.name, "Token (0x0000...cafe)");
        assert_eq!(info.symbol, "0x000");
        assert_eq!(info.decimals, 18);
    }

    #[test]
    fn funding_deadline_at__zero_means_none() {
        let mut info = drop_info();
        assert_eq!(info.funding_deadline_at(), None);
        info.funding_deadline = 1_700_000_000;
        assert_eq!(info.funding_deadline_at().unwrap().timestamp(), 1_700_000_000);
    }
}
