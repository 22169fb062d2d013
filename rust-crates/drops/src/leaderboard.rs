use crate::{
    Result,
    address::Address,
    contract::DropContract,
    model::{
        DropInfo,
        RewardType,
        TokenInfo,
    },
    winners::{
        distributable,
        prize_split,
    },
};
use std::{
    cmp::Reverse,
    collections::HashMap,
};
use tracing::{
    debug,
    warn,
};

const TOP_ENTRIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrizeDetail {
    pub reward_type: RewardType,
    /// absent for NFTs
    pub raw_value: Option<u128>,
    pub amount_formatted: String,
    pub token_address: Option<Address>,
    pub token_symbol: String,
    pub token_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub address: Address,
    pub wins: u32,
    pub prizes: Vec<PrizeDetail>,
}

impl LeaderboardEntry {
    pub fn prize_summary(&self) -> String {
        if self.prizes.is_empty() {
            return "No prizes recorded".to_string();
        }
        self.prizes
            .iter()
            .map(|p| p.amount_formatted.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn eth_won(&self) -> u128 {
        self.prizes
            .iter()
            .find(|p| p.reward_type == RewardType::Eth)
            .and_then(|p| p.raw_value)
            .unwrap_or(0)
    }

    fn add_prize(&mut self, prize: PrizeDetail, token: &TokenInfo) {
        if prize.reward_type.is_fungible() {
            let existing = self.prizes.iter_mut().find(|p| {
                p.reward_type == prize.reward_type && p.token_address == prize.token_address
            });
            if let Some(existing) = existing {
                let total = existing
                    .raw_value
                    .unwrap_or(0)
                    .saturating_add(prize.raw_value.unwrap_or(0));
                existing.raw_value = Some(total);
                existing.amount_formatted =
                    format!("{} {}", format_units(total, token.decimals), token.symbol);
                return;
            }
        }
        self.prizes.push(prize);
    }
}

/// Formats a raw token amount with `decimals` places, without trailing zeros.
pub fn format_units(raw: u128, decimals: u8) -> String {
    let digits = raw.to_string();
    let decimals = usize::from(decimals);
    if decimals == 0 {
        return digits;
    }
    let padded = format!("{digits:0>width$}", width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

fn counts_toward_leaderboard(info: &DropInfo) -> bool {
    info.is_completed
        && !info.winners.is_empty()
        && info.winners.len() == usize::from(info.num_winners)
}

fn prize_for_rank(info: &DropInfo, rank: usize, share: u128, token: &TokenInfo) -> Option<PrizeDetail> {
    match info.reward_type {
        RewardType::Eth => Some(PrizeDetail {
            reward_type: RewardType::Eth,
            raw_value: Some(share),
            amount_formatted: format!("{} ETH", format_units(share, 18)),
            token_address: None,
            token_symbol: "ETH".to_string(),
            token_id: None,
        }),
        RewardType::Erc20 | RewardType::Usdc => Some(PrizeDetail {
            reward_type: info.reward_type,
            raw_value: Some(share),
            amount_formatted: format!("{} {}", format_units(share, token.decimals), token.symbol),
            token_address: Some(info.reward_token),
            token_symbol: token.symbol.clone(),
            token_id: None,
        }),
        RewardType::Nft => info.reward_token_ids.get(rank).map(|id| PrizeDetail {
            reward_type: RewardType::Nft,
            raw_value: None,
            amount_formatted: format!("1 NFT (#{id})"),
            token_address: Some(info.reward_token),
            token_symbol: token.symbol.clone(),
            token_id: Some(*id),
        }),
    }
}

/// Folds completed drops into per-winner standings, best first.
///
/// Only drops that completed with their full set of winners count. Fungible
/// prizes of the same type and token are summed; every NFT stays its own
/// entry. `tokens` supplies metadata for the reward tokens; missing entries
/// fall back to [`TokenInfo::fallback`].
pub fn aggregate(
    drops: &[DropInfo],
    platform_fee_bps: u16,
    tokens: &HashMap<Address, TokenInfo>,
) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = Vec::new();
    let mut index_of: HashMap<Address, usize> = HashMap::new();

    for info in drops.iter().filter(|info| counts_toward_leaderboard(info)) {
        let token = if info.reward_type == RewardType::Eth {
            TokenInfo::eth()
        } else {
            tokens
                .get(&info.reward_token)
                .cloned()
                .unwrap_or_else(|| TokenInfo::fallback(&info.reward_token))
        };
        let shares = if info.reward_type.is_fungible() {
            prize_split(distributable(info, platform_fee_bps), info.winners.len())
        } else {
            vec![0; info.winners.len()]
        };

        for (rank, (winner, share)) in info.winners.iter().zip(shares).enumerate() {
            let index = *index_of.entry(*winner).or_insert_with(|| {
                entries.push(LeaderboardEntry {
                    address: *winner,
                    wins: 0,
                    prizes: Vec::new(),
                });
                entries.len() - 1
            });
            let entry = &mut entries[index];
            entry.wins += 1;
            if let Some(prize) = prize_for_rank(info, rank, share, &token) {
                entry.add_prize(prize, &token);
            }
        }
    }

    entries.sort_by_key(|e| (Reverse(e.wins), Reverse(e.prizes.len()), Reverse(e.eth_won())));
    entries.truncate(TOP_ENTRIES);
    entries
}

/// Replays every drop on the contract into the leaderboard. Drops that fail
/// to load are logged and left out.
pub async fn build_leaderboard<C: DropContract>(contract: &C) -> Result<Vec<LeaderboardEntry>> {
    let count = contract.drop_count().await?;
    let fee_bps = contract.platform_fee_bps().await?;

    let mut drops = Vec::new();
    for id in 0..count {
        match contract.drop_info(id).await {
            Ok(info) => drops.push(info),
            Err(error) => warn!(drop_id = id, %error, "skipping drop in leaderboard"),
        }
    }

    let mut tokens = HashMap::new();
    for info in drops.iter().filter(|info| counts_toward_leaderboard(info)) {
        if info.reward_type == RewardType::Eth || tokens.contains_key(&info.reward_token) {
            continue;
        }
        let token = match contract.token_info(info.reward_token).await {
            Ok(token) => token,
            Err(error) => {
                debug!(token = %info.reward_token, %error, "token metadata unavailable");
                TokenInfo::fallback(&info.reward_token)
            }
        };
        tokens.insert(info.reward_token, token);
    }

    Ok(aggregate(&drops, fee_bps, &tokens))
}
