//! Drops seeded into the simulated contract at start-up.

use color_eyre::eyre::{
    Result,
    WrapErr,
};
use drops::{
    Address,
    DropContract,
    DropId,
    NewDrop,
    RewardType,
    TokenInfo,
    leaderboard::format_units,
    notifications::NotificationRelay,
    simulated::SimulatedContract,
};
use tracing::info;

pub const DEMO_HOST: Address = Address::new([0x11; 20]);
pub const DEMO_USDC: Address = Address::new([0xaa; 20]);
pub const DEMO_NFT: Address = Address::new([0xbb; 20]);
pub const DEMO_PLATFORM_FEE_BPS: u16 = 250;

const MILLI_ETH: u128 = 1_000_000_000_000_000;
const NAMES: [&str; 10] = [
    "alice", "bob", "carol", "dave", "erin", "frank", "grace", "heidi", "ivan", "judy",
];

/// Hands out fresh player accounts.
#[derive(Debug, Default)]
pub struct Roster {
    next: u64,
}

impl Roster {
    pub fn next_player(&mut self) -> (Address, Option<String>) {
        let n = self.next;
        self.next += 1;
        let address = Address::from_low_u64(0x1000 + n);
        // every third player keeps the default name
        let name = (n % 3 != 2).then(|| NAMES[n as usize % NAMES.len()].to_string());
        (address, name)
    }
}

fn demo_drop(index: u32) -> (NewDrop, u64) {
    match index % 6 {
        0 => (NewDrop::host_funded_eth(50 * MILLI_ETH, 8, 3).manual(), 6),
        1 => (NewDrop::host_funded_eth(10 * MILLI_ETH, 5, 1), 5),
        2 => (NewDrop::host_funded_eth(0, 10, 2).paid_entry(MILLI_ETH), 4),
        3 => {
            let mut params = NewDrop::host_funded_eth(250_000_000, 12, 2).manual();
            params.reward_type = RewardType::Usdc;
            params.reward_token = DEMO_USDC;
            (params, 12)
        }
        4 => (NewDrop::host_funded_eth(100 * MILLI_ETH, 24, 3), 24),
        _ => {
            let mut params = NewDrop::host_funded_eth(0, 6, 2);
            params.reward_type = RewardType::Nft;
            params.reward_token = DEMO_NFT;
            params.reward_token_ids = vec![101, 102];
            (params, 3)
        }
    }
}

fn announced_amount(params: &NewDrop) -> (String, String) {
    match params.reward_type {
        RewardType::Nft => (params.reward_token_ids.len().to_string(), "NFT".to_string()),
        RewardType::Usdc => (format_units(params.reward_amount, 6), "USDC".to_string()),
        RewardType::Erc20 => (format_units(params.reward_amount, 18), "tokens".to_string()),
        RewardType::Eth if params.is_paid_entry => {
            (format_units(params.entry_fee, 18), "ETH entry".to_string())
        }
        RewardType::Eth => (format_units(params.reward_amount, 18), "ETH".to_string()),
    }
}

/// Creates `count` drops of assorted kinds and fills them with players.
pub async fn seed_demo_drops(
    contract: &SimulatedContract,
    roster: &mut Roster,
    relay: Option<&NotificationRelay>,
    count: u32,
) -> Result<Vec<DropId>> {
    contract.register_token(
        DEMO_USDC,
        TokenInfo {
            decimals: 6,
            symbol: "USDC".to_string(),
            name: "USD Coin".to_string(),
        },
    );
    contract.register_token(
        DEMO_NFT,
        TokenInfo {
            decimals: 0,
            symbol: "FIRE".to_string(),
            name: "FireBall Collectibles".to_string(),
        },
    );

    let mut ids = Vec::with_capacity(count as usize);
    for index in 0..count {
        let (params, players) = demo_drop(index);
        let (amount, currency) = announced_amount(&params);
        let id = contract
            .create_drop(DEMO_HOST, params)
            .await
            .wrap_err_with(|| format!("creating demo drop {index} failed"))?;
        for _ in 0..players {
            let (player, name) = roster.next_player();
            contract
                .join_drop(player, id, name)
                .await
                .wrap_err_with(|| format!("seeding player into drop {id} failed"))?;
        }
        if let Some(relay) = relay {
            relay.notify_drop_created(DEMO_HOST, id, amount, currency);
        }
        ids.push(id);
    }
    info!(drops = ids.len(), "demo drops ready");
    Ok(ids)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[tokio::test]
    async fn seed_demo_drops__creates_every_kind() {
        // given
        let contract = SimulatedContract::new(7);
        let mut roster = Roster::default();

        // when
        let ids = seed_demo_drops(&contract, &mut roster, None, 6).await.unwrap();

        // then
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
        let manual = contract.drop_info(0).await.unwrap();
        assert!(manual.is_manual_selection && manual.is_active);
        let automatic = contract.drop_info(1).await.unwrap();
        assert!(automatic.has_winners());
        let large = contract.drop_info(4).await.unwrap();
        assert_eq!(large.winners.len(), 3);
        assert_eq!(contract.participants(5).await.unwrap().len(), 3);
    }

    #[test]
    fn next_player__hands_out_distinct_accounts() {
        let mut roster = Roster::default();
        let (first, first_name) = roster.next_player();
        let (second, _) = roster.next_player();
        let (_, third_name) = roster.next_player();
        assert_ne!(first, second);
        assert_eq!(first_name.as_deref(), Some("alice"));
        assert_eq!(third_name, None);
    }

    #[test]
    fn announced_amount__uses_reward_units() {
        let (params, _) = demo_drop(1);
        assert_eq!(announced_amount(&params), ("0.01".to_string(), "ETH".to_string()));
        let (params, _) = demo_drop(3);
        assert_eq!(announced_amount(&params), ("250".to_string(), "USDC".to_string()));
    }
}
