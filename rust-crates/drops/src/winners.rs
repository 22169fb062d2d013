use crate::{
    address::Address,
    model::{
        DropInfo,
        Participant,
    },
};
use tracing::warn;

const BPS_DENOMINATOR: u128 = 10_000;

/// Maps winner addresses to their board slots, keeping rank order.
/// Winners that are not among the participants are dropped.
pub fn winner_slots(winners: &[Address], participants: &[Participant]) -> Vec<usize> {
    winners
        .iter()
        .filter_map(|winner| {
            let slot = participants
                .iter()
                .position(|p| p.address == *winner)
                .map(|index| participants[index].slot);
            if slot.is_none() {
                warn!(%winner, "winner is not a known participant");
            }
            slot
        })
        .collect()
}

/// `floor(amount * numerator / denominator)` without overflowing.
fn mul_div(amount: u128, numerator: u128, denominator: u128) -> u128 {
    amount / denominator * numerator + amount % denominator * numerator / denominator
}

/// Prize pool after the platform fee, in raw units. Fees above 100% are
/// treated as 100%.
pub fn distributable(info: &DropInfo, platform_fee_bps: u16) -> u128 {
    let gross = if info.is_paid_entry {
        info.entry_fee
            .saturating_mul(u128::from(info.current_participants))
    } else {
        info.reward_amount
    };
    let bps = u128::from(platform_fee_bps).min(BPS_DENOMINATOR);
    let fee = mul_div(gross, bps, BPS_DENOMINATOR);
    gross.saturating_sub(fee)
}

/// Per-rank shares of `pool`. The last tier absorbs rounding so the shares
/// always add up to the pool.
pub fn prize_split(pool: u128, num_winners: usize) -> Vec<u128> {
    match num_winners {
        0 => Vec::new(),
        1 => vec![pool],
        2 => {
            let first = mul_div(pool, 60, 100);
            vec![first, pool - first]
        }
        3 => {
            let first = mul_div(pool, 50, 100);
            let second = mul_div(pool, 30, 100);
            vec![first, second, pool - first - second]
        }
        n => {
            let share = pool / n as u128;
            let mut shares = vec![share; n];
            shares[0] += pool - share * n as u128;
            shares
        }
    }
}
