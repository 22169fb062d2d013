//! In-memory stand-in for the giveaway contract.
//!
//! Keeps the same preconditions the deployed contract enforces and replaces
//! the VRF callback with a seeded RNG, so the front-end and tests can run
//! without a chain.

use crate::{
    Error,
    Result,
    address::Address,
    contract::DropContract,
    model::{
        DropId,
        DropInfo,
        NewDrop,
        Participant,
        RewardType,
        TokenInfo,
    },
};
use rand::{
    SeedableRng,
    rngs::StdRng,
    seq::index,
};
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};
use tracing::{
    debug,
    info,
};

const MAX_WINNERS: u8 = 3;

struct SimulatedDrop {
    info: DropInfo,
    participants: Vec<Participant>,
    refunded: HashSet<Address>,
}

struct Ledger {
    drops: Vec<SimulatedDrop>,
    platform_fee_bps: u16,
    tokens: HashMap<Address, TokenInfo>,
    rng: StdRng,
    fail_next_selection: Option<String>,
}

#[derive(Clone)]
pub struct SimulatedContract {
    ledger: Arc<Mutex<Ledger>>,
}

impl SimulatedContract {
    pub fn new(seed: u64) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger {
                drops: Vec::new(),
                platform_fee_bps: 0,
                tokens: HashMap::new(),
                rng: StdRng::seed_from_u64(seed),
                fail_next_selection: None,
            })),
        }
    }

    pub fn with_platform_fee_bps(self, bps: u16) -> Self {
        self.ledger().platform_fee_bps = bps;
        self
    }

    pub fn register_token(&self, token: Address, info: TokenInfo) {
        self.ledger().tokens.insert(token, info);
    }

    /// Makes the next winner selection revert with `reason`.
    pub fn fail_next_selection(&self, reason: impl Into<String>) {
        self.ledger().fail_next_selection = Some(reason.into());
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Ledger {
    fn drop_mut(&mut self, id: DropId) -> Result<&mut SimulatedDrop> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.drops.get_mut(index))
            .ok_or(Error::DropNotFound(id))
    }

    fn drop_ref(&self, id: DropId) -> Result<&SimulatedDrop> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.drops.get(index))
            .ok_or(Error::DropNotFound(id))
    }

    fn pick_winners(&mut self, id: DropId) -> Result<()> {
        let Ledger { drops, rng, .. } = self;
        let drop = usize::try_from(id)
            .ok()
            .and_then(|index| drops.get_mut(index))
            .ok_or(Error::DropNotFound(id))?;
        let amount = usize::from(drop.info.num_winners).min(drop.participants.len());
        let picked = index::sample(rng, drop.participants.len(), amount).into_vec();
        drop.info.winners = picked
            .into_iter()
            .map(|i| drop.participants[i].address)
            .collect();
        drop.info.is_active = false;
        drop.info.is_completed = true;
        info!(drop_id = id, winners = ?drop.info.winners, "winners selected");
        Ok(())
    }
}

fn revert(reason: &str) -> Error {
    Error::Reverted(reason.to_string())
}

impl DropContract for SimulatedContract {
    async fn drop_count(&self) -> Result<u64> {
        Ok(self.ledger().drops.len() as u64)
    }

    async fn platform_fee_bps(&self) -> Result<u16> {
        Ok(self.ledger().platform_fee_bps)
    }

    async fn drop_info(&self, id: DropId) -> Result<DropInfo> {
        Ok(self.ledger().drop_ref(id)?.info.clone())
    }

    async fn participants(&self, id: DropId) -> Result<Vec<Participant>> {
        Ok(self.ledger().drop_ref(id)?.participants.clone())
    }

    async fn token_info(&self, token: Address) -> Result<TokenInfo> {
        if token.is_zero() {
            return Ok(TokenInfo::eth());
        }
        self.ledger()
            .tokens
            .get(&token)
            .cloned()
            .ok_or_else(|| revert("token does not implement metadata"))
    }

    async fn create_drop(&self, caller: Address, params: NewDrop) -> Result<DropId> {
        if params.num_winners == 0 || params.num_winners > MAX_WINNERS {
            return Err(revert("invalid number of winners"));
        }
        if params.max_participants < u64::from(params.num_winners) {
            return Err(revert("max participants below number of winners"));
        }
        if params.reward_type == RewardType::Nft
            && params.reward_token_ids.len() != usize::from(params.num_winners)
        {
            return Err(revert("one token id per winner required"));
        }
        let mut ledger = self.ledger();
        let id = ledger.drops.len() as DropId;
        let info = DropInfo {
            id,
            host: caller,
            sponsor: Address::ZERO,
            entry_fee: params.entry_fee,
            reward_amount: params.reward_amount,
            reward_token: params.reward_token,
            reward_type: params.reward_type,
            reward_token_ids: params.reward_token_ids,
            max_participants: params.max_participants,
            current_participants: 0,
            is_active: true,
            is_completed: false,
            is_paid_entry: params.is_paid_entry,
            is_manual_selection: params.is_manual_selection,
            is_sponsored: params.is_sponsored,
            num_winners: params.num_winners,
            funding_deadline: params.funding_deadline,
            winners: Vec::new(),
        };
        ledger.drops.push(SimulatedDrop {
            info,
            participants: Vec::new(),
            refunded: HashSet::new(),
        });
        info!(drop_id = id, host = %caller, "drop created");
        Ok(id)
    }

    async fn join_drop(&self, caller: Address, id: DropId, name: Option<String>) -> Result<()> {
        let mut ledger = self.ledger();
        let drop = ledger.drop_mut(id)?;
        if !drop.info.is_active {
            return Err(Error::DropInactive(id));
        }
        if drop.info.is_completed {
            return Err(Error::DropCompleted(id));
        }
        if drop.info.is_unfunded_sponsored() {
            return Err(revert("sponsored drop is not funded yet"));
        }
        if drop.info.is_full() {
            return Err(revert("drop is full"));
        }
        if drop.participants.iter().any(|p| p.address == caller) {
            return Err(revert("already joined"));
        }
        let slot = drop.participants.len();
        drop.participants
            .push(Participant::new(caller, name.as_deref(), slot));
        drop.info.current_participants += 1;
        debug!(drop_id = id, player = %caller, slot, "joined drop");

        if drop.info.is_full() && !drop.info.is_manual_selection {
            ledger.pick_winners(id)?;
        }
        Ok(())
    }

    async fn cancel_drop(&self, caller: Address, id: DropId) -> Result<()> {
        let mut ledger = self.ledger();
        let drop = ledger.drop_mut(id)?;
        if drop.info.host != caller {
            return Err(revert("only the host can cancel"));
        }
        if !drop.info.is_active || drop.info.is_completed {
            return Err(revert("drop already finished"));
        }
        if drop.info.is_full() {
            return Err(revert(
                "cannot cancel a drop that is full and not yet completed",
            ));
        }
        drop.info.is_active = false;
        drop.info.is_completed = true;
        info!(drop_id = id, "drop cancelled");
        Ok(())
    }

    async fn fund_drop(&self, caller: Address, id: DropId) -> Result<()> {
        let mut ledger = self.ledger();
        let drop = ledger.drop_mut(id)?;
        if !drop.info.is_sponsored {
            return Err(revert("drop is not sponsored"));
        }
        if !drop.info.sponsor.is_zero() {
            return Err(revert("drop already funded"));
        }
        drop.info.sponsor = caller;
        info!(drop_id = id, sponsor = %caller, "drop funded");
        Ok(())
    }

    async fn select_winners_manually(&self, caller: Address, id: DropId) -> Result<()> {
        let mut ledger = self.ledger();
        if let Some(reason) = ledger.fail_next_selection.take() {
            return Err(Error::Reverted(reason));
        }
        let drop = ledger.drop_mut(id)?;
        if drop.info.host != caller {
            return Err(revert("only the host can select winners"));
        }
        if !drop.info.is_manual_selection {
            return Err(revert("drop uses automatic selection"));
        }
        if !drop.info.is_active {
            return Err(Error::DropInactive(id));
        }
        if drop.info.is_completed {
            return Err(Error::DropCompleted(id));
        }
        if drop.info.current_participants < u64::from(drop.info.num_winners) {
            return Err(Error::NotEnoughParticipants {
                current: drop.info.current_participants,
                required: u64::from(drop.info.num_winners),
            });
        }
        ledger.pick_winners(id)
    }

    async fn claim_refund(&self, caller: Address, id: DropId) -> Result<()> {
        let mut ledger = self.ledger();
        let drop = ledger.drop_mut(id)?;
        if !drop.info.is_cancelled() {
            return Err(revert("drop was not cancelled"));
        }
        if !drop.info.is_paid_entry {
            return Err(revert("nothing to refund"));
        }
        if !drop.participants.iter().any(|p| p.address == caller) {
            return Err(revert("not a participant"));
        }
        if !drop.refunded.insert(caller) {
            return Err(revert("refund already claimed"));
        }
        info!(drop_id = id, player = %caller, amount = drop.info.entry_fee, "refund claimed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::contract::select_winners_and_reconcile;

    const HOST: Address = Address::new([1u8; 20]);

    fn player(n: u64) -> Address {
        Address::from_low_u64(1_000 + n)
    }

    async fn fill(contract: &SimulatedContract, id: DropId, players: u64) {
        for n in 0..players {
            contract.join_drop(player(n), id, None).await.unwrap();
        }
    }

    #[tokio::test]
    async fn join_drop__assigns_sequential_slots() {
        // given
        let contract = SimulatedContract::new(1);
        let id = contract
            .create_drop(HOST, NewDrop::host_funded_eth(1_000, 5, 1))
            .await
            .unwrap();

        // when
        fill(&contract, id, 3).await;

        // then
        let participants = contract.participants(id).await.unwrap();
        let slots: Vec<_> = participants.iter().map(|p| p.slot).collect();
        assert_eq!(slots, vec![0, 1, 2]);
        assert_eq!(contract.drop_info(id).await.unwrap().current_participants, 3);
    }

    #[tokio::test]
    async fn join_drop__rejects_duplicate_player() {
        let contract = SimulatedContract::new(1);
        let id = contract
            .create_drop(HOST, NewDrop::host_funded_eth(1_000, 5, 1))
            .await
            .unwrap();
        contract.join_drop(player(0), id, None).await.unwrap();

        let second = contract.join_drop(player(0), id, None).await;

        assert!(matches!(second, Err(Error::Reverted(_))));
    }

    #[tokio::test]
    async fn join_drop__automatic_drop_completes_when_full() {
        // given
        let contract = SimulatedContract::new(3);
        let id = contract
            .create_drop(HOST, NewDrop::host_funded_eth(1_000, 4, 2))
            .await
            .unwrap();

        // when
        fill(&contract, id, 4).await;

        // then
        let info = contract.drop_info(id).await.unwrap();
        assert!(info.is_completed);
        assert!(!info.is_active);
        assert_eq!(info.winners.len(), 2);
        assert_ne!(info.winners[0], info.winners[1]);
    }

    #[tokio::test]
    async fn select_winners_and_reconcile__returns_slots_of_winners() {
        // given
        let contract = SimulatedContract::new(5);
        let id = contract
            .create_drop(HOST, NewDrop::host_funded_eth(1_000, 10, 3).manual())
            .await
            .unwrap();
        fill(&contract, id, 6).await;

        // when
        let slots = select_winners_and_reconcile(&contract, id, HOST).await.unwrap();

        // then
        let info = contract.drop_info(id).await.unwrap();
        let participants = contract.participants(id).await.unwrap();
        let expected: Vec<_> = info
            .winners
            .iter()
            .map(|w| participants.iter().find(|p| p.address == *w).unwrap().slot)
            .collect();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots, expected);
    }

    #[tokio::test]
    async fn select_winners_and_reconcile__requires_enough_participants() {
        let contract = SimulatedContract::new(5);
        let id = contract
            .create_drop(HOST, NewDrop::host_funded_eth(1_000, 10, 3).manual())
            .await
            .unwrap();
        fill(&contract, id, 2).await;

        let result = select_winners_and_reconcile(&contract, id, HOST).await;

        assert!(matches!(
            result,
            Err(Error::NotEnoughParticipants {
                current: 2,
                required: 3
            })
        ));
    }

    #[tokio::test]
    async fn select_winners_manually__only_host_may_select() {
        let contract = SimulatedContract::new(5);
        let id = contract
            .create_drop(HOST, NewDrop::host_funded_eth(1_000, 10, 1).manual())
            .await
            .unwrap();
        fill(&contract, id, 2).await;

        let result = contract.select_winners_manually(player(0), id).await;

        assert!(matches!(result, Err(Error::Reverted(_))));
        assert!(contract.drop_info(id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn claim_refund__only_once_after_cancellation() {
        // given
        let contract = SimulatedContract::new(5);
        let id = contract
            .create_drop(HOST, NewDrop::host_funded_eth(0, 10, 1).paid_entry(50))
            .await
            .unwrap();
        fill(&contract, id, 2).await;
        contract.cancel_drop(HOST, id).await.unwrap();

        // when
        let first = contract.claim_refund(player(1), id).await;
        let second = contract.claim_refund(player(1), id).await;

        // then
        assert!(first.is_ok());
        assert!(matches!(second, Err(Error::Reverted(_))));
        assert!(contract.drop_info(id).await.unwrap().is_cancelled());
    }

    #[tokio::test]
    async fn fund_drop__unlocks_sponsored_drop() {
        // given
        let contract = SimulatedContract::new(5);
        let mut params = NewDrop::host_funded_eth(1_000, 3, 1);
        params.is_sponsored = true;
        let id = contract.create_drop(HOST, params).await.unwrap();
        let blocked = contract.join_drop(player(0), id, None).await;

        // when
        contract.fund_drop(player(9), id).await.unwrap();

        // then
        assert!(blocked.is_err());
        assert!(contract.join_drop(player(0), id, None).await.is_ok());
        assert_eq!(contract.drop_info(id).await.unwrap().sponsor, player(9));
    }
}
