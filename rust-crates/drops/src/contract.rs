use crate::{
    Error,
    Result,
    address::Address,
    model::{
        DropId,
        DropInfo,
        NewDrop,
        Participant,
        TokenInfo,
    },
    winners::winner_slots,
};
use std::future::Future;
use tracing::info;

/// Reads and writes against the giveaway contract.
///
/// Writes resolve once the transaction is confirmed; nothing beyond success
/// or failure is returned except the id of a newly created drop.
pub trait DropContract {
    fn drop_count(&self) -> impl Future<Output = Result<u64>> + Send;

    fn platform_fee_bps(&self) -> impl Future<Output = Result<u16>> + Send;

    fn drop_info(&self, id: DropId) -> impl Future<Output = Result<DropInfo>> + Send;

    fn participants(&self, id: DropId) -> impl Future<Output = Result<Vec<Participant>>> + Send;

    fn token_info(&self, token: Address) -> impl Future<Output = Result<TokenInfo>> + Send;

    fn create_drop(
        &self,
        caller: Address,
        params: NewDrop,
    ) -> impl Future<Output = Result<DropId>> + Send;

    fn join_drop(
        &self,
        caller: Address,
        id: DropId,
        name: Option<String>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn cancel_drop(&self, caller: Address, id: DropId) -> impl Future<Output = Result<()>> + Send;

    /// Sponsor pays the reward of a sponsored drop.
    fn fund_drop(&self, caller: Address, id: DropId) -> impl Future<Output = Result<()>> + Send;

    fn select_winners_manually(
        &self,
        caller: Address,
        id: DropId,
    ) -> impl Future<Output = Result<()>> + Send;

    fn claim_refund(&self, caller: Address, id: DropId) -> impl Future<Output = Result<()>> + Send;
}

/// Triggers manual winner selection and returns the winners' board slots in
/// rank order, read back from the contract after confirmation.
pub async fn select_winners_and_reconcile<C: DropContract>(
    contract: &C,
    id: DropId,
    caller: Address,
) -> Result<Vec<usize>> {
    let before = contract.drop_info(id).await?;
    if before.current_participants < u64::from(before.num_winners) {
        return Err(Error::NotEnoughParticipants {
            current: before.current_participants,
            required: u64::from(before.num_winners),
        });
    }
    if !before.is_active {
        return Err(Error::DropInactive(id));
    }
    if before.is_completed {
        return Err(Error::DropCompleted(id));
    }

    contract.select_winners_manually(caller, id).await?;
    info!(drop_id = id, "winners selected, reading back result");

    let after = contract.drop_info(id).await?;
    let participants = contract.participants(id).await?;
    Ok(winner_slots(&after.winners, &participants))
}
