//! In-process lottery chain.
//!
//! Follows the contract's observable rules closely enough to drive the client
//! without a node: fixed stake, owner-only administration, one random winner
//! per item on reveal, and `BidPlaced`/`StateChanged` events. Calls can be
//! made to fail on demand, and every submitted transaction is recorded.

use crate::{
    ledger::{
        BidPlaced,
        EventStream,
        ITEM_COUNT,
        ItemId,
        Ledger,
        LotteryContract,
        Phase,
        TxParams,
    },
    units,
    wallets::AccountSelector,
};
use alloy::primitives::Address;
use color_eyre::eyre::{
    Result,
    eyre,
};
use futures::StreamExt;
use rand::seq::IndexedRandom;
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
    },
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{
    debug,
    warn,
};

pub const DEFAULT_STARTING_BALANCE: u128 = 100 * 10u128.pow(units::ETHER_DECIMALS);

/// Every entry point of the simulated contract and ledger.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Call {
    GetBalance,
    Owner,
    PrivilegedAccount,
    BidderCount,
    Phase,
    CheckWinner,
    Bid,
    RevealWinners,
    Withdraw,
    ResetContract,
    ChangeOwner,
    DestroyContract,
    SubscribeBids,
    SubscribeStateChanges,
}

/// A state-mutating call as it was submitted, whether or not it succeeded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SubmittedCall {
    pub call: Call,
    pub item: Option<ItemId>,
    pub target: Option<Address>,
    pub tx: TxParams,
}

/// Named accounts funded at genesis.
#[derive(Clone, Copy, Debug)]
pub struct DevAccounts {
    pub deployer: Address,
    pub president: Address,
    pub alice: Address,
    pub bob: Address,
}

impl Default for DevAccounts {
    fn default() -> Self {
        Self {
            deployer: Address::repeat_byte(0xd0),
            president: Address::repeat_byte(0xb0),
            alice: Address::repeat_byte(0xa1),
            bob: Address::repeat_byte(0xb2),
        }
    }
}

impl DevAccounts {
    pub fn all(&self) -> Vec<Address> {
        vec![self.alice, self.bob, self.president, self.deployer]
    }
}

#[derive(Debug)]
struct ChainState {
    balances: HashMap<Address, u128>,
    owner: Address,
    privileged: Address,
    phase: u8,
    bidders: [Vec<Address>; ITEM_COUNT],
    winners: [Option<Address>; ITEM_COUNT],
    destroyed: bool,
    failing: HashSet<Call>,
    submitted: Vec<SubmittedCall>,
}

impl ChainState {
    fn balance(&self, address: Address) -> u128 {
        self.balances.get(&address).copied().unwrap_or_default()
    }

    fn transfer(&mut self, from: Address, to: Address, amount: u128) -> Result<()> {
        let available = self.balance(from);
        if available < amount {
            return Err(eyre!("insufficient funds for transfer from {from}"));
        }
        self.balances.insert(from, available - amount);
        *self.balances.entry(to).or_default() += amount;
        Ok(())
    }

    fn ensure_live(&self) -> Result<()> {
        if self.destroyed {
            return Err(eyre!("contract has been destroyed"));
        }
        Ok(())
    }

    fn ensure_owner(&self, sender: Address) -> Result<()> {
        if sender != self.owner {
            return Err(eyre!("execution reverted: caller is not the owner"));
        }
        Ok(())
    }

    fn ensure_admin(&self, sender: Address) -> Result<()> {
        if sender != self.owner && sender != self.privileged {
            return Err(eyre!("execution reverted: caller is not privileged"));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct SimulatedLottery {
    address: Address,
    stake: u128,
    state: Arc<Mutex<ChainState>>,
    bids_tx: broadcast::Sender<BidPlaced>,
    phase_tx: broadcast::Sender<Phase>,
}

impl SimulatedLottery {
    pub fn new(accounts: &DevAccounts, stake: u128) -> Self {
        let balances = accounts
            .all()
            .into_iter()
            .map(|account| (account, DEFAULT_STARTING_BALANCE))
            .collect();
        let state = ChainState {
            balances,
            owner: accounts.president,
            privileged: accounts.deployer,
            phase: 0,
            bidders: Default::default(),
            winners: [None; ITEM_COUNT],
            destroyed: false,
            failing: HashSet::new(),
            submitted: Vec::new(),
        };
        let (bids_tx, _) = broadcast::channel(64);
        let (phase_tx, _) = broadcast::channel(16);
        Self {
            address: Address::repeat_byte(0xc0),
            stake,
            state: Arc::new(Mutex::new(state)),
            bids_tx,
            phase_tx,
        }
    }

    /// Chain plus a wallet holding every dev account, alice active.
    pub fn with_wallet(stake: u128) -> Result<(Self, AccountSelector, DevAccounts)> {
        let accounts = DevAccounts::default();
        let lottery = Self::new(&accounts, stake);
        let wallet = AccountSelector::new(accounts.all())?;
        Ok((lottery, wallet, accounts))
    }

    /// Makes every subsequent `call` fail until cleared.
    pub fn set_failing(&self, call: Call, failing: bool) -> Result<()> {
        let mut state = self.lock()?;
        if failing {
            state.failing.insert(call);
        } else {
            state.failing.remove(&call);
        }
        Ok(())
    }

    pub fn submitted(&self) -> Result<Vec<SubmittedCall>> {
        Ok(self.lock()?.submitted.clone())
    }

    /// Emits a `BidPlaced` event without touching chain state.
    pub fn emit_bid_placed(&self, event: BidPlaced) {
        let _ = self.bids_tx.send(event);
    }

    /// Emits a `StateChanged` event without touching chain state.
    pub fn emit_state_changed(&self, phase: Phase) {
        let _ = self.phase_tx.send(phase);
    }

    fn lock(&self) -> Result<MutexGuard<'_, ChainState>> {
        self.state
            .lock()
            .map_err(|_| eyre!("simulated chain state poisoned"))
    }

    fn read(&self, call: Call) -> Result<MutexGuard<'_, ChainState>> {
        let state = self.lock()?;
        if state.failing.contains(&call) {
            return Err(eyre!("simulated failure for {call:?}"));
        }
        Ok(state)
    }

    fn submit<T>(
        &self,
        submitted: SubmittedCall,
        apply: impl FnOnce(&mut ChainState) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.lock()?;
        state.submitted.push(submitted);
        if state.failing.contains(&submitted.call) {
            return Err(eyre!("simulated failure for {:?}", submitted.call));
        }
        state.ensure_live()?;
        let outcome = apply(&mut *state);
        debug!(call = ?submitted.call, ok = outcome.is_ok(), "simulated transaction");
        outcome
    }

    fn set_phase(&self, state: &mut ChainState, raw: u8) {
        state.phase = raw;
        let _ = self.phase_tx.send(Phase::from(raw));
    }

    fn call_of(call: Call, tx: TxParams) -> SubmittedCall {
        SubmittedCall {
            call,
            item: None,
            target: None,
            tx,
        }
    }
}

impl Ledger for SimulatedLottery {
    async fn get_balance(&self, address: Address) -> Result<u128> {
        Ok(self.read(Call::GetBalance)?.balance(address))
    }
}

impl LotteryContract for SimulatedLottery {
    fn address(&self) -> Address {
        self.address
    }

    async fn owner(&self) -> Result<Address> {
        let state = self.read(Call::Owner)?;
        state.ensure_live()?;
        Ok(state.owner)
    }

    async fn privileged_account(&self) -> Result<Address> {
        let state = self.read(Call::PrivilegedAccount)?;
        state.ensure_live()?;
        Ok(state.privileged)
    }

    async fn bidder_count(&self, item: ItemId) -> Result<u64> {
        let state = self.read(Call::BidderCount)?;
        state.ensure_live()?;
        Ok(state.bidders[item.index()].len() as u64)
    }

    async fn phase(&self) -> Result<Phase> {
        let state = self.read(Call::Phase)?;
        state.ensure_live()?;
        Ok(Phase::from(state.phase))
    }

    async fn check_winner(&self, caller: Address) -> Result<Vec<ItemId>> {
        let state = self.read(Call::CheckWinner)?;
        state.ensure_live()?;
        if !Phase::from(state.phase).is_closed() {
            return Err(eyre!("execution reverted: winners not revealed yet"));
        }
        Ok(ItemId::ALL
            .into_iter()
            .filter(|item| state.winners[item.index()] == Some(caller))
            .collect())
    }

    async fn bid(&self, item: ItemId, tx: TxParams) -> Result<()> {
        let submitted = SubmittedCall {
            item: Some(item),
            ..Self::call_of(Call::Bid, tx)
        };
        let stake = self.stake;
        let contract = self.address;
        let event = self.submit(submitted, |state| {
            if Phase::from(state.phase) != Phase::Open {
                return Err(eyre!("execution reverted: bidding is closed"));
            }
            if tx.sender == state.owner {
                return Err(eyre!("execution reverted: owner cannot bid"));
            }
            if tx.value != Some(stake) {
                return Err(eyre!(
                    "execution reverted: bid must carry exactly {} ETH",
                    units::to_display(stake)
                ));
            }
            state.transfer(tx.sender, contract, stake)?;
            state.bidders[item.index()].push(tx.sender);
            Ok(BidPlaced {
                item_id: item.index() as u64,
                bidder: tx.sender,
            })
        })?;
        let _ = self.bids_tx.send(event);
        Ok(())
    }

    async fn reveal_winners(&self, tx: TxParams) -> Result<()> {
        self.submit(Self::call_of(Call::RevealWinners, tx), |state| {
            state.ensure_owner(tx.sender)?;
            if Phase::from(state.phase) != Phase::Open {
                return Err(eyre!("execution reverted: winners already revealed"));
            }
            let mut rng = rand::rng();
            for item in ItemId::ALL {
                state.winners[item.index()] =
                    state.bidders[item.index()].choose(&mut rng).copied();
            }
            self.set_phase(state, 1);
            Ok(())
        })
    }

    async fn withdraw(&self, tx: TxParams) -> Result<()> {
        let contract = self.address;
        self.submit(Self::call_of(Call::Withdraw, tx), |state| {
            state.ensure_owner(tx.sender)?;
            let pot = state.balance(contract);
            state.transfer(contract, tx.sender, pot)
        })
    }

    async fn reset_contract(&self, tx: TxParams) -> Result<()> {
        self.submit(Self::call_of(Call::ResetContract, tx), |state| {
            state.ensure_owner(tx.sender)?;
            state.bidders = Default::default();
            state.winners = [None; ITEM_COUNT];
            self.set_phase(state, 0);
            Ok(())
        })
    }

    async fn change_owner(&self, new_owner: Address, tx: TxParams) -> Result<()> {
        let submitted = SubmittedCall {
            target: Some(new_owner),
            ..Self::call_of(Call::ChangeOwner, tx)
        };
        self.submit(submitted, |state| {
            state.ensure_admin(tx.sender)?;
            if new_owner == Address::ZERO {
                return Err(eyre!("execution reverted: owner cannot be zero"));
            }
            state.owner = new_owner;
            Ok(())
        })
    }

    async fn destroy_contract(&self, tx: TxParams) -> Result<()> {
        let contract = self.address;
        self.submit(Self::call_of(Call::DestroyContract, tx), |state| {
            state.ensure_admin(tx.sender)?;
            let pot = state.balance(contract);
            state.transfer(contract, tx.sender, pot)?;
            state.destroyed = true;
            Ok(())
        })
    }

    async fn bid_placed_events(&self) -> Result<EventStream<Result<BidPlaced>>> {
        drop(self.read(Call::SubscribeBids)?);
        Ok(lagging_aware(self.bids_tx.subscribe()))
    }

    async fn state_changed_events(&self) -> Result<EventStream<Result<Phase>>> {
        drop(self.read(Call::SubscribeStateChanges)?);
        Ok(lagging_aware(self.phase_tx.subscribe()))
    }
}

fn lagging_aware<T: Clone + Send + 'static>(
    rx: broadcast::Receiver<T>,
) -> EventStream<Result<T>> {
    BroadcastStream::new(rx)
        .map(|item| {
            item.map_err(|err| {
                warn!(?err, "simulated event subscriber lagged");
                eyre!("event stream lagged: {err}")
            })
        })
        .boxed_local()
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    const STAKE: u128 = 10_000_000_000_000_000;

    fn chain() -> (SimulatedLottery, DevAccounts) {
        let accounts = DevAccounts::default();
        (SimulatedLottery::new(&accounts, STAKE), accounts)
    }

    #[tokio::test]
    async fn bid__moves_the_stake_into_the_contract_and_emits_an_event() {
        // given
        let (chain, accounts) = chain();
        let mut events = chain.bid_placed_events().await.unwrap();
        let item = ItemId::new(1).unwrap();

        // when
        chain
            .bid(item, TxParams::from(accounts.alice).with_value(STAKE))
            .await
            .unwrap();

        // then
        let event = events.next().await.unwrap().unwrap();
        assert_eq!(
            event,
            BidPlaced {
                item_id: 1,
                bidder: accounts.alice
            }
        );
        assert_eq!(chain.bidder_count(item).await.unwrap(), 1);
        assert_eq!(chain.get_balance(chain.address()).await.unwrap(), STAKE);
        assert_eq!(
            chain.get_balance(accounts.alice).await.unwrap(),
            DEFAULT_STARTING_BALANCE - STAKE
        );
    }

    #[tokio::test]
    async fn bid__rejects_owner_and_wrong_stake() {
        let (chain, accounts) = chain();
        let item = ItemId::new(0).unwrap();

        let by_owner = chain
            .bid(item, TxParams::from(accounts.president).with_value(STAKE))
            .await;
        let wrong_value = chain
            .bid(item, TxParams::from(accounts.alice).with_value(STAKE + 1))
            .await;

        assert!(by_owner.is_err());
        assert!(wrong_value.is_err());
        assert_eq!(chain.bidder_count(item).await.unwrap(), 0);
        assert_eq!(chain.submitted().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reveal_winners__closes_bidding_and_picks_a_bidder_per_item() {
        // given
        let (chain, accounts) = chain();
        let mut phases = chain.state_changed_events().await.unwrap();
        let tesla = ItemId::new(0).unwrap();
        chain
            .bid(tesla, TxParams::from(accounts.alice).with_value(STAKE))
            .await
            .unwrap();

        // when
        chain
            .reveal_winners(TxParams::from(accounts.president))
            .await
            .unwrap();

        // then
        assert_eq!(phases.next().await.unwrap().unwrap(), Phase::Closed);
        assert_eq!(chain.check_winner(accounts.alice).await.unwrap(), vec![tesla]);
        assert!(chain.check_winner(accounts.bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn withdraw__is_owner_only_and_drains_the_pot() {
        // given
        let (chain, accounts) = chain();
        chain
            .bid(
                ItemId::new(2).unwrap(),
                TxParams::from(accounts.bob).with_value(STAKE),
            )
            .await
            .unwrap();

        // when
        let by_bob = chain.withdraw(TxParams::from(accounts.bob)).await;
        chain
            .withdraw(TxParams::from(accounts.president))
            .await
            .unwrap();

        // then
        assert!(by_bob.is_err());
        assert_eq!(chain.get_balance(chain.address()).await.unwrap(), 0);
        assert_eq!(
            chain.get_balance(accounts.president).await.unwrap(),
            DEFAULT_STARTING_BALANCE + STAKE
        );
    }

    #[tokio::test]
    async fn destroy_contract__makes_later_reads_fail() {
        let (chain, accounts) = chain();

        chain
            .destroy_contract(TxParams::from(accounts.deployer))
            .await
            .unwrap();

        assert!(chain.owner().await.is_err());
        assert!(chain.phase().await.is_err());
        assert!(
            chain
                .reset_contract(TxParams::from(accounts.president))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn set_failing__fails_only_the_selected_call() {
        let (chain, accounts) = chain();

        chain.set_failing(Call::Owner, true).unwrap();

        assert!(chain.owner().await.is_err());
        assert_eq!(
            chain.privileged_account().await.unwrap(),
            accounts.deployer
        );
        chain.set_failing(Call::Owner, false).unwrap();
        assert_eq!(chain.owner().await.unwrap(), accounts.president);
    }
}
