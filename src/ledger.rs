//! Collaborator ports for the lottery client.
//!
//! The controller never talks to a chain directly. It is handed an
//! [`AccountProvider`], a [`Ledger`] and a [`LotteryContract`], which the
//! EVM backend and the simulated backend both implement.

use alloy::primitives::Address;
use color_eyre::eyre::Result;
use futures::stream::LocalBoxStream;
use std::fmt;

pub const ITEM_COUNT: usize = 3;

pub const ITEM_NAMES: [&str; ITEM_COUNT] =
    ["Tesla Model S", "iPhone 15 Pro Max", "Lenovo ThinkPad"];

/// Long-lived event feed handed out by a collaborator.
pub type EventStream<T> = LocalBoxStream<'static, T>;

/// Index of one of the auctioned items.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ItemId(usize);

impl ItemId {
    pub const ALL: [ItemId; ITEM_COUNT] = [ItemId(0), ItemId(1), ItemId(2)];

    pub fn new(index: usize) -> Option<Self> {
        (index < ITEM_COUNT).then_some(ItemId(index))
    }

    pub fn from_raw(raw: u64) -> Option<Self> {
        usize::try_from(raw).ok().and_then(Self::new)
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn name(self) -> &'static str {
        ITEM_NAMES[self.0]
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Lifecycle stage reported by the contract.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Phase {
    /// Not loaded yet, or the load failed.
    #[default]
    Unknown,
    Open,
    Closed,
    Other(u8),
}

impl From<u8> for Phase {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Phase::Open,
            1 => Phase::Closed,
            other => Phase::Other(other),
        }
    }
}

impl Phase {
    pub fn raw(self) -> Option<u8> {
        match self {
            Phase::Unknown => None,
            Phase::Open => Some(0),
            Phase::Closed => Some(1),
            Phase::Other(raw) => Some(raw),
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Phase::Closed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Unknown => write!(f, "Unknown"),
            Phase::Open => write!(f, "Bidding open (0)"),
            Phase::Closed => write!(f, "Bidding closed (1)"),
            Phase::Other(raw) => write!(f, "State {raw}"),
        }
    }
}

/// Payload of the contract's `BidPlaced` event.
///
/// `item_id` is kept as emitted; the controller validates the range.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BidPlaced {
    pub item_id: u64,
    pub bidder: Address,
}

/// Sender and attached value of a state-mutating call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TxParams {
    pub sender: Address,
    pub value: Option<u128>,
}

impl From<Address> for TxParams {
    fn from(sender: Address) -> Self {
        Self {
            sender,
            value: None,
        }
    }
}

impl TxParams {
    pub fn with_value(mut self, value: u128) -> Self {
        self.value = Some(value);
        self
    }
}

pub trait AccountProvider {
    /// Accounts the wallet exposes; the first one is the active account.
    fn request_accounts(&self) -> impl Future<Output = Result<Vec<Address>>>;

    /// Emits the new active account whenever it changes.
    fn accounts_changed(&self) -> EventStream<Address>;

    fn switch_account(&self, account: Address) -> Result<()>;
}

pub trait Ledger {
    /// Balance in the smallest unit (wei).
    fn get_balance(&self, address: Address) -> impl Future<Output = Result<u128>>;
}

pub trait LotteryContract {
    fn address(&self) -> Address;

    fn owner(&self) -> impl Future<Output = Result<Address>>;

    fn privileged_account(&self) -> impl Future<Output = Result<Address>>;

    fn bidder_count(&self, item: ItemId) -> impl Future<Output = Result<u64>>;

    fn phase(&self) -> impl Future<Output = Result<Phase>>;

    fn check_winner(&self, caller: Address)
    -> impl Future<Output = Result<Vec<ItemId>>>;

    fn bid(&self, item: ItemId, tx: TxParams) -> impl Future<Output = Result<()>>;

    fn reveal_winners(&self, tx: TxParams) -> impl Future<Output = Result<()>>;

    fn withdraw(&self, tx: TxParams) -> impl Future<Output = Result<()>>;

    fn reset_contract(&self, tx: TxParams) -> impl Future<Output = Result<()>>;

    fn change_owner(
        &self,
        new_owner: Address,
        tx: TxParams,
    ) -> impl Future<Output = Result<()>>;

    fn destroy_contract(&self, tx: TxParams) -> impl Future<Output = Result<()>>;

    fn bid_placed_events(
        &self,
    ) -> impl Future<Output = Result<EventStream<Result<BidPlaced>>>>;

    fn state_changed_events(
        &self,
    ) -> impl Future<Output = Result<EventStream<Result<Phase>>>>;
}
