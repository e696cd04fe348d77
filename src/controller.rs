//! UI-observable session state and the handlers that mutate it.
//!
//! [`ViewStateController`] owns everything the view renders. Contract events,
//! wallet account changes and user actions all flow through it, one at a
//! time, from the run loop.

use crate::{
    ledger::{
        AccountProvider,
        BidPlaced,
        EventStream,
        ITEM_COUNT,
        ItemId,
        Ledger,
        LotteryContract,
        Phase,
        TxParams,
    },
    notifications::{
        Notification,
        NotificationQueue,
        NotificationSettings,
        NotificationTimer,
        NotificationTimers,
        Severity,
    },
    units,
};
use alloy::primitives::Address;
use color_eyre::eyre::{
    Report,
    Result,
    eyre,
};
use futures::{
    StreamExt,
    future::try_join,
    stream,
};
use std::fmt;
use tracing::{
    debug,
    error,
    info,
    warn,
};

pub const WAITING_ON_TRANSACTION: &str = "Waiting on transaction success...";
pub const WAITING_FOR_RESPONSE: &str = "Waiting for response...";
pub const CONTRACT_DESTROYED: &str = "Contract has been destroyed";
pub const NO_PRIZES: &str = "You did not win any prizes.";
pub const CHECK_WINNER_FAILED: &str = "Error checking winner. Please try again.";

/// 0.01 ETH.
pub const DEFAULT_STAKE: u128 = 10_000_000_000_000_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ControllerSettings {
    /// Value attached to every bid, in wei.
    pub stake: u128,
    pub notifications: NotificationSettings,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            stake: DEFAULT_STAKE,
            notifications: NotificationSettings::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Lifecycle {
    #[default]
    Unmounted,
    Mounted,
    TornDown,
}

/// Event feeds opened by [`ViewStateController::initialize`].
///
/// The run loop polls these and hands each item back to the controller.
pub struct Subscriptions {
    pub bids: EventStream<Result<BidPlaced>>,
    pub phases: EventStream<Result<Phase>>,
    pub accounts: EventStream<Address>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Session {
    pub current_account: Option<Address>,
    pub known_accounts: Vec<Address>,
    pub current_account_balance: Option<u128>,
    pub contract_balance: Option<u128>,
    pub owner: Option<Address>,
    pub privileged_account: Option<Address>,
    pub phase: Phase,
    pub bid_counts: [u64; ITEM_COUNT],
    pub won_items: Vec<ItemId>,
    pub pending_owner_input: String,
    pub status: String,
}

impl Session {
    pub fn is_destroyed(&self) -> bool {
        self.owner == Some(Address::ZERO)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    Bid(ItemId),
    DeclareWinners,
    CheckWinner,
    Withdraw,
    Reset,
    ChangeOwner,
    Destroy,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Bid(item) => write!(f, "Bid on {item}"),
            Action::DeclareWinners => write!(f, "Declare Winners"),
            Action::CheckWinner => write!(f, "Am I Winner?"),
            Action::Withdraw => write!(f, "Withdraw"),
            Action::Reset => write!(f, "Reset"),
            Action::ChangeOwner => write!(f, "Change Owner"),
            Action::Destroy => write!(f, "Destroy Contract"),
        }
    }
}

/// Which actions the view offers for the current session.
///
/// Client-side only; the contract enforces its own rules.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ActionAvailability {
    pub bid: bool,
    pub declare_winners: bool,
    pub check_winner: bool,
    pub withdraw: bool,
    pub reset: bool,
    pub change_owner: bool,
    pub destroy: bool,
}

impl ActionAvailability {
    pub fn from_session(session: &Session) -> Self {
        let connected = session.current_account.is_some();
        let is_owner = connected && session.current_account == session.owner;
        let is_privileged =
            connected && session.current_account == session.privileged_account;
        let destroyed = session.is_destroyed();
        let closed = session.phase.is_closed();
        let administers = (is_owner || is_privileged) && !destroyed;
        Self {
            bid: connected && !closed && !is_owner && !destroyed,
            declare_winners: is_owner && !destroyed,
            check_winner: connected && closed && !is_owner,
            withdraw: is_owner,
            reset: is_owner,
            change_owner: administers,
            destroy: administers,
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Bid(_) => self.bid,
            Action::DeclareWinners => self.declare_winners,
            Action::CheckWinner => self.check_winner,
            Action::Withdraw => self.withdraw,
            Action::Reset => self.reset,
            Action::ChangeOwner => self.change_owner,
            Action::Destroy => self.destroy,
        }
    }
}

/// Everything the view needs for one frame.
#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub contract: Address,
    pub account: Option<Address>,
    pub account_balance: Option<u128>,
    pub contract_balance: Option<u128>,
    pub owner: Option<Address>,
    pub privileged_account: Option<Address>,
    pub phase: Phase,
    pub stake: u128,
    pub bid_counts: [u64; ITEM_COUNT],
    pub won_items: Vec<ItemId>,
    pub owner_input: String,
    pub availability: ActionAvailability,
    pub notifications: Vec<Notification>,
    pub status: String,
}

pub struct ViewStateController<W, L, C> {
    wallet: W,
    ledger: L,
    contract: C,
    settings: ControllerSettings,
    lifecycle: Lifecycle,
    session: Session,
    notifications: NotificationQueue,
}

impl<W, L, C> ViewStateController<W, L, C>
where
    W: AccountProvider,
    L: Ledger,
    C: LotteryContract,
{
    pub fn new(
        wallet: W,
        ledger: L,
        contract: C,
        settings: ControllerSettings,
    ) -> (Self, NotificationTimers) {
        let (notifications, timers) = NotificationQueue::new(settings.notifications);
        let controller = Self {
            wallet,
            ledger,
            contract,
            settings,
            lifecycle: Lifecycle::Unmounted,
            session: Session::default(),
            notifications,
        };
        (controller, timers)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    pub fn availability(&self) -> ActionAvailability {
        ActionAvailability::from_session(&self.session)
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.session.status = status.into();
    }

    /// Opens the event feeds and loads the initial state.
    ///
    /// Returns `None` without side effects unless the controller is still
    /// unmounted, so a second call can never double-subscribe.
    pub async fn initialize(&mut self) -> Option<Subscriptions> {
        if self.lifecycle != Lifecycle::Unmounted {
            warn!(lifecycle = ?self.lifecycle, "initialize called more than once");
            return None;
        }
        self.lifecycle = Lifecycle::Mounted;
        let subscriptions = self.subscribe().await;

        let (accounts, roles, counts, phase) = futures::join!(
            self.fetch_accounts(),
            self.fetch_roles(),
            self.fetch_bid_counts(),
            self.contract.phase(),
        );

        match accounts {
            Ok((accounts, account_balance, contract_balance)) => {
                self.session.current_account = accounts.first().copied();
                self.session.known_accounts = accounts;
                self.session.current_account_balance = Some(account_balance);
                self.session.contract_balance = Some(contract_balance);
            }
            Err(err) => self.load_failed("Failed to load current account.", err),
        }
        match roles {
            Ok((owner, privileged)) => {
                self.session.owner = Some(owner);
                self.session.privileged_account = Some(privileged);
            }
            Err(err) => self.load_failed("Failed to load owner.", err),
        }
        for (item, count) in ItemId::ALL.into_iter().zip(counts) {
            match count {
                Ok(count) => self.session.bid_counts[item.index()] = count,
                Err(err) => self.load_failed("Failed to load current bids.", err),
            }
        }
        match phase {
            Ok(phase) => self.session.phase = phase,
            Err(err) => self.load_failed("Failed to load lottery State.", err),
        }

        info!(
            account = ?self.session.current_account,
            owner = ?self.session.owner,
            phase = %self.session.phase,
            "lottery view initialized"
        );
        Some(subscriptions)
    }

    /// Cancels pending notification timers. Subscriptions end when the
    /// caller drops them.
    pub fn teardown(&mut self) -> bool {
        if self.lifecycle != Lifecycle::Mounted {
            return false;
        }
        self.notifications.clear();
        self.lifecycle = Lifecycle::TornDown;
        debug!("lottery view torn down");
        true
    }

    async fn subscribe(&self) -> Subscriptions {
        let bids = match self.contract.bid_placed_events().await {
            Ok(events) => events,
            Err(err) => {
                warn!(?err, "BidPlaced subscription failed");
                stream::pending().boxed_local()
            }
        };
        let phases = match self.contract.state_changed_events().await {
            Ok(events) => events,
            Err(err) => {
                warn!(?err, "StateChanged subscription failed");
                stream::pending().boxed_local()
            }
        };
        Subscriptions {
            bids,
            phases,
            accounts: self.wallet.accounts_changed(),
        }
    }

    async fn fetch_accounts(&self) -> Result<(Vec<Address>, u128, u128)> {
        let accounts = self.wallet.request_accounts().await?;
        let active = *accounts
            .first()
            .ok_or_else(|| eyre!("wallet returned no accounts"))?;
        let contract_balance = self.ledger.get_balance(self.contract.address()).await?;
        let account_balance = self.ledger.get_balance(active).await?;
        Ok((accounts, account_balance, contract_balance))
    }

    async fn fetch_roles(&self) -> Result<(Address, Address)> {
        try_join(self.contract.owner(), self.contract.privileged_account()).await
    }

    async fn fetch_bid_counts(&self) -> [Result<u64>; ITEM_COUNT] {
        let [tesla, iphone, thinkpad] = ItemId::ALL;
        let (tesla, iphone, thinkpad) = futures::join!(
            self.contract.bidder_count(tesla),
            self.contract.bidder_count(iphone),
            self.contract.bidder_count(thinkpad),
        );
        [tesla, iphone, thinkpad]
    }

    fn load_failed(&mut self, message: &str, err: Report) {
        warn!(?err, "{message}");
        self.session.status = message.to_string();
    }

    async fn refresh_account_balance(&mut self) {
        let Some(account) = self.session.current_account else {
            return;
        };
        match self.ledger.get_balance(account).await {
            Ok(balance) => self.session.current_account_balance = Some(balance),
            Err(err) => warn!(?err, %account, "failed to refresh account balance"),
        }
    }

    async fn refresh_contract_balance(&mut self) {
        match self.ledger.get_balance(self.contract.address()).await {
            Ok(balance) => self.session.contract_balance = Some(balance),
            Err(err) => warn!(?err, "failed to refresh contract balance"),
        }
    }

    pub async fn on_bid_placed(&mut self, event: BidPlaced) {
        let Some(item) = ItemId::from_raw(event.item_id) else {
            warn!(item_id = event.item_id, bidder = %event.bidder, "bid for unknown item ignored");
            return;
        };
        // Counted before the first await so interleaved events never lose one.
        let count = &mut self.session.bid_counts[item.index()];
        *count = count.saturating_add(1);

        self.refresh_account_balance().await;
        self.refresh_contract_balance().await;
        self.notifications.enqueue(
            Severity::Success,
            format!("New bid on {item} from {}", event.bidder),
        );
    }

    pub fn on_phase_changed(&mut self, phase: Phase) {
        debug!(%phase, "lottery phase changed");
        self.session.phase = phase;
    }

    pub async fn on_account_changed(&mut self, account: Address) {
        info!(%account, "active account changed");
        self.session.current_account = Some(account);
        if !self.session.known_accounts.contains(&account) {
            self.session.known_accounts.push(account);
        }

        if self.session.privileged_account == Some(account) {
            self.session.owner = Some(account);
        } else {
            match self.contract.owner().await {
                Ok(owner) => self.session.owner = Some(owner),
                Err(err) => self.load_failed("Failed to load owner.", err),
            }
        }
        self.refresh_account_balance().await;
    }

    pub fn on_subscription_error(&mut self, feed: &str, err: Report) {
        warn!(feed, ?err, "event subscription error");
    }

    pub fn handle_timer(&mut self, timer: NotificationTimer) {
        self.notifications.handle_timer(timer);
    }

    /// Drops the oldest visible notification, if any.
    pub fn dismiss_oldest_notification(&mut self) -> bool {
        match self.notifications.entries().first() {
            Some(entry) => {
                let id = entry.id;
                self.notifications.dismiss(id)
            }
            None => false,
        }
    }

    /// Asks the wallet to activate the account after the current one.
    ///
    /// The change itself arrives later on the account stream.
    pub fn switch_to_next_account(&mut self) {
        let accounts = &self.session.known_accounts;
        if accounts.is_empty() {
            self.session.status = "No wallet accounts available.".to_string();
            return;
        }
        let next = match self
            .session
            .current_account
            .and_then(|current| accounts.iter().position(|a| *a == current))
        {
            Some(index) => accounts[(index + 1) % accounts.len()],
            None => accounts[0],
        };
        if let Err(err) = self.wallet.switch_account(next) {
            error!(?err, %next, "account switch rejected");
            self.session.status = format!("Could not switch to {next}.");
        }
    }

    pub fn push_owner_input(&mut self, c: char) {
        self.session.pending_owner_input.push(c);
    }

    pub fn pop_owner_input(&mut self) {
        self.session.pending_owner_input.pop();
    }

    pub fn set_owner_input(&mut self, input: impl Into<String>) {
        self.session.pending_owner_input = input.into();
    }

    pub fn clear_owner_input(&mut self) {
        self.session.pending_owner_input.clear();
    }

    /// Runs `action` if the current session offers it.
    ///
    /// Returns whether a handler ran.
    pub async fn dispatch(&mut self, action: Action) -> bool {
        if !self.availability().allows(action) {
            if action == Action::ChangeOwner {
                self.session.pending_owner_input.clear();
            }
            self.session.status = format!("{action} is not available right now.");
            return false;
        }
        match action {
            Action::Bid(item) => self.place_bid(item).await,
            Action::DeclareWinners => self.reveal_winners().await,
            Action::CheckWinner => self.check_winner().await,
            Action::Withdraw => self.withdraw().await,
            Action::Reset => self.reset().await,
            Action::ChangeOwner => self.change_owner().await,
            Action::Destroy => self.destroy_contract().await,
        }
        true
    }

    fn sender(&mut self, action: Action) -> Option<TxParams> {
        match self.session.current_account {
            Some(account) => Some(TxParams::from(account)),
            None => {
                self.fail(action, eyre!("no wallet account connected"));
                None
            }
        }
    }

    fn succeed(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.session.status = message.clone();
        self.notifications.enqueue(Severity::Success, message);
    }

    fn fail(&mut self, action: Action, err: Report) {
        error!(%action, ?err, "action failed");
        self.session.status = format!("{action} failed.");
        self.notifications
            .enqueue(Severity::Error, format!("{action} failed: {err}"));
    }

    pub async fn place_bid(&mut self, item: ItemId) {
        let action = Action::Bid(item);
        self.session.status = WAITING_ON_TRANSACTION.to_string();
        let Some(tx) = self.sender(action) else {
            return;
        };
        let tx = tx.with_value(self.settings.stake);
        match self.contract.bid(item, tx).await {
            Ok(()) => self.succeed("You have placed your bid!"),
            Err(err) => self.fail(action, err),
        }
    }

    pub async fn reveal_winners(&mut self) {
        let action = Action::DeclareWinners;
        self.session.status = WAITING_ON_TRANSACTION.to_string();
        let Some(tx) = self.sender(action) else {
            return;
        };
        match self.contract.reveal_winners(tx).await {
            Ok(()) => self.succeed("A winner has been picked!"),
            Err(err) => self.fail(action, err),
        }
    }

    pub async fn withdraw(&mut self) {
        let action = Action::Withdraw;
        self.session.status = WAITING_ON_TRANSACTION.to_string();
        let Some(tx) = self.sender(action) else {
            return;
        };
        match self.contract.withdraw(tx).await {
            Ok(()) => {
                self.refresh_contract_balance().await;
                self.refresh_account_balance().await;
                self.succeed("Funds have been withdrawn!");
            }
            Err(err) => self.fail(action, err),
        }
    }

    pub async fn reset(&mut self) {
        let action = Action::Reset;
        self.session.status = WAITING_ON_TRANSACTION.to_string();
        let Some(tx) = self.sender(action) else {
            return;
        };
        match self.contract.reset_contract(tx).await {
            Ok(()) => {
                self.session.bid_counts = [0; ITEM_COUNT];
                self.session.won_items.clear();
                self.succeed("Contract has been reset.");
            }
            Err(err) => self.fail(action, err),
        }
    }

    pub async fn check_winner(&mut self) {
        self.session.status = WAITING_FOR_RESPONSE.to_string();
        let Some(caller) = self.session.current_account else {
            self.fail(Action::CheckWinner, eyre!("no wallet account connected"));
            return;
        };
        match self.contract.check_winner(caller).await {
            Ok(won) => {
                if won.is_empty() {
                    self.notifications.enqueue(Severity::Error, NO_PRIZES);
                } else {
                    for item in &won {
                        self.notifications
                            .enqueue(Severity::Success, format!("You won the {item}!"));
                    }
                }
                self.session.won_items = won;
                self.session.status = "Successfully got won items.".to_string();
            }
            Err(err) => {
                error!(?err, %caller, "checkWinner failed");
                self.session.status = CHECK_WINNER_FAILED.to_string();
                self.notifications.enqueue(Severity::Error, CHECK_WINNER_FAILED);
            }
        }
    }

    /// Submits `pending_owner_input` as the new owner.
    ///
    /// The local owner is replaced before the transaction settles and is
    /// left in place if it reverts.
    pub async fn change_owner(&mut self) {
        let action = Action::ChangeOwner;
        self.session.status = WAITING_ON_TRANSACTION.to_string();
        let Some(tx) = self.sender(action) else {
            return;
        };
        let input = self.session.pending_owner_input.trim().to_string();
        let new_owner = match input.parse::<Address>() {
            Ok(address) => address,
            Err(err) => {
                self.fail(action, eyre!("'{input}' is not a valid address: {err}"));
                return;
            }
        };
        // Zero is the destroyed-contract sentinel.
        if new_owner == Address::ZERO {
            self.fail(action, eyre!("the zero address cannot own the lottery"));
            return;
        }

        self.session.owner = Some(new_owner);
        match self.contract.change_owner(new_owner, tx).await {
            Ok(()) => {
                self.session.pending_owner_input.clear();
                self.succeed(format!("Contract owner changed to {new_owner}."));
            }
            Err(err) => self.fail(action, err),
        }
    }

    pub async fn destroy_contract(&mut self) {
        let action = Action::Destroy;
        self.session.status = WAITING_ON_TRANSACTION.to_string();
        let Some(tx) = self.sender(action) else {
            return;
        };
        match self.contract.destroy_contract(tx).await {
            Ok(()) => {
                self.session.owner = Some(Address::ZERO);
                self.refresh_contract_balance().await;
                warn!("lottery contract destroyed");
                self.session.status = CONTRACT_DESTROYED.to_string();
                self.notifications.enqueue(Severity::Error, CONTRACT_DESTROYED);
            }
            Err(err) => self.fail(action, err),
        }
    }

    pub fn snapshot(&self) -> AppSnapshot {
        let session = &self.session;
        AppSnapshot {
            contract: self.contract.address(),
            account: session.current_account,
            account_balance: session.current_account_balance,
            contract_balance: session.contract_balance,
            owner: session.owner,
            privileged_account: session.privileged_account,
            phase: session.phase,
            stake: self.settings.stake,
            bid_counts: session.bid_counts,
            won_items: session.won_items.clone(),
            owner_input: session.pending_owner_input.clone(),
            availability: self.availability(),
            notifications: self.notifications.entries().to_vec(),
            status: session.status.clone(),
        }
    }
}

impl AppSnapshot {
    pub fn account_balance_display(&self) -> String {
        self.account_balance
            .map(|wei| format!("{} ETH", units::to_display_fixed(wei, 4)))
            .unwrap_or_else(|| "-".to_string())
    }

    pub fn contract_balance_display(&self) -> String {
        self.contract_balance
            .map(|wei| format!("{} ETH", units::to_display(wei)))
            .unwrap_or_else(|| "-".to_string())
    }
}
