use crate::{
    controller::{
        ControllerSettings,
        Subscriptions,
        ViewStateController,
    },
    ledger::{
        AccountProvider,
        BidPlaced,
        Phase,
    },
    notifications::{
        NotificationTimers,
        Severity,
    },
    simulated::{
        DevAccounts,
        SimulatedLottery,
    },
    wallets::AccountSelector,
};
use alloy::primitives::Address;
use futures::{
    FutureExt,
    StreamExt,
};

pub type SimulatedController =
    ViewStateController<AccountSelector, SimulatedLottery, SimulatedLottery>;

/// A controller wired to a fresh simulated lottery, alice active.
pub struct TestContext {
    pub chain: SimulatedLottery,
    pub wallet: AccountSelector,
    pub accounts: DevAccounts,
    pub controller: SimulatedController,
    pub timers: NotificationTimers,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_settings(ControllerSettings::default())
    }

    pub fn with_settings(settings: ControllerSettings) -> Self {
        let (chain, wallet, accounts) = SimulatedLottery::with_wallet(settings.stake)
            .expect("simulated lottery");
        let (controller, timers) = ViewStateController::new(
            wallet.clone(),
            chain.clone(),
            chain.clone(),
            settings,
        );
        Self {
            chain,
            wallet,
            accounts,
            controller,
            timers,
        }
    }

    /// Context with the controller already initialized.
    pub async fn mounted() -> (Self, Subscriptions) {
        let mut ctx = Self::new();
        let subscriptions = ctx.controller.initialize().await.expect("first mount");
        (ctx, subscriptions)
    }

    pub fn alice(&self) -> Address {
        self.accounts.alice
    }

    pub fn bob(&self) -> Address {
        self.accounts.bob
    }

    pub fn president(&self) -> Address {
        self.accounts.president
    }

    pub fn deployer(&self) -> Address {
        self.accounts.deployer
    }

    /// Switches the wallet and delivers the resulting account change.
    pub async fn switch_to(&mut self, subscriptions: &mut Subscriptions, account: Address) {
        self.wallet.switch_account(account).expect("known account");
        let changed = subscriptions
            .accounts
            .next()
            .await
            .expect("account stream open");
        self.controller.on_account_changed(changed).await;
    }

    /// Feeds every already-emitted contract event to the controller.
    pub async fn deliver_events(&mut self, subscriptions: &mut Subscriptions) -> usize {
        let mut delivered = 0;
        while let Some(Some(event)) = subscriptions.bids.next().now_or_never() {
            let event: BidPlaced = event.expect("bid event");
            self.controller.on_bid_placed(event).await;
            delivered += 1;
        }
        while let Some(Some(phase)) = subscriptions.phases.next().now_or_never() {
            let phase: Phase = phase.expect("phase event");
            self.controller.on_phase_changed(phase);
            delivered += 1;
        }
        delivered
    }

    pub fn notification_texts(&self, severity: Severity) -> Vec<String> {
        self.controller
            .notifications()
            .entries()
            .iter()
            .filter(|entry| entry.severity == severity)
            .map(|entry| entry.text.clone())
            .collect()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
