use crate::{
    controller::{
        Action,
        ControllerSettings,
        Subscriptions,
        ViewStateController,
        WAITING_FOR_RESPONSE,
        WAITING_ON_TRANSACTION,
    },
    deployment::{
        DeploymentEnv,
        DeploymentRecord,
        DeploymentStore,
    },
    evm::EvmLottery,
    ledger::{
        AccountProvider,
        Ledger,
        LotteryContract,
    },
    notifications::NotificationTimers,
    simulated::SimulatedLottery,
    ui,
    wallets::{
        AccountSelector,
        dev_signer,
        find_keystore,
    },
};
use alloy::{
    primitives::Address,
    signers::local::PrivateKeySigner,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use crossterm::event::EventStream;
use futures::StreamExt;
use std::path::{
    Path,
    PathBuf,
};
use tracing::{
    info,
    warn,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOCAL_RPC_URL: &str = "http://localhost:8545";
pub const DEFAULT_SEPOLIA_RPC_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";
/// First prefunded anvil account, used on `--local` when no key is given.
pub const ANVIL_DEV_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NetworkTarget {
    Simulated,
    Local { url: String },
    Sepolia { url: String },
}

impl NetworkTarget {
    fn deployment_env(&self) -> Option<DeploymentEnv> {
        match self {
            NetworkTarget::Simulated => None,
            NetworkTarget::Local { .. } => Some(DeploymentEnv::Local),
            NetworkTarget::Sepolia { .. } => Some(DeploymentEnv::Sepolia),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WalletConfig {
    pub keystores: Vec<String>,
    pub keystore_dir: PathBuf,
    pub dev_keys: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: NetworkTarget,
    pub contract: Option<Address>,
    pub wallets: WalletConfig,
    pub controller: ControllerSettings,
}

pub fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    let appender = rolling::daily(log_dir, "lottery-ballot.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("Failed to install tracing subscriber: {e}"))?;
    Ok(guard)
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    match &config.network {
        NetworkTarget::Simulated => {
            let (lottery, wallet, _accounts) =
                SimulatedLottery::with_wallet(config.controller.stake)?;
            info!(contract = %lottery.address(), "using simulated lottery");
            run_with(wallet, lottery.clone(), lottery, config.controller).await
        }
        NetworkTarget::Local { url } | NetworkTarget::Sepolia { url } => {
            let env = config
                .network
                .deployment_env()
                .ok_or_else(|| eyre!("{:?} has no deployment store", config.network))?;
            let contract = resolve_contract(env, config.contract, url)?;
            let signers = load_signers(&config.network, &config.wallets)?;
            let wallet =
                AccountSelector::new(signers.iter().map(|s| s.address()).collect())?;
            let lottery = EvmLottery::connect(url, contract, signers).await?;
            run_with(wallet, lottery.clone(), lottery, config.controller).await
        }
    }
}

/// Picks the contract to talk to, recording an explicit address as the
/// newest deployment for `env`.
fn resolve_contract(
    env: DeploymentEnv,
    explicit: Option<Address>,
    url: &str,
) -> Result<Address> {
    let store = DeploymentStore::new(env)?;
    match explicit {
        Some(address) => {
            let already_latest = store
                .load()?
                .last()
                .is_some_and(|record| record.contract_address == address);
            if !already_latest {
                store.append(DeploymentRecord::now(address, url))?;
                info!(%address, %env, "recorded lottery deployment");
            }
            Ok(address)
        }
        None => {
            let record = store.latest()?;
            info!(
                address = %record.contract_address,
                recorded_at = %record.recorded_at,
                "using recorded lottery deployment"
            );
            Ok(record.contract_address)
        }
    }
}

fn load_signers(
    network: &NetworkTarget,
    config: &WalletConfig,
) -> Result<Vec<PrivateKeySigner>> {
    let mut signers = Vec::new();
    for name in &config.keystores {
        signers.push(find_keystore(&config.keystore_dir, name)?.unlock()?);
    }
    for key in &config.dev_keys {
        signers.push(dev_signer(key)?);
    }
    if signers.is_empty() {
        match network {
            NetworkTarget::Local { .. } => {
                warn!("no wallet given; falling back to the first anvil account");
                signers.push(dev_signer(ANVIL_DEV_KEY)?);
            }
            _ => {
                return Err(eyre!(
                    "Specify --wallet <name> or --dev-key <hex> to sign transactions"
                ));
            }
        }
    }
    Ok(signers)
}

async fn run_with<W, L, C>(
    wallet: W,
    ledger: L,
    contract: C,
    settings: ControllerSettings,
) -> Result<()>
where
    W: AccountProvider,
    L: Ledger,
    C: LotteryContract,
{
    let (mut controller, mut timers) =
        ViewStateController::new(wallet, ledger, contract, settings);
    let mut subscriptions = controller
        .initialize()
        .await
        .ok_or_else(|| eyre!("lottery view was already initialized"))?;
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(
        &mut controller,
        &mut subscriptions,
        &mut timers,
        &mut ui_state,
        &mut input_events,
    )
    .await;
    controller.teardown();
    ui::terminal_exit()?;
    res
}

fn show_processing_status<W, L, C>(
    controller: &mut ViewStateController<W, L, C>,
    ui_state: &mut ui::UiState,
    message: &str,
) -> Result<()>
where
    W: AccountProvider,
    L: Ledger,
    C: LotteryContract,
{
    controller.set_status(message);
    ui::draw(ui_state, &controller.snapshot()).wrap_err("Failed to draw pending action")
}

async fn run_loop<W, L, C>(
    controller: &mut ViewStateController<W, L, C>,
    subscriptions: &mut Subscriptions,
    timers: &mut NotificationTimers,
    ui_state: &mut ui::UiState,
    input_events: &mut EventStream,
) -> Result<()>
where
    W: AccountProvider,
    L: Ledger,
    C: LotteryContract,
{
    ui::draw(ui_state, &controller.snapshot())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => { break; }
            Some(event) = subscriptions.bids.next() => match event {
                Ok(event) => controller.on_bid_placed(event).await,
                Err(err) => controller.on_subscription_error("BidPlaced", err),
            },
            Some(event) = subscriptions.phases.next() => match event {
                Ok(phase) => controller.on_phase_changed(phase),
                Err(err) => controller.on_subscription_error("StateChanged", err),
            },
            Some(account) = subscriptions.accounts.next() => {
                controller.on_account_changed(account).await;
            }
            Some(timer) = timers.next() => controller.handle_timer(timer),
            maybe_event = input_events.next() => {
                let event = match maybe_event {
                    Some(Ok(event)) => event,
                    Some(Err(err)) => {
                        return Err(err).wrap_err("Failed to read terminal input");
                    }
                    None => break,
                };
                let Some(user_event) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match user_event {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw | ui::UserEvent::OpenOwnerModal => {}
                    ui::UserEvent::Action(action) => {
                        if controller.availability().allows(action) {
                            let pending = match action {
                                Action::CheckWinner => WAITING_FOR_RESPONSE,
                                _ => WAITING_ON_TRANSACTION,
                            };
                            show_processing_status(controller, ui_state, pending)?;
                        }
                        controller.dispatch(action).await;
                    }
                    ui::UserEvent::NextAccount => controller.switch_to_next_account(),
                    ui::UserEvent::OwnerInput(c) => controller.push_owner_input(c),
                    ui::UserEvent::OwnerBackspace => controller.pop_owner_input(),
                    ui::UserEvent::CancelOwner => controller.clear_owner_input(),
                    ui::UserEvent::DismissNotification => {
                        controller.dismiss_oldest_notification();
                    }
                }
            }
        }
        ui::draw(ui_state, &controller.snapshot())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn load_signers__falls_back_to_anvil_only_on_local() {
        let local = NetworkTarget::Local {
            url: DEFAULT_LOCAL_RPC_URL.to_string(),
        };
        let sepolia = NetworkTarget::Sepolia {
            url: DEFAULT_SEPOLIA_RPC_URL.to_string(),
        };

        let signers = load_signers(&local, &WalletConfig::default()).unwrap();

        assert_eq!(signers.len(), 1);
        assert_eq!(
            signers[0].address(),
            dev_signer(ANVIL_DEV_KEY).unwrap().address()
        );
        assert!(load_signers(&sepolia, &WalletConfig::default()).is_err());
    }

    #[test]
    fn load_signers__keeps_dev_key_order() {
        let second = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
        let config = WalletConfig {
            dev_keys: vec![second.to_string(), ANVIL_DEV_KEY.to_string()],
            ..WalletConfig::default()
        };

        let signers = load_signers(&NetworkTarget::Simulated, &config).unwrap();

        assert_eq!(signers[0].address(), dev_signer(second).unwrap().address());
        assert_eq!(
            signers[1].address(),
            dev_signer(ANVIL_DEV_KEY).unwrap().address()
        );
    }
}
