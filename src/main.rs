use alloy::primitives::Address;
use clap::{
    ArgGroup,
    Parser,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use lottery_ballot::{
    client,
    controller::ControllerSettings,
    deployment,
    notifications::NotificationSettings,
    units,
    wallets,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

#[derive(Parser, Debug)]
#[command(
    name = "lottery-ballot",
    about = "Terminal client for the lottery ballot contract",
    version,
    group(
        ArgGroup::new("network")
            .args(["simulated", "local", "sepolia"])
            .required(true)
    )
)]
struct Args {
    /// Run against an in-process simulated lottery
    #[arg(long)]
    simulated: bool,

    /// Connect to a local node such as anvil
    #[arg(long)]
    local: bool,

    /// Connect to Sepolia
    #[arg(long)]
    sepolia: bool,

    /// Override the RPC URL for the selected network
    #[arg(long)]
    rpc_url: Option<String>,

    /// Lottery contract address (recorded as the latest deployment)
    #[arg(long)]
    contract: Option<Address>,

    /// Keystore name to unlock; repeat for more accounts
    #[arg(long = "wallet")]
    wallets: Vec<String>,

    /// Keystore directory (defaults to ~/.foundry/keystores)
    #[arg(long)]
    wallet_dir: Option<String>,

    /// Hex private key to sign with; repeat for more accounts
    #[arg(long = "dev-key")]
    dev_keys: Vec<String>,

    /// Ether attached to every bid
    #[arg(long, default_value = "0.01")]
    stake: String,

    #[arg(long, default_value_t = 5_000)]
    notification_ttl_ms: u64,

    #[arg(long, default_value_t = 4_500)]
    notification_fade_ms: u64,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

impl Args {
    fn into_config(self) -> Result<client::AppConfig> {
        let network = if self.simulated {
            client::NetworkTarget::Simulated
        } else if self.sepolia {
            client::NetworkTarget::Sepolia {
                url: self
                    .rpc_url
                    .unwrap_or_else(|| client::DEFAULT_SEPOLIA_RPC_URL.to_string()),
            }
        } else {
            client::NetworkTarget::Local {
                url: self
                    .rpc_url
                    .unwrap_or_else(|| client::DEFAULT_LOCAL_RPC_URL.to_string()),
            }
        };

        let stake = units::to_base_unit(&self.stake).wrap_err("Invalid --stake")?;
        let controller = ControllerSettings {
            stake,
            notifications: NotificationSettings {
                ttl: Duration::from_millis(self.notification_ttl_ms),
                fade_after: Duration::from_millis(self.notification_fade_ms),
            },
        };

        let wallets = client::WalletConfig {
            keystores: self.wallets,
            keystore_dir: wallets::resolve_keystore_dir(self.wallet_dir.as_deref())?,
            dev_keys: self.dev_keys,
        };

        Ok(client::AppConfig {
            network,
            contract: self.contract,
            wallets,
            controller,
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let _guard = client::init_tracing(&args.log_dir)?;
    tracing::info!("starting lottery-ballot client");
    deployment::ensure_structure(Path::new(deployment::DEPLOYMENTS_ROOT))
        .wrap_err("initializing deployment directories")?;
    let app_config = args.into_config()?;
    client::run_app(app_config).await
}
