//! Lottery contract on an EVM node, reached over JSON-RPC.

use crate::ledger::{
    BidPlaced,
    EventStream,
    ItemId,
    Ledger,
    LotteryContract,
    Phase,
    TxParams,
};
use alloy::{
    network::{
        Ethereum,
        EthereumWallet,
    },
    primitives::{
        Address,
        U256,
    },
    providers::{
        DynProvider,
        PendingTransactionBuilder,
        Provider,
        ProviderBuilder,
    },
    signers::local::PrivateKeySigner,
    sol,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use futures::StreamExt;
use tracing::{
    debug,
    info,
};

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface Lottery {
        event BidPlaced(uint256 itemId, address sender);
        event StateChanged(uint8 newState);

        function owner() external view returns (address);
        function privilegedAccount() external view returns (address);
        function bidderCount(uint256 itemId) external view returns (uint256);
        function phase() external view returns (uint8);
        function checkWinner() external view returns (uint256[]);

        function bid(uint256 itemId) external payable;
        function revealWinners() external;
        function withdraw() external;
        function resetContract() external;
        function changeOwner(address newOwner) external;
        function destroyContract() external;
    }
}

#[derive(Clone)]
pub struct EvmLottery {
    provider: DynProvider,
    contract: Lottery::LotteryInstance<DynProvider>,
}

impl EvmLottery {
    /// Connects to `rpc_url`, registering every signer with the provider wallet.
    ///
    /// The first signer is the wallet's default sender; the others sign when
    /// they are named as `from`.
    pub async fn connect(
        rpc_url: &str,
        contract: Address,
        signers: Vec<PrivateKeySigner>,
    ) -> Result<Self> {
        let mut signers = signers.into_iter();
        let first = signers
            .next()
            .ok_or_else(|| eyre!("At least one signer is required"))?;
        let mut wallet = EthereumWallet::from(first);
        for signer in signers {
            wallet.register_signer(signer);
        }

        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect(rpc_url)
            .await
            .wrap_err_with(|| format!("Failed to connect to {rpc_url}"))?
            .erased();
        let chain_id = provider
            .get_chain_id()
            .await
            .wrap_err("Failed to query chain id")?;
        info!(rpc_url, chain_id, %contract, "connected to lottery contract");

        let contract = Lottery::new(contract, provider.clone());
        Ok(Self { provider, contract })
    }
}

async fn confirm(
    label: &str,
    pending: PendingTransactionBuilder<Ethereum>,
) -> Result<()> {
    let tx_hash = *pending.tx_hash();
    debug!(label, %tx_hash, "transaction submitted");
    let receipt = pending
        .get_receipt()
        .await
        .wrap_err_with(|| format!("{label}: failed to fetch receipt"))?;
    if !receipt.status() {
        return Err(eyre!("{label}: transaction {tx_hash} reverted"));
    }
    Ok(())
}

fn item_arg(item: ItemId) -> U256 {
    U256::from(item.index())
}

impl Ledger for EvmLottery {
    async fn get_balance(&self, address: Address) -> Result<u128> {
        let balance = self.provider.get_balance(address).await?;
        u128::try_from(balance).map_err(|_| eyre!("balance of {address} exceeds u128"))
    }
}

impl LotteryContract for EvmLottery {
    fn address(&self) -> Address {
        *self.contract.address()
    }

    async fn owner(&self) -> Result<Address> {
        Ok(self.contract.owner().call().await?)
    }

    async fn privileged_account(&self) -> Result<Address> {
        Ok(self.contract.privilegedAccount().call().await?)
    }

    async fn bidder_count(&self, item: ItemId) -> Result<u64> {
        let count = self.contract.bidderCount(item_arg(item)).call().await?;
        u64::try_from(count).map_err(|_| eyre!("bidder count for {item} exceeds u64"))
    }

    async fn phase(&self) -> Result<Phase> {
        Ok(Phase::from(self.contract.phase().call().await?))
    }

    async fn check_winner(&self, caller: Address) -> Result<Vec<ItemId>> {
        let won = self.contract.checkWinner().from(caller).call().await?;
        Ok(won
            .into_iter()
            .filter_map(|raw| u64::try_from(raw).ok().and_then(ItemId::from_raw))
            .collect())
    }

    async fn bid(&self, item: ItemId, tx: TxParams) -> Result<()> {
        let pending = self
            .contract
            .bid(item_arg(item))
            .from(tx.sender)
            .value(U256::from(tx.value.unwrap_or_default()))
            .send()
            .await?;
        confirm("bid", pending).await
    }

    async fn reveal_winners(&self, tx: TxParams) -> Result<()> {
        let pending = self.contract.revealWinners().from(tx.sender).send().await?;
        confirm("revealWinners", pending).await
    }

    async fn withdraw(&self, tx: TxParams) -> Result<()> {
        let pending = self.contract.withdraw().from(tx.sender).send().await?;
        confirm("withdraw", pending).await
    }

    async fn reset_contract(&self, tx: TxParams) -> Result<()> {
        let pending = self.contract.resetContract().from(tx.sender).send().await?;
        confirm("resetContract", pending).await
    }

    async fn change_owner(&self, new_owner: Address, tx: TxParams) -> Result<()> {
        let pending = self
            .contract
            .changeOwner(new_owner)
            .from(tx.sender)
            .send()
            .await?;
        confirm("changeOwner", pending).await
    }

    async fn destroy_contract(&self, tx: TxParams) -> Result<()> {
        let pending = self.contract.destroyContract().from(tx.sender).send().await?;
        confirm("destroyContract", pending).await
    }

    async fn bid_placed_events(&self) -> Result<EventStream<Result<BidPlaced>>> {
        let poller = self
            .contract
            .BidPlaced_filter()
            .watch()
            .await
            .wrap_err("Failed to subscribe to BidPlaced")?;
        Ok(poller
            .into_stream()
            .map(|item| -> Result<BidPlaced> {
                let (event, _log) = item?;
                Ok(BidPlaced {
                    // Out-of-range ids are dropped by the controller.
                    item_id: u64::try_from(event.itemId).unwrap_or(u64::MAX),
                    bidder: event.sender,
                })
            })
            .boxed_local())
    }

    async fn state_changed_events(&self) -> Result<EventStream<Result<Phase>>> {
        let poller = self
            .contract
            .StateChanged_filter()
            .watch()
            .await
            .wrap_err("Failed to subscribe to StateChanged")?;
        Ok(poller
            .into_stream()
            .map(|item| -> Result<Phase> {
                let (event, _log) = item?;
                Ok(Phase::from(event.newState))
            })
            .boxed_local())
    }
}
