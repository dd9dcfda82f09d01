use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use ethers::{
    contract::ContractFactory,
    middleware::SignerMiddleware,
    providers::{Http, JsonRpcClient, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{H160, H256, U64},
    utils::{Anvil, AnvilInstance},
};

use crate::{artifacts::Artifact, utils};

pub type Client<P = Http> = SignerMiddleware<Provider<P>, LocalWallet>;

const IN_MEMORY_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A contract instance created by one successful deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub contract_name: String,
    pub address: H160,
    pub transaction_hash: H256,
    pub block_number: Option<U64>,
}

pub struct Deploy<P = Http> {
    client: Arc<Client<P>>,
}

impl Deploy {
    pub async fn new(rpc: &str, sk: &str) -> Result<Self> {
        let wallet = utils::parse_private_key(sk)?;
        let provider = Provider::<Http>::try_from(rpc)
            .with_context(|| format!("invalid rpc url `{rpc}`"))?;
        Self::connect(provider, wallet).await
    }

    /// Spawns a local development node and deploys from its first funded
    /// account. The node is killed when the returned instance drops.
    pub async fn in_memory() -> Result<(Self, AnvilInstance)> {
        Self::spawn(Anvil::new()).await
    }

    async fn spawn(anvil: Anvil) -> Result<(Self, AnvilInstance)> {
        // `Anvil::spawn` blocks on the node's stdout and panics when the
        // node cannot start
        let anvil = tokio::task::spawn_blocking(move || anvil.spawn())
            .await
            .map_err(|_| anyhow!("failed to start local node, is `anvil` installed?"))?;

        let key = anvil
            .keys()
            .first()
            .cloned()
            .ok_or(anyhow!("local node has no development accounts"))?;
        let provider = Provider::<Http>::try_from(anvil.endpoint())?
            .interval(IN_MEMORY_POLL_INTERVAL);

        let deploy = Self::connect(provider, LocalWallet::from(key)).await?;
        Ok((deploy, anvil))
    }
}

impl<P> Deploy<P>
where
    P: JsonRpcClient + 'static,
{
    async fn connect(provider: Provider<P>, wallet: LocalWallet) -> Result<Self> {
        let chain_id = provider
            .get_chainid()
            .await
            .context("failed to connect to network")?
            .as_u64();
        log::info!("chain id:{} signer:{:?}", chain_id, wallet.address());

        let client = Arc::new(SignerMiddleware::new(
            provider,
            wallet.with_chain_id(chain_id),
        ));
        Ok(Self { client })
    }

    pub fn address(&self) -> H160 {
        self.client.address()
    }

    pub async fn run(&self, artifact: &Artifact, confirmations: usize) -> Result<Deployment> {
        if artifact.has_constructor_inputs() {
            bail!(
                "contract `{}` expects constructor arguments",
                artifact.contract_name
            );
        }

        let factory = ContractFactory::new(
            artifact.abi.clone(),
            artifact.bytecode.clone(),
            self.client.clone(),
        );
        let deployer = factory.deploy(())?.legacy().confirmations(confirmations);

        utils::ensure_funded(&self.client, &deployer.tx).await?;

        let (contract, receipt) = deployer.send_with_receipt().await?;
        log::info!("transaction hash:{:?}", receipt.transaction_hash);

        if receipt.status == Some(U64::zero()) {
            bail!(
                "deployment of `{}` reverted in transaction {:?}",
                artifact.contract_name,
                receipt.transaction_hash
            );
        }

        Ok(Deployment {
            contract_name: artifact.contract_name.clone(),
            address: contract.address(),
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
        })
    }
}
