use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::{
    artifacts::Artifact,
    config::{ActiveNetwork, Config},
    deploy::{Deploy, Deployment},
};

/// Deploy the UniTrade NFT marketplace contract.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CommandLine {
    /// Path to the JSON network config.
    #[clap(short, long, env = "UNITRADE_CONFIG", default_value = "unitrade.config.json")]
    config: PathBuf,

    /// Network to deploy to, overrides `defaultNetwork`.
    #[clap(short, long, env = "UNITRADE_NETWORK")]
    network: Option<String>,

    /// Contract name, bare or `path/File.sol:Name`.
    #[clap(long, default_value = "UniTrade1155")]
    contract: String,

    /// Name printed in front of the deployed address.
    #[clap(long, default_value = "UniTradeNFTMarketplace")]
    label: String,

    /// Blocks to wait for after the deployment is mined, at least 1.
    #[clap(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    confirmations: u64,
}

impl CommandLine {
    pub async fn execute(self) -> Result<()> {
        let deployment = self.deploy().await?;
        log::info!(
            "{} mined in block:{:?} transaction:{:?}",
            deployment.contract_name,
            deployment.block_number,
            deployment.transaction_hash
        );
        println!(
            "{} deployed to address:: {:?}",
            self.label, deployment.address
        );
        Ok(())
    }

    async fn deploy(&self) -> Result<Deployment> {
        let config = Config::load(&self.config)?;
        log::debug!(
            "solidity {} optimizer:{} runs:{} etherscan key:{}",
            config.solidity.version,
            config.solidity.settings.optimizer.enabled,
            config.solidity.settings.optimizer.runs,
            config.etherscan.api_key().is_some()
        );
        log::debug!(
            "paths sources:{} tests:{} cache:{} artifacts:{} mocha timeout:{}ms",
            config.paths.sources.display(),
            config.paths.tests.display(),
            config.paths.cache.display(),
            config.paths.artifacts.display(),
            config.mocha.timeout
        );

        let confirmations = usize::try_from(self.confirmations)?;
        let name = self.network.as_deref().unwrap_or(&config.default_network);
        let network = config.network(name)?;

        // resolved before any network activity
        let artifact = Artifact::find(&config.artifacts_dir(), &self.contract)?;
        log::info!("artifact {}:{}", artifact.source_name, artifact.contract_name);

        match network {
            ActiveNetwork::InMemory => {
                log::info!("network:{}", name);
                let (deploy, _anvil) = Deploy::in_memory().await?;
                deploy.run(&artifact, confirmations).await
            }
            ActiveNetwork::Remote { name, url, signer } => {
                log::info!("network:{} rpc:{}", name, url);
                let deploy = Deploy::new(&url, &signer).await?;
                log::info!("deployer:{:?}", deploy.address());
                deploy.run(&artifact, confirmations).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::artifacts::tests::{write_artifact, STOP_BYTECODE};

    use super::*;

    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn workspace(url: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let config = serde_json::json!({
            "defaultNetwork": "local",
            "networks": {
                "hardhat": {},
                "local": { "url": url, "accounts": [format!("0x{DEV_KEY}")] }
            }
        });
        fs::write(dir.path().join("unitrade.config.json"), config.to_string()).unwrap();
        write_artifact(
            &dir.path().join("artifacts"),
            "contracts/UniTrade1155.sol",
            "UniTrade1155",
            STOP_BYTECODE,
        );
        dir
    }

    fn command(dir: &tempfile::TempDir, extra: &[&str]) -> CommandLine {
        let config = dir.path().join("unitrade.config.json");
        let mut args = vec!["unitrade-deploy", "--config", config.to_str().unwrap()];
        args.extend_from_slice(extra);
        CommandLine::try_parse_from(args).unwrap()
    }

    #[test]
    fn runs_without_arguments() {
        let cmd = CommandLine::try_parse_from(["unitrade-deploy"]).unwrap();
        assert_eq!(cmd.contract, "UniTrade1155");
        assert_eq!(cmd.label, "UniTradeNFTMarketplace");
        assert_eq!(cmd.confirmations, 1);
    }

    #[test]
    fn rejects_zero_confirmations() {
        assert!(CommandLine::try_parse_from(["unitrade-deploy", "--confirmations", "0"]).is_err());
        let cmd =
            CommandLine::try_parse_from(["unitrade-deploy", "--confirmations", "3"]).unwrap();
        assert_eq!(cmd.confirmations, 3);
    }

    #[tokio::test]
    async fn unknown_contract_fails_before_network() {
        // port 1 is never reachable, so a network error would surface if it were tried
        let dir = workspace("http://127.0.0.1:1");
        let cmd = command(&dir, &["--contract", "Missing"]);

        let err = cmd.execute().await.unwrap_err();
        assert_eq!(err.to_string(), "artifact for contract `Missing` not found");
    }

    #[tokio::test]
    async fn unreachable_network_fails() {
        let dir = workspace("http://127.0.0.1:1");
        let err = command(&dir, &[]).execute().await.unwrap_err();
        assert!(err.to_string().contains("failed to connect to network"));
    }

    #[tokio::test]
    async fn unknown_network_fails() {
        let dir = workspace("http://127.0.0.1:1");
        let err = command(&dir, &["--network", "goerli"])
            .execute()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown network `goerli`"));
    }

    #[tokio::test]
    #[ignore = "requires anvil"]
    async fn deploys_on_in_memory_network() {
        let dir = workspace("http://127.0.0.1:1");
        let deployment = command(&dir, &["--network", "hardhat"])
            .deploy()
            .await
            .unwrap();

        let address = format!("{:?}", deployment.address);
        assert!(address.starts_with("0x"));
        assert_eq!(address.len(), 42);
        assert!(address[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
