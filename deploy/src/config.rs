use std::{
    collections::BTreeMap,
    env::{self, VarError},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

/// Name of the local development network. It needs no declaration in the
/// config file and is backed by a node spawned for the duration of the run.
pub const IN_MEMORY_NETWORK: &str = "hardhat";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_network")]
    pub default_network: String,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
    #[serde(default)]
    pub solidity: SolidityConfig,
    #[serde(default)]
    pub etherscan: EtherscanConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub mocha: MochaConfig,

    #[serde(skip)]
    root: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkConfig {
    pub url: Option<String>,
    #[serde(default)]
    pub accounts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "SolidityField")]
pub struct SolidityConfig {
    pub version: String,
    pub settings: CompilerSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CompilerSettings {
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_runs")]
    pub runs: u32,
}

// `solidity` is either a bare version string or a full object.
#[derive(Deserialize)]
#[serde(untagged)]
enum SolidityField {
    Version(String),
    Full {
        version: String,
        #[serde(default)]
        settings: CompilerSettings,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtherscanConfig {
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub sources: PathBuf,
    pub tests: PathBuf,
    pub cache: PathBuf,
    pub artifacts: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MochaConfig {
    /// Milliseconds.
    pub timeout: u64,
}

/// The network a run talks to, with environment references already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveNetwork {
    InMemory,
    Remote {
        name: String,
        url: String,
        signer: String,
    },
}

fn default_network() -> String {
    IN_MEMORY_NETWORK.to_string()
}

fn default_runs() -> u32 {
    200
}

impl Default for SolidityConfig {
    fn default() -> Self {
        Self {
            version: "0.8.7".to_string(),
            settings: CompilerSettings::default(),
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            runs: default_runs(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sources: PathBuf::from("./contracts"),
            tests: PathBuf::from("./test"),
            cache: PathBuf::from("./cache"),
            artifacts: PathBuf::from("./artifacts"),
        }
    }
}

impl Default for MochaConfig {
    fn default() -> Self {
        Self { timeout: 20_000 }
    }
}

impl From<SolidityField> for SolidityConfig {
    fn from(field: SolidityField) -> Self {
        match field {
            SolidityField::Version(version) => Self {
                version,
                settings: CompilerSettings::default(),
            },
            SolidityField::Full { version, settings } => Self { version, settings },
        }
    }
}

impl EtherscanConfig {
    /// The API key with environment references resolved, if every referenced
    /// variable is set.
    pub fn api_key(&self) -> Option<String> {
        let raw = self.api_key.as_deref()?;
        expand_env(raw, |name| env::var(name).ok())
            .ok()
            .filter(|key| !key.is_empty())
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config = Self::from_json(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        config.root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        if config.default_network != IN_MEMORY_NETWORK
            && !config.networks.contains_key(&config.default_network)
        {
            bail!(
                "default network `{}` is not declared in `networks`",
                config.default_network
            );
        }
        Ok(config)
    }

    pub fn network(&self, name: &str) -> Result<ActiveNetwork> {
        self.network_with(name, |var| env::var(var).ok())
    }

    /// Same as [`Config::network`] with an explicit variable lookup.
    pub fn network_with<F>(&self, name: &str, lookup: F) -> Result<ActiveNetwork>
    where
        F: Fn(&str) -> Option<String>,
    {
        if name == IN_MEMORY_NETWORK {
            return Ok(ActiveNetwork::InMemory);
        }

        let network = self.networks.get(name).ok_or_else(|| {
            let known: Vec<&str> = std::iter::once(IN_MEMORY_NETWORK)
                .chain(
                    self.networks
                        .keys()
                        .map(String::as_str)
                        .filter(|n| *n != IN_MEMORY_NETWORK),
                )
                .collect();
            anyhow!(
                "unknown network `{name}`, expected one of: {}",
                known.join(", ")
            )
        })?;

        let url = network
            .url
            .as_deref()
            .ok_or_else(|| anyhow!("network `{name}` has no url"))?;
        let url = expand_env(url, &lookup).with_context(|| format!("network `{name}` url"))?;

        let signer = network
            .accounts
            .first()
            .ok_or_else(|| anyhow!("network `{name}` has no accounts to sign with"))?;
        let signer =
            expand_env(signer, &lookup).with_context(|| format!("network `{name}` accounts"))?;

        Ok(ActiveNetwork::Remote {
            name: name.to_string(),
            url,
            signer,
        })
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join(&self.paths.artifacts)
    }
}

/// Replaces every `${NAME}` or `$NAME` in `text` with the value `lookup`
/// returns for it.
pub fn expand_env<F>(text: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    shellexpand::env_with_context(text, |name| {
        lookup(name).map(Some).ok_or(VarError::NotPresent)
    })
    .map(|expanded| expanded.into_owned())
    .map_err(|e| anyhow!("environment variable `{}` is not set", e.var_name))
}
