use std::{fs, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use ethers::{abi::Abi, types::Bytes};
use serde::Deserialize;
use walkdir::{DirEntry, WalkDir};

const ARTIFACT_FORMAT: &str = "hh-sol-artifact-1";
const BUILD_INFO_DIR: &str = "build-info";

/// A compiled contract as written by the build toolchain.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(rename = "_format")]
    pub format: String,
    pub contract_name: String,
    pub source_name: String,
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl Artifact {
    /// Looks up the artifact for `contract` under `artifacts_dir`.
    ///
    /// `contract` is either a bare name (`UniTrade1155`) or a fully qualified
    /// one (`contracts/UniTrade1155.sol:UniTrade1155`).
    pub fn find(artifacts_dir: &Path, contract: &str) -> Result<Self> {
        if !artifacts_dir.is_dir() {
            bail!(
                "artifacts directory {} does not exist, compile the contracts first",
                artifacts_dir.display()
            );
        }

        if let Some((source, name)) = contract.split_once(':') {
            let path = artifacts_dir.join(source).join(format!("{name}.json"));
            if !path.is_file() {
                bail!("artifact for contract `{contract}` not found");
            }
            return Self::from_file(&path);
        }

        let file_name = format!("{contract}.json");
        let mut matches = Vec::new();
        // symlinks are not followed, so a link back into the tree cannot loop
        for entry in WalkDir::new(artifacts_dir)
            .into_iter()
            .filter_entry(|e| !is_build_info(e))
        {
            let entry = entry.with_context(|| {
                format!("failed to read artifacts in {}", artifacts_dir.display())
            })?;
            if entry.file_type().is_file() && entry.file_name() == file_name.as_str() {
                matches.push(entry.into_path());
            }
        }

        match matches.as_slice() {
            [] => Err(anyhow!("artifact for contract `{contract}` not found")),
            [path] => Self::from_file(path),
            many => {
                let names: Vec<String> = many
                    .iter()
                    .filter_map(|p| p.strip_prefix(artifacts_dir).ok())
                    .filter_map(|p| p.parent())
                    .map(|source| format!("{}:{contract}", source.display()))
                    .collect();
                bail!(
                    "contract name `{contract}` is ambiguous, use one of: {}",
                    names.join(", ")
                )
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read artifact {}", path.display()))?;
        let artifact: Self = serde_json::from_str(&text)
            .with_context(|| format!("invalid artifact {}", path.display()))?;

        if artifact.format != ARTIFACT_FORMAT {
            bail!(
                "unsupported artifact format `{}` in {}",
                artifact.format,
                path.display()
            );
        }
        if artifact.bytecode.is_empty() {
            bail!(
                "contract `{}` has no bytecode, abstract contracts and interfaces cannot be deployed",
                artifact.contract_name
            );
        }
        log::debug!("artifact {}", path.display());
        Ok(artifact)
    }

    pub fn has_constructor_inputs(&self) -> bool {
        self.abi
            .constructor()
            .map(|c| !c.inputs.is_empty())
            .unwrap_or(false)
    }
}

fn is_build_info(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == BUILD_INFO_DIR
}
