use anyhow::{anyhow, bail, Result};
use ethers::{
    providers::{JsonRpcClient, Middleware},
    signers::LocalWallet,
    types::{transaction::eip2718::TypedTransaction, U256},
    utils::hex,
};

use crate::deploy::Client;

pub fn parse_private_key(sk: &str) -> Result<LocalWallet> {
    let bytes = hex::decode(sk.trim().strip_prefix("0x").unwrap_or(sk.trim()))
        .map_err(|e| anyhow!("private key is not valid hex: {e}"))?;
    if bytes.len() != 32 {
        bail!("private key must be 32 bytes, got {}", bytes.len());
    }
    Ok(LocalWallet::from_bytes(&bytes)?)
}

/// Fails when the signer cannot pay for `tx` at the current gas price.
pub async fn ensure_funded<P>(client: &Client<P>, tx: &TypedTransaction) -> Result<()>
where
    P: JsonRpcClient + 'static,
{
    let mut tx = tx.clone();
    client.fill_transaction(&mut tx, None).await?;

    let gas = tx.gas().copied().unwrap_or_default();
    let gas_price = tx.gas_price().unwrap_or_default();
    let value = tx.value().copied().unwrap_or_default();
    let cost = gas.saturating_mul(gas_price).saturating_add(value);

    let balance = client.get_balance(client.address(), None).await?;
    log::info!("deployment cost:{} balance:{}", cost, balance);
    check_balance(balance, cost)
}

fn check_balance(balance: U256, cost: U256) -> Result<()> {
    if balance < cost {
        bail!("insufficient funds for gas: need {cost} wei, have {balance} wei");
    }
    Ok(())
}
