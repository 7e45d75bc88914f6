//! Wallet - Signing agents realized from a declarative [`WalletSpec`]
//!
//! The realization (key files, mnemonic derivation, external agents) is the
//! embedding application's [`WalletProvider`]. This module only runs it as
//! one branch of environment construction.

use crate::core::types::Address;
use crate::env::config::WalletSpec;
use crate::error::{ConstructionError, EnvironmentError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Handle to a signing agent
#[async_trait]
pub trait Wallet: Send + Sync {
    fn name(&self) -> &str;

    async fn addresses(&self) -> anyhow::Result<Vec<Address>>;

    async fn change_address(&self) -> anyhow::Result<Address> {
        self.addresses()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("wallet {} has no addresses", self.name()))
    }

    /// Sign a serialized transaction body, returning the serialized witness set
    async fn sign_transaction(&self, tx: &[u8]) -> anyhow::Result<Vec<u8>>;
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn build_wallet(&self, spec: &WalletSpec) -> anyhow::Result<Arc<dyn Wallet>>;
}

/// Provider for runtimes that never configure a wallet
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWallets;

#[async_trait]
impl WalletProvider for NoWallets {
    async fn build_wallet(&self, spec: &WalletSpec) -> anyhow::Result<Arc<dyn Wallet>> {
        anyhow::bail!("no wallet provider configured, cannot realize a {} wallet", spec_kind(spec))
    }
}

fn spec_kind(spec: &WalletSpec) -> &'static str {
    match spec {
        WalletSpec::UseKeys { .. } => "use_keys",
        WalletSpec::UseMnemonic { .. } => "use_mnemonic",
        WalletSpec::Extension { .. } => "extension",
    }
}

pub(crate) async fn bootstrap_wallet(
    provider: &dyn WalletProvider,
    spec: Option<&WalletSpec>,
) -> Result<Option<Arc<dyn Wallet>>, EnvironmentError> {
    let Some(spec) = spec else {
        return Ok(None);
    };
    let wallet = provider
        .build_wallet(spec)
        .await
        .map_err(|source| ConstructionError::Wallet { source })?;
    debug!(wallet = wallet.name(), kind = spec_kind(spec), "wallet ready");
    Ok(Some(wallet))
}
