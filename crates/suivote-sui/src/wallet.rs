// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Wallet Context wrapper.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::anyhow;
use sui_sdk::{sui_client_config::SuiEnv, wallet_context::WalletContext};
use sui_types::{
    base_types::SuiAddress,
    transaction::{Transaction, TransactionData},
};
use suivote_utils::config::{home_relative, path_or_defaults_if_exist};

/// The `Wallet` struct wraps the `WalletContext` from the Sui SDK, exposing only the account and
/// signing functionality the voting client needs.
#[derive(Clone)]
pub struct Wallet {
    active_address: SuiAddress,
    active_env: SuiEnv,
    config_path: PathBuf,
    wallet_context: Arc<WalletContext>,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("active_address", &self.active_address)
            .field("active_env", &self.active_env)
            .finish()
    }
}

/// The error type for the `Wallet` struct.
pub type WalletError = anyhow::Error;

impl Wallet {
    /// Create a new Wallet.
    pub fn new(mut wallet_context: WalletContext) -> Result<Self, WalletError> {
        Ok(Self {
            active_address: wallet_context.active_address()?,
            active_env: wallet_context.config.get_active_env()?.clone(),
            config_path: wallet_context.config.path().to_path_buf(),
            wallet_context: Arc::new(wallet_context),
        })
    }

    /// Loads the wallet from the given path.
    ///
    /// If no path is provided, tries `./client.yaml`, `./sui_config.yaml`, and the standard Sui
    /// configuration directory, in that order.
    pub fn load(path: Option<&Path>) -> Result<Self, WalletError> {
        let path = path_or_defaults_if_exist(path, &default_wallet_paths())
            .ok_or_else(|| anyhow!("could not find a valid wallet config file"))?;
        tracing::info!("using wallet configuration from {}", path.display());
        Self::new(WalletContext::new(&path, None, None)?)
    }

    /// Get the active address.
    pub fn active_address(&self) -> SuiAddress {
        self.active_address
    }

    /// Passes through to the `WalletContext` to sign a transaction.
    pub async fn sign_transaction(&self, transaction_data: &TransactionData) -> Transaction {
        self.wallet_context.sign_transaction(transaction_data).await
    }

    /// Get the rpc_url for the active environment.
    pub fn get_rpc_url(&self) -> &str {
        &self.active_env.rpc
    }

    /// Get the alias of the active environment, e.g. `testnet`.
    pub fn get_active_env_alias(&self) -> &str {
        &self.active_env.alias
    }

    /// Get the path to the wallet configuration file.
    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }
}

/// The locations searched for a wallet configuration when no path is given.
pub fn default_wallet_paths() -> Vec<PathBuf> {
    let mut default_paths = vec!["./client.yaml".into(), "./sui_config.yaml".into()];
    default_paths.extend(home_relative(".sui/sui_config/client.yaml"));
    default_paths
}
