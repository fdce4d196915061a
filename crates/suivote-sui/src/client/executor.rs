// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Signing and execution of transactions.

use std::fmt::Debug;

use anyhow::anyhow;
use async_trait::async_trait;
use sui_sdk::rpc_types::{
    SuiExecutionStatus,
    SuiTransactionBlockEffectsAPI,
    SuiTransactionBlockResponseOptions,
};
use sui_types::{
    base_types::{ObjectID, SuiAddress, TransactionDigest},
    transaction::{ProgrammableTransaction, TransactionData},
    transaction_driver_types::ExecuteTransactionRequestType::WaitForLocalExecution,
};
use tokio::sync::Mutex;
use tracing::Level;

use super::{
    SuiClientError,
    SuiClientResult,
    read_client::{SuiReadClient, retry_rpc_errors, retry_transport_errors},
};
use crate::wallet::Wallet;

/// Gas budget used when none is configured, in MIST.
pub const DEFAULT_GAS_BUDGET: u64 = 100_000_000;

/// A transaction that was executed successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedTransaction {
    /// The digest of the transaction.
    pub digest: TransactionDigest,
    /// Objects created by the transaction.
    pub created: Vec<ObjectID>,
}

/// Signs and executes transactions on behalf of one account.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionExecutor: Debug + Send + Sync {
    /// The address signing the transactions.
    fn sender(&self) -> SuiAddress;

    /// Signs and executes `transaction`.
    ///
    /// Returns [`SuiClientError::TransactionExecutionError`] if the transaction was executed but
    /// failed.
    async fn execute(
        &self,
        transaction: ProgrammableTransaction,
        method: &'static str,
    ) -> SuiClientResult<ExecutedTransaction>;

    /// Waits until the transaction is known to the full node as final.
    async fn wait_for_finality(&self, digest: TransactionDigest) -> SuiClientResult<()>;
}

/// [`TransactionExecutor`] of a read-only client; every execution fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectedExecutor;

#[async_trait]
impl TransactionExecutor for DisconnectedExecutor {
    fn sender(&self) -> SuiAddress {
        SuiAddress::ZERO
    }

    async fn execute(
        &self,
        _transaction: ProgrammableTransaction,
        _method: &'static str,
    ) -> SuiClientResult<ExecutedTransaction> {
        Err(SuiClientError::NoWalletConfigured)
    }

    async fn wait_for_finality(&self, _digest: TransactionDigest) -> SuiClientResult<()> {
        Err(SuiClientError::NoWalletConfigured)
    }
}

/// [`TransactionExecutor`] signing with a local Sui wallet.
#[derive(Debug)]
pub struct WalletExecutor {
    wallet: Wallet,
    read_client: SuiReadClient,
    gas_budget: Option<u64>,
    /// Serializes executions so that the same gas coin is never used twice concurrently.
    execution_lock: Mutex<()>,
}

impl WalletExecutor {
    /// Creates an executor signing with `wallet` and talking to the node of `read_client`.
    pub fn new(wallet: Wallet, read_client: SuiReadClient, gas_budget: Option<u64>) -> Self {
        Self {
            wallet,
            read_client,
            gas_budget,
            execution_lock: Mutex::new(()),
        }
    }

    /// The wallet used for signing.
    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    async fn transaction_data(
        &self,
        transaction: ProgrammableTransaction,
    ) -> SuiClientResult<TransactionData> {
        let sender = self.wallet.active_address();
        let sui_client = self.read_client.sui_client();
        let gas_budget = self.gas_budget.unwrap_or(DEFAULT_GAS_BUDGET);

        let gas_price = retry_rpc_errors(
            self.read_client.get_strategy(),
            || async { Ok(sui_client.read_api().get_reference_gas_price().await?) },
            self.read_client.metrics(),
            "get_reference_gas_price",
        )
        .await?;
        let coins = retry_rpc_errors(
            self.read_client.get_strategy(),
            || async {
                Ok(sui_client
                    .coin_read_api()
                    .select_coins(sender, None, u128::from(gas_budget), vec![])
                    .await?)
            },
            self.read_client.metrics(),
            "select_coins",
        )
        .await?;
        if coins.is_empty() {
            return Err(SuiClientError::NoCompatibleGasCoins);
        }

        Ok(TransactionData::new_programmable(
            sender,
            coins.iter().map(|coin| coin.object_ref()).collect(),
            transaction,
            gas_budget,
            gas_price,
        ))
    }
}

#[async_trait]
impl TransactionExecutor for WalletExecutor {
    fn sender(&self) -> SuiAddress {
        self.wallet.active_address()
    }

    #[tracing::instrument(level = Level::DEBUG, err, skip(self, transaction))]
    async fn execute(
        &self,
        transaction: ProgrammableTransaction,
        method: &'static str,
    ) -> SuiClientResult<ExecutedTransaction> {
        let _guard = self.execution_lock.lock().await;
        let transaction_data = self.transaction_data(transaction).await?;
        let signed_transaction = self.wallet.sign_transaction(&transaction_data).await;

        // Retries must use the exact same transaction to avoid locking objects. Rejections by the
        // node are final.
        let response = retry_transport_errors(
            self.read_client.get_strategy(),
            || async {
                Ok(self
                    .read_client
                    .sui_client()
                    .quorum_driver_api()
                    .execute_transaction_block(
                        signed_transaction.clone(),
                        SuiTransactionBlockResponseOptions::new().with_effects(),
                        Some(WaitForLocalExecution),
                    )
                    .await?)
            },
            self.read_client.metrics(),
            method,
        )
        .await?;

        let effects = response
            .effects
            .as_ref()
            .ok_or_else(|| anyhow!("no transaction effects in response"))?;
        match effects.status() {
            SuiExecutionStatus::Success => {
                tracing::info!(digest = %response.digest, method, "transaction executed");
                Ok(ExecutedTransaction {
                    digest: response.digest,
                    created: effects
                        .created()
                        .iter()
                        .map(|object| object.reference.object_id)
                        .collect(),
                })
            }
            SuiExecutionStatus::Failure { error } => {
                Err(SuiClientError::TransactionExecutionError(error.as_str().into()))
            }
        }
    }

    #[tracing::instrument(level = Level::DEBUG, err, skip(self))]
    async fn wait_for_finality(&self, digest: TransactionDigest) -> SuiClientResult<()> {
        retry_rpc_errors(
            self.read_client.get_strategy(),
            || async {
                Ok(self
                    .read_client
                    .sui_client()
                    .read_api()
                    .get_transaction_with_options(
                        digest,
                        SuiTransactionBlockResponseOptions::new(),
                    )
                    .await?)
            },
            self.read_client.metrics(),
            "get_transaction",
        )
        .await?;
        Ok(())
    }
}
