// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Read access to the full node.

use std::{
    fmt::{self, Debug},
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use move_core_types::language_storage::StructTag;
use rand::{
    Rng as _,
    rngs::{StdRng, ThreadRng},
};
use sui_sdk::{
    SuiClient,
    SuiClientBuilder,
    rpc_types::{
        SuiObjectDataFilter,
        SuiObjectDataOptions,
        SuiObjectResponse,
        SuiObjectResponseQuery,
    },
};
use sui_types::{
    base_types::{ObjectID, SuiAddress, TransactionDigest},
    object::Owner,
    transaction::{ObjectArg, ProgrammableTransaction, SharedObjectMutability, TransactionKind},
};
use suivote_utils::backoff::{ExponentialBackoff, ExponentialBackoffConfig};
use tracing::Level;

use super::{SuiClientError, SuiClientResult, metrics::SuiClientMetricSet};
use crate::{decoder::ChainObject, types::ChainEvent};

/// Maximum number of objects the full node returns for a single multi-get request.
pub const MULTI_GET_OBJ_LIMIT: usize = 50;

/// Whether a shared object is passed to a call by mutable or immutable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutability {
    /// The object is mutable.
    Mutable,
    /// The object is immutable.
    Immutable,
}

impl From<bool> for Mutability {
    fn from(value: bool) -> Self {
        if value {
            Self::Mutable
        } else {
            Self::Immutable
        }
    }
}

impl From<Mutability> for SharedObjectMutability {
    fn from(value: Mutability) -> Self {
        match value {
            Mutability::Mutable => Self::Mutable,
            Mutability::Immutable => Self::Immutable,
        }
    }
}

/// The read operations of the full node used by the client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainReadApi: Debug + Send + Sync {
    /// Reads a single object; `None` if it does not exist.
    async fn get_object(&self, object_id: ObjectID) -> SuiClientResult<Option<ChainObject>>;

    /// Reads several objects, returning them in the order of `object_ids`.
    async fn multi_get_objects(
        &self,
        object_ids: Vec<ObjectID>,
    ) -> SuiClientResult<Vec<Option<ChainObject>>>;

    /// Returns all objects of the exact type `struct_tag` owned by `owner`.
    async fn owned_objects_of_type(
        &self,
        owner: SuiAddress,
        struct_tag: StructTag,
    ) -> SuiClientResult<Vec<ChainObject>>;

    /// Returns the events emitted by a transaction.
    async fn transaction_events(
        &self,
        digest: TransactionDigest,
    ) -> SuiClientResult<Vec<ChainEvent>>;

    /// Simulates `transaction` and returns the BCS return values of its last command.
    async fn dev_inspect(
        &self,
        sender: SuiAddress,
        transaction: ProgrammableTransaction,
    ) -> SuiClientResult<Vec<Vec<u8>>>;

    /// Resolves the argument used to pass an object to a call.
    async fn object_arg(
        &self,
        object_id: ObjectID,
        mutability: Mutability,
    ) -> SuiClientResult<ObjectArg>;
}

/// Retries `operation` with the delays produced by `strategy` while it fails with an RPC error.
pub(crate) async fn retry_rpc_errors<S, F, Fut, T>(
    strategy: S,
    operation: F,
    metrics: Option<Arc<SuiClientMetricSet>>,
    method: &'static str,
) -> SuiClientResult<T>
where
    S: Iterator<Item = Duration>,
    F: FnMut() -> Fut,
    Fut: Future<Output = SuiClientResult<T>>,
{
    retry_if(
        strategy,
        operation,
        SuiClientError::is_retriable_rpc_error,
        metrics,
        method,
    )
    .await
}

/// Retries `operation` only while the request did not reach the node.
///
/// Used for calls that are not idempotent on the node side, where an error response must be
/// returned as is.
pub(crate) async fn retry_transport_errors<S, F, Fut, T>(
    strategy: S,
    operation: F,
    metrics: Option<Arc<SuiClientMetricSet>>,
    method: &'static str,
) -> SuiClientResult<T>
where
    S: Iterator<Item = Duration>,
    F: FnMut() -> Fut,
    Fut: Future<Output = SuiClientResult<T>>,
{
    retry_if(
        strategy,
        operation,
        SuiClientError::is_transport_error,
        metrics,
        method,
    )
    .await
}

async fn retry_if<S, F, Fut, T>(
    mut strategy: S,
    mut operation: F,
    is_retriable: fn(&SuiClientError) -> bool,
    metrics: Option<Arc<SuiClientMetricSet>>,
    method: &'static str,
) -> SuiClientResult<T>
where
    S: Iterator<Item = Duration>,
    F: FnMut() -> Fut,
    Fut: Future<Output = SuiClientResult<T>>,
{
    loop {
        let start = Instant::now();
        let result = operation().await;
        if let Some(metrics) = metrics.as_ref() {
            let status = if result.is_ok() { "success" } else { "error" };
            metrics.record_rpc_call(method, status, start.elapsed());
        }

        match result {
            Err(error) if is_retriable(&error) => match strategy.next() {
                Some(delay) => {
                    tracing::debug!(method, ?delay, %error, "retrying RPC call after error");
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::warn!(method, %error, "RPC call failed after retries");
                    return Err(error);
                }
            },
            result => return result,
        }
    }
}

/// [`ChainReadApi`] over the JSON-RPC API of a full node.
#[derive(Clone)]
pub struct SuiReadClient {
    sui_client: SuiClient,
    rpc_url: String,
    backoff_config: ExponentialBackoffConfig,
    metrics: Option<Arc<SuiClientMetricSet>>,
}

impl Debug for SuiReadClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuiReadClient")
            .field("rpc_url", &self.rpc_url)
            .field("backoff_config", &self.backoff_config)
            .finish_non_exhaustive()
    }
}

impl SuiReadClient {
    /// Connects to the full node at `rpc_url`.
    pub async fn new(
        rpc_url: &str,
        backoff_config: ExponentialBackoffConfig,
        metrics: Option<Arc<SuiClientMetricSet>>,
    ) -> SuiClientResult<Self> {
        let strategy = backoff_config.get_strategy(ThreadRng::default().r#gen());
        let sui_client = retry_rpc_errors(
            strategy,
            || async { Ok(SuiClientBuilder::default().build(rpc_url).await?) },
            metrics.clone(),
            "build_sui_client",
        )
        .await?;
        tracing::debug!(rpc_url, "connected to full node");
        Ok(Self {
            sui_client,
            rpc_url: rpc_url.to_owned(),
            backoff_config,
            metrics,
        })
    }

    /// The underlying SDK client.
    pub fn sui_client(&self) -> &SuiClient {
        &self.sui_client
    }

    /// The URL of the full node.
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// The metrics recorded for RPC calls, if any.
    pub(crate) fn metrics(&self) -> Option<Arc<SuiClientMetricSet>> {
        self.metrics.clone()
    }

    /// Gets a backoff strategy, seeded from the thread RNG.
    pub(crate) fn get_strategy(&self) -> ExponentialBackoff<StdRng> {
        self.backoff_config
            .get_strategy(ThreadRng::default().r#gen())
    }

    fn object_options() -> SuiObjectDataOptions {
        SuiObjectDataOptions::new()
            .with_type()
            .with_owner()
            .with_content()
    }

    fn to_chain_object(response: SuiObjectResponse) -> SuiClientResult<Option<ChainObject>> {
        match response.data {
            Some(data) => Ok(Some(
                ChainObject::from_object_data(&data)
                    .context("failed to render object data as JSON")?,
            )),
            None => {
                tracing::debug!(error = ?response.error, "object not available");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ChainReadApi for SuiReadClient {
    #[tracing::instrument(level = Level::DEBUG, skip(self))]
    async fn get_object(&self, object_id: ObjectID) -> SuiClientResult<Option<ChainObject>> {
        let response = retry_rpc_errors(
            self.get_strategy(),
            || async {
                Ok(self
                    .sui_client
                    .read_api()
                    .get_object_with_options(object_id, Self::object_options())
                    .await?)
            },
            self.metrics.clone(),
            "get_object",
        )
        .await?;
        Self::to_chain_object(response)
    }

    #[tracing::instrument(level = Level::DEBUG, skip_all)]
    async fn multi_get_objects(
        &self,
        object_ids: Vec<ObjectID>,
    ) -> SuiClientResult<Vec<Option<ChainObject>>> {
        let mut objects = Vec::with_capacity(object_ids.len());
        for chunk in object_ids.chunks(MULTI_GET_OBJ_LIMIT) {
            let responses = retry_rpc_errors(
                self.get_strategy(),
                || async {
                    Ok(self
                        .sui_client
                        .read_api()
                        .multi_get_object_with_options(chunk.to_vec(), Self::object_options())
                        .await?)
                },
                self.metrics.clone(),
                "multi_get_objects",
            )
            .await?;
            if responses.len() != chunk.len() {
                return Err(anyhow!(
                    "full node returned {} objects for {} requested IDs",
                    responses.len(),
                    chunk.len()
                )
                .into());
            }
            for response in responses {
                objects.push(Self::to_chain_object(response)?);
            }
        }
        Ok(objects)
    }

    #[tracing::instrument(level = Level::DEBUG, skip(self))]
    async fn owned_objects_of_type(
        &self,
        owner: SuiAddress,
        struct_tag: StructTag,
    ) -> SuiClientResult<Vec<ChainObject>> {
        let mut objects = vec![];
        let mut cursor = None;
        loop {
            let page = retry_rpc_errors(
                self.get_strategy(),
                || async {
                    let query = SuiObjectResponseQuery {
                        filter: Some(SuiObjectDataFilter::StructType(struct_tag.clone())),
                        options: Some(Self::object_options()),
                    };
                    Ok(self
                        .sui_client
                        .read_api()
                        .get_owned_objects(owner, Some(query), cursor, None)
                        .await?)
                },
                self.metrics.clone(),
                "get_owned_objects",
            )
            .await?;

            for response in page.data {
                if let Some(object) = Self::to_chain_object(response)? {
                    objects.push(object);
                }
            }
            match page.next_cursor {
                Some(next) if page.has_next_page => cursor = Some(next),
                _ => break,
            }
        }
        Ok(objects)
    }

    #[tracing::instrument(level = Level::DEBUG, skip(self))]
    async fn transaction_events(
        &self,
        digest: TransactionDigest,
    ) -> SuiClientResult<Vec<ChainEvent>> {
        let events = retry_rpc_errors(
            self.get_strategy(),
            || async { Ok(self.sui_client.event_api().get_events(digest).await?) },
            self.metrics.clone(),
            "get_events",
        )
        .await?;
        Ok(events.iter().map(ChainEvent::from).collect())
    }

    #[tracing::instrument(level = Level::DEBUG, skip(self, transaction))]
    async fn dev_inspect(
        &self,
        sender: SuiAddress,
        transaction: ProgrammableTransaction,
    ) -> SuiClientResult<Vec<Vec<u8>>> {
        let results = retry_rpc_errors(
            self.get_strategy(),
            || async {
                Ok(self
                    .sui_client
                    .read_api()
                    .dev_inspect_transaction_block(
                        sender,
                        TransactionKind::ProgrammableTransaction(transaction.clone()),
                        None,
                        None,
                        None,
                    )
                    .await?)
            },
            self.metrics.clone(),
            "dev_inspect",
        )
        .await?;

        if let Some(error) = results.error {
            return Err(SuiClientError::DevInspectFailed(error));
        }
        Ok(results
            .results
            .and_then(|mut results| results.pop())
            .map(|result| {
                result
                    .return_values
                    .into_iter()
                    .map(|(bytes, _type)| bytes)
                    .collect()
            })
            .unwrap_or_default())
    }

    #[tracing::instrument(level = Level::DEBUG, skip(self))]
    async fn object_arg(
        &self,
        object_id: ObjectID,
        mutability: Mutability,
    ) -> SuiClientResult<ObjectArg> {
        let response = retry_rpc_errors(
            self.get_strategy(),
            || async {
                Ok(self
                    .sui_client
                    .read_api()
                    .get_object_with_options(object_id, SuiObjectDataOptions::new().with_owner())
                    .await?)
            },
            self.metrics.clone(),
            "get_object_owner",
        )
        .await?;
        let data = response
            .into_object()
            .map_err(|error| anyhow!("object {object_id} is not available: {error}"))?;

        Ok(match data.owner {
            Some(Owner::Shared {
                initial_shared_version,
            }) => ObjectArg::SharedObject {
                id: object_id,
                initial_shared_version,
                mutability: mutability.into(),
            },
            _ => ObjectArg::ImmOrOwnedObject(data.object_ref()),
        })
    }
}
