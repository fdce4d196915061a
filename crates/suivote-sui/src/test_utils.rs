// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Test doubles of the chain, the signer, and the notifier, and builders of chain objects.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use move_core_types::language_storage::StructTag;
use serde_json::{Value, json};
use sui_types::{
    base_types::{ObjectID, SequenceNumber, SuiAddress, TransactionDigest},
    digests::ObjectDigest,
    transaction::{Command, ObjectArg, ProgrammableTransaction},
};

use crate::{
    client::{
        SuiClientError,
        SuiClientResult,
        capability::CapabilityKind,
        executor::{ExecutedTransaction, TransactionExecutor},
        read_client::{ChainReadApi, Mutability},
        submission::{Notification, Notifier},
    },
    contracts::{StructTag as ContractStruct, proposal},
    decoder::ChainObject,
    types::ChainEvent,
};

/// Returns an object ID whose last byte is `n`.
pub fn object_id(n: u8) -> ObjectID {
    ObjectID::from_single_byte(n)
}

/// Returns an address whose last byte is `n`.
pub fn address(n: u8) -> SuiAddress {
    SuiAddress::from(object_id(n))
}

/// The package ID used by the object builders.
pub fn package_id() -> ObjectID {
    object_id(0x2a)
}

fn type_string(tag: ContractStruct<'_>) -> String {
    tag.type_string(package_id())
}

/// Builds a Move object of type `type_` with the given fields.
pub fn move_object(id: ObjectID, type_: &str, fields: Value) -> ChainObject {
    ChainObject::from_json(json!({
        "objectId": id.to_string(),
        "version": "1",
        "digest": "11111111111111111111111111111111",
        "type": type_,
        "content": {
            "dataType": "moveObject",
            "type": type_,
            "hasPublicTransfer": false,
            "fields": fields,
        }
    }))
}

/// Builds the dashboard object.
pub fn dashboard_object(
    id: ObjectID,
    proposals_ids: &[ObjectID],
    admin_addresses: &[SuiAddress],
    super_admin_addresses: &[SuiAddress],
) -> ChainObject {
    move_object(
        id,
        &type_string(crate::contracts::dashboard::Dashboard),
        json!({
            "id": { "id": id.to_string() },
            "proposals_ids": proposals_ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "admin_addresses": { "type": "0x2::vec_set::VecSet<address>", "fields": {
                "contents": admin_addresses.iter().map(ToString::to_string).collect::<Vec<_>>(),
            } },
            "super_admin_addresses": { "type": "0x2::vec_set::VecSet<address>", "fields": {
                "contents": super_admin_addresses
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>(),
            } },
        }),
    )
}

/// Builds an active public proposal expiring far in the future.
pub fn proposal_object(id: ObjectID, title: &str) -> ChainObject {
    move_object(
        id,
        &type_string(proposal::Proposal),
        json!({
            "id": { "id": id.to_string() },
            "title": title,
            "description": format!("description of {title}"),
            "voted_yes_count": "0",
            "voted_no_count": "0",
            "expiration": "4102444800000",
            "creator": address(0x1).to_string(),
            "status": { "variant": "Active", "fields": {} },
            "is_private": false,
            "voter_registry": [],
        }),
    )
}

/// Builds an active public ballot with the given candidate names.
pub fn ballot_object(id: ObjectID, title: &str, candidates: &[&str]) -> ChainObject {
    let candidates: Vec<_> = candidates
        .iter()
        .zip(1u64..)
        .map(|(name, candidate_id)| {
            json!({
                "type": type_string(crate::contracts::ballot::Candidate),
                "fields": {
                    "id": candidate_id.to_string(),
                    "name": name,
                    "description": "",
                    "image_url": { "vec": [] },
                    "votes": "0",
                }
            })
        })
        .collect();
    move_object(
        id,
        &type_string(crate::contracts::ballot::Ballot),
        json!({
            "id": { "id": id.to_string() },
            "title": title,
            "description": "",
            "expiration": "4102444800000",
            "creator": address(0x1).to_string(),
            "status": { "variant": "Active", "fields": {} },
            "is_private": false,
            "candidates": candidates,
            "total_votes": "0",
        }),
    )
}

/// Builds a capability object.
pub fn capability_object(id: ObjectID, kind: CapabilityKind) -> ChainObject {
    move_object(
        id,
        &type_string(kind.struct_tag()),
        json!({ "id": { "id": id.to_string() } }),
    )
}

/// Builds the vote-proof NFT of a vote on `proposal_id`.
pub fn vote_proof_object(id: ObjectID, proposal_id: ObjectID) -> ChainObject {
    move_object(
        id,
        &type_string(proposal::VoteProofNFT),
        json!({
            "id": { "id": id.to_string() },
            "proposal_id": proposal_id.to_string(),
            "name": "Vote proof",
            "description": "",
            "url": "https://example.com/proof.png",
        }),
    )
}

#[derive(Debug, Default)]
struct ChainState {
    objects: HashMap<ObjectID, ChainObject>,
    owners: HashMap<ObjectID, SuiAddress>,
    delays: HashMap<ObjectID, Duration>,
    events: HashMap<TransactionDigest, Vec<ChainEvent>>,
    dev_inspect_results: VecDeque<SuiClientResult<Vec<Vec<u8>>>>,
    failing_owners: HashSet<SuiAddress>,
}

/// An in-memory [`ChainReadApi`].
///
/// Objects without an owner are treated as shared, including objects that were never inserted.
#[derive(Debug, Default)]
pub struct InMemoryChain {
    state: Mutex<ChainState>,
    object_reads: AtomicUsize,
    owned_queries: AtomicUsize,
}

impl InMemoryChain {
    fn state(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().expect("the chain state is not poisoned")
    }

    /// Stores `object`, replacing a previous version.
    pub fn insert_object(&self, object: ChainObject) {
        let id = object.object_id().expect("test objects have an ID");
        self.state().objects.insert(id, object);
    }

    /// Stores `object` as owned by `owner`.
    pub fn insert_owned(&self, owner: SuiAddress, object: ChainObject) {
        let id = object.object_id().expect("test objects have an ID");
        let mut state = self.state();
        state.objects.insert(id, object);
        state.owners.insert(id, owner);
    }

    /// Removes an object, e.g. after it was deleted by a transaction.
    pub fn remove_object(&self, object_id: ObjectID) {
        let mut state = self.state();
        state.objects.remove(&object_id);
        state.owners.remove(&object_id);
    }

    /// Delays every read of `object_id` by `delay`.
    pub fn delay_object(&self, object_id: ObjectID, delay: Duration) {
        self.state().delays.insert(object_id, delay);
    }

    /// Sets the events returned for `digest`.
    pub fn set_events(&self, digest: TransactionDigest, events: Vec<ChainEvent>) {
        self.state().events.insert(digest, events);
    }

    /// Queues the return values of the next dev-inspect call.
    pub fn push_dev_inspect_result(&self, return_values: Vec<Vec<u8>>) {
        self.state()
            .dev_inspect_results
            .push_back(Ok(return_values));
    }

    /// Makes owned-object queries for `owner` fail.
    pub fn fail_owned_queries_for(&self, owner: SuiAddress) {
        self.state().failing_owners.insert(owner);
    }

    /// Number of single and batched object reads served.
    pub fn object_reads(&self) -> usize {
        self.object_reads.load(Ordering::SeqCst)
    }

    /// Number of owned-object queries served.
    pub fn owned_queries(&self) -> usize {
        self.owned_queries.load(Ordering::SeqCst)
    }

    async fn read(&self, object_id: ObjectID) -> Option<ChainObject> {
        let delay = self.state().delays.get(&object_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state().objects.get(&object_id).cloned()
    }
}

#[async_trait]
impl ChainReadApi for InMemoryChain {
    async fn get_object(&self, object_id: ObjectID) -> SuiClientResult<Option<ChainObject>> {
        self.object_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.read(object_id).await)
    }

    async fn multi_get_objects(
        &self,
        object_ids: Vec<ObjectID>,
    ) -> SuiClientResult<Vec<Option<ChainObject>>> {
        self.object_reads.fetch_add(1, Ordering::SeqCst);
        let mut objects = Vec::with_capacity(object_ids.len());
        for object_id in object_ids {
            objects.push(self.read(object_id).await);
        }
        Ok(objects)
    }

    async fn owned_objects_of_type(
        &self,
        owner: SuiAddress,
        struct_tag: StructTag,
    ) -> SuiClientResult<Vec<ChainObject>> {
        self.owned_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if state.failing_owners.contains(&owner) {
            return Err(anyhow::anyhow!("owned objects of {owner} are not available").into());
        }
        let type_ = format!(
            "{}::{}::{}",
            ObjectID::from(struct_tag.address),
            struct_tag.module,
            struct_tag.name
        );
        let mut objects: Vec<_> = state
            .owners
            .iter()
            .filter(|(_, object_owner)| **object_owner == owner)
            .filter_map(|(object_id, _)| state.objects.get(object_id))
            .filter(|object| object.object_type() == Some(type_.as_str()))
            .cloned()
            .collect();
        objects.sort_by_key(ChainObject::object_id);
        Ok(objects)
    }

    async fn transaction_events(
        &self,
        digest: TransactionDigest,
    ) -> SuiClientResult<Vec<ChainEvent>> {
        Ok(self
            .state()
            .events
            .get(&digest)
            .cloned()
            .unwrap_or_default())
    }

    async fn dev_inspect(
        &self,
        _sender: SuiAddress,
        _transaction: ProgrammableTransaction,
    ) -> SuiClientResult<Vec<Vec<u8>>> {
        self.state()
            .dev_inspect_results
            .pop_front()
            .unwrap_or_else(|| {
                Err(SuiClientError::DevInspectFailed(
                    "no dev-inspect result scripted".to_owned(),
                ))
            })
    }

    async fn object_arg(
        &self,
        object_id: ObjectID,
        mutability: Mutability,
    ) -> SuiClientResult<ObjectArg> {
        let version = SequenceNumber::from_u64(1);
        Ok(if self.state().owners.contains_key(&object_id) {
            ObjectArg::ImmOrOwnedObject((object_id, version, ObjectDigest::random()))
        } else {
            ObjectArg::SharedObject {
                id: object_id,
                initial_shared_version: version,
                mutability: mutability.into(),
            }
        })
    }
}

/// A [`Notifier`] that records all notifications.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
    dismissed: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    /// All notifications, in the order they were shown.
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .expect("the notifier is not poisoned")
            .clone()
    }

    /// The latest notification.
    pub fn last(&self) -> Option<Notification> {
        self.notifications().pop()
    }

    /// The keys of dismissed notifications.
    pub fn dismissed(&self) -> Vec<String> {
        self.dismissed
            .lock()
            .expect("the notifier is not poisoned")
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications
            .lock()
            .expect("the notifier is not poisoned")
            .push(notification);
    }

    fn dismiss(&self, key: &str) {
        self.dismissed
            .lock()
            .expect("the notifier is not poisoned")
            .push(key.to_owned());
    }
}

/// The digest [`ScriptedExecutor`] reports for its `n`-th execution, counting from 1.
pub fn scripted_digest(n: usize) -> TransactionDigest {
    let mut digest = [0; 32];
    digest[..8].copy_from_slice(&(n as u64).to_le_bytes());
    TransactionDigest::new(digest)
}

/// A [`TransactionExecutor`] that succeeds unless a failure was scripted.
#[derive(Debug)]
pub struct ScriptedExecutor {
    sender: SuiAddress,
    delay: Option<Duration>,
    failures: Mutex<VecDeque<String>>,
    created: Mutex<VecDeque<Vec<ObjectID>>>,
    executed: Mutex<Vec<ProgrammableTransaction>>,
    finality_waits: AtomicUsize,
}

impl ScriptedExecutor {
    /// Creates an executor signing as `sender`.
    pub fn new(sender: SuiAddress) -> Self {
        Self {
            sender,
            delay: None,
            failures: Mutex::default(),
            created: Mutex::default(),
            executed: Mutex::default(),
            finality_waits: AtomicUsize::new(0),
        }
    }

    /// Makes every execution take `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes the next execution fail with `error`.
    pub fn push_failure(&self, error: &str) {
        self.failures
            .lock()
            .expect("the executor is not poisoned")
            .push_back(error.to_owned());
    }

    /// Makes the next successful execution report `created` as created objects.
    pub fn push_created(&self, created: Vec<ObjectID>) {
        self.created
            .lock()
            .expect("the executor is not poisoned")
            .push_back(created);
    }

    /// Number of executions, including failed ones.
    pub fn executed_count(&self) -> usize {
        self.executed
            .lock()
            .expect("the executor is not poisoned")
            .len()
    }

    /// The `module::function` of every Move call executed, in order.
    pub fn executed_functions(&self) -> Vec<String> {
        self.executed
            .lock()
            .expect("the executor is not poisoned")
            .iter()
            .flat_map(|transaction| transaction.commands.iter())
            .filter_map(|command| match command {
                Command::MoveCall(call) => Some(format!("{}::{}", call.module, call.function)),
                _ => None,
            })
            .collect()
    }

    /// Number of waits for finality.
    pub fn finality_waits(&self) -> usize {
        self.finality_waits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionExecutor for ScriptedExecutor {
    fn sender(&self) -> SuiAddress {
        self.sender
    }

    async fn execute(
        &self,
        transaction: ProgrammableTransaction,
        _method: &'static str,
    ) -> SuiClientResult<ExecutedTransaction> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let count = {
            let mut executed = self.executed.lock().expect("the executor is not poisoned");
            executed.push(transaction);
            executed.len()
        };
        let failure = self
            .failures
            .lock()
            .expect("the executor is not poisoned")
            .pop_front();
        if let Some(error) = failure {
            return Err(SuiClientError::TransactionExecutionError(
                error.as_str().into(),
            ));
        }

        Ok(ExecutedTransaction {
            digest: scripted_digest(count),
            created: self
                .created
                .lock()
                .expect("the executor is not poisoned")
                .pop_front()
                .unwrap_or_default(),
        })
    }

    async fn wait_for_finality(&self, _digest: TransactionDigest) -> SuiClientResult<()> {
        self.finality_waits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
