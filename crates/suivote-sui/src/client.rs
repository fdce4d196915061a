// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Client to read the voting dashboard and call the voting contracts from Rust.

use std::{
    collections::HashMap,
    fmt::Display,
    sync::{Arc, Mutex},
};

use anyhow::{Context, anyhow};
use jsonrpsee::core::ClientError;
use sui_sdk::error::Error as SuiSdkError;
use sui_types::base_types::{ObjectID, SuiAddress};
use suivote_utils::metrics::Registry;
use tracing::Level;

use crate::{
    config::ClientConfig,
    contracts::proposal,
    decoder::{ChainObject, MoveRecord, ObjectKind, decode},
    explorer::Explorer,
    types::{
        Ballot,
        Dashboard,
        Proposal,
        VoteProof,
        move_errors::{AbortCodes, FailureCategory, MoveExecutionError},
    },
    validation::{FieldError, Validator, parse_address},
    wallet::Wallet,
};

pub mod capability;
pub mod classification;
pub mod contract_config;
pub mod executor;
mod metrics;
pub mod object_cache;
pub mod read_client;
pub mod submission;
pub mod transaction_builder;

pub use capability::{AuthorizedCap, CapabilityGate, CapabilityKind, CapabilityState, Privileges};
pub use classification::{CLASSIFICATION_TIMEOUT, DashboardClassification, DashboardClassifier};
pub use contract_config::ContractConfig;
pub use executor::{
    DisconnectedExecutor,
    ExecutedTransaction,
    TransactionExecutor,
    WalletExecutor,
};
pub use metrics::{SubmissionMetricSet, SuiClientMetricSet};
pub use object_cache::ObjectCache;
pub use read_client::{ChainReadApi, SuiReadClient};
pub use submission::{
    Notification,
    NotificationLevel,
    Notifier,
    SubmissionContext,
    SubmissionError,
    SubmissionOptions,
    SubmissionPhase,
    SubmissionPipeline,
    SubmissionReceipt,
    TracingNotifier,
};
pub use transaction_builder::{CallPlan, VotingCallBuilder};

/// Error returned by the [`VotingClient`] and the [`SuiReadClient`].
#[derive(Debug, thiserror::Error)]
pub enum SuiClientError {
    /// Unexpected internal errors.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
    /// Error resulting from a Sui-SDK call.
    #[error(transparent)]
    SuiSdkError(#[from] SuiSdkError),
    /// Error in a transaction execution.
    #[error("transaction execution failed: {0}")]
    TransactionExecutionError(MoveExecutionError),
    /// The object does not exist or could not be decoded as the expected type.
    #[error("object {0} does not exist or has an unexpected type")]
    ObjectNotFound(ObjectID),
    /// No gas coin found for the transaction.
    #[error("could not find SUI coins with sufficient balance to pay for gas")]
    NoCompatibleGasCoins,
    /// A simulated call failed.
    #[error("dev-inspect call failed: {0}")]
    DevInspectFailed(String),
    /// The client has no wallet to sign with.
    #[error("no wallet is configured for this client")]
    NoWalletConfigured,
}

impl SuiClientError {
    /// Returns true if the error is a transient RPC failure worth retrying.
    pub fn is_retriable_rpc_error(&self) -> bool {
        matches!(self, Self::SuiSdkError(SuiSdkError::RpcError(_)))
    }

    /// Returns true if the RPC request failed before the node could answer it.
    ///
    /// Error responses from the node are excluded, as resending the same request yields the same
    /// answer.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::SuiSdkError(SuiSdkError::RpcError(
                ClientError::Transport(_)
                    | ClientError::RequestTimeout
                    | ClientError::RestartNeeded(_)
            ))
        )
    }

    /// Classifies the error for presentation, preferring a Move abort mapped in `abort_codes`.
    pub fn failure_category(&self, abort_codes: &AbortCodes) -> FailureCategory {
        match self {
            Self::TransactionExecutionError(error) => {
                FailureCategory::classify(abort_codes, error.abort.as_ref(), &error.message)
            }
            other => FailureCategory::from_text(&other.to_string()),
        }
    }
}

/// Result type of the client.
pub type SuiClientResult<T> = Result<T, SuiClientError>;

/// Input of [`VotingClient::create_proposal`] and [`VotingClient::create_ballot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalParams {
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Expiration time in milliseconds since the Unix epoch.
    pub expiration_ms: u64,
    /// Whether only registered voters may vote.
    pub is_private: bool,
}

/// Input of [`VotingClient::add_candidate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateParams {
    /// Name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Optional image URL.
    pub image_url: Option<String>,
}

/// The capability an operation requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requirement {
    /// Either capability, preferring the super-admin one.
    AnyAdmin,
    /// Exactly the given capability.
    Exactly(CapabilityKind),
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Reads the dashboard and submits admin and voting transactions for one network.
///
/// A client is bound to the network of its [`ClientConfig`]. Switching networks builds a new
/// client with [`VotingClient::switch_network`]; nothing is carried over except the wallet, the
/// notifier, and the metrics.
#[derive(Debug)]
pub struct VotingClient {
    config: ClientConfig,
    read_client: Arc<dyn ChainReadApi>,
    cache: Arc<ObjectCache>,
    admin_gate: CapabilityGate,
    super_admin_gate: CapabilityGate,
    builder: VotingCallBuilder,
    classifier: DashboardClassifier,
    wallet: Option<Wallet>,
    executor: Option<Arc<dyn TransactionExecutor>>,
    notifier: Arc<dyn Notifier>,
    sui_metrics: Option<Arc<SuiClientMetricSet>>,
    submission_metrics: Option<Arc<SubmissionMetricSet>>,
    pipelines: Mutex<HashMap<String, Arc<SubmissionPipeline>>>,
}

impl VotingClient {
    /// Creates a client over the given collaborators.
    ///
    /// Without an executor, the client is read-only and every submission fails with
    /// [`SubmissionError::NoWallet`].
    pub fn new(
        config: ClientConfig,
        read_client: Arc<dyn ChainReadApi>,
        executor: Option<Arc<dyn TransactionExecutor>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let ContractConfig {
            package_id,
            dashboard_object,
            ..
        } = config.contract_config;
        let cache = Arc::new(ObjectCache::new(read_client.clone()));
        Self {
            admin_gate: CapabilityGate::new(
                CapabilityKind::AdminCap,
                package_id,
                read_client.clone(),
            ),
            super_admin_gate: CapabilityGate::new(
                CapabilityKind::SuperAdminCap,
                package_id,
                read_client.clone(),
            ),
            builder: VotingCallBuilder::new(package_id, dashboard_object),
            classifier: DashboardClassifier::new(cache.clone()),
            cache,
            read_client,
            config,
            wallet: None,
            executor,
            notifier,
            sui_metrics: None,
            submission_metrics: None,
            pipelines: Mutex::new(HashMap::new()),
        }
    }

    /// Connects to the network of `config`, signing with `wallet` if given.
    ///
    /// The wallet's RPC URL is only used if the wallet's active environment is the configured
    /// network.
    #[tracing::instrument(level = Level::DEBUG, skip_all, fields(network = %config.network))]
    pub async fn connect(
        config: ClientConfig,
        wallet: Option<Wallet>,
        notifier: Arc<dyn Notifier>,
        registry: Option<&Registry>,
    ) -> SuiClientResult<Self> {
        let sui_metrics = registry.map(|registry| Arc::new(SuiClientMetricSet::new(registry)));
        let submission_metrics =
            registry.map(|registry| Arc::new(SubmissionMetricSet::new(registry)));
        Self::connect_with_metrics(config, wallet, notifier, sui_metrics, submission_metrics)
            .await
    }

    async fn connect_with_metrics(
        config: ClientConfig,
        wallet: Option<Wallet>,
        notifier: Arc<dyn Notifier>,
        sui_metrics: Option<Arc<SuiClientMetricSet>>,
        submission_metrics: Option<Arc<SubmissionMetricSet>>,
    ) -> SuiClientResult<Self> {
        let wallet_rpc_url = wallet
            .as_ref()
            .filter(|wallet| wallet.get_active_env_alias() == config.network.as_str())
            .map(|wallet| wallet.get_rpc_url().to_owned());
        if let (Some(wallet), None) = (wallet.as_ref(), wallet_rpc_url.as_ref()) {
            tracing::warn!(
                wallet_env = wallet.get_active_env_alias(),
                network = %config.network,
                "the wallet's active environment differs from the selected network"
            );
        }

        let read_client = config
            .new_read_client(wallet_rpc_url.as_deref(), sui_metrics.clone())
            .await?;
        let executor = wallet.clone().map(|wallet| {
            Arc::new(WalletExecutor::new(
                wallet,
                read_client.clone(),
                config.gas_budget,
            )) as Arc<dyn TransactionExecutor>
        });
        tracing::info!(
            network = %config.network,
            rpc_url = read_client.rpc_url(),
            account = ?executor.as_ref().map(|executor| executor.sender()),
            "voting client connected"
        );

        let mut client = Self::new(config, Arc::new(read_client), executor, notifier);
        client.wallet = wallet;
        client.sui_metrics = sui_metrics;
        client.submission_metrics = submission_metrics;
        Ok(client)
    }

    /// Builds a fresh client for another network, reusing the wallet, notifier, and metrics.
    pub async fn switch_network(&self, config: ClientConfig) -> SuiClientResult<Self> {
        tracing::info!(from = %self.config.network, to = %config.network, "switching network");
        Self::connect_with_metrics(
            config,
            self.wallet.clone(),
            self.notifier.clone(),
            self.sui_metrics.clone(),
            self.submission_metrics.clone(),
        )
        .await
    }

    /// Records submissions in `metrics`.
    pub fn with_submission_metrics(mut self, metrics: Arc<SubmissionMetricSet>) -> Self {
        self.submission_metrics = Some(metrics);
        self
    }

    /// The configuration of the client.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The explorer links of the client's network.
    pub fn explorer(&self) -> Explorer {
        self.config.explorer()
    }

    /// The object cache.
    pub fn cache(&self) -> &Arc<ObjectCache> {
        &self.cache
    }

    /// The connected account, if a wallet is connected.
    pub fn account(&self) -> Option<SuiAddress> {
        self.executor.as_ref().map(|executor| executor.sender())
    }

    /// The classifier of dashboard entries, e.g. to observe its loading state.
    pub fn classifier(&self) -> &DashboardClassifier {
        &self.classifier
    }

    /// The gate of the given capability.
    pub fn gate(&self, kind: CapabilityKind) -> &CapabilityGate {
        match kind {
            CapabilityKind::AdminCap => &self.admin_gate,
            CapabilityKind::SuperAdminCap => &self.super_admin_gate,
        }
    }

    // Reads.

    /// Evaluates both capability gates for the connected account.
    pub async fn refresh_capabilities(&self) -> Privileges {
        let account = self.account();
        let (admin, super_admin) = tokio::join!(
            self.admin_gate.refresh(account),
            self.super_admin_gate.refresh(account),
        );
        Privileges { admin, super_admin }
    }

    /// The current states of both capability gates, without querying the chain.
    pub fn privileges(&self) -> Privileges {
        Privileges {
            admin: self.admin_gate.current(),
            super_admin: self.super_admin_gate.current(),
        }
    }

    /// Reads the dashboard object.
    pub async fn dashboard(&self) -> SuiClientResult<Dashboard> {
        let dashboard_id = self.config.contract_config.dashboard_object;
        let object = self.cache.get(dashboard_id).await?;
        decode::<Dashboard>(object.as_ref()).ok_or(SuiClientError::ObjectNotFound(dashboard_id))
    }

    /// Classifies the dashboard entries into proposals and ballots.
    ///
    /// Completes within [`CLASSIFICATION_TIMEOUT`], with partial results if the reads are slow.
    pub async fn classify_dashboard(&self) -> SuiClientResult<DashboardClassification> {
        let dashboard = self.dashboard().await?;
        Ok(self.classifier.classify(&dashboard.proposals_ids).await)
    }

    /// Lists the proposals registered in the dashboard, in dashboard order.
    pub async fn list_proposals(&self) -> SuiClientResult<Vec<Proposal>> {
        let classification = self.classify_dashboard().await?;
        self.list_proposals_with(&classification).await
    }

    /// Lists the proposals of an existing classification, without classifying again.
    ///
    /// Entries are read from the cache the classification filled.
    pub async fn list_proposals_with(
        &self,
        classification: &DashboardClassification,
    ) -> SuiClientResult<Vec<Proposal>> {
        self.records(&classification.proposals).await
    }

    /// Lists the ballots registered in the dashboard, in dashboard order.
    pub async fn list_ballots(&self) -> SuiClientResult<Vec<Ballot>> {
        let classification = self.classify_dashboard().await?;
        self.list_ballots_with(&classification).await
    }

    /// Lists the ballots of an existing classification, without classifying again.
    pub async fn list_ballots_with(
        &self,
        classification: &DashboardClassification,
    ) -> SuiClientResult<Vec<Ballot>> {
        self.records(&classification.ballots).await
    }

    async fn records<R: MoveRecord>(&self, object_ids: &[ObjectID]) -> SuiClientResult<Vec<R>> {
        Ok(self
            .cache
            .get_many(object_ids)
            .await?
            .iter()
            .filter_map(|object| decode::<R>(object.as_ref()))
            .collect())
    }

    /// Reads a proposal; `None` if the object does not exist or is not a proposal.
    pub async fn proposal(&self, proposal_id: ObjectID) -> SuiClientResult<Option<Proposal>> {
        self.record_of_kind(proposal_id, ObjectKind::Proposal).await
    }

    /// Reads a ballot; `None` if the object does not exist or is not a ballot.
    pub async fn ballot(&self, ballot_id: ObjectID) -> SuiClientResult<Option<Ballot>> {
        self.record_of_kind(ballot_id, ObjectKind::Ballot).await
    }

    async fn record_of_kind<R: MoveRecord>(
        &self,
        object_id: ObjectID,
        kind: ObjectKind,
    ) -> SuiClientResult<Option<R>> {
        let object = self.cache.get(object_id).await?;
        Ok(object
            .filter(|object| object.kind() == kind)
            .and_then(|object| decode::<R>(Some(&object))))
    }

    /// Checks with a simulated call whether `voter` is registered for a private proposal.
    pub async fn is_voter_registered(
        &self,
        proposal_id: ObjectID,
        voter: SuiAddress,
    ) -> SuiClientResult<bool> {
        let return_values = self
            .dev_inspect(&self.builder.is_voter_registered(proposal_id, voter))
            .await?;
        decode_first_return_value(&return_values, "is_voter_registered_for_proposal")
    }

    /// Lists the voters registered for a private proposal with a simulated call.
    pub async fn registered_voters(
        &self,
        proposal_id: ObjectID,
    ) -> SuiClientResult<Vec<SuiAddress>> {
        let return_values = self
            .dev_inspect(&self.builder.registered_voters(proposal_id))
            .await?;
        decode_first_return_value(&return_values, "get_registered_voters")
    }

    async fn dev_inspect(&self, plan: &CallPlan) -> SuiClientResult<Vec<Vec<u8>>> {
        let transaction = plan.resolve(self.read_client.as_ref()).await?;
        let sender = self.account().unwrap_or(SuiAddress::ZERO);
        self.read_client.dev_inspect(sender, transaction).await
    }

    /// Returns the vote proofs owned by `owner`.
    pub async fn vote_proofs(&self, owner: SuiAddress) -> SuiClientResult<Vec<VoteProof>> {
        let struct_tag = proposal::VoteProofNFT
            .to_move_struct_tag(self.config.contract_config.package_id)?;
        Ok(self
            .read_client
            .owned_objects_of_type(owner, struct_tag)
            .await?
            .iter()
            .filter_map(|object: &ChainObject| decode::<VoteProof>(Some(object)))
            .collect())
    }

    /// Checks whether `voter` owns a vote proof for `proposal_id`.
    pub async fn has_voted(
        &self,
        voter: SuiAddress,
        proposal_id: ObjectID,
    ) -> SuiClientResult<bool> {
        Ok(self
            .vote_proofs(voter)
            .await?
            .iter()
            .any(|proof| proof.proposal_id == Some(proposal_id)))
    }

    // Submissions.

    /// Returns the pipeline of `action` on `target`, creating it on first use.
    ///
    /// Pipelines that are at rest and not referenced elsewhere are dropped here.
    pub fn pipeline(&self, action: &str, target: impl Display) -> Arc<SubmissionPipeline> {
        let key = format!("{action}:{target}");
        let mut pipelines = self
            .pipelines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        pipelines.retain(|_, pipeline| Arc::strong_count(pipeline) > 1 || !pipeline.is_at_rest());
        pipelines
            .entry(key)
            .or_insert_with_key(|key| {
                Arc::new(SubmissionPipeline::new(key.clone(), self.submission_context()))
            })
            .clone()
    }

    /// The number of pipelines the client keeps.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn submission_context(&self) -> SubmissionContext {
        SubmissionContext {
            read_client: self.read_client.clone(),
            executor: self
                .executor
                .clone()
                .unwrap_or_else(|| Arc::new(DisconnectedExecutor)),
            refresher: self.cache.clone(),
            notifier: self.notifier.clone(),
            explorer: self.config.explorer(),
            reset_delay: self.config.submission.reset_delay,
            abort_codes: self.config.contract_config.abort_codes.clone(),
            metrics: self.submission_metrics.clone(),
        }
    }

    fn options(&self, target: Option<ObjectID>, query_events: bool) -> SubmissionOptions {
        SubmissionOptions {
            wait_for_finality: self.config.submission.wait_for_finality,
            query_events: query_events && self.config.submission.query_events,
            refetch: vec![],
            target_object_id: target,
        }
    }

    fn ensure_wallet(&self) -> Result<(), SubmissionError> {
        if self.executor.is_none() {
            return Err(SubmissionError::NoWallet);
        }
        Ok(())
    }

    async fn authorize(&self, requirement: Requirement) -> Result<AuthorizedCap, SubmissionError> {
        self.ensure_wallet()?;
        let privileges = self.refresh_capabilities().await;
        let (cap, missing) = match requirement {
            Requirement::AnyAdmin => (privileges.strongest(), CapabilityKind::AdminCap),
            Requirement::Exactly(kind) => (privileges.get(kind), kind),
        };
        cap.ok_or_else(|| {
            tracing::info!(required = %missing, account = ?self.account(), "not authorized");
            SubmissionError::Unauthorized(missing)
        })
    }

    async fn invalidate_capabilities(&self) {
        self.admin_gate.invalidate().await;
        self.super_admin_gate.invalidate().await;
    }

    /// Grants admin rights to `new_admin`.
    pub async fn grant_admin(&self, new_admin: &str) -> Result<SubmissionReceipt, SubmissionError> {
        let new_admin = parse_address_field("new_admin", new_admin)?;
        let cap = self.authorize(Requirement::AnyAdmin).await?;
        let plan = self.builder.grant_admin(cap, new_admin);
        let receipt = self
            .pipeline("grant_admin", new_admin)
            .submit(&plan, self.options(None, false))
            .await;
        self.invalidate_capabilities().await;
        receipt
    }

    /// Grants super-admin rights to `new_admin`.
    pub async fn grant_super_admin(
        &self,
        new_admin: &str,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let new_admin = parse_address_field("new_admin", new_admin)?;
        let cap = self
            .authorize(Requirement::Exactly(CapabilityKind::SuperAdminCap))
            .await?;
        let plan = self.builder.grant_super_admin(cap.cap_id, new_admin);
        let receipt = self
            .pipeline("grant_super_admin", new_admin)
            .submit(&plan, self.options(None, false))
            .await;
        self.invalidate_capabilities().await;
        receipt
    }

    /// Revokes the admin rights of `admin`.
    pub async fn revoke_admin(&self, admin: &str) -> Result<SubmissionReceipt, SubmissionError> {
        let admin = parse_address_field("admin", admin)?;
        let cap = self
            .authorize(Requirement::Exactly(CapabilityKind::SuperAdminCap))
            .await?;
        let plan = self.builder.revoke_admin(cap.cap_id, admin);
        let receipt = self
            .pipeline("revoke_admin", admin)
            .submit(&plan, self.options(None, false))
            .await;
        self.invalidate_capabilities().await;
        receipt
    }

    /// Revokes the super-admin rights of `admin`.
    pub async fn revoke_super_admin(
        &self,
        admin: &str,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let admin = parse_address_field("admin", admin)?;
        let cap = self
            .authorize(Requirement::Exactly(CapabilityKind::SuperAdminCap))
            .await?;
        let plan = self.builder.revoke_super_admin(cap.cap_id, admin);
        let receipt = self
            .pipeline("revoke_super_admin", admin)
            .submit(&plan, self.options(None, false))
            .await;
        self.invalidate_capabilities().await;
        receipt
    }

    /// Registers `voter` for the private proposal or ballot `proposal_id`.
    pub async fn register_voter(
        &self,
        proposal_id: ObjectID,
        voter: &str,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let voter = parse_address_field("voter", voter)?;
        let cap = self.authorize(Requirement::AnyAdmin).await?;
        let plan = self.builder.register_voter(cap, proposal_id, voter);
        self.pipeline("register_voter", proposal_id)
            .submit(&plan, self.options(Some(proposal_id), false))
            .await
    }

    /// Removes `voter` from the registry of the private proposal or ballot `proposal_id`.
    pub async fn unregister_voter(
        &self,
        proposal_id: ObjectID,
        voter: &str,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let voter = parse_address_field("voter", voter)?;
        let cap = self.authorize(Requirement::AnyAdmin).await?;
        let plan = self.builder.unregister_voter(cap, proposal_id, voter);
        self.pipeline("unregister_voter", proposal_id)
            .submit(&plan, self.options(Some(proposal_id), false))
            .await
    }

    /// Creates a proposal and registers it in the dashboard in one transaction.
    pub async fn create_proposal(
        &self,
        params: &ProposalParams,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        validate_proposal(params)?;
        let cap = self.authorize(Requirement::AnyAdmin).await?;
        let plan = self.builder.create_proposal(
            cap,
            params.title.trim(),
            &params.description,
            params.expiration_ms,
            params.is_private,
        );
        self.pipeline("create_proposal", self.config.contract_config.dashboard_object)
            .submit(&plan, self.options(None, false))
            .await
    }

    /// Creates a ballot and registers it in the dashboard in one transaction.
    pub async fn create_ballot(
        &self,
        params: &ProposalParams,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        validate_proposal(params)?;
        let cap = self.authorize(Requirement::AnyAdmin).await?;
        let plan = self.builder.create_ballot(
            cap,
            params.title.trim(),
            &params.description,
            params.expiration_ms,
            params.is_private,
        );
        self.pipeline("create_ballot", self.config.contract_config.dashboard_object)
            .submit(&plan, self.options(None, false))
            .await
    }

    /// Registers an existing proposal or ballot in the dashboard.
    pub async fn register_proposal(
        &self,
        proposal_id: ObjectID,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let cap = self.authorize(Requirement::AnyAdmin).await?;
        let plan = self.builder.register_proposal(cap, proposal_id);
        self.pipeline("register_proposal", proposal_id)
            .submit(&plan, self.options(Some(proposal_id), false))
            .await
    }

    /// Sets the proposal to active.
    pub async fn set_active_status(
        &self,
        proposal_id: ObjectID,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let cap = self.authorize(Requirement::AnyAdmin).await?;
        let plan = self.builder.set_active_status(cap, proposal_id);
        self.pipeline("set_active_status", proposal_id)
            .submit(&plan, self.options(Some(proposal_id), false))
            .await
    }

    /// Delists the proposal.
    pub async fn set_delisted_status(
        &self,
        proposal_id: ObjectID,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let cap = self.authorize(Requirement::AnyAdmin).await?;
        let plan = self.builder.set_delisted_status(cap, proposal_id);
        self.pipeline("set_delisted_status", proposal_id)
            .submit(&plan, self.options(Some(proposal_id), false))
            .await
    }

    /// Removes the proposal.
    pub async fn remove_proposal(
        &self,
        proposal_id: ObjectID,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let cap = self.authorize(Requirement::AnyAdmin).await?;
        let plan = self.builder.remove_proposal(cap, proposal_id);
        let mut options = self.options(Some(proposal_id), false);
        options.refetch.push(self.config.contract_config.dashboard_object);
        self.pipeline("remove_proposal", proposal_id)
            .submit(&plan, options)
            .await
    }

    /// Moves the expiration of the proposal; requires the admin capability.
    pub async fn change_expiration_date(
        &self,
        proposal_id: ObjectID,
        expiration_ms: u64,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let mut validator = Validator::new();
        validator.future_expiration("expiration", expiration_ms, now_ms());
        validator.finish()?;
        let cap = self
            .authorize(Requirement::Exactly(CapabilityKind::AdminCap))
            .await?;
        let plan = self
            .builder
            .change_expiration_date(cap.cap_id, proposal_id, expiration_ms);
        self.pipeline("change_expiration_date", proposal_id)
            .submit(&plan, self.options(Some(proposal_id), false))
            .await
    }

    /// Adds a candidate to the ballot.
    pub async fn add_candidate(
        &self,
        ballot_id: ObjectID,
        params: &CandidateParams,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let mut validator = Validator::new();
        validator.non_empty("name", &params.name);
        validator.optional_url("image_url", params.image_url.as_deref());
        validator.finish()?;
        let cap = self.authorize(Requirement::AnyAdmin).await?;
        let plan = self.builder.add_candidate(
            cap,
            ballot_id,
            params.name.trim(),
            &params.description,
            params
                .image_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty()),
        );
        self.pipeline("add_candidate", ballot_id)
            .submit(&plan, self.options(Some(ballot_id), false))
            .await
    }

    /// Votes on a proposal.
    pub async fn vote(
        &self,
        proposal_id: ObjectID,
        vote_yes: bool,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        self.ensure_wallet()?;
        let plan = self.builder.vote(proposal_id, vote_yes);
        self.pipeline("vote", proposal_id)
            .submit(&plan, self.options(Some(proposal_id), true))
            .await
    }

    /// Votes for `candidate_id` on a ballot.
    pub async fn vote_ballot(
        &self,
        ballot_id: ObjectID,
        candidate_id: u64,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        self.ensure_wallet()?;
        let plan = self.builder.vote_ballot(ballot_id, candidate_id);
        self.pipeline("vote_ballot", ballot_id)
            .submit(&plan, self.options(Some(ballot_id), true))
            .await
    }
}

fn parse_address_field(field: &'static str, input: &str) -> Result<SuiAddress, SubmissionError> {
    parse_address(input)
        .map_err(|error| SubmissionError::Validation(FieldError { field, error }.into()))
}

fn validate_proposal(params: &ProposalParams) -> Result<(), SubmissionError> {
    let mut validator = Validator::new();
    validator.non_empty("title", &params.title);
    validator.future_expiration("expiration", params.expiration_ms, now_ms());
    validator.finish()?;
    Ok(())
}

fn decode_first_return_value<T: serde::de::DeserializeOwned>(
    return_values: &[Vec<u8>],
    function: &str,
) -> SuiClientResult<T> {
    let bytes = return_values
        .first()
        .ok_or_else(|| anyhow!("{function} returned no value"))?;
    Ok(bcs::from_bytes(bytes).with_context(|| format!("unexpected return value of {function}"))?)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sui_types::base_types::TransactionDigest;

    use super::*;
    use crate::{
        client::contract_config::ContractConfig,
        config::Network,
        test_utils::{
            InMemoryChain,
            RecordingNotifier,
            ScriptedExecutor,
            address,
            capability_object,
            dashboard_object,
            object_id,
            package_id,
            proposal_object,
            vote_proof_object,
        },
        types::move_errors::MoveAbort,
    };

    const FAR_FUTURE_MS: u64 = 4_102_444_800_000;

    struct Harness {
        client: VotingClient,
        chain: Arc<InMemoryChain>,
        executor: Arc<ScriptedExecutor>,
    }

    fn config() -> ClientConfig {
        let mut config = ClientConfig::new_from_contract_config(
            Network::Testnet,
            ContractConfig::new(package_id(), object_id(0xd)),
        );
        config.submission.reset_delay = Duration::from_millis(100);
        config
    }

    fn harness(account: SuiAddress) -> Harness {
        let chain = Arc::new(InMemoryChain::default());
        chain.insert_object(dashboard_object(object_id(0xd), &[], &[], &[]));
        let executor = Arc::new(ScriptedExecutor::new(account));
        let client = VotingClient::new(
            config(),
            chain.clone(),
            Some(executor.clone()),
            Arc::new(RecordingNotifier::default()),
        );
        Harness {
            client,
            chain,
            executor,
        }
    }

    #[test]
    fn execution_errors_are_classified_by_mapped_abort_first() {
        let error = SuiClientError::TransactionExecutionError(MoveExecutionError {
            message: "something expired".to_owned(),
            abort: Some(MoveAbort {
                module: "dashboard".to_owned(),
                function: Some("revoke_admin".to_owned()),
                code: 1,
            }),
        });
        let abort_codes =
            AbortCodes::new([("dashboard", 1, FailureCategory::CannotRevokeDeployer)]);
        assert_eq!(
            error.failure_category(&abort_codes),
            FailureCategory::CannotRevokeDeployer
        );
        assert_eq!(
            error.failure_category(&AbortCodes::default()),
            FailureCategory::Expired
        );
        assert_eq!(
            SuiClientError::DevInspectFailed("voter not registered".to_owned())
                .failure_category(&AbortCodes::default()),
            FailureCategory::NotRegistered
        );
    }

    #[tokio::test]
    async fn admin_operations_require_a_capability() {
        let Harness {
            client, executor, ..
        } = harness(address(0x1));

        let result = client.grant_admin(&address(0x2).to_string()).await;

        assert!(matches!(
            result,
            Err(SubmissionError::Unauthorized(CapabilityKind::AdminCap))
        ));
        assert_eq!(executor.executed_count(), 0);
    }

    #[tokio::test]
    async fn super_admin_operations_reject_the_admin_capability() {
        let Harness {
            client,
            chain,
            executor,
        } = harness(address(0x1));
        chain.insert_owned(
            address(0x1),
            capability_object(object_id(0xc1), CapabilityKind::AdminCap),
        );

        let result = client.revoke_admin(&address(0x2).to_string()).await;

        assert!(matches!(
            result,
            Err(SubmissionError::Unauthorized(CapabilityKind::SuperAdminCap))
        ));
        assert_eq!(executor.executed_count(), 0);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_authorization() {
        let Harness {
            client, chain, ..
        } = harness(address(0x1));

        let result = client.grant_admin("0x123").await;
        let Err(SubmissionError::Validation(errors)) = result else {
            panic!("expected a validation error");
        };
        assert!(errors.field("new_admin").is_some());

        let result = client
            .create_proposal(&ProposalParams {
                title: String::new(),
                description: String::new(),
                expiration_ms: 1,
                is_private: false,
            })
            .await;
        let Err(SubmissionError::Validation(errors)) = result else {
            panic!("expected a validation error");
        };
        assert_eq!(errors.errors().len(), 2);
        assert_eq!(chain.owned_queries(), 0);
    }

    #[tokio::test]
    async fn read_only_clients_cannot_submit() {
        let chain = Arc::new(InMemoryChain::default());
        let client = VotingClient::new(
            config(),
            chain.clone(),
            None,
            Arc::new(RecordingNotifier::default()),
        );

        assert!(matches!(
            client.vote(object_id(0xa), true).await,
            Err(SubmissionError::NoWallet)
        ));
        assert_eq!(client.refresh_capabilities().await, Privileges::default());
        assert_eq!(chain.owned_queries(), 0);
    }

    #[tokio::test]
    async fn proposals_are_created_with_the_strongest_capability() -> anyhow::Result<()> {
        let Harness {
            client,
            chain,
            executor,
        } = harness(address(0x1));
        chain.insert_owned(
            address(0x1),
            capability_object(object_id(0xc1), CapabilityKind::AdminCap),
        );
        chain.insert_owned(
            address(0x1),
            capability_object(object_id(0xc2), CapabilityKind::SuperAdminCap),
        );

        client
            .create_proposal(&ProposalParams {
                title: "Budget".to_owned(),
                description: "Annual budget".to_owned(),
                expiration_ms: FAR_FUTURE_MS,
                is_private: false,
            })
            .await?;

        assert_eq!(
            executor.executed_functions(),
            ["proposal::create_super", "dashboard::register_proposal_super"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn granting_admin_rights_reevaluates_the_capabilities() -> anyhow::Result<()> {
        let Harness { client, chain, .. } = harness(address(0x1));
        chain.insert_owned(
            address(0x1),
            capability_object(object_id(0xc1), CapabilityKind::AdminCap),
        );

        client.grant_admin(&address(0x2).to_string()).await?;
        let queries = chain.owned_queries();
        client.refresh_capabilities().await;

        assert_eq!(chain.owned_queries(), queries + 2);
        Ok(())
    }

    #[tokio::test]
    async fn proposals_are_read_by_kind() -> anyhow::Result<()> {
        let Harness { client, chain, .. } = harness(address(0x1));
        chain.insert_object(proposal_object(object_id(0xa), "Budget"));

        let proposal = client
            .proposal(object_id(0xa))
            .await?
            .expect("the proposal exists");
        assert_eq!(proposal.title, "Budget");
        assert_eq!(client.ballot(object_id(0xa)).await?, None);
        assert_eq!(client.proposal(object_id(0xee)).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn vote_proofs_tell_whether_an_account_voted() -> anyhow::Result<()> {
        let Harness { client, chain, .. } = harness(address(0x1));
        chain.insert_owned(
            address(0x1),
            vote_proof_object(object_id(0xf1), object_id(0xa)),
        );

        assert!(client.has_voted(address(0x1), object_id(0xa)).await?);
        assert!(!client.has_voted(address(0x1), object_id(0xb)).await?);
        assert!(!client.has_voted(address(0x2), object_id(0xa)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn registration_is_read_with_dev_inspect() -> anyhow::Result<()> {
        let Harness { client, chain, .. } = harness(address(0x1));
        chain.push_dev_inspect_result(vec![bcs::to_bytes(&true)?]);
        chain.push_dev_inspect_result(vec![bcs::to_bytes(&vec![address(0x2), address(0x3)])?]);

        assert!(
            client
                .is_voter_registered(object_id(0xa), address(0x2))
                .await?
        );
        assert_eq!(
            client.registered_voters(object_id(0xa)).await?,
            vec![address(0x2), address(0x3)]
        );
        assert!(matches!(
            client.registered_voters(object_id(0xa)).await,
            Err(SuiClientError::DevInspectFailed(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn pipelines_are_shared_per_action_and_target() {
        let Harness { client, .. } = harness(address(0x1));

        let first = client.pipeline("vote", object_id(0xa));
        let second = client.pipeline("vote", object_id(0xa));
        let other = client.pipeline("vote", object_id(0xb));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(first.key(), format!("vote:{}", object_id(0xa)));
    }

    #[tokio::test(start_paused = true)]
    async fn pipelines_at_rest_are_pruned() -> anyhow::Result<()> {
        let Harness { client, .. } = harness(address(0x1));

        client.vote(object_id(0xa), true).await?;
        tokio::time::sleep(Duration::from_millis(101)).await;
        // The undismissed transaction keeps the pipeline.
        client.pipeline("vote", object_id(0xb));
        assert_eq!(client.pipeline_count(), 2);

        client.pipeline("vote", object_id(0xa)).dismiss_pending();
        client.pipeline("vote", object_id(0xc));
        assert_eq!(client.pipeline_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn votes_link_to_the_explorer() -> anyhow::Result<()> {
        let Harness { client, .. } = harness(address(0x1));

        let receipt = client.vote(object_id(0xa), true).await?;

        assert_ne!(receipt.transaction.digest, TransactionDigest::ZERO);
        assert!(
            receipt
                .explorer_url
                .starts_with("https://suiscan.xyz/testnet/tx/")
        );
        Ok(())
    }

    #[tokio::test]
    async fn submission_outcomes_are_recorded() -> anyhow::Result<()> {
        let Harness {
            client, executor, ..
        } = harness(address(0x1));
        let metrics = Arc::new(SubmissionMetricSet::new(&Registry::default()));
        let client = client.with_submission_metrics(metrics.clone());

        client.vote(object_id(0xa), true).await?;
        executor.push_failure("EProposalExpired");
        assert!(client.vote(object_id(0xb), false).await.is_err());

        let outcomes = &metrics.submissions_total;
        assert_eq!(outcomes.with_label_values(&["vote", "success"]).get(), 1);
        assert_eq!(outcomes.with_label_values(&["vote", "failure"]).get(), 1);
        Ok(())
    }
}
