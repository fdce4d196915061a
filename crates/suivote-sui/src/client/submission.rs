// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Submission of transactions and reconciliation of the client state.
//!
//! A [`SubmissionPipeline`] belongs to one action, e.g. voting on one proposal. It moves through
//! `Idle -> Pending -> (Success | Error)` and returns to `Idle` a fixed delay after reaching a
//! terminal phase. Submitting in any phase other than `Idle` is rejected, so at most one
//! submission per action is in flight.

use std::{
    fmt::Debug,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use serde::Serialize;
use sui_types::base_types::{ObjectID, TransactionDigest};
use tokio::sync::watch;

use super::{
    SuiClientError,
    SuiClientResult,
    capability::CapabilityKind,
    executor::{ExecutedTransaction, TransactionExecutor},
    metrics::SubmissionMetricSet,
    read_client::ChainReadApi,
    transaction_builder::CallPlan,
};
use crate::{
    explorer::Explorer,
    types::{
        ChainEvent,
        VoteConfirmation,
        move_errors::{AbortCodes, FailureCategory},
    },
    validation::ValidationErrors,
};

/// Time after which a terminal phase returns to [`SubmissionPhase::Idle`].
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_secs(3);

/// The phase of a submission pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionPhase {
    /// Ready to submit.
    Idle,
    /// A submission is in flight.
    Pending,
    /// The last submission succeeded.
    Success(TransactionDigest),
    /// The last submission failed.
    Error(FailureCategory),
}

impl SubmissionPhase {
    /// Returns true if the action can be submitted.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true for `Success` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Error(_))
    }
}

/// Local gating flags set by classified failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionFlags {
    /// The target was found to be expired; the action should no longer be offered.
    pub expired: bool,
    /// The account was found not to be registered for the private target.
    pub not_registered: bool,
}

impl ActionFlags {
    fn record(&mut self, category: FailureCategory) -> bool {
        match category {
            FailureCategory::Expired if !self.expired => self.expired = true,
            FailureCategory::NotRegistered if !self.not_registered => self.not_registered = true,
            _ => return false,
        }
        true
    }
}

/// The severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationLevel {
    /// A submission is being processed.
    Pending,
    /// A submission succeeded.
    Success,
    /// A submission failed.
    Error,
}

/// A user-facing notification. Notifications with the same key replace each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// The key of the action the notification belongs to.
    pub key: String,
    /// The severity.
    pub level: NotificationLevel,
    /// The message.
    pub message: String,
    /// Whether the user may dismiss the notification.
    pub dismissible: bool,
    /// A link to the transaction in the explorer.
    pub explorer_url: Option<String>,
}

/// Presents notifications to the user.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Debug + Send + Sync {
    /// Shows `notification`, replacing any notification with the same key.
    fn notify(&self, notification: Notification);

    /// Removes the notification with the given key.
    fn dismiss(&self, key: &str);
}

/// [`Notifier`] writing notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let Notification {
            key,
            level,
            message,
            explorer_url,
            ..
        } = notification;
        match level {
            NotificationLevel::Pending => tracing::info!(%key, "{message}"),
            NotificationLevel::Success => tracing::info!(%key, ?explorer_url, "{message}"),
            NotificationLevel::Error => tracing::warn!(%key, "{message}"),
        }
    }

    fn dismiss(&self, key: &str) {
        tracing::debug!(key, "notification dismissed");
    }
}

/// Refreshes objects in the client-side cache after a mutation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectRefresher: Debug + Send + Sync {
    /// Re-reads the given objects.
    async fn refetch(&self, object_ids: Vec<ObjectID>) -> SuiClientResult<()>;
}

/// Per-submission behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionOptions {
    /// Wait for the transaction to be final before reporting success.
    pub wait_for_finality: bool,
    /// Query the transaction's events and decode vote confirmations.
    pub query_events: bool,
    /// Objects to refetch in addition to the shared objects the plan mutates.
    pub refetch: Vec<ObjectID>,
    /// The object the action targets, for the explorer link.
    pub target_object_id: Option<ObjectID>,
}

/// A submitted transaction, kept until dismissed to render its explorer link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTransaction {
    /// The transaction digest.
    pub digest: TransactionDigest,
    /// The object the action targeted.
    pub target_object_id: Option<ObjectID>,
}

/// The result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    /// The submitted transaction.
    pub transaction: PendingTransaction,
    /// Link to the transaction in the explorer.
    pub explorer_url: String,
    /// Objects created by the transaction.
    pub created: Vec<ObjectID>,
    /// Vote confirmations decoded from the events, if they were queried.
    pub confirmations: Vec<VoteConfirmation>,
}

/// Errors surfaced by admin and voting operations.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// A submission for the same action has not reached `Idle` again.
    #[error("a submission for this action is already in progress")]
    InFlight,
    /// The account does not hold the required capability. No transaction was built.
    #[error("this action requires a {0} owned by the connected account")]
    Unauthorized(CapabilityKind),
    /// The input is invalid. No transaction was built.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    /// There is no wallet to sign with.
    #[error("no wallet is connected")]
    NoWallet,
    /// The transaction could not be built, was rejected, or failed on chain.
    #[error("{message}")]
    Failed {
        /// The classified failure.
        category: FailureCategory,
        /// The user-facing message of the category.
        message: String,
        /// The underlying error.
        #[source]
        source: SuiClientError,
    },
}

impl SubmissionError {
    /// The failure category, for failed submissions.
    pub fn category(&self) -> Option<FailureCategory> {
        match self {
            Self::Failed { category, .. } => Some(*category),
            _ => None,
        }
    }
}

/// The collaborators a pipeline needs.
#[derive(Debug, Clone)]
pub struct SubmissionContext {
    /// Resolves the object arguments of call plans and queries events.
    pub read_client: Arc<dyn ChainReadApi>,
    /// Signs and executes transactions.
    pub executor: Arc<dyn TransactionExecutor>,
    /// Refreshes mutated objects.
    pub refresher: Arc<dyn ObjectRefresher>,
    /// Presents notifications.
    pub notifier: Arc<dyn Notifier>,
    /// Builds explorer links.
    pub explorer: Explorer,
    /// Delay after which a terminal phase returns to `Idle`.
    pub reset_delay: Duration,
    /// Abort codes of the deployment, for classifying failures.
    pub abort_codes: AbortCodes,
    /// Submission metrics.
    pub metrics: Option<Arc<SubmissionMetricSet>>,
}

/// Executes the transactions of one action and reconciles the client state.
#[derive(Debug)]
pub struct SubmissionPipeline {
    key: String,
    context: SubmissionContext,
    phase: Arc<watch::Sender<SubmissionPhase>>,
    flags: watch::Sender<ActionFlags>,
    pending: Mutex<Option<PendingTransaction>>,
}

impl SubmissionPipeline {
    /// Creates an idle pipeline for the action identified by `key`.
    pub fn new(key: impl Into<String>, context: SubmissionContext) -> Self {
        Self {
            key: key.into(),
            context,
            phase: Arc::new(watch::Sender::new(SubmissionPhase::Idle)),
            flags: watch::Sender::new(ActionFlags::default()),
            pending: Mutex::new(None),
        }
    }

    /// The key of the action.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The current phase.
    pub fn phase(&self) -> SubmissionPhase {
        self.phase.borrow().clone()
    }

    /// Subscribes to phase changes.
    pub fn subscribe(&self) -> watch::Receiver<SubmissionPhase> {
        self.phase.subscribe()
    }

    /// The current gating flags.
    pub fn flags(&self) -> ActionFlags {
        *self.flags.borrow()
    }

    /// Subscribes to flag changes.
    pub fn subscribe_flags(&self) -> watch::Receiver<ActionFlags> {
        self.flags.subscribe()
    }

    /// Returns true if the pipeline is idle and holds neither flags nor an undismissed
    /// transaction, i.e. dropping it loses no state.
    pub fn is_at_rest(&self) -> bool {
        self.phase.borrow().is_idle()
            && self.flags() == ActionFlags::default()
            && self.pending_transaction().is_none()
    }

    /// The last successful transaction, unless dismissed.
    pub fn pending_transaction(&self) -> Option<PendingTransaction> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Discards the last successful transaction and its notification.
    pub fn dismiss_pending(&self) {
        let dismissed = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if dismissed.is_some() {
            self.context.notifier.dismiss(&self.key);
        }
    }

    /// Submits `plan`.
    ///
    /// Fails with [`SubmissionError::InFlight`] without any effect unless the pipeline is idle.
    pub async fn submit(
        &self,
        plan: &CallPlan,
        options: SubmissionOptions,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let claimed = self.phase.send_if_modified(|phase| {
            if phase.is_idle() {
                *phase = SubmissionPhase::Pending;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(SubmissionError::InFlight);
        }

        let method = plan
            .primary_function()
            .map(|function| function.name)
            .unwrap_or("empty_plan");
        let start = Instant::now();
        let mut guard = AbandonGuard {
            pipeline: self,
            method,
            start,
            armed: true,
        };
        self.context.notifier.notify(Notification {
            key: self.key.clone(),
            level: NotificationLevel::Pending,
            message: "Processing transaction...".to_owned(),
            dismissible: false,
            explorer_url: None,
        });

        let result = match self.execute(plan, &options, method).await {
            Ok((executed, confirmations)) => {
                Ok(self.on_success(executed, confirmations, &options))
            }
            Err(error) => Err(self.on_error(error)),
        };
        guard.armed = false;

        if let Some(metrics) = self.context.metrics.as_ref() {
            let outcome = if result.is_ok() { "success" } else { "failure" };
            metrics.record_submission(method, outcome, start.elapsed());
        }
        self.schedule_reset();
        result
    }

    async fn execute(
        &self,
        plan: &CallPlan,
        options: &SubmissionOptions,
        method: &'static str,
    ) -> SuiClientResult<(ExecutedTransaction, Vec<VoteConfirmation>)> {
        let transaction = plan.resolve(self.context.read_client.as_ref()).await?;
        let executed = self.context.executor.execute(transaction, method).await?;
        if options.wait_for_finality {
            self.context
                .executor
                .wait_for_finality(executed.digest)
                .await?;
        }

        let confirmations = if options.query_events {
            self.vote_confirmations(executed.digest).await
        } else {
            vec![]
        };

        let mut refetch = plan.mutated_objects();
        refetch.extend(options.refetch.iter().copied());
        refetch.sort();
        refetch.dedup();
        if let Err(error) = self.context.refresher.refetch(refetch).await {
            tracing::warn!(key = %self.key, %error, "failed to refetch objects after submission");
        }

        Ok((executed, confirmations))
    }

    async fn vote_confirmations(&self, digest: TransactionDigest) -> Vec<VoteConfirmation> {
        let events: Vec<ChainEvent> =
            match self.context.read_client.transaction_events(digest).await {
                Ok(events) => events,
                Err(error) => {
                    tracing::debug!(%digest, %error, "events of the transaction are not available");
                    return vec![];
                }
            };
        let confirmations = VoteConfirmation::from_events(&events);
        for confirmation in &confirmations {
            tracing::info!(%digest, ?confirmation, "vote recorded");
        }
        confirmations
    }

    fn on_success(
        &self,
        executed: ExecutedTransaction,
        confirmations: Vec<VoteConfirmation>,
        options: &SubmissionOptions,
    ) -> SubmissionReceipt {
        let transaction = PendingTransaction {
            digest: executed.digest,
            target_object_id: options.target_object_id,
        };
        let explorer_url = self.context.explorer.transaction_url(&executed.digest);
        *self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(transaction.clone());

        self.context.notifier.notify(Notification {
            key: self.key.clone(),
            level: NotificationLevel::Success,
            message: "Transaction successful".to_owned(),
            dismissible: true,
            explorer_url: Some(explorer_url.clone()),
        });
        self.phase
            .send_replace(SubmissionPhase::Success(executed.digest));

        SubmissionReceipt {
            transaction,
            explorer_url,
            created: executed.created,
            confirmations,
        }
    }

    fn on_error(&self, error: SuiClientError) -> SubmissionError {
        let category = error.failure_category(&self.context.abort_codes);
        tracing::warn!(key = %self.key, ?category, %error, "submission failed");
        self.flags.send_if_modified(|flags| flags.record(category));

        let message = category.user_message().to_owned();
        self.context.notifier.notify(Notification {
            key: self.key.clone(),
            level: NotificationLevel::Error,
            message: message.clone(),
            dismissible: true,
            explorer_url: None,
        });
        self.phase.send_replace(SubmissionPhase::Error(category));

        SubmissionError::Failed {
            category,
            message,
            source: error,
        }
    }

    /// Releases the action after the submitting future was dropped while `Pending`.
    ///
    /// The outcome of the transaction is unknown, so the phase goes straight back to `Idle`.
    fn on_abandoned(&self, method: &'static str, start: Instant) {
        tracing::warn!(key = %self.key, "submission dropped before completing");
        self.context.notifier.dismiss(&self.key);
        if let Some(metrics) = self.context.metrics.as_ref() {
            metrics.record_submission(method, "abandoned", start.elapsed());
        }
        self.phase.send_if_modified(|phase| {
            if *phase == SubmissionPhase::Pending {
                *phase = SubmissionPhase::Idle;
                true
            } else {
                false
            }
        });
    }

    fn schedule_reset(&self) {
        let phase = self.phase.clone();
        let reset_delay = self.context.reset_delay;
        tokio::spawn(async move {
            tokio::time::sleep(reset_delay).await;
            phase.send_if_modified(|phase| {
                if phase.is_terminal() {
                    *phase = SubmissionPhase::Idle;
                    true
                } else {
                    false
                }
            });
        });
    }
}

/// Releases a pipeline whose submission future is dropped before it completes.
struct AbandonGuard<'a> {
    pipeline: &'a SubmissionPipeline,
    method: &'static str,
    start: Instant,
    armed: bool,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.pipeline.on_abandoned(self.method, self.start);
        }
    }
}
