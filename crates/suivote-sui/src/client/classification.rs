// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Sorting of dashboard entries into proposals and ballots.

use std::{collections::HashMap, pin::pin, sync::Arc, time::Duration};

use futures::StreamExt as _;
use itertools::Itertools as _;
use serde::Serialize;
use sui_types::base_types::ObjectID;
use tokio::sync::watch;

use super::object_cache::ObjectCache;
use crate::decoder::ObjectKind;

/// Upper bound on the time spent classifying; partial results are returned after it.
pub const CLASSIFICATION_TIMEOUT: Duration = Duration::from_secs(15);

const MAX_CONCURRENT_READS: usize = 10;

/// The dashboard entries grouped by kind, each group in dashboard order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardClassification {
    /// Entries of type `proposal::Proposal`.
    pub proposals: Vec<ObjectID>,
    /// Entries of type `ballot::Ballot`.
    pub ballots: Vec<ObjectID>,
    /// Entries that do not exist or have another type.
    pub unknown: Vec<ObjectID>,
    /// Entries whose type could not be read before the timeout or because of an error.
    pub unresolved: Vec<ObjectID>,
    /// False if the timeout cut the classification short.
    pub complete: bool,
}

/// Classifies dashboard entries by reading their types through the object cache.
#[derive(Debug)]
pub struct DashboardClassifier {
    cache: Arc<ObjectCache>,
    timeout: Duration,
    loading: watch::Sender<bool>,
}

impl DashboardClassifier {
    /// Creates a classifier with the default [`CLASSIFICATION_TIMEOUT`].
    pub fn new(cache: Arc<ObjectCache>) -> Self {
        Self::with_timeout(cache, CLASSIFICATION_TIMEOUT)
    }

    /// Creates a classifier with a custom timeout.
    pub fn with_timeout(cache: Arc<ObjectCache>, timeout: Duration) -> Self {
        Self {
            cache,
            timeout,
            loading: watch::Sender::new(false),
        }
    }

    /// Whether a classification is running.
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Subscribes to the loading state.
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Classifies `object_ids`.
    ///
    /// Never takes longer than the timeout: on expiry, the loading state is cleared and whatever
    /// was classified so far is returned with `complete` set to false.
    pub async fn classify(&self, object_ids: &[ObjectID]) -> DashboardClassification {
        self.loading.send_replace(true);
        let mut kinds = HashMap::with_capacity(object_ids.len());

        let complete = tokio::time::timeout(self.timeout, async {
            let mut reads = pin!(
                futures::stream::iter(object_ids.iter().copied().unique())
                    .map(|object_id| async move { (object_id, self.cache.get(object_id).await) })
                    .buffer_unordered(MAX_CONCURRENT_READS)
            );
            while let Some((object_id, result)) = reads.next().await {
                match result {
                    Ok(object) => {
                        let kind = object
                            .as_ref()
                            .map(|object| object.kind())
                            .unwrap_or(ObjectKind::Other);
                        kinds.insert(object_id, kind);
                    }
                    Err(error) => {
                        tracing::warn!(%object_id, %error, "failed to read dashboard entry");
                    }
                }
            }
        })
        .await
        .is_ok();

        if !complete {
            tracing::warn!(
                timeout = ?self.timeout,
                classified = kinds.len(),
                total = object_ids.len(),
                "dashboard classification timed out, returning partial results"
            );
        }
        self.loading.send_replace(false);

        let mut classification = DashboardClassification {
            complete,
            ..Default::default()
        };
        for object_id in object_ids.iter().copied().unique() {
            let bucket = match kinds.get(&object_id) {
                Some(ObjectKind::Proposal) => &mut classification.proposals,
                Some(ObjectKind::Ballot) => &mut classification.ballots,
                Some(ObjectKind::Other) => &mut classification.unknown,
                None => &mut classification.unresolved,
            };
            bucket.push(object_id);
        }
        classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{InMemoryChain, ballot_object, object_id, proposal_object};

    fn classifier(chain: InMemoryChain) -> DashboardClassifier {
        DashboardClassifier::new(Arc::new(ObjectCache::new(Arc::new(chain))))
    }

    #[tokio::test(start_paused = true)]
    async fn entries_are_grouped_by_type() {
        let chain = InMemoryChain::default();
        chain.insert_object(proposal_object(object_id(0xa), "proposal"));
        chain.insert_object(ballot_object(object_id(0xb), "ballot", &[]));

        let classification = classifier(chain)
            .classify(&[object_id(0xa), object_id(0xb), object_id(0xc)])
            .await;

        assert_eq!(
            classification,
            DashboardClassification {
                proposals: vec![object_id(0xa)],
                ballots: vec![object_id(0xb)],
                unknown: vec![object_id(0xc)],
                unresolved: vec![],
                complete: true,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_returns_partial_results_and_clears_loading() {
        let chain = InMemoryChain::default();
        chain.insert_object(proposal_object(object_id(0xa), "fast"));
        chain.insert_object(ballot_object(object_id(0xb), "slow", &[]));
        chain.delay_object(object_id(0xb), Duration::from_secs(60));
        let classifier = classifier(chain);
        let loading = classifier.subscribe_loading();

        let start = tokio::time::Instant::now();
        let classification = classifier
            .classify(&[object_id(0xa), object_id(0xb)])
            .await;

        assert!(start.elapsed() >= CLASSIFICATION_TIMEOUT);
        assert!(start.elapsed() < Duration::from_secs(60));
        assert!(!classification.complete);
        assert_eq!(classification.proposals, vec![object_id(0xa)]);
        assert_eq!(classification.unresolved, vec![object_id(0xb)]);
        assert!(!classifier.is_loading());
        assert!(!*loading.borrow());
    }
}
