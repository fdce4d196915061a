// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Client-side cache of chain objects.
//!
//! Entries are only replaced by an explicit [`ObjectCache::refetch`], which the submission
//! pipeline issues for the objects a transaction mutated. There is no background revalidation.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use sui_types::base_types::ObjectID;
use tokio::sync::RwLock;

use super::{SuiClientResult, read_client::ChainReadApi, submission::ObjectRefresher};
use crate::decoder::ChainObject;

/// Caches objects read through a [`ChainReadApi`], including negative lookups.
#[derive(Debug)]
pub struct ObjectCache {
    read_client: Arc<dyn ChainReadApi>,
    objects: RwLock<HashMap<ObjectID, Option<ChainObject>>>,
}

impl ObjectCache {
    /// Creates an empty cache over `read_client`.
    pub fn new(read_client: Arc<dyn ChainReadApi>) -> Self {
        Self {
            read_client,
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// The read client backing the cache.
    pub fn read_client(&self) -> &Arc<dyn ChainReadApi> {
        &self.read_client
    }

    /// Returns the object, reading it from the chain on a cache miss.
    pub async fn get(&self, object_id: ObjectID) -> SuiClientResult<Option<ChainObject>> {
        if let Some(cached) = self.objects.read().await.get(&object_id) {
            return Ok(cached.clone());
        }
        let object = self.read_client.get_object(object_id).await?;
        self.objects
            .write()
            .await
            .insert(object_id, object.clone());
        Ok(object)
    }

    /// Returns the objects in the order of `object_ids`, reading all misses in one batch.
    pub async fn get_many(
        &self,
        object_ids: &[ObjectID],
    ) -> SuiClientResult<Vec<Option<ChainObject>>> {
        let missing: Vec<_> = {
            let objects = self.objects.read().await;
            let mut missing: Vec<_> = object_ids
                .iter()
                .filter(|id| !objects.contains_key(id))
                .copied()
                .collect();
            missing.sort();
            missing.dedup();
            missing
        };
        if !missing.is_empty() {
            self.fetch_and_store(missing).await?;
        }

        let objects = self.objects.read().await;
        Ok(object_ids
            .iter()
            .map(|id| objects.get(id).cloned().flatten())
            .collect())
    }

    /// Re-reads the given objects from the chain, replacing their cache entries.
    pub async fn refetch(&self, object_ids: &[ObjectID]) -> SuiClientResult<()> {
        if object_ids.is_empty() {
            return Ok(());
        }
        tracing::debug!(?object_ids, "refetching objects");
        self.fetch_and_store(object_ids.to_vec()).await
    }

    /// Returns true if the object is cached, whether it exists or not.
    pub async fn contains(&self, object_id: &ObjectID) -> bool {
        self.objects.read().await.contains_key(object_id)
    }

    async fn fetch_and_store(&self, object_ids: Vec<ObjectID>) -> SuiClientResult<()> {
        let fetched = self
            .read_client
            .multi_get_objects(object_ids.clone())
            .await?;
        let mut objects = self.objects.write().await;
        for (object_id, object) in object_ids.into_iter().zip(fetched) {
            objects.insert(object_id, object);
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectRefresher for ObjectCache {
    async fn refetch(&self, object_ids: Vec<ObjectID>) -> SuiClientResult<()> {
        ObjectCache::refetch(self, &object_ids).await
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use serde_json::json;

    use super::*;
    use crate::client::read_client::MockChainReadApi;

    fn object(id: &str, title: &str) -> ChainObject {
        ChainObject::from_json(json!({
            "objectId": id,
            "type": "0x2a::proposal::Proposal",
            "content": {
                "dataType": "moveObject",
                "type": "0x2a::proposal::Proposal",
                "fields": { "title": title },
            },
        }))
    }

    fn id(n: u8) -> ObjectID {
        ObjectID::from_single_byte(n)
    }

    #[tokio::test]
    async fn reads_are_served_from_the_cache() -> SuiClientResult<()> {
        let mut read_client = MockChainReadApi::new();
        read_client
            .expect_get_object()
            .with(eq(id(1)))
            .times(1)
            .returning(|_| Ok(Some(object("0x1", "first"))));
        let cache = ObjectCache::new(Arc::new(read_client));

        let first = cache.get(id(1)).await?;
        let second = cache.get(id(1)).await?;

        assert_eq!(first, second);
        assert!(cache.contains(&id(1)).await);
        Ok(())
    }

    #[tokio::test]
    async fn refetch_replaces_entries() -> SuiClientResult<()> {
        let mut read_client = MockChainReadApi::new();
        let mut titles = vec!["before", "after"].into_iter();
        read_client
            .expect_multi_get_objects()
            .times(2)
            .returning(move |ids| {
                let title = titles.next().unwrap_or("exhausted");
                Ok(ids.iter().map(|_| Some(object("0x1", title))).collect())
            });
        let cache = ObjectCache::new(Arc::new(read_client));

        let before = cache.get_many(&[id(1)]).await?;
        cache.refetch(&[id(1)]).await?;
        let after = cache.get_many(&[id(1)]).await?;

        assert_ne!(before, after);
        assert_eq!(after[0], Some(object("0x1", "after")));
        Ok(())
    }

    #[tokio::test]
    async fn get_many_only_fetches_misses() -> SuiClientResult<()> {
        let mut read_client = MockChainReadApi::new();
        read_client
            .expect_get_object()
            .times(1)
            .returning(|_| Ok(Some(object("0x1", "cached"))));
        read_client
            .expect_multi_get_objects()
            .withf(|ids| *ids == vec![id(2)])
            .times(1)
            .returning(|_| Ok(vec![None]));
        let cache = ObjectCache::new(Arc::new(read_client));

        cache.get(id(1)).await?;
        let objects = cache.get_many(&[id(1), id(2), id(2)]).await?;

        assert_eq!(objects.len(), 3);
        assert!(objects[0].is_some());
        assert!(objects[1].is_none() && objects[2].is_none());
        Ok(())
    }
}
