// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use smartlearn_core::ReviewItem;

use crate::cache::SyncCache;
use crate::error::SyncError;
use crate::service::library_prefix;
use crate::store::DocumentStore;
use crate::store::Mutation;
use crate::store::Query;
use crate::watch::WatchHub;
use crate::watch::WatchStream;

/// Library reads go through the cache; library writes go to the store and
/// then invalidate the library's key family, so the next read is fresh.
pub struct LibraryService<S> {
    store: Arc<S>,
    cache: Arc<SyncCache>,
    hub: Arc<WatchHub<Vec<ReviewItem>>>,
}

impl<S> Clone for LibraryService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: self.cache.clone(),
            hub: self.hub.clone(),
        }
    }
}

impl<S: DocumentStore> LibraryService<S> {
    pub fn new(store: Arc<S>, cache: Arc<SyncCache>, hub: Arc<WatchHub<Vec<ReviewItem>>>) -> Self {
        Self { store, cache, hub }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<SyncCache> {
        &self.cache
    }

    pub async fn items(&self, library_id: &str) -> Result<Arc<Vec<ReviewItem>>, SyncError> {
        self.query_cached(Query::Library(library_id.to_string()), library_id, "items")
            .await
    }

    pub async fn favorites(&self, library_id: &str) -> Result<Arc<Vec<ReviewItem>>, SyncError> {
        self.query_cached(
            Query::Favorites(library_id.to_string()),
            library_id,
            "favorites",
        )
        .await
    }

    async fn query_cached(
        &self,
        query: Query,
        library_id: &str,
        scope: &str,
    ) -> Result<Arc<Vec<ReviewItem>>, SyncError> {
        let store = self.store.clone();
        self.cache
            .cached(&["library", library_id, scope], None, move || async move {
                store.query(&query).await
            })
            .await
    }

    pub async fn upsert_item(&self, item: ReviewItem) -> Result<(), SyncError> {
        let library_id = item.library_id.clone();
        self.store.mutate(Mutation::Upsert(item)).await?;
        self.cache.invalidate(Some(&library_prefix(&library_id)));
        Ok(())
    }

    pub async fn set_favorite(
        &self,
        library_id: &str,
        item_id: &str,
        favorite: bool,
    ) -> Result<(), SyncError> {
        self.store
            .mutate(Mutation::SetFavorite {
                item_id: item_id.to_string(),
                favorite,
            })
            .await?;
        self.cache.invalidate(Some(&library_prefix(library_id)));
        Ok(())
    }

    pub async fn remove_item(&self, library_id: &str, item_id: &str) -> Result<(), SyncError> {
        self.store
            .mutate(Mutation::Remove {
                item_id: item_id.to_string(),
            })
            .await?;
        self.cache.invalidate(Some(&library_prefix(library_id)));
        Ok(())
    }

    /// A live view of a library's items. All watchers of the same library
    /// share one store subscription.
    pub fn watch_items(
        &self,
        library_id: &str,
    ) -> Result<WatchStream<Vec<ReviewItem>>, SyncError> {
        let query = Query::Library(library_id.to_string());
        let key = query.key();
        let store = self.store.clone();
        self.hub.subscribe(&key, move |tx| {
            store.listen(
                query,
                Arc::new(move |items| {
                    // Send fails only when every consumer is gone; the
                    // upstream is being torn down then anyway.
                    let _ = tx.send(items);
                }),
            )
        })
    }
}
