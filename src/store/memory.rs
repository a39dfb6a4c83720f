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

//! In-memory document store for tests and demos.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::Ordering;

use smartlearn_core::ReviewItem;

use crate::error::SyncError;
use crate::store::ChangeCallback;
use crate::store::DocumentStore;
use crate::store::ListenerHandle;
use crate::store::ListenerRegistry;
use crate::store::Mutation;
use crate::store::Query;
use crate::store::SettingsStore;

#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, ReviewItem>>,
    settings: Mutex<HashMap<String, String>>,
    registry: ListenerRegistry,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self, query: &Query) -> Vec<ReviewItem> {
        let items = self.items.lock().unwrap();
        let mut result: Vec<ReviewItem> = items
            .values()
            .filter(|item| query.matches(item))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.id.cmp(&b.id));
        result
    }

    /// Delivers the current result set of every live listener on
    /// `library_id`. Snapshots are computed first so no lock is held while
    /// callbacks run.
    fn notify(&self, library_id: &str) {
        let affected = self.registry.affected_queries(library_id);
        let snapshots: Vec<_> = affected
            .iter()
            .map(|(query, callback, alive)| (self.snapshot(query), callback.clone(), alive.clone()))
            .collect();
        for (snapshot, callback, alive) in snapshots {
            if alive.load(Ordering::SeqCst) {
                callback(snapshot);
            }
        }
    }

    fn apply(&self, op: Mutation) -> Result<String, SyncError> {
        let mut items = self.items.lock().unwrap();
        match op {
            Mutation::Upsert(item) => {
                let library_id = item.library_id.clone();
                items.insert(item.id.clone(), item);
                Ok(library_id)
            }
            Mutation::SetFavorite { item_id, favorite } => match items.get_mut(&item_id) {
                Some(item) => {
                    item.favorite = favorite;
                    Ok(item.library_id.clone())
                }
                None => Err(SyncError::LoadFailed(format!("no such item: {item_id}"))),
            },
            Mutation::UpdateSchedule { item_id, schedule } => match items.get_mut(&item_id) {
                Some(item) => {
                    item.schedule = schedule;
                    Ok(item.library_id.clone())
                }
                None => Err(SyncError::LoadFailed(format!("no such item: {item_id}"))),
            },
            Mutation::Remove { item_id } => match items.remove(&item_id) {
                Some(item) => Ok(item.library_id),
                None => Err(SyncError::LoadFailed(format!("no such item: {item_id}"))),
            },
        }
    }
}

impl DocumentStore for MemoryStore {
    fn fetch_one(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<ReviewItem>, SyncError>> + Send {
        let result = self.items.lock().unwrap().get(id).cloned();
        async move { Ok(result) }
    }

    fn fetch_many(
        &self,
        ids: &[String],
    ) -> impl Future<Output = Result<Vec<ReviewItem>, SyncError>> + Send {
        let items = self.items.lock().unwrap();
        let result: Vec<ReviewItem> = ids.iter().filter_map(|id| items.get(id).cloned()).collect();
        drop(items);
        async move { Ok(result) }
    }

    fn query(
        &self,
        query: &Query,
    ) -> impl Future<Output = Result<Vec<ReviewItem>, SyncError>> + Send {
        let result = self.snapshot(query);
        async move { Ok(result) }
    }

    fn listen(&self, query: Query, on_change: ChangeCallback) -> Result<ListenerHandle, SyncError> {
        let snapshot = self.snapshot(&query);
        let (handle, alive) = self.registry.register(query, on_change.clone());
        // Initial delivery is asynchronous; a consumer that detaches before
        // it lands never observes it.
        tokio::spawn(async move {
            if alive.load(Ordering::SeqCst) {
                on_change(snapshot);
            }
        });
        Ok(handle)
    }

    fn mutate(&self, op: Mutation) -> impl Future<Output = Result<(), SyncError>> + Send {
        let result = self.apply(op);
        if let Ok(library_id) = &result {
            self.notify(library_id);
        }
        async move { result.map(|_| ()) }
    }

    fn libraries(&self) -> impl Future<Output = Result<Vec<String>, SyncError>> + Send {
        let items = self.items.lock().unwrap();
        let mut result: Vec<String> = items.values().map(|i| i.library_id.clone()).collect();
        drop(items);
        result.sort();
        result.dedup();
        async move { Ok(result) }
    }
}

impl SettingsStore for MemoryStore {
    fn get_item(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, SyncError>> + Send {
        let result = self.settings.lock().unwrap().get(key).cloned();
        async move { Ok(result) }
    }

    fn set_item(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), SyncError>> + Send {
        self.settings
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        async move { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use smartlearn_core::ScheduleState;
    use smartlearn_core::Timestamp;
    use tokio::task::yield_now;

    use super::*;

    fn make(s: &str) -> Timestamp {
        Timestamp::try_from(s.to_string()).unwrap()
    }

    fn item(id: &str, library_id: &str) -> ReviewItem {
        ReviewItem::new(id, library_id, "term", "definition", make("2024-01-01T12:00:00.000"))
    }

    #[tokio::test]
    async fn test_upsert_and_fetch() {
        let store = MemoryStore::new();
        store.mutate(Mutation::Upsert(item("a", "lib1"))).await.unwrap();
        let fetched = store.fetch_one("a").await.unwrap().unwrap();
        assert_eq!(fetched.id, "a");
        assert!(store.fetch_one("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_many_skips_missing() {
        let store = MemoryStore::new();
        store.mutate(Mutation::Upsert(item("a", "lib1"))).await.unwrap();
        store.mutate(Mutation::Upsert(item("b", "lib1"))).await.unwrap();
        let ids = vec!["a".to_string(), "missing".to_string(), "b".to_string()];
        let fetched = store.fetch_many(&ids).await.unwrap();
        assert_eq!(fetched.len(), 2);
    }

    #[tokio::test]
    async fn test_query_filters_by_library_and_favorite() {
        let store = MemoryStore::new();
        store.mutate(Mutation::Upsert(item("a", "lib1"))).await.unwrap();
        store.mutate(Mutation::Upsert(item("b", "lib2"))).await.unwrap();
        store
            .mutate(Mutation::SetFavorite {
                item_id: "a".to_string(),
                favorite: true,
            })
            .await
            .unwrap();
        let all = store.query(&Query::Library("lib1".to_string())).await.unwrap();
        assert_eq!(all.len(), 1);
        let favorites = store
            .query(&Query::Favorites("lib1".to_string()))
            .await
            .unwrap();
        assert_eq!(favorites.len(), 1);
        let favorites2 = store
            .query(&Query::Favorites("lib2".to_string()))
            .await
            .unwrap();
        assert!(favorites2.is_empty());
    }

    #[tokio::test]
    async fn test_mutating_missing_item_fails() {
        let store = MemoryStore::new();
        let result = store
            .mutate(Mutation::SetFavorite {
                item_id: "ghost".to_string(),
                favorite: true,
            })
            .await;
        assert!(matches!(result, Err(SyncError::LoadFailed(_))));
    }

    #[tokio::test]
    async fn test_update_schedule() {
        let store = MemoryStore::new();
        store.mutate(Mutation::Upsert(item("a", "lib1"))).await.unwrap();
        let mut schedule = ScheduleState::new(make("2024-01-01T12:00:00.000"));
        schedule.repetition_count = 3;
        store
            .mutate(Mutation::UpdateSchedule {
                item_id: "a".to_string(),
                schedule,
            })
            .await
            .unwrap();
        let fetched = store.fetch_one("a").await.unwrap().unwrap();
        assert_eq!(fetched.schedule.repetition_count, 3);
    }

    #[tokio::test]
    async fn test_listen_delivers_initial_snapshot_and_updates() {
        let store = MemoryStore::new();
        store.mutate(Mutation::Upsert(item("a", "lib1"))).await.unwrap();
        let snapshots: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
        let snapshots2 = snapshots.clone();
        let _handle = store
            .listen(
                Query::Library("lib1".to_string()),
                Arc::new(move |items| {
                    let ids = items.iter().map(|i| i.id.clone()).collect();
                    snapshots2.lock().unwrap().push(ids);
                }),
            )
            .unwrap();
        yield_now().await;
        store.mutate(Mutation::Upsert(item("b", "lib1"))).await.unwrap();
        // A mutation in another library is not delivered.
        store.mutate(Mutation::Upsert(item("c", "lib2"))).await.unwrap();
        let snapshots = snapshots.lock().unwrap();
        assert_eq!(
            *snapshots,
            vec![
                vec!["a".to_string()],
                vec!["a".to_string(), "b".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn test_detach_before_initial_snapshot_discards_it() {
        let store = MemoryStore::new();
        store.mutate(Mutation::Upsert(item("a", "lib1"))).await.unwrap();
        let deliveries = Arc::new(Mutex::new(0usize));
        let deliveries2 = deliveries.clone();
        let handle = store
            .listen(
                Query::Library("lib1".to_string()),
                Arc::new(move |_| {
                    *deliveries2.lock().unwrap() += 1;
                }),
            )
            .unwrap();
        // Detach before the spawned initial delivery runs.
        drop(handle);
        for _ in 0..4 {
            yield_now().await;
        }
        assert_eq!(*deliveries.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_detached_listener_no_longer_notified() {
        let store = MemoryStore::new();
        store.mutate(Mutation::Upsert(item("a", "lib1"))).await.unwrap();
        let deliveries = Arc::new(Mutex::new(0usize));
        let deliveries2 = deliveries.clone();
        let handle = store
            .listen(
                Query::Library("lib1".to_string()),
                Arc::new(move |_| {
                    *deliveries2.lock().unwrap() += 1;
                }),
            )
            .unwrap();
        yield_now().await;
        assert_eq!(*deliveries.lock().unwrap(), 1);
        drop(handle);
        store.mutate(Mutation::Upsert(item("b", "lib1"))).await.unwrap();
        assert_eq!(*deliveries.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_libraries() {
        let store = MemoryStore::new();
        store.mutate(Mutation::Upsert(item("a", "lib2"))).await.unwrap();
        store.mutate(Mutation::Upsert(item("b", "lib1"))).await.unwrap();
        store.mutate(Mutation::Upsert(item("c", "lib1"))).await.unwrap();
        let libraries = store.libraries().await.unwrap();
        assert_eq!(libraries, vec!["lib1".to_string(), "lib2".to_string()]);
    }

    #[tokio::test]
    async fn test_settings_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get_item("theme").await.unwrap().is_none());
        store.set_item("theme", "dark").await.unwrap();
        assert_eq!(store.get_item("theme").await.unwrap().unwrap(), "dark");
    }
}
