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

//! The document-store collaborator.
//!
//! `DocumentStore` is the seam between the sync layer and whatever backend
//! holds the documents. `listen` follows the real-time store contract: the
//! callback receives the full updated result set on every change, starting
//! with an asynchronous initial snapshot, and must tolerate duplicate
//! invocations.

pub mod memory;
pub mod sqlite;

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use smartlearn_core::ReviewItem;
use smartlearn_core::ScheduleState;

use crate::error::SyncError;

/// Receives the full updated result set of a listened query.
pub type ChangeCallback = Arc<dyn Fn(Vec<ReviewItem>) + Send + Sync>;

/// Keeps a `listen` subscription alive. Dropping the handle clears the
/// liveness flag, so snapshots still in flight are discarded, and then
/// detaches the listener from the store.
pub struct ListenerHandle {
    alive: Arc<AtomicBool>,
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerHandle {
    pub fn new(alive: Arc<AtomicBool>, detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            alive,
            detach: Some(Box::new(detach)),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

/// A live query over the store.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Query {
    /// All items in a library.
    Library(String),
    /// Favorite items in a library.
    Favorites(String),
}

impl Query {
    pub fn matches(&self, item: &ReviewItem) -> bool {
        match self {
            Query::Library(library_id) => &item.library_id == library_id,
            Query::Favorites(library_id) => &item.library_id == library_id && item.favorite,
        }
    }

    /// The library this query ranges over.
    pub fn library_id(&self) -> &str {
        match self {
            Query::Library(library_id) => library_id,
            Query::Favorites(library_id) => library_id,
        }
    }

    /// The watch/cache key for this query's result set.
    pub fn key(&self) -> String {
        match self {
            Query::Library(library_id) => format!("library:{library_id}:items"),
            Query::Favorites(library_id) => format!("library:{library_id}:favorites"),
        }
    }
}

/// A write operation against the store.
#[derive(Clone, PartialEq, Debug)]
pub enum Mutation {
    Upsert(ReviewItem),
    SetFavorite { item_id: String, favorite: bool },
    UpdateSchedule { item_id: String, schedule: ScheduleState },
    Remove { item_id: String },
}

pub trait DocumentStore: Send + Sync + 'static {
    fn fetch_one(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<ReviewItem>, SyncError>> + Send;

    fn fetch_many(
        &self,
        ids: &[String],
    ) -> impl Future<Output = Result<Vec<ReviewItem>, SyncError>> + Send;

    fn query(
        &self,
        query: &Query,
    ) -> impl Future<Output = Result<Vec<ReviewItem>, SyncError>> + Send;

    /// Establishes a change-stream subscription. The callback first
    /// receives the current result set (asynchronously), then the full
    /// updated result set after every matching mutation. The subscription
    /// lives as long as the returned handle.
    fn listen(&self, query: Query, on_change: ChangeCallback) -> Result<ListenerHandle, SyncError>;

    fn mutate(&self, op: Mutation) -> impl Future<Output = Result<(), SyncError>> + Send;

    /// The distinct library ids present in the store.
    fn libraries(&self) -> impl Future<Output = Result<Vec<String>, SyncError>> + Send;
}

/// Durable cross-session settings, keyed by string.
pub trait SettingsStore: Send + Sync {
    fn get_item(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, SyncError>> + Send;

    fn set_item(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;
}

/// Listener bookkeeping shared by the store backends.
struct RegisteredListener {
    id: u64,
    query: Query,
    alive: Arc<AtomicBool>,
    callback: ChangeCallback,
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: Arc<Mutex<Vec<RegisteredListener>>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns its handle, plus the liveness flag
    /// for the initial snapshot delivery.
    pub(crate) fn register(
        &self,
        query: Query,
        callback: ChangeCallback,
    ) -> (ListenerHandle, Arc<AtomicBool>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let alive = Arc::new(AtomicBool::new(true));
        {
            let mut listeners = self.listeners.lock().unwrap();
            listeners.push(RegisteredListener {
                id,
                query,
                alive: alive.clone(),
                callback,
            });
        }
        let listeners = self.listeners.clone();
        let handle = ListenerHandle::new(alive.clone(), move || {
            let mut listeners = listeners.lock().unwrap();
            listeners.retain(|l| l.id != id);
        });
        (handle, alive)
    }

    /// The queries of live listeners affected by a change to `library_id`.
    pub(crate) fn affected_queries(&self, library_id: &str) -> Vec<(Query, ChangeCallback, Arc<AtomicBool>)> {
        let listeners = self.listeners.lock().unwrap();
        listeners
            .iter()
            .filter(|l| l.alive.load(Ordering::SeqCst) && l.query.library_id() == library_id)
            .map(|l| (l.query.clone(), l.callback.clone(), l.alive.clone()))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use smartlearn_core::Timestamp;

    use super::*;

    fn make(s: &str) -> Timestamp {
        Timestamp::try_from(s.to_string()).unwrap()
    }

    fn item(id: &str, library_id: &str, favorite: bool) -> ReviewItem {
        let mut item = ReviewItem::new(
            id,
            library_id,
            "term",
            "definition",
            make("2024-01-01T12:00:00.000"),
        );
        item.favorite = favorite;
        item
    }

    #[test]
    fn test_query_matching() {
        let plain = item("a", "lib1", false);
        let starred = item("b", "lib1", true);
        let other = item("c", "lib2", true);
        let library = Query::Library("lib1".to_string());
        let favorites = Query::Favorites("lib1".to_string());
        assert!(library.matches(&plain));
        assert!(library.matches(&starred));
        assert!(!library.matches(&other));
        assert!(!favorites.matches(&plain));
        assert!(favorites.matches(&starred));
        assert!(!favorites.matches(&other));
    }

    #[test]
    fn test_query_keys() {
        assert_eq!(
            Query::Library("lib1".to_string()).key(),
            "library:lib1:items"
        );
        assert_eq!(
            Query::Favorites("lib1".to_string()).key(),
            "library:lib1:favorites"
        );
    }

    #[test]
    fn test_dropping_handle_deregisters() {
        let registry = ListenerRegistry::new();
        let (handle, alive) = registry.register(
            Query::Library("lib1".to_string()),
            Arc::new(|_| {}),
        );
        assert!(handle.is_alive());
        assert_eq!(registry.len(), 1);
        drop(handle);
        assert!(!alive.load(Ordering::SeqCst));
        assert_eq!(registry.len(), 0);
    }
}
