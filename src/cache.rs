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

//! TTL cache in front of the document store.
//!
//! De-duplicates reads against the external store: entries are reused until
//! their TTL elapses, concurrent loads of the same key share one loader
//! invocation, and mutations invalidate whole key families by prefix.
//! Not a singleton; the process constructs one and owns it.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;

use chrono::Duration;
use smartlearn_core::Timestamp;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::SyncError;

/// Default entry lifetime in seconds.
pub const DEFAULT_TTL_SECS: i64 = 300;

/// Time source for expiry checks. Injectable so tests can simulate the
/// clock.
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// Builds a composite cache key from its parts: resource type, id, optional
/// sub-scope.
pub fn composite_key(parts: &[&str]) -> String {
    parts.join(":")
}

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    expires_at: Timestamp,
}

type Listener = Arc<dyn Fn(Option<&str>) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Deregisters the listener when dropped.
pub struct InvalidationGuard {
    id: u64,
    listeners: Arc<Mutex<Listeners>>,
}

impl Drop for InvalidationGuard {
    fn drop(&mut self) {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.entries.retain(|(id, _)| *id != self.id);
    }
}

pub struct SyncCache {
    clock: Clock,
    default_ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
    /// One gate per key with a load in flight. Callers racing on a cold key
    /// queue on the gate instead of invoking the loader again.
    pending: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    listeners: Arc<Mutex<Listeners>>,
}

impl SyncCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_clock(default_ttl, Arc::new(Timestamp::now))
    }

    pub fn with_clock(default_ttl: Duration, clock: Clock) -> Self {
        Self {
            clock,
            default_ttl,
            entries: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            listeners: Arc::new(Mutex::new(Listeners::default())),
        }
    }

    fn now(&self) -> Timestamp {
        (self.clock)()
    }

    /// Looks up a live entry. Expired entries are dropped on access.
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        let now = self.now();
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get(key) {
            if entry.expires_at > now {
                return entry.value.clone().downcast::<T>().ok();
            }
            entries.remove(key);
        }
        None
    }

    /// Stores a value under `key`, replacing any previous entry. The entry
    /// expires after `ttl`, or the default TTL if unspecified.
    pub fn set<T: Send + Sync + 'static>(&self, key: &str, value: T, ttl: Option<Duration>) {
        self.set_shared(key, Arc::new(value), ttl);
    }

    fn set_shared(&self, key: &str, value: Arc<dyn Any + Send + Sync>, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let expires_at = Timestamp::new(self.now().into_inner() + ttl);
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), Entry { value, expires_at });
    }

    /// Read-through access: returns the cached value if live, otherwise
    /// invokes `loader`, caches the result, and returns it. A failed load
    /// is returned to the caller and not cached, so the next access
    /// retries.
    pub async fn cached<T, F, Fut>(
        &self,
        key_parts: &[&str],
        ttl: Option<Duration>,
        loader: F,
    ) -> Result<Arc<T>, SyncError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let key = composite_key(key_parts);
        if let Some(value) = self.get::<T>(&key) {
            return Ok(value);
        }
        let gate = {
            let mut pending = self.pending.lock().unwrap();
            pending
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let held = gate.lock().await;
        // Another caller may have completed the load while we queued.
        if let Some(value) = self.get::<T>(&key) {
            return Ok(value);
        }
        let result = loader().await;
        match result {
            Ok(value) => {
                let value = Arc::new(value);
                self.set_shared(&key, value.clone(), ttl);
                self.pending.lock().unwrap().remove(&key);
                drop(held);
                Ok(value)
            }
            Err(err) => {
                self.pending.lock().unwrap().remove(&key);
                drop(held);
                log::debug!("load failed for cache key {key}: {err}");
                Err(err)
            }
        }
    }

    /// Removes every entry whose key starts with `prefix` (all entries if
    /// `prefix` is `None`), then notifies the invalidation listeners in
    /// registration order, synchronously, within the caller's task.
    pub fn invalidate(&self, prefix: Option<&str>) {
        {
            let mut entries = self.entries.lock().unwrap();
            match prefix {
                Some(prefix) => entries.retain(|key, _| !key.starts_with(prefix)),
                None => entries.clear(),
            }
        }
        log::debug!("cache invalidated, prefix: {}", prefix.unwrap_or("<all>"));
        let listeners: Vec<Listener> = {
            let listeners = self.listeners.lock().unwrap();
            listeners.entries.iter().map(|(_, l)| l.clone()).collect()
        };
        for listener in listeners {
            listener(prefix);
        }
    }

    /// Registers an invalidation listener. The listener is detached when
    /// the returned guard drops.
    pub fn on_invalidated(
        &self,
        listener: impl Fn(Option<&str>) + Send + Sync + 'static,
    ) -> InvalidationGuard {
        let mut listeners = self.listeners.lock().unwrap();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));
        InvalidationGuard {
            id,
            listeners: self.listeners.clone(),
        }
    }

    /// The number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = self.now();
        let entries = self.entries.lock().unwrap();
        entries.values().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SyncCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_TTL_SECS))
    }
}
