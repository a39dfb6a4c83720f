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

//! Reference-counted fan-out of store change streams.
//!
//! One upstream `listen` subscription exists per key, shared by every
//! consumer of that key over a broadcast channel. The upstream listener is
//! torn down when the last consumer detaches.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::error::SyncError;
use crate::store::ListenerHandle;

/// Buffered updates per watch before slow consumers start lagging.
const CHANNEL_CAPACITY: usize = 64;

struct SharedWatch<T> {
    tx: broadcast::Sender<T>,
    subscribers: usize,
    // Held so the upstream listener detaches when the watch is removed.
    _upstream: ListenerHandle,
}

type WatchMap<T> = Arc<Mutex<HashMap<String, SharedWatch<T>>>>;

pub struct WatchHub<T: Clone + Send + 'static> {
    watches: WatchMap<T>,
}

impl<T: Clone + Send + 'static> WatchHub<T> {
    pub fn new() -> Self {
        Self {
            watches: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Attaches a consumer to the watch for `key`. The first consumer
    /// establishes the upstream subscription by calling `establish` with
    /// the shared sender; later consumers reuse it.
    pub fn subscribe<F>(&self, key: &str, establish: F) -> Result<WatchStream<T>, SyncError>
    where
        F: FnOnce(broadcast::Sender<T>) -> Result<ListenerHandle, SyncError>,
    {
        let mut watches = self.watches.lock().unwrap();
        if let Some(shared) = watches.get_mut(key) {
            shared.subscribers += 1;
            let rx = shared.tx.subscribe();
            return Ok(WatchStream {
                key: key.to_string(),
                rx,
                watches: self.watches.clone(),
            });
        }
        let (tx, rx) = broadcast::channel(CHANNEL_CAPACITY);
        let upstream = establish(tx.clone())?;
        log::debug!("watch established for {key}");
        watches.insert(
            key.to_string(),
            SharedWatch {
                tx,
                subscribers: 1,
                _upstream: upstream,
            },
        );
        Ok(WatchStream {
            key: key.to_string(),
            rx,
            watches: self.watches.clone(),
        })
    }

    /// The number of keys with a live upstream subscription.
    pub fn active_watches(&self) -> usize {
        self.watches.lock().unwrap().len()
    }
}

impl<T: Clone + Send + 'static> Default for WatchHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A consumer's view of a shared watch. Dropping the stream detaches the
/// consumer; the last detach tears down the upstream subscription.
pub struct WatchStream<T: Clone + Send + 'static> {
    key: String,
    rx: broadcast::Receiver<T>,
    watches: WatchMap<T>,
}

impl<T: Clone + Send + 'static> WatchStream<T> {
    /// The next update, or `None` once the watch is closed. A consumer
    /// that fell behind skips to the oldest retained update rather than
    /// erroring out.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("watch {} lagged, skipped {skipped} updates", self.key);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl<T: Clone + Send + 'static> Drop for WatchStream<T> {
    fn drop(&mut self) {
        let mut watches = self.watches.lock().unwrap();
        if let Some(shared) = watches.get_mut(&self.key) {
            shared.subscribers -= 1;
            if shared.subscribers == 0 {
                watches.remove(&self.key);
                log::debug!("watch torn down for {}", self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use super::*;

    fn handle() -> (ListenerHandle, Arc<AtomicBool>) {
        let alive = Arc::new(AtomicBool::new(true));
        let detached = Arc::new(AtomicBool::new(false));
        let detached2 = detached.clone();
        let handle = ListenerHandle::new(alive.clone(), move || {
            detached2.store(true, Ordering::SeqCst);
        });
        (handle, detached)
    }

    #[tokio::test]
    async fn test_single_upstream_shared_by_consumers() {
        let hub: WatchHub<u32> = WatchHub::new();
        let establishes = Arc::new(AtomicUsize::new(0));
        let sender: Arc<Mutex<Option<broadcast::Sender<u32>>>> = Arc::new(Mutex::new(None));

        let mut streams = Vec::new();
        for _ in 0..3 {
            let establishes = establishes.clone();
            let sender = sender.clone();
            let stream = hub
                .subscribe("library:lib1:items", move |tx| {
                    establishes.fetch_add(1, Ordering::SeqCst);
                    *sender.lock().unwrap() = Some(tx);
                    Ok(handle().0)
                })
                .unwrap();
            streams.push(stream);
        }
        assert_eq!(establishes.load(Ordering::SeqCst), 1);
        assert_eq!(hub.active_watches(), 1);

        let tx = sender.lock().unwrap().clone().unwrap();
        tx.send(42).unwrap();
        for stream in streams.iter_mut() {
            assert_eq!(stream.next().await, Some(42));
        }
    }

    #[tokio::test]
    async fn test_last_detach_tears_down_upstream() {
        let hub: WatchHub<u32> = WatchHub::new();
        let (h, detached) = handle();
        let a = hub.subscribe("k", move |_| Ok(h)).unwrap();
        let b = hub.subscribe("k", |_| unreachable!()).unwrap();
        drop(a);
        assert!(!detached.load(Ordering::SeqCst));
        assert_eq!(hub.active_watches(), 1);
        drop(b);
        assert!(detached.load(Ordering::SeqCst));
        assert_eq!(hub.active_watches(), 0);
    }

    #[tokio::test]
    async fn test_establish_failure_propagates() {
        let hub: WatchHub<u32> = WatchHub::new();
        let result = hub.subscribe("k", |_| {
            Err(SyncError::ListenSetupFailed("no backend".to_string()))
        });
        assert!(matches!(result, Err(SyncError::ListenSetupFailed(_))));
        assert_eq!(hub.active_watches(), 0);
        // The failed attempt leaves no residue; the next subscribe retries.
        let (h, _) = handle();
        assert!(hub.subscribe("k", move |_| Ok(h)).is_ok());
    }

    #[tokio::test]
    async fn test_reestablish_after_teardown() {
        let hub: WatchHub<u32> = WatchHub::new();
        let establishes = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let establishes = establishes.clone();
            let stream = hub
                .subscribe("k", move |_| {
                    establishes.fetch_add(1, Ordering::SeqCst);
                    Ok(handle().0)
                })
                .unwrap();
            drop(stream);
        }
        assert_eq!(establishes.load(Ordering::SeqCst), 2);
    }
}
