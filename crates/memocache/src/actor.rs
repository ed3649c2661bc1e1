use std::collections::HashMap;
use std::collections::hash_map;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::computation::Computation;
use crate::config::CacheConfig;
use crate::error::{CacheEntry, CacheError};

/// A slot in the arbiter's table, using the same latch protocol as `Memo`:
/// written exactly once, read by any number of current and future waiters.
type Slot<C> = watch::Receiver<Option<CacheEntry<C>>>;

enum Message<C: Computation> {
    /// A lookup, carrying a reply channel for exactly one result.
    Get {
        key: C::Key,
        reply: oneshot::Sender<CacheEntry<C>>,
    },
    /// Drop the entry of a failed computation (`cache_errors` disabled).
    Evict { key: C::Key },
    /// Stop the arbiter; later lookups fail with [`CacheError::Closed`].
    Shutdown,
}

/// A memoization cache whose table is exclusively owned by a background
/// arbiter task.
///
/// This is the message-passing twin of [`Memo`](crate::Memo): instead of a
/// table mutex, all lookups are requests sent to a single task that owns the
/// table outright. The arbiter spawns one detached worker per new key (so
/// computations run to completion even if every requester gives up) and one
/// short-lived forwarder per request, which exits as soon as its one reply is
/// delivered or abandoned.
///
/// The handle is cheap to clone. [`close`](Self::close) terminates the
/// arbiter; dropping all handles has the same effect.
pub struct CacheActor<C: Computation> {
    requests: mpsc::UnboundedSender<Message<C>>,
}

impl<C: Computation> fmt::Debug for CacheActor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheActor")
            .field("closed", &self.requests.is_closed())
            .finish()
    }
}

impl<C: Computation> Clone for CacheActor<C> {
    fn clone(&self) -> Self {
        CacheActor {
            requests: self.requests.clone(),
        }
    }
}

impl<C: Computation> CacheActor<C> {
    /// Spawns an arbiter with an empty table and the default configuration.
    pub fn new(driver: C) -> Self {
        Self::with_config(driver, CacheConfig::default())
    }

    /// Spawns an arbiter with an empty table.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_config(driver: C, config: CacheConfig) -> Self {
        let (requests, inbox) = mpsc::unbounded_channel();
        let server = Server {
            driver: Arc::new(driver),
            config,
            table: HashMap::new(),
            // A weak sender, so that the arbiter and its workers do not keep
            // their own inbox alive once all handles are gone.
            requests: requests.downgrade(),
        };
        tokio::spawn(server.run(inbox));
        CacheActor { requests }
    }

    /// Looks up `key`, computing it if necessary.
    ///
    /// Same contract as [`Memo::get`](crate::Memo::get), with one addition:
    /// after [`close`](Self::close) this fails with [`CacheError::Closed`].
    pub async fn get(&self, key: C::Key) -> CacheEntry<C> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Message::Get { key, reply })
            .map_err(|_| CacheError::Closed)?;
        response.await.map_err(|_| CacheError::Closed)?
    }

    /// Terminates the background arbiter task.
    ///
    /// Requests already accepted are still answered; computations in flight
    /// run to completion. Lookups sent after the shutdown is processed fail
    /// with [`CacheError::Closed`].
    pub fn close(&self) {
        let _ = self.requests.send(Message::Shutdown);
    }
}

/// The arbiter: sole owner of the table, serializing all structural access
/// through its inbox. It never runs driver code itself.
struct Server<C: Computation> {
    driver: Arc<C>,
    config: CacheConfig,
    table: HashMap<C::Key, Slot<C>>,
    requests: mpsc::WeakUnboundedSender<Message<C>>,
}

impl<C: Computation> Server<C> {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Message<C>>) {
        while let Some(message) = inbox.recv().await {
            match message {
                Message::Get { key, reply } => self.handle_get(key, reply),
                Message::Evict { key } => {
                    self.table.remove(&key);
                }
                Message::Shutdown => break,
            }
        }
        tracing::debug!(cache = %self.config.name, "cache arbiter stopped");
    }

    fn handle_get(&mut self, key: C::Key, reply: oneshot::Sender<CacheEntry<C>>) {
        let slot = match self.table.entry(key.clone()) {
            hash_map::Entry::Occupied(slot) => {
                tracing::trace!(
                    cache = %self.config.name,
                    key = ?key,
                    "joining cached or in-flight entry"
                );
                slot.get().clone()
            }
            hash_map::Entry::Vacant(vacant) => {
                let (tx, rx) = watch::channel(None);
                vacant.insert(rx.clone());
                self.spawn_worker(key, tx);
                rx
            }
        };

        // One forwarder per request. Sending into a dropped reply channel
        // fails silently, so an abandoned requester leaks no task.
        tokio::spawn(async move {
            let mut slot = slot;
            if let Ok(result) = slot.wait_for(Option::is_some).await {
                if let Some(result) = result.as_ref() {
                    let _ = reply.send(result.clone());
                }
            }
        });
    }

    /// Spawns the single worker that computes and publishes `key`.
    fn spawn_worker(&self, key: C::Key, slot: watch::Sender<Option<CacheEntry<C>>>) {
        tracing::trace!(cache = %self.config.name, key = ?key, "computing new entry");

        let driver = Arc::clone(&self.driver);
        let cache_errors = self.config.cache_errors;
        let requests = self.requests.clone();
        tokio::spawn(async move {
            let result = driver
                .compute(key.clone())
                .await
                .map(Arc::new)
                .map_err(CacheError::Computation);

            if result.is_err() && !cache_errors {
                // Waiters already on this slot still observe the error; the
                // eviction only affects lookups arriving afterwards.
                if let Some(requests) = requests.upgrade() {
                    let _ = requests.send(Message::Evict { key });
                }
            }
            slot.send_replace(Some(result));
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use futures::join;
    use tokio::time::{self, Instant};

    use crate::testutils::{Lookup, TestError};

    use super::*;

    #[tokio::test]
    async fn test_coalesced_gets_compute_once() {
        time::pause();

        let lookup = Lookup::new(Duration::from_millis(100));
        let calls = lookup.calls();
        let cache = CacheActor::new(lookup);

        let start = Instant::now();
        let results = join!(cache.get("slow-a"), cache.get("slow-a"), cache.get("slow-a"));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*results.0.unwrap(), "SLOW-A");
        assert_eq!(results.1, results.2);
        // One shared 100ms computation, not one per caller.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_late_arrival_hits_cache() {
        let lookup = Lookup::new(Duration::ZERO);
        let calls = lookup.calls();
        let cache = CacheActor::new(lookup);

        let first = cache.get("a").await.unwrap();
        let second = cache.get("a").await.unwrap();

        assert_eq!(*first, "A");
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unrelated_keys_do_not_block() {
        time::pause();

        let lookup = Lookup::new(Duration::from_secs(1));
        let calls = lookup.calls();
        let cache = CacheActor::new(lookup);

        let slow = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get("slow").await }
        });
        tokio::task::yield_now().await;

        let start = Instant::now();
        let fast = cache.get("fast").await.unwrap();
        assert_eq!(*fast, "FAST");
        // Bounded by a small constant, not by the slow key's second.
        assert!(start.elapsed() < Duration::from_millis(100));

        let slow = slow.await.unwrap().unwrap();
        assert_eq!(*slow, "SLOW");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_error_replayed_from_cache() {
        let lookup = Lookup::new(Duration::ZERO);
        let calls = lookup.calls();
        let cache = CacheActor::new(lookup);

        let first = cache.get("err-x").await;
        let second = cache.get("err-x").await;

        assert_eq!(first, Err(CacheError::Computation(TestError::NotFound)));
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_recomputed_when_not_cached() {
        let lookup = Lookup::new(Duration::ZERO);
        let calls = lookup.calls();
        let config = CacheConfig {
            cache_errors: false,
            ..Default::default()
        };
        let cache = CacheActor::with_config(lookup, config);

        assert!(cache.get("err-x").await.is_err());
        // Let the arbiter process the eviction before the second lookup.
        tokio::task::yield_now().await;
        assert!(cache.get("err-x").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_get_after_close_fails() {
        let lookup = Lookup::new(Duration::ZERO);
        let cache = CacheActor::new(lookup);

        assert_eq!(*cache.get("a").await.unwrap(), "A");

        cache.close();
        assert_eq!(cache.get("b").await, Err(CacheError::Closed));
    }

    #[tokio::test]
    async fn test_abandoned_requester_does_not_cancel_computation() {
        time::pause();

        let lookup = Lookup::new(Duration::from_secs(1));
        let calls = lookup.calls();
        let cache = CacheActor::new(lookup);

        let abandoned = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get("slow").await }
        });
        tokio::task::yield_now().await;
        abandoned.abort();

        // The detached worker keeps running; this lookup joins it.
        let result = cache.get("slow").await.unwrap();
        assert_eq!(*result, "SLOW");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
