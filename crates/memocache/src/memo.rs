use std::collections::HashMap;
use std::collections::hash_map;
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::computation::Computation;
use crate::config::CacheConfig;
use crate::error::{CacheEntry, CacheError};
use crate::utils::defer;

/// A slot in the table: the latch all callers of one key rendezvous on.
///
/// `None` means the computation is still in flight. The slot is written
/// exactly once, by the caller that inserted it, and stays read-only
/// afterwards; late subscribers observe the published value immediately.
type Slot<C> = watch::Receiver<Option<CacheEntry<C>>>;

type Table<C> = Arc<Mutex<HashMap<<C as Computation>::Key, Slot<C>>>>;

/// The outcome of the atomic lookup-or-insert on the table.
enum Claim<C: Computation> {
    /// This caller inserted the pending slot and owns the computation.
    Winner(watch::Sender<Option<CacheEntry<C>>>),
    /// Another caller owns the slot; wait on its latch.
    Waiter(Slot<C>),
}

/// A lock-based memoization cache over a [`Computation`].
///
/// Internally deduplicates concurrent lookups: the driver runs at most once
/// per key, no matter how many callers race on it, and a slow computation
/// for one key never delays lookups of unrelated keys. The table mutex is
/// only held for the lookup-or-insert itself, never while computing.
///
/// The computation runs on the task of the caller that first requested the
/// key. If that caller is cancelled mid-computation, the pending slot is
/// dropped and the remaining waiters race to elect a new owner.
pub struct Memo<C: Computation> {
    driver: Arc<C>,
    config: CacheConfig,
    table: Table<C>,
}

impl<C: Computation> fmt::Debug for Memo<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.table.lock().map(|t| t.len()).unwrap_or_default();
        f.debug_struct("Memo")
            .field("config", &self.config)
            .field("entries", &entries)
            .finish()
    }
}

impl<C: Computation> Clone for Memo<C> {
    fn clone(&self) -> Self {
        Memo {
            driver: Arc::clone(&self.driver),
            config: self.config.clone(),
            table: Arc::clone(&self.table),
        }
    }
}

impl<C: Computation> Memo<C> {
    /// Creates a cache with an empty table and the default configuration.
    pub fn new(driver: C) -> Self {
        Self::with_config(driver, CacheConfig::default())
    }

    /// Creates a cache with an empty table.
    pub fn with_config(driver: C, config: CacheConfig) -> Self {
        Memo {
            driver: Arc::new(driver),
            config,
            table: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Looks up `key`, computing it if necessary.
    ///
    /// The first caller for a key runs the driver; every concurrent and
    /// subsequent caller receives a clone of the same result, including a
    /// cached error (see [`CacheConfig::cache_errors`]). This never returns
    /// [`CacheError::Closed`].
    pub async fn get(&self, key: C::Key) -> CacheEntry<C> {
        loop {
            let claim: Claim<C> = {
                let mut table = self.table.lock().unwrap();
                match table.entry(key.clone()) {
                    hash_map::Entry::Occupied(slot) => Claim::Waiter(slot.get().clone()),
                    hash_map::Entry::Vacant(vacant) => {
                        let (tx, rx) = watch::channel(None);
                        vacant.insert(rx);
                        Claim::Winner(tx)
                    }
                }
            };

            match claim {
                Claim::Winner(slot) => return self.compute(key, slot).await,
                Claim::Waiter(mut slot) => {
                    tracing::trace!(
                        cache = %self.config.name,
                        key = ?key,
                        "joining cached or in-flight entry"
                    );
                    if let Ok(result) = slot.wait_for(Option::is_some).await {
                        if let Some(result) = result.as_ref() {
                            return result.clone();
                        }
                    }
                    // The owner was dropped before publishing a result and
                    // its slot is gone from the table. Race for a new one.
                }
            }
        }
    }

    /// Runs the driver for `key` and publishes the result into `slot`.
    async fn compute(&self, key: C::Key, slot: watch::Sender<Option<CacheEntry<C>>>) -> CacheEntry<C> {
        let slot = Arc::new(slot);

        // A pending slot with no owner would block its waiters forever, so
        // remove it from the table if this future is dropped before the
        // result is published.
        let cleanup = {
            let table = Arc::clone(&self.table);
            let slot = Arc::clone(&slot);
            let key = key.clone();
            defer(move || {
                if slot.borrow().is_none() {
                    table.lock().unwrap().remove(&key);
                }
            })
        };

        tracing::trace!(cache = %self.config.name, key = ?key, "computing new entry");

        let result = self
            .driver
            .compute(key.clone())
            .await
            .map(Arc::new)
            .map_err(CacheError::Computation);

        if result.is_err() && !self.config.cache_errors {
            // Current waiters still observe the error through their latch;
            // the next fresh lookup recomputes.
            self.table.lock().unwrap().remove(&key);
        }
        slot.send_replace(Some(result.clone()));
        drop(cleanup);

        result
    }
}
