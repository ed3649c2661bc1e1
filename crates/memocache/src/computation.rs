use std::fmt;
use std::hash::Hash;

use futures::future::BoxFuture;

/// The computation to memoize.
///
/// The driver provides the actual work that is supposed to be cached, as well
/// as the key, value, and error types the cache operates on. One driver
/// instance is shared between all callers of a cache.
pub trait Computation: Send + Sync + 'static {
    /// Identifies one unit of memoized work, for example a URL.
    type Key: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static;

    /// The computed payload. Callers receive it behind an [`Arc`](std::sync::Arc).
    type Value: Send + Sync + 'static;

    /// A failed computation.
    ///
    /// Failures are broadcast to every caller of the key, which is why they
    /// have to be `Clone`.
    type Error: std::error::Error + Clone + Send + Sync + 'static;

    /// Runs the computation for `key`.
    ///
    /// The cache invokes this at most once per key, and never while holding
    /// any lock. The returned future must be `'static`, so a driver holding
    /// state clones whatever it needs into the future.
    fn compute(&self, key: Self::Key) -> BoxFuture<'static, Result<Self::Value, Self::Error>>;
}
