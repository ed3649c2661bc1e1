//! # Concurrent memoization with request coalescing
//!
//! This crate caches the results of an expensive, idempotent, keyed
//! computation across any number of concurrent callers. It guarantees:
//!
//! - **At-most-once execution**: the computation runs at most once per key,
//!   no matter how many lookups race on it.
//! - **No cross-key blocking**: a slow computation for one key never delays
//!   lookups of unrelated keys. The table is only locked (or, in the arbiter
//!   variant, only owned) for the atomic lookup-or-insert step.
//! - **Consistent results**: every concurrent and subsequent caller of a key
//!   observes the same result, published with a happens-before edge ahead of
//!   the per-key completion latch.
//!
//! ## Variants
//!
//! Two interchangeable implementations share the same contract:
//!
//! - [`Memo`] keeps the table behind a mutex and runs the computation on the
//!   first caller's task. This is the shared-state design.
//! - [`CacheActor`] hands the table to a background arbiter task and turns
//!   every lookup into a message with a reply channel. No lock exists at
//!   all; the arbiter spawns one detached worker per new key. It additionally
//!   supports [`close`](CacheActor::close), after which lookups fail with
//!   [`CacheError::Closed`].
//!
//! ## Failures
//!
//! A failed computation is memoized too: later callers get the same error,
//! not a retry. This is configurable via [`CacheConfig::cache_errors`].
//! The cache never wraps or translates computation errors, and it installs
//! no panic recovery around the driver.
//!
//! Entries are never evicted otherwise; a cache lives as long as its
//! memoization domain, and callers construct one cache per domain rather
//! than sharing a process-wide instance.
//!
//! ## Example
//!
//! ```
//! use futures::future::BoxFuture;
//! use memocache::{Computation, Memo};
//!
//! #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
//! #[error("no number in {0:?}")]
//! struct ParseError(String);
//!
//! struct ParseNumber;
//!
//! impl Computation for ParseNumber {
//!     type Key = String;
//!     type Value = u64;
//!     type Error = ParseError;
//!
//!     fn compute(&self, key: String) -> BoxFuture<'static, Result<u64, ParseError>> {
//!         Box::pin(async move { key.parse().map_err(|_| ParseError(key)) })
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let memo = Memo::new(ParseNumber);
//! let value = memo.get("42".to_owned()).await.unwrap();
//! assert_eq!(*value, 42);
//! # }
//! ```

mod actor;
mod computation;
mod config;
mod error;
mod memo;
mod utils;

#[cfg(test)]
mod testutils;

pub use actor::CacheActor;
pub use computation::Computation;
pub use config::CacheConfig;
pub use error::{CacheEntry, CacheError};
pub use memo::Memo;
