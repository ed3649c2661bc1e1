use std::sync::Arc;

use thiserror::Error;

use crate::computation::Computation;

/// An error returned from a cache lookup.
///
/// Computation errors are part of the cached result: they are stored once and
/// replayed verbatim to every caller of the key, without any wrapping or
/// translation. The cache only adds the [`Closed`](Self::Closed) variant,
/// which is a usage error and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError<E> {
    /// The cache's arbiter task was shut down via
    /// [`CacheActor::close`](crate::CacheActor::close).
    ///
    /// Only returned by the message-passing variant; [`Memo`](crate::Memo)
    /// has no closed state.
    #[error("cache is closed")]
    Closed,

    /// The underlying computation failed.
    ///
    /// Depending on [`CacheConfig::cache_errors`](crate::CacheConfig), this
    /// is either memoized like a value or recomputed on the next lookup.
    #[error(transparent)]
    Computation(E),
}

/// The result of a memoized lookup: the shared value, or the error the
/// computation produced.
pub type CacheEntry<C> =
    Result<Arc<<C as Computation>::Value>, CacheError<<C as Computation>::Error>>;
