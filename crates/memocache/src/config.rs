use serde::Deserialize;

/// Configuration for a single memoization cache.
///
/// Callers construct one cache per logical memoization domain, so the
/// defaults are meant to be overridden with struct-update syntax:
///
/// ```
/// use memocache::CacheConfig;
///
/// let config = CacheConfig {
///     name: "symbols".into(),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Human-readable name for this cache, used to tag log output.
    pub name: String,

    /// Whether failed computations are cached.
    ///
    /// When enabled (the default), an error is memoized like any other
    /// result and replayed to every later caller of the key. When disabled,
    /// the entry is dropped once its current waiters have been served, and
    /// the next lookup runs the computation again.
    pub cache_errors: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            name: "memo".into(),
            cache_errors: true,
        }
    }
}
