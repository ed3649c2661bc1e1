use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::computation::Computation;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestError {
    #[error("not found")]
    NotFound,
}

/// A driver that uppercases its key, counting every invocation.
///
/// Keys starting with `slow` take `delay` to compute, keys starting with
/// `err` fail with [`TestError::NotFound`].
pub struct Lookup {
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl Lookup {
    pub fn new(delay: Duration) -> Self {
        Lookup {
            calls: Arc::new(AtomicUsize::new(0)),
            delay,
        }
    }

    /// The invocation counter, to hold on to after the driver moves into a
    /// cache.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Computation for Lookup {
    type Key = &'static str;
    type Value = String;
    type Error = TestError;

    fn compute(&self, key: Self::Key) -> BoxFuture<'static, Result<String, TestError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay;
        Box::pin(async move {
            if key.starts_with("slow") {
                tokio::time::sleep(delay).await;
            }
            if key.starts_with("err") {
                Err(TestError::NotFound)
            } else {
                Ok(key.to_uppercase())
            }
        })
    }
}
