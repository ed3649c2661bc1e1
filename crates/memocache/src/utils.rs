/// Runs a cleanup closure when dropped.
///
/// [`Memo`](crate::Memo) arms one of these before running a computation, so
/// the pending table slot is released even if the computing caller's future
/// is dropped mid-flight. The closure must not panic: it may run while the
/// stack is already unwinding.
pub struct DeferGuard<F: FnOnce()> {
    cleanup: Option<F>,
}

impl<F: FnOnce()> Drop for DeferGuard<F> {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

/// Defers `cleanup` until the returned guard is dropped.
pub fn defer<F: FnOnce()>(cleanup: F) -> DeferGuard<F> {
    DeferGuard {
        cleanup: Some(cleanup),
    }
}
