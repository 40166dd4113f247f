use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Bounds how many futures run at once.
///
/// Permits are handed out in the order futures first ask for them, so
/// futures polled in declaration order are also admitted in that order.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    permits: Arc<Semaphore>,
}

impl ConcurrencyLimiter {
    /// `concurrency` is kept within `1..=Semaphore::MAX_PERMITS`.
    pub fn new(concurrency: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency.clamp(1, Semaphore::MAX_PERMITS))),
        }
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for a permit, then drives `fut` to completion while holding it.
    pub async fn run<F>(&self, fut: F) -> F::Output
    where
        F: Future,
    {
        // The semaphore is never closed, a failed acquire can't happen.
        let _permit = self.permits.acquire().await.ok();
        fut.await
    }
}
