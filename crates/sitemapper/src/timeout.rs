use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::AbortHandle;
use tokio::task::JoinHandle;

/// Book-keeping of the cancellation timers armed for in-flight requests.
///
/// Timers are keyed by a per-request token rather than by URL, so two
/// concurrent fetches of the same sitemap never clear each other's timer.
#[derive(Debug, Clone, Default)]
pub struct TimeoutRegistry {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_token: AtomicU64,
    timers: Mutex<HashMap<u64, Timer>>,
}

#[derive(Debug)]
struct Timer {
    url: String,
    handle: JoinHandle<()>,
}

impl TimeoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts `request` once `duration` elapses, unless the returned guard
    /// is dropped first. Must be called from within a tokio runtime.
    pub fn arm(&self, url: &str, duration: Duration, request: AbortHandle) -> TimeoutGuard {
        let token = self.inner.next_token.fetch_add(1, Ordering::SeqCst);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            request.abort();
        });
        let timer = Timer {
            url: url.to_string(),
            handle,
        };
        self.timers().insert(token, timer);

        TimeoutGuard {
            registry: self.clone(),
            token,
        }
    }

    /// Number of timers currently armed.
    pub fn in_flight(&self) -> usize {
        self.timers().len()
    }

    /// URLs of the requests currently guarded by a timer.
    pub fn urls(&self) -> Vec<String> {
        self.timers().values().map(|t| t.url.clone()).collect()
    }

    fn clear(&self, token: u64) {
        if let Some(timer) = self.timers().remove(&token) {
            timer.handle.abort();
        }
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<u64, Timer>> {
        self.inner
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears its timer when dropped, whether the request settled or was abandoned.
#[derive(Debug)]
pub struct TimeoutGuard {
    registry: TimeoutRegistry,
    token: u64,
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        self.registry.clear(self.token);
    }
}
