//! Hover-triggered prefetching.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::router::Router;

/// Default delay between a hover and the prefetch it triggers.
pub const PREFETCH_DELAY: Duration = Duration::from_millis(20);

#[derive(Debug, Default)]
struct SchedulerState {
    generation: u64,
    seen: HashSet<String>,
}

/// Debounces pointer events into [`Router::prefetch`] calls.
///
/// Only the last hover within the delay fires, and each URL is prefetched
/// at most once.
#[derive(Clone)]
pub struct PrefetchScheduler {
    router: Router,
    delay: Duration,
    state: Arc<Mutex<SchedulerState>>,
}

impl PrefetchScheduler {
    pub fn new(router: Router) -> Self {
        Self::with_delay(router, PREFETCH_DELAY)
    }

    pub fn with_delay(router: Router, delay: Duration) -> Self {
        Self {
            router,
            delay,
            state: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }

    /// Pointer entered a link (or touch started).
    ///
    /// Returns the pending task, or `None` when the URL was already
    /// prefetched or cannot be resolved.
    pub fn hover(&self, target: &str) -> Option<JoinHandle<()>> {
        let mut url = match self.router.resolve(target) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(link = target, error = %e, "Not prefetching unresolvable link");
                return None;
            }
        };
        url.set_fragment(None);
        let key = url.to_string();

        let generation = {
            let mut state = self.state.lock();
            if state.seen.contains(&key) {
                return None;
            }
            state.generation += 1;
            state.generation
        };

        let scheduler = self.clone();
        Some(tokio::spawn(async move {
            tokio::time::sleep(scheduler.delay).await;

            {
                let mut state = scheduler.state.lock();
                if state.generation != generation || !state.seen.insert(key.clone()) {
                    return;
                }
            }

            if let Err(e) = scheduler.router.prefetch(&key).await {
                tracing::warn!(url = %key, error = %e, "Prefetch failed");
                scheduler.state.lock().seen.remove(&key);
            }
        }))
    }

    /// Pointer left before the delay elapsed.
    pub fn leave(&self) {
        self.state.lock().generation += 1;
    }

    /// Whether `target` has already been prefetched.
    pub fn is_prefetched(&self, target: &str) -> bool {
        let Ok(mut url) = self.router.resolve(target) else {
            return false;
        };
        url.set_fragment(None);
        self.state.lock().seen.contains(url.as_str())
    }
}
