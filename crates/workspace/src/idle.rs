//! Per-frame idle timeouts
//!
//! A url with `idle_timeout_minutes` gets a timer when it is activated. Any
//! interaction bubbling out of its frame re-arms the timer. On expiry the url
//! is unloaded through the store, which keeps the store authoritative; the
//! mount manager then destroys the frame in response to the store event.

use crate::store::WeakIframeStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Interaction events that count as activity inside a frame container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    PointerDown,
    PointerMove,
    KeyDown,
    Wheel,
    TouchStart,
    Focus,
    Scroll,
}

impl InteractionKind {
    pub const ALL: [InteractionKind; 7] = [
        InteractionKind::PointerDown,
        InteractionKind::PointerMove,
        InteractionKind::KeyDown,
        InteractionKind::Wheel,
        InteractionKind::TouchStart,
        InteractionKind::Focus,
        InteractionKind::Scroll,
    ];
}

struct IdleTimer {
    timeout: Duration,
    task: JoinHandle<()>,
}

/// Idle timers keyed by url id
pub struct IdleTimers {
    store: WeakIframeStore,
    timers: HashMap<String, IdleTimer>,
}

impl IdleTimers {
    pub fn new(store: WeakIframeStore) -> Self {
        Self {
            store,
            timers: HashMap::new(),
        }
    }

    /// Start (or restart) the timer for `url_id`
    pub fn arm(&mut self, url_id: &str, timeout: Duration) {
        self.cancel(url_id);

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime available; idle timeout for {} disabled", url_id);
                return;
            }
        };

        let store = self.store.clone();
        let id = url_id.to_string();
        let task = handle.spawn(async move {
            tokio::time::sleep(timeout).await;
            match store.upgrade() {
                Some(store) => {
                    info!("Url {} idle for {:?}; unloading", id, timeout);
                    store.unload_iframe(&id);
                }
                None => debug!("Idle timer for {} fired after store was dropped", id),
            }
        });
        self.timers.insert(url_id.to_string(), IdleTimer { timeout, task });
    }

    /// Re-arm after activity; false if `url_id` has no timer
    pub fn touch(&mut self, url_id: &str) -> bool {
        let Some(timeout) = self.timers.get(url_id).map(|t| t.timeout) else {
            return false;
        };
        self.arm(url_id, timeout);
        true
    }

    pub fn cancel(&mut self, url_id: &str) -> bool {
        match self.timers.remove(url_id) {
            Some(timer) => {
                timer.task.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.task.abort();
        }
    }

    pub fn is_armed(&self, url_id: &str) -> bool {
        self.timers
            .get(url_id)
            .is_some_and(|t| !t.task.is_finished())
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl Drop for IdleTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Timeout configured for a url, if any
pub fn idle_timeout(minutes: Option<u32>) -> Option<Duration> {
    match minutes {
        Some(0) | None => None,
        Some(m) => Some(Duration::from_secs(u64::from(m) * 60)),
    }
}
