//! Long-press-to-unload gesture driver
//!
//! The store holds the gesture state machine; this driver owns the periodic
//! tick that advances it. The ticker is aborted on release, on cancel and on
//! drop, so no tick can land after the gesture is over.

use crate::config::LongPressConfig;
use crate::store::IframeStore;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct LongPressDriver {
    store: IframeStore,
    config: LongPressConfig,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl LongPressDriver {
    pub fn new(store: IframeStore, config: LongPressConfig) -> Self {
        Self {
            store,
            config,
            ticker: Mutex::new(None),
        }
    }

    /// Begin holding on `url_id`
    pub fn press(&self, url_id: &str) {
        self.stop_ticker();
        self.store.start_long_press(url_id);

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime available; long press on {} will not advance", url_id);
                return;
            }
        };

        let store = self.store.downgrade();
        let config = self.config.clone();
        let task = handle.spawn(async move {
            let mut ticks = 0u64;
            loop {
                tokio::time::sleep(config.tick_interval()).await;
                ticks += 1;
                let Some(store) = store.upgrade() else {
                    return;
                };
                let progress = config.progress_after(ticks);
                store.update_long_press_progress(progress);
                if progress >= 1.0 {
                    debug!("Long press reached completion after {} ticks", ticks);
                    return;
                }
            }
        });
        *self.ticker.lock() = Some(task);
    }

    /// Let go; returns true when the hold was long enough to unload
    pub fn release(&self) -> bool {
        self.stop_ticker();
        self.store.end_long_press()
    }

    /// Abandon the gesture without unloading anything
    pub fn cancel(&self) {
        self.stop_ticker();
        self.store.cancel_long_press();
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn stop_ticker(&self) {
        if let Some(task) = self.ticker.lock().take() {
            task.abort();
        }
    }
}

impl Drop for LongPressDriver {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framedeck_common::{Catalog, Url, UrlGroup};
    use std::time::Duration;

    fn store() -> IframeStore {
        let store = IframeStore::new(Catalog::new(vec![UrlGroup::new(
            "dev",
            "Dev",
            vec![Url::new("u1", "https://a.test")],
        )]));
        store.set_active_url_id("u1");
        store
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_hold_unloads() {
        let store = store();
        let driver = LongPressDriver::new(store.clone(), LongPressConfig::default());

        driver.press("u1");
        tokio::time::sleep(Duration::from_millis(510)).await;
        assert_eq!(store.snapshot().long_press_progress(), 1.0);
        assert!(!driver.is_ticking());

        assert!(driver.release());
        assert_eq!(store.active_url_id(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_release_cancels() {
        let store = store();
        let driver = LongPressDriver::new(store.clone(), LongPressConfig::default());

        driver.press("u1");
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!((store.snapshot().long_press_progress() - 0.4).abs() < f32::EPSILON);

        assert!(!driver.release());
        assert!(!driver.is_ticking());

        // no stray tick may revive the gesture
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        let state = store.snapshot();
        assert!(!state.is_long_pressing());
        assert_eq!(state.active_url_id.as_deref(), Some("u1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_at_completion_keeps_frame() {
        let store = store();
        let driver = LongPressDriver::new(store.clone(), LongPressConfig::default());

        driver.press("u1");
        tokio::time::sleep(Duration::from_millis(600)).await;
        driver.cancel();
        assert!(!driver.release());
        assert_eq!(store.active_url_id().as_deref(), Some("u1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_ticker() {
        let store = store();
        {
            let driver = LongPressDriver::new(store.clone(), LongPressConfig::default());
            driver.press("u1");
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        let before = store.snapshot().long_press_progress();
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(store.snapshot().long_press_progress(), before);
    }

    #[test]
    fn test_press_without_runtime_still_tracks_gesture() {
        let store = store();
        let driver = LongPressDriver::new(store.clone(), LongPressConfig::default());
        driver.press("u1");
        assert_eq!(store.snapshot().long_press_url_id(), Some("u1"));
        assert!(!driver.release());
    }
}
