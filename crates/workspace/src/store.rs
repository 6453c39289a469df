//! Iframe state store
//!
//! Single source of truth for which url is active, which urls have a live
//! frame, and which urls the catalog knows about. The store is a plain
//! observable container: mutations happen synchronously under a lock and
//! subscribers are notified with a [`StoreEvent`] after the lock is
//! released, so a subscriber may call back into the store.
//!
//! No operation here returns an error. Unknown ids, stale persisted values
//! and late gesture ticks are absorbed and logged.

use crate::history::{HistoryCodec, NavigationHistory, NoHistory};
use crate::persistence::Persister;
use framedeck_common::{ActiveUrlPreference, Catalog, Url};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Long-press gesture state
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LongPressState {
    #[default]
    Idle,
    Pressing {
        url_id: String,
        /// Always within [0, 1]
        progress: f32,
    },
}

/// Snapshot of the store's state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IframeState {
    pub active_url_id: Option<String>,
    pub loaded_url_ids: BTreeSet<String>,
    pub known_url_ids: BTreeSet<String>,
    pub long_press: LongPressState,
    /// Reset counter per url id, bumped by `reset_iframe`
    pub generations: HashMap<String, u64>,
}

impl IframeState {
    pub fn is_long_pressing(&self) -> bool {
        matches!(self.long_press, LongPressState::Pressing { .. })
    }

    pub fn long_press_url_id(&self) -> Option<&str> {
        match &self.long_press {
            LongPressState::Pressing { url_id, .. } => Some(url_id),
            LongPressState::Idle => None,
        }
    }

    pub fn long_press_progress(&self) -> f32 {
        match &self.long_press {
            LongPressState::Pressing { progress, .. } => *progress,
            LongPressState::Idle => 0.0,
        }
    }

    pub fn generation(&self, url_id: &str) -> u64 {
        self.generations.get(url_id).copied().unwrap_or(0)
    }

    pub fn is_loaded(&self, url_id: &str) -> bool {
        self.loaded_url_ids.contains(url_id)
    }
}

/// Notification emitted after a state change
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A different url became active (and loaded)
    ActiveChanged { url: Url, previous: Option<String> },
    /// A url joined the loaded set without becoming active
    Loaded { url_id: String, url: Option<Url> },
    /// A url left the loaded set
    Unloaded { url_id: String, was_active: bool },
    /// A frame should reload its current address
    Reset { url_id: String, generation: u64 },
    LongPressChanged(LongPressState),
    CatalogReplaced { pruned: Vec<String> },
}

/// Handle returned by [`IframeStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

/// Progress this close to 1 counts as a completed long press, so that
/// accumulated float steps like 5 x 0.2 still commit
const COMPLETION_TOLERANCE: f32 = 1e-4;

/// How an activation touches navigation history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryMode {
    /// Push a new entry unless the current entry already names the url
    Update,
    /// Overwrite the current entry
    Replace,
    /// Leave history alone (the browser already navigated)
    Skip,
}

struct StoreShared {
    inner: Mutex<StoreInner>,
    subscribers: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
    history: Arc<dyn NavigationHistory>,
    codec: HistoryCodec,
    persister: Option<Arc<Persister>>,
}

struct StoreInner {
    catalog: Arc<Catalog>,
    state: IframeState,
}

/// Observable iframe state container
#[derive(Clone)]
pub struct IframeStore {
    shared: Arc<StoreShared>,
}

/// Non-owning reference to an [`IframeStore`]
#[derive(Clone)]
pub struct WeakIframeStore {
    shared: Weak<StoreShared>,
}

impl WeakIframeStore {
    pub fn upgrade(&self) -> Option<IframeStore> {
        self.shared.upgrade().map(|shared| IframeStore { shared })
    }
}

/// Builder for [`IframeStore`]
pub struct IframeStoreBuilder {
    catalog: Catalog,
    history: Arc<dyn NavigationHistory>,
    codec: HistoryCodec,
    persister: Option<Arc<Persister>>,
}

impl IframeStoreBuilder {
    pub fn history(mut self, history: Arc<dyn NavigationHistory>) -> Self {
        self.history = history;
        self
    }

    pub fn codec(mut self, codec: HistoryCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn persister(mut self, persister: Arc<Persister>) -> Self {
        self.persister = Some(persister);
        self
    }

    pub fn build(self) -> IframeStore {
        let state = IframeState {
            known_url_ids: self.catalog.ids(),
            ..Default::default()
        };
        IframeStore {
            shared: Arc::new(StoreShared {
                inner: Mutex::new(StoreInner {
                    catalog: Arc::new(self.catalog),
                    state,
                }),
                subscribers: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
                history: self.history,
                codec: self.codec,
                persister: self.persister,
            }),
        }
    }
}

impl IframeStore {
    /// Store over `catalog` with no history and no persistence
    pub fn new(catalog: Catalog) -> Self {
        Self::builder(catalog).build()
    }

    pub fn builder(catalog: Catalog) -> IframeStoreBuilder {
        IframeStoreBuilder {
            catalog,
            history: Arc::new(NoHistory),
            codec: HistoryCodec::default(),
            persister: None,
        }
    }

    pub fn downgrade(&self) -> WeakIframeStore {
        WeakIframeStore {
            shared: Arc::downgrade(&self.shared),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn snapshot(&self) -> IframeState {
        self.shared.inner.lock().state.clone()
    }

    pub fn active_url_id(&self) -> Option<String> {
        self.shared.inner.lock().state.active_url_id.clone()
    }

    pub fn loaded_url_ids(&self) -> BTreeSet<String> {
        self.shared.inner.lock().state.loaded_url_ids.clone()
    }

    pub fn known_url_ids(&self) -> BTreeSet<String> {
        self.shared.inner.lock().state.known_url_ids.clone()
    }

    pub fn is_known(&self, url_id: &str) -> bool {
        self.shared.inner.lock().state.known_url_ids.contains(url_id)
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.shared.inner.lock().catalog.clone()
    }

    pub fn find_url(&self, url_id: &str) -> Option<Url> {
        self.shared.inner.lock().catalog.find(url_id).cloned()
    }

    pub fn codec(&self) -> &HistoryCodec {
        &self.shared.codec
    }

    pub fn persister(&self) -> Option<&Arc<Persister>> {
        self.shared.persister.as_ref()
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.shared.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.shared.subscribers.lock().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.shared.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    fn notify(&self, event: &StoreEvent) {
        let listeners: Vec<Listener> = self
            .shared
            .subscribers
            .lock()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    // ========================================================================
    // Activation
    // ========================================================================

    /// Make `url` the active url, loading it if needed
    pub fn set_active_url(&self, url: &Url) {
        self.activate(url, HistoryMode::Update, true);
    }

    /// Activate a url by id; false when the catalog has no such url
    pub fn set_active_url_id(&self, url_id: &str) -> bool {
        match self.find_url(url_id) {
            Some(url) => {
                self.set_active_url(&url);
                true
            }
            None => {
                warn!("Cannot activate {}: not in catalog", url_id);
                false
            }
        }
    }

    fn activate(&self, url: &Url, history: HistoryMode, persist: bool) {
        let event = {
            let mut inner = self.shared.inner.lock();
            if !inner.catalog.contains(&url.id) {
                // Stale catalog on the caller's side; adopt the id so the
                // active-is-known invariant holds until the next prune.
                warn!("Activating url {} which is not in the catalog", url.id);
            }
            let state = &mut inner.state;
            state.known_url_ids.insert(url.id.clone());
            let newly_loaded = state.loaded_url_ids.insert(url.id.clone());
            let previous = state.active_url_id.replace(url.id.clone());
            let changed = newly_loaded || previous.as_deref() != Some(url.id.as_str());
            changed.then(|| StoreEvent::ActiveChanged {
                url: url.clone(),
                previous,
            })
        };

        match &event {
            Some(_) => debug!("Active url is now {}", url.id),
            None => debug!("Url {} already active", url.id),
        }
        if let Some(event) = event {
            self.notify(&event);
        }

        match history {
            HistoryMode::Update => self.update_browser_history(&url.id),
            HistoryMode::Replace => self.shared.history.replace(&self.shared.codec.encode(&url.id)),
            HistoryMode::Skip => {}
        }
        if persist {
            self.save_to_persistence(&url.id);
        }
    }

    // ========================================================================
    // Load set
    // ========================================================================

    /// Force the frame for `url_id` to reload its current address
    pub fn reset_iframe(&self, url_id: &str) {
        let generation = {
            let mut inner = self.shared.inner.lock();
            let counter = inner.state.generations.entry(url_id.to_string()).or_insert(0);
            *counter += 1;
            *counter
        };
        debug!("Reset {} (generation {})", url_id, generation);
        self.notify(&StoreEvent::Reset {
            url_id: url_id.to_string(),
            generation,
        });
    }

    /// Drop the frame for `url_id`; clears the active url if it was active
    pub fn unload_iframe(&self, url_id: &str) {
        if self.remove_loaded(url_id) {
            info!("Unloaded {}", url_id);
        }
    }

    /// Load `url_id` again without making it active
    pub fn reload_iframe(&self, url_id: &str) {
        if self.find_url(url_id).is_none() {
            warn!("Cannot reload {}: not in catalog", url_id);
            return;
        }
        self.add_loaded_url_id(url_id);
    }

    pub fn add_loaded_url_id(&self, url_id: &str) {
        let event = {
            let mut inner = self.shared.inner.lock();
            let url = inner.catalog.find(url_id).cloned();
            if url.is_none() {
                warn!("Loading url {} which is not in the catalog", url_id);
            }
            inner
                .state
                .loaded_url_ids
                .insert(url_id.to_string())
                .then(|| StoreEvent::Loaded {
                    url_id: url_id.to_string(),
                    url,
                })
        };
        if let Some(event) = event {
            self.notify(&event);
        }
    }

    pub fn remove_loaded_url_id(&self, url_id: &str) {
        self.remove_loaded(url_id);
    }

    fn remove_loaded(&self, url_id: &str) -> bool {
        let event = {
            let mut inner = self.shared.inner.lock();
            let state = &mut inner.state;
            if !state.loaded_url_ids.remove(url_id) {
                None
            } else {
                let was_active = state.active_url_id.as_deref() == Some(url_id);
                if was_active {
                    state.active_url_id = None;
                }
                Some(StoreEvent::Unloaded {
                    url_id: url_id.to_string(),
                    was_active,
                })
            }
        };

        match event {
            Some(event) => {
                self.notify(&event);
                true
            }
            None => {
                debug!("Unload of {} ignored: not loaded", url_id);
                false
            }
        }
    }

    // ========================================================================
    // Side effects
    // ========================================================================

    /// Push a history entry for `url_id`, or replace the current entry when it
    /// already names that url
    pub fn update_browser_history(&self, url_id: &str) {
        let codec = &self.shared.codec;
        let location = codec.encode(url_id);
        let current = self
            .shared
            .history
            .current()
            .and_then(|loc| codec.decode(&loc));
        if current.as_deref() == Some(url_id) {
            self.shared.history.replace(&location);
        } else {
            self.shared.history.push(&location);
        }
    }

    /// Fire-and-forget durable write of the active url
    pub fn save_to_persistence(&self, url_id: &str) {
        match &self.shared.persister {
            Some(persister) => persister.save(url_id),
            None => debug!("No preference store configured; not persisting {}", url_id),
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Re-activate the url encoded in `location` after back/forward navigation
    pub fn handle_popstate(&self, location: &str) -> bool {
        let Some(url_id) = self.shared.codec.decode(location) else {
            debug!("Popstate to {} carries no url id", location);
            return false;
        };
        match self.find_url(&url_id) {
            Some(url) => {
                self.activate(&url, HistoryMode::Skip, true);
                true
            }
            None => {
                warn!("Popstate to unknown url {}", url_id);
                false
            }
        }
    }

    /// Restore the active url at session start.
    ///
    /// The id in `location` wins over the persisted one. Ids missing from the
    /// catalog are pruned, never activated; a stale persisted id is cleared
    /// from the durable store.
    pub fn hydrate(
        &self,
        location: Option<&str>,
        persisted: Option<ActiveUrlPreference>,
    ) -> Option<String> {
        let persisted_id = persisted.and_then(|p| p.active_url_id);
        let persisted_url = persisted_id.as_deref().and_then(|id| self.find_url(id));
        if let (Some(id), None) = (&persisted_id, &persisted_url) {
            warn!("Pruning stale persisted url id {}", id);
        }

        let location_id = location.and_then(|loc| self.shared.codec.decode(loc));
        if let Some(id) = &location_id {
            match self.find_url(id) {
                Some(url) => {
                    let persist = persisted_id.as_deref() != Some(id.as_str());
                    self.activate(&url, HistoryMode::Skip, persist);
                    info!("Hydrated active url {} from location", id);
                    return Some(url.id);
                }
                None => warn!("Ignoring unknown url id {} in location", id),
            }
        }

        if let Some(url) = persisted_url {
            self.activate(&url, HistoryMode::Replace, false);
            info!("Hydrated active url {} from preferences", url.id);
            return Some(url.id);
        }

        if persisted_id.is_some() {
            if let Some(persister) = &self.shared.persister {
                persister.spawn_write(ActiveUrlPreference::default());
            }
        }
        None
    }

    /// Swap in a new catalog, unloading every url it no longer contains
    pub fn replace_catalog(&self, catalog: Catalog) -> Vec<String> {
        let (pruned, cancel_gesture) = {
            let mut inner = self.shared.inner.lock();
            let known = catalog.ids();
            let pruned: Vec<String> = inner
                .state
                .loaded_url_ids
                .iter()
                .filter(|id| !known.contains(*id))
                .cloned()
                .collect();
            let cancel_gesture = matches!(
                inner.state.long_press_url_id(),
                Some(id) if !known.contains(id)
            );
            inner.state.generations.retain(|id, _| known.contains(id));
            inner.state.known_url_ids = known;
            inner.catalog = Arc::new(catalog);
            (pruned, cancel_gesture)
        };

        if cancel_gesture {
            self.cancel_long_press();
        }
        for url_id in &pruned {
            self.remove_loaded(url_id);
        }
        info!("Catalog replaced; pruned {} url(s)", pruned.len());
        self.notify(&StoreEvent::CatalogReplaced {
            pruned: pruned.clone(),
        });
        pruned
    }

    // ========================================================================
    // Long press
    // ========================================================================

    pub fn start_long_press(&self, url_id: &str) {
        let state = LongPressState::Pressing {
            url_id: url_id.to_string(),
            progress: 0.0,
        };
        {
            let mut inner = self.shared.inner.lock();
            if let Some(previous) = inner.state.long_press_url_id() {
                debug!("Long press on {} replaced by {}", previous, url_id);
            }
            inner.state.long_press = state.clone();
        }
        self.notify(&StoreEvent::LongPressChanged(state));
    }

    /// Set gesture progress; ignored once the gesture has ended
    pub fn update_long_press_progress(&self, progress: f32) {
        if progress.is_nan() {
            warn!("Ignoring NaN long-press progress");
            return;
        }
        let state = {
            let mut guard = self.shared.inner.lock();
            let inner = &mut *guard;
            let LongPressState::Pressing { progress: p, .. } = &mut inner.state.long_press else {
                debug!("Long-press progress after gesture ended; ignored");
                return;
            };
            let clamped = progress.clamp(0.0, 1.0);
            *p = if clamped >= 1.0 - COMPLETION_TOLERANCE {
                1.0
            } else {
                clamped
            };
            inner.state.long_press.clone()
        };
        self.notify(&StoreEvent::LongPressChanged(state));
    }

    /// Add `step` to the gesture progress; returns the new progress
    pub fn advance_long_press(&self, step: f32) -> Option<f32> {
        let current = {
            let inner = self.shared.inner.lock();
            match &inner.state.long_press {
                LongPressState::Pressing { progress, .. } => *progress,
                LongPressState::Idle => return None,
            }
        };
        self.update_long_press_progress(current + step);
        Some(self.snapshot().long_press_progress())
    }

    /// Release the gesture. Unloads the pressed url iff progress reached 1.
    pub fn end_long_press(&self) -> bool {
        let previous = std::mem::take(&mut self.shared.inner.lock().state.long_press);
        let LongPressState::Pressing { url_id, progress } = previous else {
            return false;
        };
        self.notify(&StoreEvent::LongPressChanged(LongPressState::Idle));

        if progress >= 1.0 {
            debug!("Long press on {} completed", url_id);
            self.unload_iframe(&url_id);
            true
        } else {
            debug!("Long press on {} cancelled at {:.2}", url_id, progress);
            false
        }
    }

    /// Abandon the gesture without committing it
    pub fn cancel_long_press(&self) {
        let previous = std::mem::take(&mut self.shared.inner.lock().state.long_press);
        if previous != LongPressState::Idle {
            self.notify(&StoreEvent::LongPressChanged(LongPressState::Idle));
        }
    }
}

impl std::fmt::Debug for IframeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IframeStore")
            .field("state", &self.snapshot())
            .finish()
    }
}
