//! Frame mount manager
//!
//! Turns store state into frame elements inside one shared container. A
//! frame is created lazily the first time its url is activated and afterwards
//! only shown or hidden, so its scroll position and in-page session survive
//! switching between urls. Frames are destroyed only on unload or teardown.
//!
//! The manager is explicitly constructed and explicitly torn down; there is
//! no process-wide container.

use crate::address::{choose_address, is_mobile_viewport, ViewportProbe};
use crate::host::FrameHost;
use crate::idle::{idle_timeout, IdleTimers, InteractionKind};
use crate::store::{IframeState, IframeStore, StoreEvent, SubscriptionId};
use framedeck_common::Url;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Load progress of a frame's current address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLoadState {
    Loading,
    Loaded,
    Failed,
}

/// A live frame owned by the manager
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord<E> {
    pub url_id: String,
    pub element: E,
    /// Fixed at creation for the rest of the session
    pub current_address: String,
    pub load_state: FrameLoadState,
}

/// Native events relayed from a frame element
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    Loaded,
    Error(String),
    Interaction(InteractionKind),
}

/// Hosting-UI observer for frame load results
pub trait FrameListener: Send + Sync {
    fn on_load(&self, _url_id: &str) {}

    fn on_error(&self, _url_id: &str, _message: &str) {}
}

enum Notice {
    Load(String),
    Error(String, String),
}

struct MountInner<H: FrameHost> {
    host: H,
    frames: HashMap<String, FrameRecord<H::Element>>,
    visible: Option<String>,
    container_mounted: bool,
    idle: IdleTimers,
}

struct MountShared<H: FrameHost> {
    inner: Mutex<MountInner<H>>,
    viewport: Arc<dyn ViewportProbe>,
    breakpoint_px: u32,
    listeners: Mutex<Vec<Arc<dyn FrameListener>>>,
}

/// Owns the frame elements for one page/session
pub struct FrameMountManager<H: FrameHost> {
    shared: Arc<MountShared<H>>,
    store: IframeStore,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl<H: FrameHost> FrameMountManager<H> {
    pub fn new(
        store: IframeStore,
        host: H,
        viewport: Arc<dyn ViewportProbe>,
        breakpoint_px: u32,
    ) -> Self {
        let idle = IdleTimers::new(store.downgrade());
        Self {
            shared: Arc::new(MountShared {
                inner: Mutex::new(MountInner {
                    host,
                    frames: HashMap::new(),
                    visible: None,
                    container_mounted: false,
                    idle,
                }),
                viewport,
                breakpoint_px,
                listeners: Mutex::new(Vec::new()),
            }),
            store,
            subscription: Mutex::new(None),
        }
    }

    /// Start following store events and mount frames for the current state
    pub fn attach(&self) {
        let mut subscription = self.subscription.lock();
        if subscription.is_some() {
            return;
        }
        let weak = Arc::downgrade(&self.shared);
        *subscription = Some(self.store.subscribe(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.apply(event);
            }
        }));
        drop(subscription);

        self.shared.sync(&self.store.snapshot(), &self.store);
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.lock().is_some()
    }

    pub fn add_listener(&self, listener: Arc<dyn FrameListener>) {
        self.shared.listeners.lock().push(listener);
    }

    /// Existing record for `url_id`, or a newly created hidden frame
    pub fn ensure_frame(&self, url_id: &str, address: &str) -> FrameRecord<H::Element> {
        self.shared.inner.lock().ensure_frame(url_id, address)
    }

    /// Show the frame for `url_id` and hide every other frame
    pub fn set_visible(&self, url_id: &str) {
        self.shared.inner.lock().set_visible(url_id);
    }

    pub fn hide_all(&self) {
        self.shared.inner.lock().hide_all();
    }

    pub fn destroy_frame(&self, url_id: &str) -> bool {
        self.shared.inner.lock().destroy_frame(url_id)
    }

    /// Destroy every frame, cancel idle timers and remove the container.
    /// Safe to call any number of times.
    pub fn teardown_all(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.store.unsubscribe(id);
        }
        let mut inner = self.shared.inner.lock();
        let count = inner.frames.len();
        inner.teardown();
        if count > 0 {
            info!("Tore down {} frame(s)", count);
        }
    }

    /// Relay a native frame event to listeners and idle tracking
    pub fn handle_frame_event(&self, url_id: &str, event: FrameEvent) {
        let notice = self.shared.inner.lock().record_event(url_id, event);
        if let Some(notice) = notice {
            self.shared.notify(notice);
        }
    }

    pub fn frame(&self, url_id: &str) -> Option<FrameRecord<H::Element>> {
        self.shared.inner.lock().frames.get(url_id).cloned()
    }

    pub fn frame_count(&self) -> usize {
        self.shared.inner.lock().frames.len()
    }

    /// Ids with a live frame, sorted
    pub fn frame_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.shared.inner.lock().frames.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn visible_url_id(&self) -> Option<String> {
        self.shared.inner.lock().visible.clone()
    }

    pub fn has_idle_timer(&self, url_id: &str) -> bool {
        self.shared.inner.lock().idle.is_armed(url_id)
    }
}

impl<H: FrameHost> MountShared<H> {
    fn is_mobile(&self) -> bool {
        is_mobile_viewport(self.viewport.width(), self.breakpoint_px)
    }

    fn apply(&self, event: &StoreEvent) {
        match event {
            StoreEvent::ActiveChanged { url, .. } => self.open(url),
            StoreEvent::Loaded { url: Some(url), .. } => {
                let address = choose_address(url, self.is_mobile()).to_string();
                self.inner.lock().ensure_frame(&url.id, &address);
            }
            StoreEvent::Loaded { url_id, url: None } => {
                debug!("No catalog entry for {}; frame not created", url_id);
            }
            StoreEvent::Unloaded { url_id, was_active } => {
                let mut inner = self.inner.lock();
                inner.destroy_frame(url_id);
                if *was_active {
                    inner.hide_all();
                }
            }
            StoreEvent::Reset { url_id, .. } => self.inner.lock().reload_frame(url_id),
            StoreEvent::LongPressChanged(_) | StoreEvent::CatalogReplaced { .. } => {}
        }
    }

    fn open(&self, url: &Url) {
        let address = choose_address(url, self.is_mobile()).to_string();
        let mut inner = self.inner.lock();
        inner.ensure_frame(&url.id, &address);
        inner.set_visible(&url.id);
        match idle_timeout(url.idle_timeout_minutes) {
            Some(timeout) => inner.idle.arm(&url.id, timeout),
            None => {
                inner.idle.cancel(&url.id);
            }
        }
    }

    /// Mount frames for a store that already has state
    fn sync(&self, state: &IframeState, store: &IframeStore) {
        for url_id in &state.loaded_url_ids {
            if state.active_url_id.as_deref() == Some(url_id.as_str()) {
                continue;
            }
            match store.find_url(url_id) {
                Some(url) => {
                    let address = choose_address(&url, self.is_mobile()).to_string();
                    self.inner.lock().ensure_frame(url_id, &address);
                }
                None => debug!("No catalog entry for loaded url {}", url_id),
            }
        }
        if let Some(active) = &state.active_url_id {
            match store.find_url(active) {
                Some(url) => self.open(&url),
                None => warn!("Active url {} missing from catalog; not mounted", active),
            }
        }
    }

    fn notify(&self, notice: Notice) {
        let listeners: Vec<_> = self.listeners.lock().clone();
        for listener in listeners {
            match &notice {
                Notice::Load(url_id) => listener.on_load(url_id),
                Notice::Error(url_id, message) => listener.on_error(url_id, message),
            }
        }
    }
}

impl<H: FrameHost> MountInner<H> {
    fn ensure_frame(&mut self, url_id: &str, address: &str) -> FrameRecord<H::Element> {
        if let Some(record) = self.frames.get(url_id) {
            if record.current_address != address {
                debug!(
                    "Frame for {} keeps address {} (requested {})",
                    url_id, record.current_address, address
                );
            }
            return record.clone();
        }

        if !self.container_mounted {
            self.host.mount_container();
            self.container_mounted = true;
        }
        let element = self.host.create_frame(url_id, address);
        self.host.set_visibility(&element, false);
        let record = FrameRecord {
            url_id: url_id.to_string(),
            element,
            current_address: address.to_string(),
            load_state: FrameLoadState::Loading,
        };
        debug!("Created frame for {} at {}", url_id, address);
        self.frames.insert(url_id.to_string(), record.clone());
        record
    }

    fn set_visible(&mut self, url_id: &str) {
        for (id, record) in &self.frames {
            self.host.set_visibility(&record.element, id == url_id);
        }
        self.visible = self.frames.contains_key(url_id).then(|| url_id.to_string());
        if self.visible.is_none() {
            debug!("No frame for {}; nothing visible", url_id);
        }
    }

    fn hide_all(&mut self) {
        for record in self.frames.values() {
            self.host.set_visibility(&record.element, false);
        }
        self.visible = None;
    }

    fn destroy_frame(&mut self, url_id: &str) -> bool {
        self.idle.cancel(url_id);
        let Some(record) = self.frames.remove(url_id) else {
            return false;
        };
        self.host.remove_frame(&record.element);
        if self.visible.as_deref() == Some(url_id) {
            self.visible = None;
        }
        debug!("Destroyed frame for {}", url_id);
        true
    }

    fn reload_frame(&mut self, url_id: &str) {
        match self.frames.get_mut(url_id) {
            Some(record) => {
                record.load_state = FrameLoadState::Loading;
                self.host.reload(&record.element, &record.current_address);
                debug!("Reloading frame for {}", url_id);
            }
            None => debug!("Reset of {} ignored: no frame", url_id),
        }
    }

    fn record_event(&mut self, url_id: &str, event: FrameEvent) -> Option<Notice> {
        let Some(record) = self.frames.get_mut(url_id) else {
            debug!("Event {:?} for {} ignored: no frame", event, url_id);
            return None;
        };
        match event {
            FrameEvent::Loaded => {
                record.load_state = FrameLoadState::Loaded;
                Some(Notice::Load(url_id.to_string()))
            }
            FrameEvent::Error(message) => {
                if record.load_state == FrameLoadState::Failed {
                    debug!("Repeated load error for {} suppressed", url_id);
                    return None;
                }
                record.load_state = FrameLoadState::Failed;
                warn!("Frame for {} failed to load: {}", url_id, message);
                Some(Notice::Error(url_id.to_string(), message))
            }
            FrameEvent::Interaction(kind) => {
                if self.idle.touch(url_id) {
                    debug!("Idle timer for {} reset by {:?}", url_id, kind);
                }
                None
            }
        }
    }

    fn teardown(&mut self) {
        self.idle.cancel_all();
        for (_, record) in self.frames.drain() {
            self.host.remove_frame(&record.element);
        }
        if self.container_mounted {
            self.host.unmount_container();
            self.container_mounted = false;
        }
        self.visible = None;
    }
}
