//! Dashboard session
//!
//! A [`Dashboard`] is one page worth of workspace: the store, the mount
//! manager, the long-press driver, navigation history and the preference
//! writer, wired together and hydrated in the right order.

use crate::address::{SharedViewport, ViewportProbe};
use crate::config::WorkspaceConfig;
use crate::history::{HistoryCodec, NavigationHistory, NoHistory};
use crate::host::FrameHost;
use crate::long_press::LongPressDriver;
use crate::mount::{FrameEvent, FrameListener, FrameMountManager};
use crate::persistence::{PersistErrorCallback, PreferenceStore, Persister};
use crate::store::IframeStore;
use framedeck_common::{Catalog, UserKey};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Everything needed to mount a dashboard
pub struct DashboardOptions<H: FrameHost> {
    pub catalog: Catalog,
    pub user: UserKey,
    pub host: H,
    pub config: WorkspaceConfig,
    pub viewport: Arc<dyn ViewportProbe>,
    pub history: Arc<dyn NavigationHistory>,
    pub preferences: Option<Arc<dyn PreferenceStore>>,
    pub on_persist_error: Option<PersistErrorCallback>,
    pub listeners: Vec<Arc<dyn FrameListener>>,
}

impl<H: FrameHost> DashboardOptions<H> {
    pub fn new(catalog: Catalog, user: UserKey, host: H) -> Self {
        Self {
            catalog,
            user,
            host,
            config: WorkspaceConfig::default(),
            viewport: Arc::new(SharedViewport::default()),
            history: Arc::new(NoHistory),
            preferences: None,
            on_persist_error: None,
            listeners: Vec::new(),
        }
    }

    pub fn config(mut self, config: WorkspaceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn viewport(mut self, viewport: Arc<dyn ViewportProbe>) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn history(mut self, history: Arc<dyn NavigationHistory>) -> Self {
        self.history = history;
        self
    }

    pub fn preferences(mut self, store: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = Some(store);
        self
    }

    pub fn on_persist_error(mut self, callback: PersistErrorCallback) -> Self {
        self.on_persist_error = Some(callback);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn FrameListener>) -> Self {
        self.listeners.push(listener);
        self
    }
}

/// A mounted workspace session
pub struct Dashboard<H: FrameHost> {
    store: IframeStore,
    frames: FrameMountManager<H>,
    long_press: LongPressDriver,
    persister: Option<Arc<Persister>>,
    mounted: AtomicBool,
}

impl<H: FrameHost> Dashboard<H> {
    /// Build and hydrate a session.
    ///
    /// The stored preference is read once; a failed read is logged and the
    /// session starts without it.
    pub async fn mount(options: DashboardOptions<H>) -> Self {
        let DashboardOptions {
            catalog,
            user,
            host,
            config,
            viewport,
            history,
            preferences,
            on_persist_error,
            listeners,
        } = options;

        let persister = preferences.map(|store| {
            let persister = Persister::new(store, user.clone());
            Arc::new(match on_persist_error {
                Some(callback) => persister.with_error_callback(callback),
                None => persister,
            })
        });

        let mut builder = IframeStore::builder(catalog)
            .history(history.clone())
            .codec(HistoryCodec::new(config.history.query_param.clone()));
        if let Some(persister) = &persister {
            builder = builder.persister(persister.clone());
        }
        let store = builder.build();

        let frames = FrameMountManager::new(
            store.clone(),
            host,
            viewport,
            config.mobile_breakpoint_px,
        );
        for listener in listeners {
            frames.add_listener(listener);
        }
        frames.attach();

        let persisted = match &persister {
            Some(persister) => persister.load().await,
            None => None,
        };
        let location = history.current();
        let active = store.hydrate(location.as_deref(), persisted);

        let long_press = LongPressDriver::new(store.clone(), config.long_press.clone());
        info!("Dashboard mounted for {} (active: {:?})", user, active);

        Self {
            store,
            frames,
            long_press,
            persister,
            mounted: AtomicBool::new(true),
        }
    }

    pub fn store(&self) -> &IframeStore {
        &self.store
    }

    pub fn frames(&self) -> &FrameMountManager<H> {
        &self.frames
    }

    pub fn long_press(&self) -> &LongPressDriver {
        &self.long_press
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Activate `url_id` as if its tile were clicked
    pub fn open(&self, url_id: &str) -> bool {
        self.store.set_active_url_id(url_id)
    }

    /// Back/forward navigation landed on `location`
    pub fn handle_popstate(&self, location: &str) -> bool {
        self.store.handle_popstate(location)
    }

    pub fn handle_frame_event(&self, url_id: &str, event: FrameEvent) {
        self.frames.handle_frame_event(url_id, event);
    }

    /// Wait for every preference write spawned so far
    pub async fn flush(&self) {
        if let Some(persister) = &self.persister {
            persister.flush().await;
        }
    }

    /// Cancel any gesture, destroy every frame and drain pending writes.
    /// Later calls do nothing.
    pub async fn unmount(&self) {
        if !self.mounted.swap(false, Ordering::SeqCst) {
            debug!("Dashboard already unmounted");
            return;
        }
        self.long_press.cancel();
        self.frames.teardown_all();
        self.flush().await;
        info!("Dashboard unmounted");
    }
}
