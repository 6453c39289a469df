//! FrameDeck workspace
//!
//! Keeps a set of embedded pages alive across switches. The [`IframeStore`]
//! decides which urls are loaded and which one is active; the
//! [`FrameMountManager`] turns that into frame elements on a [`FrameHost`];
//! [`Dashboard`] wires both to history, preferences and the long-press and
//! idle timers for one session.

pub mod address;
pub mod client;
pub mod config;
pub mod history;
pub mod host;
pub mod idle;
pub mod long_press;
pub mod mount;
pub mod persistence;
pub mod session;
pub mod store;

pub use address::{choose_address, is_mobile_viewport, SharedViewport, ViewportProbe};
pub use client::{DeckClient, HealthStatus};
pub use config::{HistoryConfig, LongPressConfig, WorkspaceConfig};
pub use history::{HistoryCodec, MemoryHistory, NavigationHistory, NoHistory};
pub use host::{FrameHandle, FrameHost, HeadlessFrame, HeadlessHost};
pub use idle::{idle_timeout, IdleTimers, InteractionKind};
pub use long_press::LongPressDriver;
pub use mount::{FrameEvent, FrameListener, FrameLoadState, FrameMountManager, FrameRecord};
pub use persistence::{
    MemoryPreferenceStore, PersistErrorCallback, PreferenceStore, Persister,
    SqlitePreferenceStore,
};
pub use session::{Dashboard, DashboardOptions};
pub use store::{IframeState, IframeStore, LongPressState, StoreEvent, SubscriptionId, WeakIframeStore};
