//! End-to-end workspace behaviour against the headless host

use framedeck_common::{ActiveUrlPreference, Catalog, Database, Error, Url, UrlGroup, UserKey};
use framedeck_workspace::{
    Dashboard, DashboardOptions, FrameEvent, HeadlessHost, IframeStore, InteractionKind, LongPressConfig,
    MemoryHistory, MemoryPreferenceStore, NavigationHistory, PreferenceStore, SharedViewport,
    SqlitePreferenceStore, StoreEvent, WorkspaceConfig,
};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn dev_catalog() -> Catalog {
    Catalog::new(vec![UrlGroup::new(
        "dev",
        "Dev",
        vec![Url::new("u1", "https://a.test"), Url::new("u2", "https://b.test")],
    )])
}

fn ids(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

async fn dashboard(host: &HeadlessHost) -> Dashboard<HeadlessHost> {
    Dashboard::mount(DashboardOptions::new(
        dev_catalog(),
        UserKey::new("tester"),
        host.clone(),
    ))
    .await
}

/// Records every url id the store unloads
fn record_unloads(store: &IframeStore) -> Arc<Mutex<Vec<String>>> {
    let unloads = Arc::new(Mutex::new(Vec::new()));
    let sink = unloads.clone();
    store.subscribe(move |event| {
        if let StoreEvent::Unloaded { url_id, .. } = event {
            sink.lock().push(url_id.clone());
        }
    });
    unloads
}

#[tokio::test]
async fn test_switch_and_unload_sequence() {
    let host = HeadlessHost::new();
    let deck = dashboard(&host).await;
    let store = deck.store();
    let u1 = store.find_url("u1").unwrap();
    let u2 = store.find_url("u2").unwrap();

    // first activation
    store.set_active_url(&u1);
    assert_eq!(store.active_url_id().as_deref(), Some("u1"));
    assert_eq!(store.loaded_url_ids(), ids(&["u1"]));
    assert_eq!(host.child_count(), 1);
    assert_eq!(host.visible_url_ids(), vec!["u1"]);

    // switching keeps the first frame alive
    store.set_active_url(&u2);
    assert_eq!(store.active_url_id().as_deref(), Some("u2"));
    assert_eq!(store.loaded_url_ids(), ids(&["u1", "u2"]));
    assert_eq!(host.child_count(), 2);
    assert_eq!(host.visible_url_ids(), vec!["u2"]);

    // unloading the active url leaves nothing visible
    store.unload_iframe("u2");
    assert_eq!(store.active_url_id(), None);
    assert_eq!(store.loaded_url_ids(), ids(&["u1"]));
    assert!(host.frame("u2").is_none());
    let u1_frame = host.frame("u1").unwrap();
    assert!(!u1_frame.visible);

    deck.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_full_long_press_unloads() {
    let host = HeadlessHost::new();
    let deck = dashboard(&host).await;
    deck.open("u1");
    let unloads = record_unloads(deck.store());

    deck.long_press().press("u1");
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    // let the fifth tick land
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(deck.long_press().release());

    assert_eq!(*unloads.lock(), vec!["u1".to_string()]);
    assert_eq!(host.child_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_short_long_press_keeps_frame() {
    let host = HeadlessHost::new();
    let deck = dashboard(&host).await;
    deck.open("u1");
    let unloads = record_unloads(deck.store());

    deck.long_press().press("u1");
    tokio::time::sleep(Duration::from_millis(201)).await;
    let progress = deck.store().snapshot().long_press_progress();
    assert!((progress - 0.4).abs() < 1e-6);

    assert!(!deck.long_press().release());
    let state = deck.store().snapshot();
    assert!(unloads.lock().is_empty());
    assert!(!state.is_long_pressing());
    assert_eq!(state.long_press_url_id(), None);
    assert_eq!(host.visible_url_ids(), vec!["u1"]);
}

#[tokio::test]
async fn test_manual_long_press_steps() {
    let store = IframeStore::new(dev_catalog());
    store.set_active_url_id("u1");
    let unloads = record_unloads(&store);

    store.start_long_press("u1");
    for _ in 0..5 {
        store.advance_long_press(0.2);
    }
    assert!(store.end_long_press());
    assert_eq!(*unloads.lock(), vec!["u1".to_string()]);
}

#[tokio::test]
async fn test_activation_is_idempotent() {
    let host = HeadlessHost::new();
    let history = Arc::new(MemoryHistory::new());
    let deck = Dashboard::mount(
        DashboardOptions::new(dev_catalog(), UserKey::new("tester"), host.clone())
            .history(history.clone()),
    )
    .await;

    deck.open("u1");
    let once = deck.store().snapshot();
    deck.open("u1");
    let twice = deck.store().snapshot();

    assert_eq!(once.active_url_id, twice.active_url_id);
    assert_eq!(once.loaded_url_ids, twice.loaded_url_ids);
    assert_eq!(host.child_count(), 1);
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_one_visible_frame_after_each_activation() {
    let catalog = Catalog::new(vec![
        UrlGroup::new(
            "dev",
            "Dev",
            vec![Url::new("u1", "https://a.test"), Url::new("u2", "https://b.test")],
        ),
        UrlGroup::new(
            "ops",
            "Ops",
            vec![Url::new("g1", "https://grafana.test"), Url::new("k1", "https://kibana.test")],
        ),
    ]);
    let host = HeadlessHost::new();
    let deck = Dashboard::mount(DashboardOptions::new(
        catalog,
        UserKey::new("tester"),
        host.clone(),
    ))
    .await;

    for id in ["u1", "g1", "u2", "u1", "k1", "g1"] {
        deck.open(id);
        assert_eq!(host.visible_url_ids(), vec![id.to_string()]);
        let state = deck.store().snapshot();
        assert!(state.loaded_url_ids.contains(id));
    }
    assert_eq!(host.child_count(), 4);
}

#[tokio::test]
async fn test_back_and_forward_restore_active_url() {
    let history = Arc::new(MemoryHistory::starting_at("/dashboard"));
    let prefs = Arc::new(MemoryPreferenceStore::new());
    let host = HeadlessHost::new();
    let user = UserKey::new("tester");
    let deck = Dashboard::mount(
        DashboardOptions::new(dev_catalog(), user.clone(), host.clone())
            .history(history.clone())
            .preferences(prefs.clone()),
    )
    .await;

    deck.open("u1");
    deck.open("u2");
    assert_eq!(
        history.entries(),
        vec!["/dashboard", "?url=u1", "?url=u2"]
    );

    let location = history.back().unwrap();
    assert!(deck.handle_popstate(&location));
    assert_eq!(deck.store().active_url_id().as_deref(), Some("u1"));
    assert_eq!(host.visible_url_ids(), vec!["u1"]);
    assert_eq!(history.len(), 3);

    let location = history.back().unwrap();
    assert!(!deck.handle_popstate(&location));
    assert_eq!(deck.store().active_url_id().as_deref(), Some("u1"));

    let location = history.forward().unwrap();
    deck.handle_popstate(&location);
    deck.flush().await;
    assert_eq!(
        prefs.get(&user).unwrap().active_url_id.as_deref(),
        Some("u1")
    );
    let location = history.forward().unwrap();
    deck.handle_popstate(&location);
    deck.flush().await;
    assert_eq!(
        prefs.get(&user).unwrap().active_url_id.as_deref(),
        Some("u2")
    );
    assert_eq!(history.current().as_deref(), Some("?url=u2"));
}

#[tokio::test]
async fn test_preference_survives_sessions_in_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("state.db")).unwrap();
    let prefs = Arc::new(SqlitePreferenceStore::new(db.clone()));
    let user = UserKey::new("carol");

    let first = Dashboard::mount(
        DashboardOptions::new(dev_catalog(), user.clone(), HeadlessHost::new())
            .preferences(prefs.clone()),
    )
    .await;
    first.open("u2");
    first.unmount().await;

    let host = HeadlessHost::new();
    let second = Dashboard::mount(
        DashboardOptions::new(dev_catalog(), user.clone(), host.clone())
            .preferences(prefs.clone()),
    )
    .await;
    assert_eq!(second.store().active_url_id().as_deref(), Some("u2"));
    assert_eq!(host.visible_url_ids(), vec!["u2"]);
    second.unmount().await;
}

#[tokio::test]
async fn test_stale_preference_is_cleared() {
    let user = UserKey::new("dave");
    let prefs = Arc::new(
        MemoryPreferenceStore::new()
            .with_record(user.clone(), ActiveUrlPreference::active_now("retired")),
    );
    let host = HeadlessHost::new();
    let deck = Dashboard::mount(
        DashboardOptions::new(dev_catalog(), user.clone(), host.clone())
            .preferences(prefs.clone()),
    )
    .await;
    deck.flush().await;

    assert_eq!(deck.store().active_url_id(), None);
    assert_eq!(host.child_count(), 0);
    assert_eq!(prefs.get(&user).unwrap().active_url_id, None);
}

#[tokio::test]
async fn test_failed_writes_do_not_block_switching() {
    let user = UserKey::new("erin");
    let prefs = Arc::new(MemoryPreferenceStore::new());
    prefs.set_fail_writes(true);
    let failures = Arc::new(Mutex::new(0usize));
    let counter = failures.clone();

    let deck = Dashboard::mount(
        DashboardOptions::new(dev_catalog(), user, HeadlessHost::new())
            .preferences(prefs.clone())
            .on_persist_error(Arc::new(move |_: &UserKey, _: &Error| *counter.lock() += 1)),
    )
    .await;
    deck.open("u1");
    deck.open("u2");
    assert_eq!(deck.store().active_url_id().as_deref(), Some("u2"));

    deck.flush().await;
    assert_eq!(*failures.lock(), 2);
    assert_eq!(prefs.write_count(), 0);
}

#[tokio::test]
async fn test_narrow_viewport_uses_mobile_address() {
    let catalog = Catalog::new(vec![UrlGroup::new(
        "dev",
        "Dev",
        vec![
            Url::new("u1", "https://a.test").with_mobile("https://m.a.test"),
            Url::new("u2", "https://b.test"),
        ],
    )]);
    let host = HeadlessHost::new();
    let deck = Dashboard::mount(
        DashboardOptions::new(catalog, UserKey::new("tester"), host.clone())
            .viewport(Arc::new(SharedViewport::new(390))),
    )
    .await;

    deck.open("u1");
    deck.open("u2");
    assert_eq!(host.frame("u1").unwrap().address, "https://m.a.test");
    assert_eq!(host.frame("u2").unwrap().address, "https://b.test");
}

#[tokio::test(start_paused = true)]
async fn test_idle_frame_is_unloaded_in_background() {
    let catalog = Catalog::new(vec![UrlGroup::new(
        "dev",
        "Dev",
        vec![
            Url::new("u1", "https://a.test").with_idle_timeout(2),
            Url::new("u2", "https://b.test"),
        ],
    )]);
    let host = HeadlessHost::new();
    let deck = Dashboard::mount(DashboardOptions::new(
        catalog,
        UserKey::new("tester"),
        host.clone(),
    ))
    .await;

    deck.open("u1");
    tokio::time::sleep(Duration::from_secs(90)).await;
    deck.handle_frame_event("u1", FrameEvent::Interaction(InteractionKind::Wheel));
    deck.open("u2");

    tokio::time::sleep(Duration::from_secs(119)).await;
    assert!(host.frame("u1").is_some());
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(host.frame("u1").is_none());
    assert_eq!(deck.store().active_url_id().as_deref(), Some("u2"));
    assert_eq!(deck.store().loaded_url_ids(), ids(&["u2"]));
}

#[tokio::test]
async fn test_catalog_reload_prunes_frames() {
    let host = HeadlessHost::new();
    let deck = dashboard(&host).await;
    deck.open("u1");
    deck.open("u2");

    let pruned = deck.store().replace_catalog(Catalog::new(vec![UrlGroup::new(
        "dev",
        "Dev",
        vec![Url::new("u1", "https://a.test")],
    )]));
    assert_eq!(pruned, vec!["u2".to_string()]);
    assert_eq!(deck.store().active_url_id(), None);
    assert_eq!(host.child_count(), 1);
    assert!(!deck.store().is_known("u2"));
}

#[tokio::test(start_paused = true)]
async fn test_custom_long_press_timing() {
    let mut config = WorkspaceConfig::default();
    config.long_press = LongPressConfig {
        total_duration_ms: 1_000,
        tick_interval_ms: 250,
    };
    let host = HeadlessHost::new();
    let deck = Dashboard::mount(
        DashboardOptions::new(dev_catalog(), UserKey::new("tester"), host.clone()).config(config),
    )
    .await;
    deck.open("u2");

    deck.long_press().press("u2");
    tokio::time::sleep(Duration::from_millis(760)).await;
    assert!(!deck.long_press().release());
    assert_eq!(host.child_count(), 1);

    deck.long_press().press("u2");
    tokio::time::sleep(Duration::from_millis(1_010)).await;
    assert!(deck.long_press().release());
    assert_eq!(host.child_count(), 0);
}

/// Preference store whose first write stalls behind later ones
#[derive(Default)]
struct StallingStore {
    inner: MemoryPreferenceStore,
    writes: AtomicUsize,
}

#[async_trait::async_trait]
impl PreferenceStore for StallingStore {
    async fn read(&self, key: &UserKey) -> framedeck_common::Result<Option<ActiveUrlPreference>> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &UserKey, pref: &ActiveUrlPreference) -> framedeck_common::Result<()> {
        if self.writes.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.inner.write(key, pref).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_write_does_not_leave_stale_preference() {
    let user = UserKey::new("frank");
    let prefs = Arc::new(StallingStore::default());

    let deck = Dashboard::mount(
        DashboardOptions::new(dev_catalog(), user.clone(), HeadlessHost::new())
            .preferences(prefs.clone()),
    )
    .await;
    deck.open("u1");
    deck.open("u2");
    deck.unmount().await;

    assert_eq!(
        prefs.inner.get(&user).unwrap().active_url_id.as_deref(),
        Some("u2")
    );

    let again = Dashboard::mount(
        DashboardOptions::new(dev_catalog(), user, HeadlessHost::new()).preferences(prefs.clone()),
    )
    .await;
    assert_eq!(again.store().active_url_id().as_deref(), Some("u2"));
    again.unmount().await;
}
