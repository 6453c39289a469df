//! Durable preference persistence
//!
//! Writes are fire-and-forget: the in-memory state change is visible
//! immediately and the durable write completes (or fails) later on the tokio
//! runtime, in issue order. Failures are logged and handed to an optional
//! error callback, never surfaced to the caller.

use async_trait::async_trait;
use framedeck_common::{ActiveUrlPreference, Database, Error, Result, UserKey};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Per-user durable settings record
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn read(&self, key: &UserKey) -> Result<Option<ActiveUrlPreference>>;

    async fn write(&self, key: &UserKey, pref: &ActiveUrlPreference) -> Result<()>;
}

/// Preference store backed by the local SQLite database
#[derive(Clone)]
pub struct SqlitePreferenceStore {
    db: Database,
}

impl SqlitePreferenceStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PreferenceStore for SqlitePreferenceStore {
    async fn read(&self, key: &UserKey) -> Result<Option<ActiveUrlPreference>> {
        self.db.get_active_url(&key.user_id)
    }

    async fn write(&self, key: &UserKey, pref: &ActiveUrlPreference) -> Result<()> {
        self.db.set_active_url(&key.user_id, pref)
    }
}

/// Preference store kept in process memory
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    records: Mutex<HashMap<UserKey, ActiveUrlPreference>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record without counting it as a write
    pub fn with_record(self, key: UserKey, pref: ActiveUrlPreference) -> Self {
        self.records.lock().insert(key, pref);
        self
    }

    /// Make subsequent writes fail (simulates an unreachable store)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn get(&self, key: &UserKey) -> Option<ActiveUrlPreference> {
        self.records.lock().get(key).cloned()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn read(&self, key: &UserKey) -> Result<Option<ActiveUrlPreference>> {
        Ok(self.get(key))
    }

    async fn write(&self, key: &UserKey, pref: &ActiveUrlPreference) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Persistence(format!("write rejected for {}", key)));
        }
        self.records.lock().insert(key.clone(), pref.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Callback invoked when a background write fails
pub type PersistErrorCallback = Arc<dyn Fn(&UserKey, &Error) + Send + Sync>;

enum WriteOp {
    Save(ActiveUrlPreference),
    Flush(oneshot::Sender<()>),
}

/// Queues unawaited preference writes for one user
///
/// A single writer task drains the queue, so writes reach the store in the
/// order they were issued.
pub struct Persister {
    store: Arc<dyn PreferenceStore>,
    key: UserKey,
    on_error: Option<PersistErrorCallback>,
    writer: Mutex<Option<mpsc::UnboundedSender<WriteOp>>>,
    queued: Arc<AtomicUsize>,
}

impl Persister {
    pub fn new(store: Arc<dyn PreferenceStore>, key: UserKey) -> Self {
        Self {
            store,
            key,
            on_error: None,
            writer: Mutex::new(None),
            queued: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_error_callback(mut self, on_error: PersistErrorCallback) -> Self {
        self.on_error = Some(on_error);
        self
    }

    pub fn key(&self) -> &UserKey {
        &self.key
    }

    /// Read the stored preference once; failures are logged and read as absent
    pub async fn load(&self) -> Option<ActiveUrlPreference> {
        match self.store.read(&self.key).await {
            Ok(pref) => pref,
            Err(e) => {
                warn!("Failed to read preferences for {}: {}", self.key, e);
                None
            }
        }
    }

    /// Record `url_id` as the active url without waiting for the write
    pub fn save(&self, url_id: &str) {
        self.spawn_write(ActiveUrlPreference::active_now(url_id));
    }

    /// Queue a write of `pref` behind every earlier write
    pub fn spawn_write(&self, pref: ActiveUrlPreference) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                "No async runtime available; dropping preference write for {}",
                self.key
            );
            return;
        };

        let mut writer = self.writer.lock();
        let tx = match writer.as_ref().filter(|tx| !tx.is_closed()) {
            Some(tx) => tx.clone(),
            None => {
                let tx = self.start_writer(&handle);
                *writer = Some(tx.clone());
                tx
            }
        };

        self.queued.fetch_add(1, Ordering::SeqCst);
        if tx.send(WriteOp::Save(pref)).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            warn!("Preference writer for {} stopped; write dropped", self.key);
        }
    }

    fn start_writer(&self, handle: &Handle) -> mpsc::UnboundedSender<WriteOp> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let store = self.store.clone();
        let key = self.key.clone();
        let on_error = self.on_error.clone();
        let queued = self.queued.clone();

        debug!("Starting preference writer for {}", key);
        handle.spawn(async move {
            while let Some(op) = rx.recv().await {
                match op {
                    WriteOp::Save(pref) => {
                        match store.write(&key, &pref).await {
                            Ok(()) => {
                                debug!("Persisted active url {:?} for {}", pref.active_url_id, key)
                            }
                            Err(e) => {
                                warn!("Failed to persist active url for {}: {}", key, e);
                                if let Some(cb) = &on_error {
                                    cb(&key, &e);
                                }
                            }
                        }
                        queued.fetch_sub(1, Ordering::SeqCst);
                    }
                    WriteOp::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        tx
    }

    /// Number of writes that have not completed yet
    pub fn in_flight(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Wait for every write queued so far
    pub async fn flush(&self) {
        let tx = match self.writer.lock().as_ref() {
            Some(tx) => tx.clone(),
            None => return,
        };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(WriteOp::Flush(done_tx)).is_err() || done_rx.await.is_err() {
            warn!("Preference writer for {} stopped before flushing", self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Store whose first write stalls, so a later write could overtake it
    #[derive(Default)]
    struct SlowFirstWrite {
        inner: MemoryPreferenceStore,
        started: AtomicUsize,
    }

    #[async_trait]
    impl PreferenceStore for SlowFirstWrite {
        async fn read(&self, key: &UserKey) -> Result<Option<ActiveUrlPreference>> {
            self.inner.read(key).await
        }

        async fn write(&self, key: &UserKey, pref: &ActiveUrlPreference) -> Result<()> {
            if self.started.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            self.inner.write(key, pref).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_writes_land_in_issue_order() {
        let store = Arc::new(SlowFirstWrite::default());
        let persister = Persister::new(store.clone(), UserKey::new("alice"));

        persister.save("u1");
        persister.save("u2");
        persister.save("u3");
        persister.flush().await;

        let stored = store.inner.get(&UserKey::new("alice")).unwrap();
        assert_eq!(stored.active_url_id.as_deref(), Some("u3"));
        assert_eq!(store.inner.write_count(), 3);
        assert_eq!(persister.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_flush_without_writes_returns() {
        let persister = Persister::new(
            Arc::new(MemoryPreferenceStore::new()),
            UserKey::new("alice"),
        );
        persister.flush().await;
        assert_eq!(persister.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_save_is_fire_and_forget() {
        let store = Arc::new(MemoryPreferenceStore::new());
        let persister = Persister::new(store.clone(), UserKey::new("alice"));

        persister.save("u1");
        persister.flush().await;

        let stored = store.get(&UserKey::new("alice")).unwrap();
        assert_eq!(stored.active_url_id.as_deref(), Some("u1"));
        assert!(stored.last_active_at.is_some());
        assert_eq!(persister.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failure_reaches_callback() {
        let store = Arc::new(MemoryPreferenceStore::new());
        store.set_fail_writes(true);

        let failures = Arc::new(AtomicUsize::new(0));
        let seen = failures.clone();
        let persister = Persister::new(store.clone(), UserKey::new("alice"))
            .with_error_callback(Arc::new(move |key: &UserKey, err: &Error| {
                assert_eq!(key.user_id, "alice");
                assert!(matches!(err, Error::Persistence(_)));
                seen.fetch_add(1, Ordering::SeqCst);
            }));

        persister.save("u1");
        persister.save("u2");
        persister.flush().await;

        assert_eq!(failures.load(Ordering::SeqCst), 2);
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_save_without_runtime_is_dropped() {
        let store = Arc::new(MemoryPreferenceStore::new());
        let persister = Persister::new(store.clone(), UserKey::new("alice"));
        persister.save("u1");
        assert_eq!(persister.in_flight(), 0);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_load_from_sqlite() {
        let db = Database::open_memory().unwrap();
        db.set_active_url("bob", &ActiveUrlPreference::active_now("u7")).unwrap();
        let persister = Persister::new(
            Arc::new(SqlitePreferenceStore::new(db.clone())),
            UserKey::new("bob"),
        );

        let loaded = persister.load().await.unwrap();
        assert_eq!(loaded.active_url_id.as_deref(), Some("u7"));

        persister.save("u8");
        persister.flush().await;
        assert_eq!(
            db.get_active_url("bob").unwrap().unwrap().active_url_id.as_deref(),
            Some("u8")
        );
    }
}
