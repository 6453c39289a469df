//! SQLite database for FrameDeck user settings

use crate::types::ActiveUrlPreference;
use crate::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Database wrapper for per-user settings
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref())?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        info!("Opened database at {:?}", path.as_ref());
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            -- One row per user; only the active-url subset of frame state is durable
            CREATE TABLE IF NOT EXISTS user_settings (
                user_id TEXT PRIMARY KEY,
                last_active_url TEXT,
                last_active_at INTEGER,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    // ========================================================================
    // User settings
    // ========================================================================

    /// Read a user's active-url preference
    pub fn get_active_url(&self, user_id: &str) -> Result<Option<ActiveUrlPreference>> {
        let conn = self.conn.lock();

        let row: Option<(Option<String>, Option<i64>)> = conn
            .query_row(
                "SELECT last_active_url, last_active_at FROM user_settings WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(row.map(|(active_url_id, at)| ActiveUrlPreference {
            active_url_id,
            last_active_at: at.and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms)),
        }))
    }

    /// Upsert a user's active-url preference
    pub fn set_active_url(&self, user_id: &str, pref: &ActiveUrlPreference) -> Result<()> {
        let conn = self.conn.lock();
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO user_settings (user_id, last_active_url, last_active_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                last_active_url = excluded.last_active_url,
                last_active_at = excluded.last_active_at,
                updated_at = excluded.updated_at",
            params![
                user_id,
                pref.active_url_id,
                pref.last_active_at.map(|t| t.timestamp_millis()),
                now,
            ],
        )?;

        debug!("Stored active url for {}: {:?}", user_id, pref.active_url_id);
        Ok(())
    }

    /// Remove a user's settings row
    pub fn clear_active_url(&self, user_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "DELETE FROM user_settings WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(rows > 0)
    }

    /// Count of users with stored settings
    pub fn user_count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM user_settings", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
