//! FrameDeck Common Library
//!
//! Shared catalog and preference types, the error type, and the SQLite
//! settings database.

pub mod db;
pub mod error;
pub mod types;

pub use db::Database;
pub use error::{Error, Result};
pub use types::*;

/// FrameDeck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default store path
pub fn default_store_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".framedeck")
}

/// Default database path
pub fn default_db_path() -> std::path::PathBuf {
    default_store_path().join("state.db")
}

/// Default catalog path
pub fn default_catalog_path() -> std::path::PathBuf {
    default_store_path().join("catalog.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths_share_store_dir() {
        let store = default_store_path();
        assert!(store.ends_with(".framedeck"));
        assert_eq!(default_db_path(), store.join("state.db"));
        assert_eq!(default_catalog_path(), store.join("catalog.toml"));
    }
}
