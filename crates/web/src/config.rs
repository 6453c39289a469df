//! Server configuration

use framedeck_workspace::WorkspaceConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// FrameDeck server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address
    pub listen: String,

    /// Store directory holding the settings database
    pub store_path: PathBuf,

    /// Catalog file; defaults to `catalog.toml` in the store directory
    pub catalog_path: Option<PathBuf>,

    /// Settings handed to workspace clients
    pub workspace: WorkspaceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:7080".to_string(),
            store_path: framedeck_common::default_store_path(),
            catalog_path: None,
            workspace: WorkspaceConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file; a missing file yields defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.catalog_path
            .clone()
            .unwrap_or_else(|| self.store_path.join("catalog.toml"))
    }

    pub fn db_path(&self) -> PathBuf {
        self.store_path.join("state.db")
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid listen address {}: {}", self.listen, e))
    }
}
