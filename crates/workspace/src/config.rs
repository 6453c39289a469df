//! Workspace configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for a frame workspace session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Viewports narrower than this (in CSS pixels) use mobile addresses
    pub mobile_breakpoint_px: u32,

    /// Long-press-to-unload gesture timing
    pub long_press: LongPressConfig,

    /// History encoding
    pub history: HistoryConfig,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            mobile_breakpoint_px: 768,
            long_press: LongPressConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

/// Long-press gesture configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LongPressConfig {
    /// Hold time needed to commit the gesture
    pub total_duration_ms: u64,

    /// Interval between progress ticks
    pub tick_interval_ms: u64,
}

impl Default for LongPressConfig {
    fn default() -> Self {
        Self {
            total_duration_ms: 500,
            tick_interval_ms: 100,
        }
    }
}

impl LongPressConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Progress after `ticks` ticks, clamped to [0, 1]
    pub fn progress_after(&self, ticks: u64) -> f32 {
        if self.total_duration_ms == 0 {
            return 1.0;
        }
        let elapsed = ticks.saturating_mul(self.tick_interval_ms.max(1));
        (elapsed as f64 / self.total_duration_ms as f64).min(1.0) as f32
    }
}

/// History configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Query parameter carrying the active url id
    pub query_param: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            query_param: "url".to_string(),
        }
    }
}

impl WorkspaceConfig {
    /// Load configuration from file
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
