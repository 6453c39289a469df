//! Core types for FrameDeck

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

/// A single embeddable address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Url {
    /// Stable identifier, unique across the whole catalog
    pub id: String,

    /// Desktop address
    pub url: String,

    /// Address used on narrow viewports, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_mobile: Option<String>,

    /// Unload the frame after this many minutes without interaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_minutes: Option<u32>,
}

impl Url {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            url_mobile: None,
            idle_timeout_minutes: None,
        }
    }

    pub fn with_mobile(mut self, url_mobile: impl Into<String>) -> Self {
        self.url_mobile = Some(url_mobile.into());
        self
    }

    pub fn with_idle_timeout(mut self, minutes: u32) -> Self {
        self.idle_timeout_minutes = Some(minutes);
        self
    }
}

/// A named, ordered collection of URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub urls: Vec<Url>,
}

impl UrlGroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>, urls: Vec<Url>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            urls,
        }
    }
}

/// The admin-configured tree of groups and URLs available to a user.
///
/// The catalog is read-only for the lifetime of a session. Shape checks
/// happen once in [`Catalog::validate`] when a catalog is loaded from disk;
/// consumers never revalidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub groups: Vec<UrlGroup>,
}

impl Catalog {
    pub fn new(groups: Vec<UrlGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[UrlGroup] {
        &self.groups
    }

    /// All URLs in display order
    pub fn urls(&self) -> impl Iterator<Item = &Url> {
        self.groups.iter().flat_map(|g| g.urls.iter())
    }

    /// Group owning the given URL id
    pub fn group_of(&self, url_id: &str) -> Option<&UrlGroup> {
        self.groups
            .iter()
            .find(|g| g.urls.iter().any(|u| u.id == url_id))
    }

    pub fn find(&self, url_id: &str) -> Option<&Url> {
        self.urls().find(|u| u.id == url_id)
    }

    pub fn contains(&self, url_id: &str) -> bool {
        self.find(url_id).is_some()
    }

    pub fn ids(&self) -> BTreeSet<String> {
        self.urls().map(|u| u.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.urls().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject duplicate ids and empty addresses
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for url in self.urls() {
            if url.id.trim().is_empty() {
                return Err(Error::InvalidConfig("url with empty id".to_string()));
            }
            if !seen.insert(url.id.as_str()) {
                return Err(Error::InvalidConfig(format!("duplicate url id: {}", url.id)));
            }
            if url.url.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("url {} has no address", url.id)));
            }
            if matches!(url.url_mobile.as_deref(), Some(m) if m.trim().is_empty()) {
                return Err(Error::InvalidConfig(format!(
                    "url {} has an empty mobile address",
                    url.id
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate a catalog from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let catalog: Self = toml::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog file, or an empty catalog if the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

/// Key addressing one user's record in the durable preference store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserKey {
    pub user_id: String,
}

impl UserKey {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

impl std::fmt::Display for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.user_id)
    }
}

/// The persisted subset of a user's frame state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveUrlPreference {
    #[serde(default)]
    pub active_url_id: Option<String>,
    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,
}

impl ActiveUrlPreference {
    /// Preference recording `url_id` as active now
    pub fn active_now(url_id: impl Into<String>) -> Self {
        Self {
            active_url_id: Some(url_id.into()),
            last_active_at: Some(Utc::now()),
        }
    }
}
