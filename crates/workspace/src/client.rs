//! HTTP client for the FrameDeck server

use crate::config::WorkspaceConfig;
use crate::persistence::PreferenceStore;
use async_trait::async_trait;
use framedeck_common::{ActiveUrlPreference, Catalog, Error, Result, UserKey};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Body of `GET /healthz`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub url_count: usize,
    pub user_count: usize,
}

/// Client for the FrameDeck HTTP API
#[derive(Debug, Clone)]
pub struct DeckClient {
    http: Client,
    base: String,
}

impl DeckClient {
    pub fn new(addr: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(http_error)?;
        Ok(Self {
            http,
            base: normalize_base(addr),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        self.get_json("/healthz").await
    }

    pub async fn fetch_catalog(&self) -> Result<Catalog> {
        self.get_json("/api/catalog").await
    }

    pub async fn reload_catalog(&self) -> Result<Catalog> {
        let response = self
            .http
            .post(self.endpoint("/api/catalog/reload"))
            .send()
            .await
            .map_err(http_error)?;
        decode(check(response).await?).await
    }

    pub async fn fetch_workspace_config(&self) -> Result<WorkspaceConfig> {
        self.get_json("/api/workspace/config").await
    }

    pub async fn get_active_url(&self, user: &UserKey) -> Result<ActiveUrlPreference> {
        self.get_json(&active_path(user)).await
    }

    pub async fn set_active_url(
        &self,
        user: &UserKey,
        pref: &ActiveUrlPreference,
    ) -> Result<ActiveUrlPreference> {
        let response = self
            .http
            .put(self.endpoint(&active_path(user)))
            .json(pref)
            .send()
            .await
            .map_err(http_error)?;
        decode(check(response).await?).await
    }

    /// Returns false when nothing was stored
    pub async fn clear_active_url(&self, user: &UserKey) -> Result<bool> {
        let response = self
            .http
            .delete(self.endpoint(&active_path(user)))
            .send()
            .await
            .map_err(http_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(response).await?;
        Ok(true)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!("GET {}", path);
        let response = self
            .http
            .get(self.endpoint(path))
            .send()
            .await
            .map_err(http_error)?;
        decode(check(response).await?).await
    }
}

#[async_trait]
impl PreferenceStore for DeckClient {
    async fn read(&self, key: &UserKey) -> Result<Option<ActiveUrlPreference>> {
        let pref = self.get_active_url(key).await?;
        Ok(pref.active_url_id.is_some().then_some(pref))
    }

    async fn write(&self, key: &UserKey, pref: &ActiveUrlPreference) -> Result<()> {
        self.set_active_url(key, pref).await.map(|_| ())
    }
}

fn normalize_base(addr: &str) -> String {
    let addr = addr.trim_end_matches('/');
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    }
}

fn active_path(user: &UserKey) -> String {
    // form encoding writes spaces as '+', which paths read literally
    let encoded: String = url::form_urlencoded::byte_serialize(user.user_id.as_bytes()).collect();
    format!("/api/users/{}/active-url", encoded.replace('+', "%20"))
}

fn http_error(e: reqwest::Error) -> Error {
    Error::Http(e.to_string())
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Http(format!("{}: {}", status, body.trim())))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    response.json().await.map_err(http_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("127.0.0.1:7080", "http://127.0.0.1:7080" ; "bare host")]
    #[test_case("http://deck.local/", "http://deck.local" ; "trailing slash")]
    #[test_case("https://deck.example", "https://deck.example" ; "https")]
    fn test_normalize_base(addr: &str, expected: &str) {
        assert_eq!(normalize_base(addr), expected);
    }

    #[test]
    fn test_active_path_escapes_user() {
        assert_eq!(active_path(&UserKey::new("alice")), "/api/users/alice/active-url");
        assert_eq!(
            active_path(&UserKey::new("a/b c")),
            "/api/users/a%2Fb%20c/active-url"
        );
    }
}
