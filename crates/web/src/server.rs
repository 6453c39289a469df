//! HTTP API for catalogs and per-user active url preferences

use crate::config::ServerConfig;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use framedeck_common::{ActiveUrlPreference, Catalog, Database, Error};
use framedeck_workspace::{HealthStatus, WorkspaceConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared server state
pub struct AppState {
    pub db: Database,
    pub catalog: RwLock<Arc<Catalog>>,
    pub catalog_path: PathBuf,
    pub workspace: WorkspaceConfig,
}

impl AppState {
    pub fn new(db: Database, catalog: Catalog, catalog_path: PathBuf, workspace: WorkspaceConfig) -> Self {
        Self {
            db,
            catalog: RwLock::new(Arc::new(catalog)),
            catalog_path,
            workspace,
        }
    }

    /// Open the settings database and load the catalog named by `config`
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let db = Database::open(config.db_path())?;
        let catalog_path = config.catalog_path();
        let catalog = Catalog::load(&catalog_path)?;
        info!(
            "Loaded {} url(s) in {} group(s) from {}",
            catalog.len(),
            catalog.groups().len(),
            catalog_path.display()
        );
        Ok(Self::new(db, catalog, catalog_path, config.workspace.clone()))
    }

    pub async fn catalog(&self) -> Arc<Catalog> {
        self.catalog.read().await.clone()
    }
}

/// Error body returned by every handler
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let status = match &e {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::InvalidConfig(_) | Error::Toml(_) | Error::Serialization(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/api/catalog", get(catalog_handler))
        .route("/api/catalog/reload", post(reload_catalog_handler))
        .route("/api/workspace/config", get(workspace_config_handler))
        .route(
            "/api/users/:user_id/active-url",
            get(get_active_url_handler)
                .put(put_active_url_handler)
                .delete(delete_active_url_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until ctrl-c
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("FrameDeck server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Received shutdown signal");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthStatus>> {
    let url_count = state.catalog().await.len();
    let user_count = state.db.user_count()? as usize;
    Ok(Json(HealthStatus {
        status: "ok".to_string(),
        version: framedeck_common::VERSION.to_string(),
        url_count,
        user_count,
    }))
}

async fn catalog_handler(State(state): State<Arc<AppState>>) -> Json<Catalog> {
    Json(state.catalog().await.as_ref().clone())
}

async fn reload_catalog_handler(State(state): State<Arc<AppState>>) -> ApiResult<Json<Catalog>> {
    let catalog = Catalog::load(&state.catalog_path).map_err(|e| {
        warn!("Catalog reload from {} failed: {}", state.catalog_path.display(), e);
        ApiError::from(e)
    })?;
    info!("Catalog reloaded: {} url(s)", catalog.len());
    *state.catalog.write().await = Arc::new(catalog.clone());
    Ok(Json(catalog))
}

async fn workspace_config_handler(State(state): State<Arc<AppState>>) -> Json<WorkspaceConfig> {
    Json(state.workspace.clone())
}

async fn get_active_url_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<ActiveUrlPreference>> {
    let pref = state.db.get_active_url(&user_id)?.unwrap_or_default();
    Ok(Json(pref))
}

async fn put_active_url_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(mut pref): Json<ActiveUrlPreference>,
) -> ApiResult<Json<ActiveUrlPreference>> {
    if let Some(url_id) = &pref.active_url_id {
        if !state.catalog().await.contains(url_id) {
            // clients may hold an older catalog
            warn!("Storing unknown url {} as active for {}", url_id, user_id);
        }
        if pref.last_active_at.is_none() {
            pref.last_active_at = Some(Utc::now());
        }
    }
    state.db.set_active_url(&user_id, &pref)?;
    Ok(Json(pref))
}

async fn delete_active_url_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.db.clear_active_url(&user_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::not_found("active url", user_id).into())
    }
}
