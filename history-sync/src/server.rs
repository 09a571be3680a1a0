//! HTTP surface: history inspection and on-demand group synchronisation.
//!
//! - `GET /health`
//! - `GET /api/history`: fetch a platform's history and filter it by post id or reference id
//! - `POST /api/history/sync`: run [`synchronise_group`] for a configured account group

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use history_sync_core::contract::HistoryFilter;
use history_sync_core::error::FetchError;
use history_sync_core::history;
use history_sync_core::model::{HistoryStatus, Platform, RemoteHistoricalPost};
use history_sync_core::synchronise::{synchronise_group, GroupSyncOptions, SyncDeps};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::load_config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub deps: SyncDeps,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        (
            status,
            Json(json!({ "success": false, "error": self.to_string() })),
        )
            .into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/history", get(get_history))
        .route("/api/history/sync", post(sync_history))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "History sync server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub account_group_id: Option<String>,
    pub profile_key: Option<String>,
    pub post_id: Option<String>,
    pub ref_id: Option<String>,
    pub platform: Option<String>,
    pub limit: Option<u32>,
    pub last_days: Option<u32>,
    pub status: Option<String>,
    #[serde(default)]
    pub include_raw: bool,
}

fn resolve_profile_key(config: &AppConfig, query: &HistoryQuery) -> Result<String, ApiError> {
    if let Some(group_id) = query.account_group_id.as_deref() {
        return config
            .group(group_id)
            .map(|g| g.profile_key.clone())
            .ok_or_else(|| ApiError::BadRequest(format!("unknown account group '{group_id}'")));
    }
    match query.profile_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(ApiError::BadRequest(
            "accountGroupId or profileKey is required".into(),
        )),
    }
}

fn parse_platform(raw: Option<&str>) -> Result<Platform, ApiError> {
    raw.ok_or_else(|| ApiError::BadRequest("platform is required".into()))?
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))
}

/// Without a post id or reference id every record matches.
pub fn matches_lookup(
    post: &RemoteHistoricalPost,
    post_id: Option<&str>,
    ref_id: Option<&str>,
) -> bool {
    if post_id.is_none() && ref_id.is_none() {
        return true;
    }
    let by_post_id = post_id.is_some_and(|id| {
        post.id == id || post.post_ids.iter().any(|d| d.id.as_deref() == Some(id))
    });
    let by_ref_id = ref_id.is_some_and(|r| post.ref_id.as_deref() == Some(r));
    by_post_id || by_ref_id
}

async fn get_history(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let profile_key = resolve_profile_key(&state.config, &query)?;
    let platform = parse_platform(query.platform.as_deref())?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<HistoryStatus>)
        .transpose()
        .map_err(ApiError::BadRequest)?;
    let filter = HistoryFilter {
        limit: query.limit,
        last_days: query.last_days,
        status,
    };

    let raw = history::fetch_raw_history(
        state.deps.provider.as_ref(),
        platform,
        &profile_key,
        &filter,
    )
    .await
    .map_err(|e| match e {
        FetchError::InvalidFilter(msg) => ApiError::BadRequest(msg),
        other => {
            error!(platform = %platform, error = %other, "History lookup failed");
            ApiError::Upstream(other.to_string())
        }
    })?;

    let total = raw.len();
    let posts = history::validate_records(platform, raw.clone());
    let matches: Vec<RemoteHistoricalPost> = posts
        .into_iter()
        .filter(|p| matches_lookup(p, query.post_id.as_deref(), query.ref_id.as_deref()))
        .collect();

    let mut body = json!({
        "success": true,
        "meta": {
            "platform": platform,
            "total": total,
            "matched": matches.len(),
            "postId": query.post_id,
            "refId": query.ref_id,
            "filter": filter,
        },
        "matches": matches,
    });
    if query.include_raw {
        body["history"] = json!(raw);
    }
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBody {
    pub account_group_id: String,
    #[serde(default)]
    pub platforms: Option<Vec<String>>,
}

async fn sync_history(
    State(state): State<AppState>,
    body: Result<Json<SyncBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let group = state
        .config
        .group(&body.account_group_id)
        .ok_or_else(|| {
            ApiError::NotFound(format!("unknown account group '{}'", body.account_group_id))
        })?;

    let platforms = body
        .platforms
        .map(|list| {
            list.iter()
                .map(|p| p.parse::<Platform>())
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    info!(group = %group.id, "Running group sync from HTTP request");
    let report = synchronise_group(
        &state.deps,
        &state.config.sync,
        group,
        platforms.as_deref(),
        GroupSyncOptions::default(),
    )
    .await;

    Ok(Json(json!({
        "success": report.success(),
        "updated": report.updated,
        "errors": report.errors,
        "reports": report.reports,
    })))
}
