//! HTTP surface: visitor checks and the blog catalog.

use crate::blog::{BlogCatalog, BlogPost};
use crate::config::GateConfig;
use crate::engine::{RedirectEngine, VisitorRequest, VisitorVerdict};
use crate::error::ApiError;
use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        ConnectInfo, Path, Query, State,
    },
    http::{header::USER_AGENT, HeaderMap},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared request state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RedirectEngine>,
    pub catalog: Arc<BlogCatalog>,
    pub trust_forwarded_for: bool,
    pub max_url_length: usize,
}

impl AppState {
    pub fn new(config: &GateConfig, engine: Arc<RedirectEngine>, catalog: Arc<BlogCatalog>) -> Self {
        Self {
            engine,
            catalog,
            trust_forwarded_for: config.server.trust_forwarded_for,
            max_url_length: config.limits.max_url_length,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/check-visitor", get(check_visitor))
        .route("/api/blog-posts", get(blog_posts))
        .route("/api/blog-posts/:id", get(blog_post))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener.local_addr()?;
    info!(%address, "Traffic gate listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

/// `GET /api/check-visitor?url=<encoded>&clientBlacklisted=<bool>`
async fn check_visitor(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    query: Result<Query<BTreeMap<String, String>>, QueryRejection>,
) -> Result<Json<VisitorVerdict>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;

    let url = query.get("url").cloned().unwrap_or_default();
    if url.len() > state.max_url_length {
        return Err(ApiError::InvalidRequest(format!(
            "url exceeds {} bytes",
            state.max_url_length
        )));
    }
    let client_blacklisted = parse_flag(query.get("clientBlacklisted").map(String::as_str))?;

    let request = VisitorRequest {
        ip_address: client_ip(&headers, peer.map(|ConnectInfo(addr)| addr), state.trust_forwarded_for),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        url,
        client_blacklisted,
        query,
    };

    let verdict = state.engine.check(&request).await?;
    Ok(Json(verdict))
}

/// `GET /api/blog-posts`
async fn blog_posts(State(state): State<AppState>) -> Json<Vec<BlogPost>> {
    Json(state.catalog.all().to_vec())
}

/// `GET /api/blog-posts/:id`
async fn blog_post(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<BlogPost>, ApiError> {
    let Path(id) = id.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    state
        .catalog
        .get(id)
        .cloned()
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Parse the client-asserted flag; absent means not flagged.
fn parse_flag(raw: Option<&str>) -> Result<bool, ApiError> {
    match raw {
        None | Some("false") => Ok(false),
        Some("true") => Ok(true),
        Some(other) => Err(ApiError::InvalidRequest(format!(
            "clientBlacklisted must be true or false, got {:?}",
            other
        ))),
    }
}

/// Resolve the client address: first `X-Forwarded-For` hop, then the
/// socket peer, then `0.0.0.0`.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "0.0.0.0".to_string())
}
