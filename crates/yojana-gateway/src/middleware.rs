use crate::error::ErrorBody;
use crate::rate_limit::{Admission, RateLimiter};
use axum::{
    extract::{ConnectInfo, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::warn;

/// Paths reachable without an API key.
const PUBLIC_PATHS: &[&str] = &["/", "/health"];

/// Auth configuration for the gateway.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// API keys that are allowed to connect. Empty = no auth required.
    pub api_keys: Vec<String>,
}

impl AuthConfig {
    pub fn new(api_keys: Vec<String>) -> Self {
        Self { api_keys }
    }

    /// Returns true if authentication is enabled (at least one key configured).
    pub fn is_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }
}

/// Shared middleware state.
#[derive(Clone)]
pub struct MiddlewareState {
    pub rate_limiter: Arc<RateLimiter>,
    pub auth: AuthConfig,
}

#[derive(serde::Deserialize, Default)]
pub struct AuthQuery {
    pub api_key: Option<String>,
}

/// Key from `Authorization: Bearer <key>`, falling back to `?api_key=<key>`.
fn presented_key(headers: &HeaderMap, query: &AuthQuery) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .or_else(|| query.api_key.clone())
}

/// Rate limit bucket key: a configured API key, else the first
/// `X-Forwarded-For` address, else the peer address.
///
/// Keys that are not configured never get their own bucket.
fn client_key(
    headers: &HeaderMap,
    query: &AuthQuery,
    auth: &AuthConfig,
    peer: Option<IpAddr>,
) -> String {
    if let Some(key) = presented_key(headers, query).filter(|k| auth.api_keys.contains(k)) {
        return format!("key:{key}");
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(|ip| format!("ip:{ip}"))
        .or_else(|| peer.map(|ip| format!("ip:{ip}")))
        .unwrap_or_else(|| "anonymous".to_string())
}

fn reject(status: StatusCode, error: &str, message: &str) -> Response {
    (status, Json(ErrorBody::new(error, message))).into_response()
}

/// Auth middleware: validates the API key from header or query param.
///
/// If no API keys are configured, all requests are allowed.
pub async fn auth_middleware(
    State(state): State<Arc<MiddlewareState>>,
    headers: HeaderMap,
    query: Query<AuthQuery>,
    request: Request,
    next: Next,
) -> Response {
    if !state.auth.is_enabled() || PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    match presented_key(&headers, &query) {
        Some(k) if state.auth.api_keys.contains(&k) => next.run(request).await,
        Some(_) => {
            warn!(path = %request.uri().path(), "Rejected request: invalid API key");
            reject(StatusCode::UNAUTHORIZED, "unauthorized", "Invalid API key")
        }
        None => {
            warn!(path = %request.uri().path(), "Rejected request: missing API key");
            reject(StatusCode::UNAUTHORIZED, "unauthorized", "API key required")
        }
    }
}

/// Rate limiting middleware: one token bucket per client key.
pub async fn rate_limit_middleware(
    State(state): State<Arc<MiddlewareState>>,
    headers: HeaderMap,
    query: Query<AuthQuery>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    let client = client_key(&headers, &query, &state.auth, peer);
    if let Admission::Limited { retry_after } = state.rate_limiter.admit(&client).await {
        warn!(
            client = %client,
            retry_after_ms = retry_after.as_millis() as u64,
            "Rate limited request"
        );
        let mut response = reject(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "Rate limit exceeded, please slow down",
        );
        let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        return response;
    }

    next.run(request).await
}
