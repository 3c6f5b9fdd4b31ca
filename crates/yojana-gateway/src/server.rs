use crate::api;
use crate::middleware::{auth_middleware, rate_limit_middleware, AuthConfig, MiddlewareState};
use crate::rate_limit::RateLimiter;
use axum::{
    http::HeaderValue,
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use yojana_agent::RagPipeline;
use yojana_memory::VectorStore;
use yojana_session::SessionStore;

/// Shared application state.
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
    pub sessions: Arc<dyn SessionStore>,
    pub vectors: Arc<dyn VectorStore>,
}

impl AppState {
    /// The session store is the one the pipeline records turns in.
    pub fn new(pipeline: Arc<RagPipeline>, vectors: Arc<dyn VectorStore>) -> Self {
        let sessions = pipeline.sessions().clone();
        Self {
            pipeline,
            sessions,
            vectors,
        }
    }
}

/// The REST gateway.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the gateway without auth or rate limiting, allowing any origin.
    pub fn build(state: Arc<AppState>) -> Router {
        Self::build_with_middleware(state, None, AuthConfig::default(), &[])
    }

    /// Build the gateway with optional rate limiting, auth and an origin
    /// allow-list. An empty `cors_origins` allows any origin.
    pub fn build_with_middleware(
        state: Arc<AppState>,
        rate_limiter: Option<Arc<RateLimiter>>,
        auth_config: AuthConfig,
        cors_origins: &[String],
    ) -> Router {
        let app = Router::new()
            .route("/", get(api::root_handler))
            .route("/health", get(api::health_handler))
            .route("/api/chat", post(api::chat_handler))
            .route("/api/session", post(api::create_session_handler))
            .route("/api/sessions", get(api::list_sessions_handler))
            .route(
                "/api/session/{id}/messages",
                get(api::session_messages_handler),
            )
            .route(
                "/api/session/{id}",
                axum::routing::delete(api::delete_session_handler),
            )
            .with_state(state);

        let app = if rate_limiter.is_some() || auth_config.is_enabled() {
            let mw_state = Arc::new(MiddlewareState {
                rate_limiter: rate_limiter
                    .unwrap_or_else(|| Arc::new(RateLimiter::new(1000.0, 1000.0))),
                auth: auth_config,
            });

            app.layer(axum_mw::from_fn_with_state(
                mw_state.clone(),
                rate_limit_middleware,
            ))
            .layer(axum_mw::from_fn_with_state(mw_state, auth_middleware))
        } else {
            app
        };

        app.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors_origins)),
        )
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}
