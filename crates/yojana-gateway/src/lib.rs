//! HTTP surface of the Yojana assistant: chat and session endpoints over
//! axum, with optional API-key auth, per-client rate limiting and CORS.

pub mod api;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod server;

pub use error::ApiError;
pub use middleware::AuthConfig;
pub use rate_limit::{Admission, RateLimiter};
pub use server::{AppState, GatewayServer};
