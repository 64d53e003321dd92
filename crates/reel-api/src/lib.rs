//! Axum HTTP API server for listing video assembly.
//!
//! This crate provides:
//! - Multipart ingress for the combine route, streamed to disk
//! - HS256 bearer token verification
//! - Video listing, download and deletion
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod upload;

pub use auth::{issue_token, AuthUser, JwtVerifier};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
