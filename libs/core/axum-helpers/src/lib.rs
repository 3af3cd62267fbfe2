//! # Axum Helpers
//!
//! Shared HTTP plumbing for the service binaries.
//!
//! - **[`errors`]**: `AppError` and the `ErrorResponse` wire format
//! - **[`extractors`]**: `ValidatedJson`, `ValidatedQuery` and `UuidPath`
//! - **[`auth`]**: bearer-token header parsing
//! - **[`server`]**: router layering and graceful serving

pub mod auth;
pub mod errors;
pub mod extractors;
pub mod server;

pub use auth::extract_bearer_token;
pub use errors::{AppError, ErrorCode, ErrorResponse};
pub use extractors::{UuidPath, ValidatedJson, ValidatedQuery};
pub use server::{create_router, serve, shutdown_signal};
