//! Router assembly and graceful serving.
//!
//! ```ignore
//! use axum_helpers::server::{create_router, serve};
//!
//! let router = create_router(api_routes, &config.server);
//! serve(router, &config.server).await?;
//! ```

pub mod app;
pub mod shutdown;

pub use app::{create_router, serve};
pub use shutdown::shutdown_signal;
