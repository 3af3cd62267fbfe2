use super::shutdown::shutdown_signal;
use crate::errors::handlers::not_found;
use axum::{Router, http::StatusCode};
use core_config::server::ServerConfig;
use std::future::IntoFuture;
use std::io;
use tokio::sync::watch;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, warn};

/// Wraps API routes with the cross-cutting layers every service uses.
///
/// - routes nested under `/api`
/// - JSON 404 fallback
/// - request spans at INFO
/// - per-request timeout (`request_timeout`, answered with 408)
/// - response compression
pub fn create_router(apis: Router, server_config: &ServerConfig) -> Router {
    Router::new()
        .nest("/api", apis)
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            server_config.request_timeout,
        ))
        .layer(CompressionLayer::new())
}

/// Binds the configured address and serves until SIGINT/SIGTERM.
///
/// After the signal, in-flight requests get `shutdown_timeout` to drain;
/// whatever is still open after that is dropped.
///
/// # Errors
/// Fails if the listener cannot bind or the server loop errors out.
pub async fn serve(router: Router, server_config: &ServerConfig) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(server_config.address()).await?;
    info!("Server starting on {}", listener.local_addr()?);

    let (signalled_tx, mut signalled_rx) = watch::channel(false);
    let signal = async move {
        shutdown_signal().await;
        let _ = signalled_tx.send(true);
    };

    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(signal)
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.inspect_err(|e| tracing::error!("Server encountered an error: {:?}", e))?;
        }
        _ = signalled_rx.wait_for(|signalled| *signalled) => {
            match tokio::time::timeout(server_config.shutdown_timeout, &mut server).await {
                Ok(result) => result?,
                Err(_) => warn!(
                    "Graceful shutdown exceeded {:?}, dropping open connections",
                    server_config.shutdown_timeout
                ),
            }
        }
    }

    info!("Server stopped");
    Ok(())
}
