//! HTTP server lifecycle.
//!
//! `serve` binds and runs until Ctrl-C. `serve_on` takes an already bound
//! listener and an explicit shutdown signal.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::api::router::api_router;
use crate::api::types::ApiContext;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Bind `addr` and serve in the foreground until Ctrl-C.
pub async fn serve(ctx: ApiContext, addr: SocketAddr) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    serve_on(listener, ctx, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("Ctrl-C received, shutting down");
    })
    .await
}

/// Serve on `listener` until `shutdown` resolves, then drain in-flight requests.
pub async fn serve_on<F>(
    listener: TcpListener,
    ctx: ApiContext,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local = listener.local_addr()?;
    let app = api_router(ctx);

    tracing::info!(addr = %local, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
