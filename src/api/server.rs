//! HTTP server lifecycle: bind → spawn background task → return handle
//! with shutdown channel.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use thiserror::Error;
use tokio::sync::oneshot;

use crate::api::router::api_router;
use crate::api::types::ApiContext;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Failed to resolve server address: {0}")]
    Addr(std::io::Error),
}

/// Handle to a running API server.
pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ApiServer {
    /// Shut down the server gracefully. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }
}

/// Start the API server on the configured port, listening on all interfaces.
pub async fn start_server(ctx: ApiContext) -> Result<ApiServer, ServerError> {
    let port = ctx.config.port;
    start_server_on(ctx, IpAddr::V4(Ipv4Addr::UNSPECIFIED), port).await
}

/// Start on a specific address. Tests use `127.0.0.1` with port 0.
pub async fn start_server_on(
    ctx: ApiContext,
    ip: IpAddr,
    port: u16,
) -> Result<ApiServer, ServerError> {
    let bind_addr = SocketAddr::new(ip, port);
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| ServerError::Bind {
            addr: bind_addr,
            source: e,
        })?;
    let addr = listener.local_addr().map_err(ServerError::Addr)?;

    let app = api_router(ctx);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::Db;

    fn test_ctx(dir: &tempfile::TempDir) -> ApiContext {
        let config = Config::for_tests(dir.path().to_path_buf());
        let db = Db::open_in_memory().unwrap();
        ApiContext::new(db, config)
    }

    #[tokio::test]
    async fn start_serve_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut server =
            start_server_on(test_ctx(&dir), IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
                .await
                .expect("server should start");
        assert!(server.addr.port() > 0);

        let url = format!("http://127.0.0.1:{}/api/health", server.addr.port());
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        // Protected route without a token is rejected
        let url = format!("http://127.0.0.1:{}/api/user/appointments", server.addr.port());
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

        server.shutdown();
        server.shutdown(); // idempotent
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}
