use std::sync::Arc;

use chunkwise_common::{Error, Result};
use chunkwise_config::AppConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Binds the admin HTTP surface and serves it until ctrl-c.
pub struct GatewayServer {
    config: AppConfig,
}

impl GatewayServer {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.gateway.host, self.config.gateway.port);

        let state = Arc::new(AppState::from_config(self.config)?);
        let app = build_router(state);

        let listener = TcpListener::bind(&addr).await?;
        info!("chunkwise gateway listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Other(format!("server error: {e}")))?;

        info!("chunkwise gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // no signal handler available; serve until the task is dropped
        std::future::pending::<()>().await;
    }
}
