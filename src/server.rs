use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::app::{router, AppState};
use crate::auth::JwtAuthenticator;
use crate::config::AppConfig;
use crate::database::DatabaseManager;

/// Wire the configured store and token gate into handler state
pub async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let store = DatabaseManager::connect(&config.database)
        .await
        .context("failed to initialise product store")?;
    let auth = JwtAuthenticator::new(&config.security).context("failed to initialise JWT authenticator")?;

    if !config.security.enforce_ownership {
        warn!("Ownership checks are disabled: any authenticated caller may update or delete any product");
    }

    Ok(AppState::new(store, Arc::new(auth), config.security.enforce_ownership))
}

/// Bind, serve until Ctrl-C/SIGTERM, then close the store
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let state = build_state(&config).await?;

    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    serve(listener, state, &config, shutdown_signal()).await
}

pub async fn serve<F>(listener: TcpListener, state: AppState, config: &AppConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let store = state.store.clone();
    let app = router(state, config);

    info!(
        "Product API listening on http://{} ({:?} mode)",
        listener.local_addr()?,
        config.environment
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")?;

    store.close().await;
    info!("Product API stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
