mod api;
mod middleware;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::{build_app, default_rate_limit_state, AppState};
use proploc_engine::SearchEngine;
use proploc_providers::Collaborators;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = proploc_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = proploc_db::PoolConfig::from_app_config(&config);
    let pool = proploc_db::connect_pool(&config.database_url, pool_config).await?;
    proploc_db::run_migrations(&pool).await?;

    let collaborators = Collaborators::from_config(&config)?;
    let engine = SearchEngine::new(
        collaborators.geocoder,
        collaborators.detector,
        collaborators.imagery,
        proploc_db::PgRequestRepository::new(pool.clone()),
        proploc_core::SearchPolicy::default(),
    );

    let app = build_app(
        AppState {
            engine: Arc::new(engine),
            pool,
        },
        default_rate_limit_state(),
    );

    tracing::info!(addr = %config.bind_addr, env = %config.env, "starting server");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
