use std::sync::Arc;

use blog_admin::config::Config;
use blog_admin::database::{apply_schema, connect_pool};
use blog_admin::repository::MysqlStore;
use blog_admin::state::AppState;
use blog_admin::storage::R2Storage;
use blog_admin::{auth::JwtService, router};
use dotenv::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // axum logs rejections from built-in extractors with the `axum::rejection`
                // target, at `TRACE` level. `axum::rejection=trace` enables showing those events
                format!(
                    "{}=debug,tower_http=debug,axum::rejection=trace",
                    env!("CARGO_CRATE_NAME")
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "server stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    tracing::info!(env = %config.app.env, port = config.app.port, "starting blog admin");

    let pool = connect_pool(&config.database)?;
    let store = Arc::new(MysqlStore::new(pool.clone()));
    tokio::task::spawn_blocking(move || apply_schema(&pool)).await??;

    let storage = Arc::new(R2Storage::new(&config.r2));
    let jwt = JwtService::new(&config.jwt);
    let state = AppState::new(store, storage, jwt, config.password_cost);

    if let Some(seed) = config.admin_seed.clone() {
        let users = state.users.clone();
        tokio::task::spawn_blocking(move || users.ensure_admin(&seed)).await??;
    } else {
        tracing::debug!("no admin seed configured");
    }

    let app = router(state);
    let listener = TcpListener::bind(("0.0.0.0", config.app.port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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
    tracing::info!("shutdown signal received");
}
