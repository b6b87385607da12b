pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use crate::core::state::Services;
use crate::core::{config::Settings, redis::RedisHandle, state::AppState, telemetry};

const API_SERVICE: &str = "playpack-reports";
const WORKER_SERVICE: &str = "playpack-worker";

/// Shared startup for both binaries: config, tracing, metrics, pool, migrations, services.
async fn bootstrap(service: &'static str) -> anyhow::Result<AppState> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings, service)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings, service).await?;
    db::run_migrations(&db_pool).await?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    let services = Services::postgres(&settings, db_pool.clone())?;

    Ok(AppState::new(settings, db_pool, redis, services))
}

pub async fn run() -> anyhow::Result<()> {
    let state = bootstrap(API_SERVICE).await?;

    let redis = state.redis().clone();
    if let Err(err) = redis.connect().await {
        tracing::error!(error = %err, "Failed to connect to Redis; continuing without rate limiting");
    } else {
        tracing::info!("Redis connected successfully");
    }

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "PlayPack reports API listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}

/// Runs the learning-summary queue loop until a shutdown signal arrives.
pub async fn run_worker() -> anyhow::Result<()> {
    let state = bootstrap(WORKER_SERVICE).await?;
    tasks::scheduler::run(state).await
}
