mod api;
mod middleware;
mod runner;
mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use newsroom_research::{CrawlRateLimiter, ResearchEngine, TranscriptBreaker};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
    runner::ResearchRunner,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(newsroom_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = newsroom_db::PoolConfig::from_app_config(&config);
    let pool = newsroom_db::connect_pool(&config.database_url, pool_config).await?;
    newsroom_db::run_migrations(&pool).await?;

    let limiter = Arc::new(CrawlRateLimiter::new(Duration::from_millis(
        config.crawl_min_interval_ms,
    )));
    let engine = ResearchEngine::from_config(
        pool.clone(),
        &config,
        limiter,
        Arc::new(TranscriptBreaker::new()),
    )?;
    let runner = Arc::new(ResearchRunner::new(
        Arc::new(engine),
        config.research_max_retries,
        Duration::from_secs(config.research_retry_delay_secs),
    ));

    let _scheduler =
        scheduler::build_scheduler(pool.clone(), Arc::clone(&config), Arc::clone(&runner)).await?;

    let auth = AuthState::from_env(config.is_development())?;
    let app = build_app(AppState { pool, runner }, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "newsroom server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
