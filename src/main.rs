//! pledge-pulse: binary entrypoint.
//! Loads config, opens the history store, connects the presence sink and
//! runs the refresh/rotation scheduler until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use pledge_pulse::app;
use pledge_pulse::config::BotConfig;
use pledge_pulse::logging::init_logging;
use pledge_pulse::metrics::Metrics;
use pledge_pulse::shutdown::ShutdownController;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let cfg = BotConfig::load_default().context("loading configuration")?;
    init_logging(cfg.log.format, &cfg.log.level)?;
    tracing::info!(
        network = ?cfg.network,
        node = cfg.node_url(),
        presence = ?cfg.presence.mode,
        "pledge-pulse starting"
    );

    let store = app::open_store(&cfg.store.path)?;
    let scheduler = app::build_scheduler(
        &cfg,
        app::chain_source(&cfg),
        app::version_source(&cfg),
        app::presence_sink(&cfg),
        store,
    )?;

    if let Some(bind) = cfg.http.bind {
        let metrics = Metrics::init()?;
        let router = metrics.router(scheduler.board().clone());
        let listener = tokio::net::TcpListener::bind(bind)
            .await
            .with_context(|| format!("binding status server to {bind}"))?;
        tracing::info!(%bind, "status server listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "status server stopped");
            }
        });
    }

    let shutdown = ShutdownController::new();
    let run = tokio::spawn(scheduler.run(shutdown.subscribe()));

    shutdown.wait_for_signal().await;
    run.await.context("scheduler task")?;
    tracing::info!("pledge-pulse stopped");
    Ok(())
}
