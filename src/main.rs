// src/main.rs

use color_eyre::eyre::{Result, WrapErr};
use tokio::net::TcpListener;
use tracing::{info, warn};

mod app;
mod config;
mod core;
mod logging;
mod web;

use app::App;
use config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    logging::initialize_logging()?;

    let settings = Settings::load().wrap_err("loading configuration")?;
    let App { state, workers } = App::build(&settings).await?;

    let sweeper = settings.storage.ttl().map(|ttl| {
        info!(ttl_secs = ttl.as_secs(), "Result expiry enabled.");
        core::store::spawn_sweeper(state.store.clone(), ttl, settings.storage.sweep_interval())
    });

    let listener = TcpListener::bind(settings.server.bind)
        .await
        .wrap_err_with(|| format!("binding {}", settings.server.bind))?;
    info!(address = %settings.server.bind, "Listening.");

    axum::serve(listener, web::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("serving HTTP")?;

    // The router owned the last queue handle, so workers finish what is queued and stop.
    info!("Draining scan queue.");
    workers.shutdown().await;
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C, shutting down.");
        return;
    }
    info!("Shutdown requested.");
}
