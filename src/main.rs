/*****************************************************************************************
 *
 *  Gadget Registry – rental records over a persistent ordered map
 *  ---------------------------------------------------------------
 *
 *  VERSION: create / list / get / rent / return / delete + JSON snapshot persistence
 *
 *****************************************************************************************/

mod app;
mod config;
mod errors;
mod persistence;
mod routes;
mod services;
mod state;

use std::path::PathBuf;

use anyhow::{bail, Context};
use axum::serve;
use tokio::net::TcpListener;
use tokio::task;

use tracing_subscriber::FmtSubscriber;

use crate::config::AppConfig;
use crate::persistence::autosave_loop;
use crate::state::gadgets::GadgetStore;

/// Overrides the config.json lookup next to the executable.
const CONFIG_ENV: &str = "GADGETS_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    //
    // ────────────────────────────────────────────────────────
    //  Load configuration
    // ────────────────────────────────────────────────────────
    //
    let config_path = locate_config()?;
    let cfg = AppConfig::load_from_file(&config_path)?;

    //
    // ────────────────────────────────────────────────────────
    //  Configure logging
    // ────────────────────────────────────────────────────────
    //
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cfg.level_filter())
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    tracing::info!("Starting gadget registry…");
    tracing::info!("Loaded config.json from {}", config_path.display());
    tracing::info!("Loaded configuration: {:?}", cfg);

    //
    // ────────────────────────────────────────────────────────
    //  Open the gadget store
    // ────────────────────────────────────────────────────────
    //
    let store = GadgetStore::open(&cfg.snapshot_path)
        .await
        .with_context(|| format!("Failed to open snapshot {}", cfg.snapshot_path))?;

    //
    // ────────────────────────────────────────────────────────
    //  Start autosave loop
    // ────────────────────────────────────────────────────────
    //
    let autosave = {
        let store_clone = store.clone();
        let interval = cfg.snapshot_interval;

        task::spawn(async move {
            autosave_loop(store_clone, interval).await;
        })
    };

    //
    // ────────────────────────────────────────────────────────
    //  Bind server and start listening
    // ────────────────────────────────────────────────────────
    //
    let app = app::build_app(store.clone(), cfg.clone());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("Listening on http://{}", addr);

    serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    //
    // ────────────────────────────────────────────────────────
    //  Stop autosave, then flush the store. A save interrupted
    //  by the abort leaves the store dirty, so close rewrites it.
    // ────────────────────────────────────────────────────────
    //
    autosave.abort();
    if let Err(e) = autosave.await {
        if !e.is_cancelled() {
            tracing::warn!("Autosave task failed: {e}");
        }
    }

    store.close().await.context("Failed to save snapshot on shutdown")?;
    tracing::info!("Snapshot saved. Goodbye.");

    Ok(())
}

/// `$GADGETS_CONFIG`, else config.json in the executable's folder or its parent.
fn locate_config() -> anyhow::Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    let exe_path = std::env::current_exe().context("Cannot get executable path")?;
    let exe_dir = exe_path
        .parent()
        .context("Cannot get executable directory")?;

    let primary = exe_dir.join("config.json");
    if primary.exists() {
        return Ok(primary);
    }

    let fallback = exe_dir.join("..").join("config.json");
    if fallback.exists() {
        return Ok(fallback);
    }

    bail!(
        "config.json not found in:\n  {}\n  {}\nCopy config.json to one of these paths or set {}.",
        primary.display(),
        fallback.display(),
        CONFIG_ENV
    )
}

//
// ─────────────────────────────────────────────────────────────
//  Graceful shutdown handler
// ─────────────────────────────────────────────────────────────
//
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }

    tracing::warn!("CTRL+C received — shutting down…");
}
