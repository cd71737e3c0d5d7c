mod board;
mod config;
mod monitor;
mod sms;
mod state;
mod web;

use anyhow::Result;
use std::{env, sync::Arc, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

use board::Board;
use sms::SmsClient;
use state::ControllerState;
use web::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ──────────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::load(&config_path)?;

    // ── Board ───────────────────────────────────────────────────────
    let board = Arc::new(Board::from_kit(&cfg.board.kit)?);
    info!(kit = %cfg.board.kit, "board ready");

    // ── SMS transport ───────────────────────────────────────────────
    let sms = Arc::new(SmsClient::new(cfg.sms.clone()));
    if !sms.is_enabled() {
        info!("sms disabled — alerts go to the board display and event log only");
    }

    // ── Shared state ────────────────────────────────────────────────
    let shared = ControllerState::shared();
    {
        let mut st = shared.write().await;
        st.record_system("hub started".to_string());
    }

    // Prime the history so the index page is non-empty on first load.
    monitor::check_moisture(&board, &shared).await?;

    // ── Monitor loops ───────────────────────────────────────────────
    let every = Duration::from_secs(cfg.monitor.moisture_interval_min * 60);
    tokio::spawn(monitor::run_moisture(
        Arc::clone(&board),
        Arc::clone(&shared),
        every,
    ));
    tokio::spawn(monitor::run_lights(
        Arc::clone(&board),
        Arc::clone(&shared),
        Arc::clone(&sms),
    ));

    // ── Web server ──────────────────────────────────────────────────
    let app = AppState { shared, board, sms };
    web::serve(app, cfg.web.port).await
}
