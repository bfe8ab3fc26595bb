//! Anchor Timer - serve a persistent countdown/countup timer over HTTP
//!
//! This is the main entry point for the anchor-timer application.

use std::sync::Arc;
use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use anchor_timer::{
    api::create_router,
    config::Config,
    engine::{TimerEngine, TimerRuntime},
    state::{view_channel, AppState},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("anchor_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting anchor-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, key={}, mode={:?}, duration={:?}ms, cross_tab={}",
        config.host, config.port, config.key, config.mode, config.duration_ms, config.cross_tab
    );

    // Timer callbacks feed the change channel the API long-polls on
    let view_tx = view_channel();
    let ticks = Arc::clone(&view_tx);
    let ends = Arc::clone(&view_tx);
    let options = config
        .timer_options()
        .on_tick(move |value_ms| ticks.send_modify(|view| view.value_ms = value_ms))
        .on_end(move || {
            info!("Timer finished");
            ends.send_modify(|view| {
                view.running = false;
                view.ended = true;
            });
        })
        .on_persist_error(|e| warn!("Timer state not saved: {}", e));

    let runtime = TimerRuntime::tokio().context("Timer needs a tokio runtime")?;
    let timer = TimerEngine::new(options, runtime);
    let state = Arc::new(AppState::new(
        timer,
        view_tx,
        config.key.clone(),
        config.port,
        config.host.clone(),
    ));

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /timer        - Current timer value");
    info!("  GET  /timer/next   - Wait for the next timer change");
    info!("  POST /timer/start  - Start or resume");
    info!("  POST /timer/pause  - Pause");
    info!("  POST /timer/reset  - Reset to idle");
    info!("  GET  /status       - Timer and server status");
    info!("  GET  /health       - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    state.timer.dispose();
    info!("Server shutdown complete");
    Ok(())
}
