mod audio;
mod io;
mod live;
mod pipeline;
mod state;
mod ui;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use io::CpalDevices;
use live::{CallDriver, GeminiTransport, LiveConfig};
use state::AppState;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run() {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    info!("Starting Live Tutor...");

    let config = LiveConfig::from_env().context("Failed to load configuration")?;
    info!("Configuration: {:?}", config);

    // wss connections need a process-wide rustls crypto provider.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("live-tutor")
        .build()
        .context("Failed to start async runtime")?;

    let devices = Arc::new(CpalDevices::new(
        config.input_device.clone(),
        config.output_device.clone(),
    ));
    let model = config.model.clone();
    let voice = config.voice.clone();
    let (driver, call) = CallDriver::new(config, devices, Arc::new(GeminiTransport));
    runtime.spawn(driver.run());

    let state = AppState::new(call.clone(), model, voice);

    info!("Call driver started, launching UI...");

    dioxus::LaunchBuilder::desktop()
        .with_cfg(
            dioxus::desktop::Config::new().with_window(
                dioxus::desktop::WindowBuilder::new()
                    .with_title("Live Tutor")
                    .with_always_on_top(false),
            ),
        )
        .with_context(state)
        .launch(ui::App);

    call.shutdown();
    runtime.shutdown_timeout(std::time::Duration::from_secs(2));
    Ok(())
}
