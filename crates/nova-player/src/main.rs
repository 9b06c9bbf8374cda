mod controller;
mod invocation;
mod playback;
mod process;
mod recording;
mod registry;
mod sweep;
#[cfg(test)]
mod testutil;

use nova_core::config::Config;
use nova_core::platform;
use nova_core::status::StatusUpdate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use controller::PlayerController;

struct Args {
    url: Option<String>,
    auto_record: bool,
}

fn parse_args() -> Args {
    let mut url = None;
    let mut auto_record = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--record" => auto_record = true,
            // accepted for compatibility; this binary is always headless
            "--headless" => {}
            other if !other.starts_with('-') => url = Some(other.to_string()),
            other => eprintln!("NovaPlayer: ignoring unknown flag {other}"),
        }
    }
    Args { url, auto_record }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("player.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,nova_player=debug")),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let args = parse_args();
    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    // Kill leftovers from prior runs before any supervisor exists.
    let swept = sweep::sweep();
    if swept > 0 {
        info!(swept, "killed orphaned player processes");
    }

    let controller = Arc::new(PlayerController::new(&config));

    // Print every published status transition, the headless equivalent of
    // the status labels a GUI would show.
    let mut updates = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(StatusUpdate::Playback { message, .. })
                | Ok(StatusUpdate::Recording { message, .. }) => {
                    println!("NovaPlayer: {message}");
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    if let Some(url) = &args.url {
        // Subscribe before play so the first Playing transition is seen.
        if args.auto_record {
            controller.enable_auto_record();
        }
        controller.play(url);
    }

    tokio::select! {
        result = wait_for_shutdown_signal() => {
            result?;
            info!("received termination signal, shutting down");
        }
        _ = run_until_idle(&controller) => {
            info!("nothing left to supervise, shutting down");
        }
    }

    controller.shutdown().await;
    Ok(())
}

/// Completes once neither playback nor recording has work in flight.
async fn run_until_idle(controller: &PlayerController) {
    loop {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if !controller.status().is_active() {
            return;
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
