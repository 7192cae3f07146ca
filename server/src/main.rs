mod config;
mod control;
mod effects;
mod session;

use std::sync::Arc;

use lamp::{FallbackLamp, GoveeCloud, GoveeLan, LampDriver};
use lichess_client::LichessClient;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::Instrument;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use config::{ConfigWatcher, FileConfigSource};
use control::ControlServer;
use session::SessionMonitor;

/// Stderr always; a daily rolling file as well when `CHESSLAMP_LOG_DIR` is set.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer().with_span_events(FmtSpan::CLOSE);

    match std::env::var_os("CHESSLAMP_LOG_DIR") {
        Some(log_dir) => {
            std::fs::create_dir_all(&log_dir).ok();
            let file_appender = tracing_appender::rolling::daily(&log_dir, "chesslamp-server");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_line_number(true)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();

    tracing::info!("Starting chesslamp server");

    let config_path = config::get_config_path();
    tracing::info!("Using config file: {}", config_path.display());
    let file = config::load_initial(&config_path)?;
    let credentials = file.credentials()?;

    let source = Arc::new(LichessClient::new(credentials.lichess_token.clone())?);
    let lan = GoveeLan::new(
        credentials.govee_device_mac.clone(),
        credentials.govee_device_ip,
    );
    let cloud = GoveeCloud::new(
        credentials.govee_api_key.clone(),
        credentials.govee_device_mac.clone(),
        credentials.govee_model.clone(),
    )?;
    let lamp: Arc<dyn LampDriver> = Arc::new(FallbackLamp::new(lan, cloud));

    let (scheduler, scheduler_task) = effects::spawn_scheduler(lamp.clone());

    let (mut watcher, config_rx) = ConfigWatcher::new(FileConfigSource::new(&config_path), file);
    watcher.prime().await;
    tokio::spawn(
        watcher
            .run()
            .instrument(tracing::info_span!("config_watcher")),
    );

    let (monitor, handle) = SessionMonitor::new(source, lamp, scheduler.clone(), config_rx);
    let monitor_task = tokio::spawn(monitor.run());

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
    let control = ControlServer::bind(&chesslamp_proto::socket_path(), handle.clone(), shutdown_tx)?;
    let socket_path = control.path().to_path_buf();
    tokio::spawn(control.run());

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
        _ = terminate.recv() => tracing::info!("Terminated"),
        _ = shutdown_rx.recv() => tracing::info!("Shutdown requested"),
    }

    // the monitor restores the lamp before it exits
    handle.shutdown().await;
    if let Err(e) = monitor_task.await {
        tracing::error!(error = %e, "Session monitor task failed");
    }
    scheduler.shutdown().await;
    if let Err(e) = scheduler_task.await {
        tracing::error!(error = %e, "Scheduler task failed");
    }
    let _ = std::fs::remove_file(&socket_path);

    tracing::info!("Server stopped");
    Ok(())
}
