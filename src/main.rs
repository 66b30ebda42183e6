//! timetracker - foreground window and idle time tracker daemon.
//!
//! Records how long each window stays focused, and how long the user is
//! away, to a SQLite database and a CSV log.
//! Send SIGUSR1 to pause or resume tracking; Ctrl-C to stop.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use timetracker::activity::{ActivityMonitor, ActivitySignal};
use timetracker::config::Config;
use timetracker::dispatch::EventDispatcher;
use timetracker::poll::PollLoop;
use timetracker::probe::{NativeProbe, SysinfoResolver};
use timetracker::sink::{CsvSink, Sink, SqliteSink};

/// Application version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    // Load configuration
    let config = Config::load(config_path.as_deref())?;
    config.validate()?;

    init_tracing(&config.logging.level, config.logging.json)?;

    info!("Starting timetracker v{}", VERSION);

    if let Err(e) = run(config).await {
        error!("timetracker stopped: {:#}", e);
        return Err(e);
    }

    info!("timetracker shutdown complete");
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    std::fs::create_dir_all(&config.storage.data_dir).with_context(|| {
        format!("Failed to create data directory: {:?}", config.storage.data_dir)
    })?;

    let user = config.tracker.user();
    info!(
        "Configuration loaded: poll interval={:?}, idle threshold={}s, user={}",
        config.tracker.poll_interval(),
        config.tracker.idle_threshold_seconds,
        user
    );

    let sqlite = SqliteSink::new(config.storage.database_path(), config.storage.table.clone());
    let csv = CsvSink::new(config.storage.csv_path());
    info!(
        "Recording to {:?} (table {}) and {:?}",
        sqlite.path(),
        sqlite.table(),
        csv.path()
    );
    let sinks: Vec<Arc<dyn Sink>> = vec![Arc::new(sqlite), Arc::new(csv)];
    let dispatcher = EventDispatcher::new(sinks).with_timeout(config.storage.sink_timeout());

    // Start input listeners before the first sample
    let activity = ActivitySignal::new();
    let _monitor =
        ActivityMonitor::start(activity.clone(), config.tracker.activity_check_interval())
            .context("Failed to start input activity monitor")?;

    let probe = NativeProbe::connect().context("Failed to connect to the window system")?;

    let poll = PollLoop::new(
        probe,
        SysinfoResolver::new(),
        activity,
        dispatcher,
        config.tracker.detector_settings(),
        user,
    )
    .with_interval(config.tracker.poll_interval());

    spawn_pause_toggle(poll.pause_flag());

    poll.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;

    Ok(())
}

/// Toggle the pause flag on every SIGUSR1.
#[cfg(unix)]
fn spawn_pause_toggle(paused: Arc<AtomicBool>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut signals = match signal(SignalKind::user_defined1()) {
            Ok(signals) => signals,
            Err(e) => {
                error!("Failed to install SIGUSR1 handler, pausing disabled: {}", e);
                return;
            }
        };

        while signals.recv().await.is_some() {
            let was_paused = paused.fetch_xor(true, Ordering::SeqCst);
            info!("Tracking {}", if was_paused { "resumed" } else { "paused" });
        }
    });
}

#[cfg(not(unix))]
fn spawn_pause_toggle(_paused: Arc<AtomicBool>) {}

/// Initialize tracing subscriber with the given log level.
fn init_tracing(level: &str, json: bool) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .try_init()?;
    }

    Ok(())
}
