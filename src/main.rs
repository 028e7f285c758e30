use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scan_watch::config::{self, Settings};
use scan_watch::display::{ActivityLog, ConsoleDisplay, Display};
use scan_watch::server::{self, Dashboard};
use scan_watch::session::Session;
use scan_watch::store::{HistoryStore, SessionFileStore};
use scan_watch::transport::EventStream;
use scan_watch::wakelock::{InhibitLock, WakeLockKeeper};
use scan_watch::clock;

/// scan-watch — live status display for a pushed stream of device scan results.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "scan-watch",
    version,
    about = "Live status display for a pushed stream of device scan results.",
    long_about = None
)]
struct Cli {
    /// Event stream endpoint (text/event-stream).
    #[arg(long, env = "SCAN_WATCH_URL", default_value = config::DEFAULT_URL)]
    url: String,

    /// Dashboard listen address.
    #[arg(long, env = "SCAN_WATCH_BIND", default_value = config::DEFAULT_BIND)]
    bind: String,

    /// Print results to the console instead of serving the dashboard.
    #[arg(long = "no-ui", default_value_t = false)]
    no_ui: bool,

    /// Session name. Restarting with the same name restores its history.
    #[arg(long, env = "SCAN_WATCH_SESSION", default_value = config::DEFAULT_SESSION)]
    session: String,

    /// Directory holding per-session history.
    #[arg(long = "state-dir", env = "SCAN_WATCH_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Keep at most this many history entries (default: keep all).
    #[arg(long = "history-limit", env = "SCAN_WATCH_HISTORY_LIMIT")]
    history_limit: Option<usize>,

    /// First reconnect delay in milliseconds; the server's `retry:` overrides it.
    #[arg(long = "retry-ms", default_value_t = 3000)]
    retry_ms: u64,

    /// Upper bound for the reconnect delay in milliseconds.
    #[arg(long = "max-retry-ms", default_value_t = 60_000)]
    max_retry_ms: u64,

    /// Hold an idle inhibitor so the screen stays on.
    #[arg(long = "keep-awake", default_value_t = false)]
    keep_awake: bool,

    /// Discard the session's stored history before starting.
    #[arg(long, default_value_t = false)]
    reset: bool,
}

impl Cli {
    fn into_settings(self) -> Result<Settings> {
        let settings = Settings {
            bind: (!self.no_ui).then_some(self.bind),
            session: self.session,
            state_dir: self.state_dir.unwrap_or_else(config::default_state_dir),
            history_limit: self.history_limit,
            reconnect: config::reconnect_policy(self.retry_ms, self.max_retry_ms),
            keep_awake: self.keep_awake,
            reset: self.reset,
            ..Settings::default()
        }
        .with_url(&self.url)?;
        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Cli::parse().into_settings()?;

    println!("scan-watch configuration:");
    println!("  url          : {}", settings.url);
    println!(
        "  dashboard    : {}",
        settings.bind.as_deref().unwrap_or("<console>")
    );
    println!("  session      : {}", settings.session);
    println!("  state_dir    : {}", settings.state_dir.display());
    println!(
        "  history      : {}",
        settings
            .history_limit
            .map(|n| format!("last {n}"))
            .unwrap_or_else(|| "unbounded".to_string())
    );
    println!(
        "  reconnect    : {}ms..{}ms",
        settings.reconnect.initial.as_millis(),
        settings.reconnect.max.as_millis()
    );
    println!("  keep_awake   : {}", settings.keep_awake);

    let store = SessionFileStore::open(&settings.state_dir, &settings.session)
        .context("invalid session name")?;
    if settings.reset {
        store.end_session()?;
        info!(session = %settings.session, "stored history discarded");
    }
    let stream = EventStream::new(settings.url.clone(), settings.reconnect)?;

    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    match settings.bind.clone() {
        Some(bind) => {
            let dashboard = Dashboard::new();
            let server_cancel = cancel.clone();
            let server_dash = dashboard.clone();
            let server = tokio::spawn(async move {
                server::spawn_server(&bind, server_dash, server_cancel).await
            });
            tokio::spawn(clock::run_clock(dashboard.clone(), cancel.clone()));
            println!(
                "Dashboard at http://{} (Ctrl+C to stop)",
                settings.bind.as_deref().unwrap_or_default()
            );

            keep_awake(&settings, dashboard.clone(), cancel.clone());
            run_session(&settings, store, dashboard, stream, &cancel).await;

            cancel.cancel();
            match server.await {
                Ok(Err(e)) => warn!(error = %e, "dashboard server failed"),
                Err(e) => warn!(error = %e, "dashboard task panicked"),
                Ok(Ok(())) => {}
            }
        }
        None => {
            keep_awake(&settings, ConsoleDisplay::stdout(), cancel.clone());
            run_session(&settings, store, ConsoleDisplay::stdout(), stream, &cancel).await;
        }
    }

    Ok(())
}

async fn run_session<S: HistoryStore, D: Display>(
    settings: &Settings,
    store: S,
    display: D,
    stream: EventStream,
    cancel: &CancellationToken,
) {
    let mut session = Session::new(store, display, settings.history_limit);
    session.start(stream, cancel.clone()).await;
    if !cancel.is_cancelled() {
        warn!("event stream closed by server; display stays up until Ctrl+C");
        cancel.cancelled().await;
    }
    info!(entries = session.log().len(), "session ended");
}

/// Acquire the idle inhibitor and keep it for the life of the process.
/// SIGUSR1 / SIGUSR2 report the display as shown / hidden.
fn keep_awake<A>(settings: &Settings, mut log: A, cancel: CancellationToken)
where
    A: ActivityLog + Send + 'static,
{
    if !settings.keep_awake {
        return;
    }
    let mut keeper = WakeLockKeeper::new(InhibitLock::new());
    keeper.init(&mut log);
    tokio::spawn(async move {
        #[cfg(unix)]
        if let Err(e) = scan_watch::wakelock::follow_visibility(keeper, log, cancel).await {
            warn!(error = %e, "visibility signals unavailable");
        }
        #[cfg(not(unix))]
        {
            let _keeper = keeper;
            drop(log);
            cancel.cancelled().await;
        }
    });
}
