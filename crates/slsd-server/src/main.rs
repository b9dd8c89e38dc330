//! slsd daemon entry point.
//!
//! Wires configuration, the discovery responder, its handlers, and the
//! self-test prober, then runs until interrupted.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ AppConfig::load()          -- TOML file + CLI overrides
//!  └─ DiscoveryResponder::bind() -- claims the UDP port (fatal on conflict)
//!  └─ register handlers
//!       ├─ /sessions  -> session_list_handler (directory scan + reply)
//!       └─ wildcard   -> fallback_handler     (log and drop)
//!  └─ responder.start()          -- dispatch loop on its own thread
//!  └─ run_probe()                -- cancellable Tokio task, 1 Hz self-test
//!  └─ Ctrl-C                     -- clears the running flag, joins everything
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use slsd_server::config::AppConfig;
use slsd_server::probe::run_probe;
use slsd_server::responder::{AddressPattern, DiscoveryResponder};
use slsd_server::sessions::{fallback_handler, session_list_handler, SESSIONS_ADDRESS};

/// Answer discovery requests with the SooperLooper sessions in a directory.
#[derive(Debug, Parser)]
#[command(name = "slsd", version, about)]
struct Cli {
    /// Directory containing `.slsess` session files.
    session_dir: PathBuf,

    /// UDP port to listen on (0 = OS-assigned).  Overrides the config file.
    #[arg(long)]
    port: Option<u16>,

    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable the periodic self-test prober.
    #[arg(long)]
    no_probe: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(port) = cli.port {
        cfg.network.port = port;
    }
    if cli.no_probe {
        cfg.probe.enabled = false;
    }

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cfg.log_level.clone())),
        )
        .init();

    let session_dir = cli
        .session_dir
        .canonicalize()
        .with_context(|| format!("resolving session directory {}", cli.session_dir.display()))?;
    anyhow::ensure!(
        session_dir.is_dir(),
        "{} is not a directory",
        session_dir.display()
    );

    // ── Discovery responder ───────────────────────────────────────────────────
    let responder = DiscoveryResponder::bind(cfg.network.bind_address, cfg.network.port)
        .context("starting discovery responder")?;
    let port = responder.local_port();

    responder.register(
        AddressPattern::Exact(SESSIONS_ADDRESS.to_string()),
        session_list_handler(
            session_dir.clone(),
            cfg.sessions.extension.clone(),
            responder.transport(),
        ),
    );
    responder.register_fallback(fallback_handler());

    let running = Arc::new(AtomicBool::new(true));
    let dispatch = responder
        .start(Arc::clone(&running))
        .context("starting dispatch loop")?;

    println!("serving sessions from {}", session_dir.display());
    println!("listening on UDP port {port}; press Ctrl-C to stop");

    // ── Self-test prober ──────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let probe_task = if cfg.probe.enabled {
        let target = SocketAddr::new(probe_target_ip(cfg.network.bind_address), port);
        let period = Duration::from_secs(cfg.probe.interval_secs.max(1));
        Some(tokio::spawn(run_probe(target, period, shutdown_rx)))
    } else {
        None
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    loop {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if !running.load(Ordering::Relaxed) {
            break;
        }
    }

    // Stop the prober first so it does not warn about the dying responder.
    shutdown_tx.send(true).ok();
    if let Some(task) = probe_task {
        if let Ok(Err(e)) = task.await {
            error!("self-test prober failed: {e:#}");
        }
    }
    if dispatch.join().is_err() {
        error!("dispatch thread panicked");
    }

    info!("slsd stopped");
    Ok(())
}

/// Picks the address the prober should send to: loopback when the responder
/// binds all interfaces, otherwise the bound address itself.
fn probe_target_ip(bind_address: IpAddr) -> IpAddr {
    if bind_address.is_unspecified() {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    } else {
        bind_address
    }
}
