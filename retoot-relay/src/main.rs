//! retoot-relay - daemon that relays a Twitter account to Mastodon
//!
//! Polls the source timeline on a fixed interval and republishes fresh
//! posts to the configured Mastodon account, text, expanded links, and
//! media included. Delivery is at-most-once across cycles and restarts.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use libretoot::cache::RelayCache;
use libretoot::config::expand_path;
use libretoot::logging::{LogFormat, LoggingConfig};
use libretoot::poller::SourcePoller;
use libretoot::publish::mastodon::MastodonPublisher;
use libretoot::publish::Publisher;
use libretoot::source::twitter::TwitterTimeline;
use libretoot::staging::{HttpFetcher, MediaStaging};
use libretoot::{Config, RelayOrchestrator, Result};

#[derive(Parser, Debug)]
#[command(name = "retoot-relay")]
#[command(version)]
#[command(about = "Relay a Twitter account's fresh posts to Mastodon")]
#[command(long_about = "\
retoot-relay - relay a Twitter account's fresh posts to Mastodon

DESCRIPTION:
    retoot-relay is a long-running daemon that polls a Twitter account's
    timeline and republishes new posts to a Mastodon account. Text is
    carried over with shortened links expanded and media markers stripped;
    attached media is downloaded, re-uploaded, and referenced from the new
    post. A durable dedup log guarantees each source post is delivered at
    most once across polling cycles and process restarts.

USAGE:
    # Run in foreground (logs to stderr)
    retoot-relay

    # Run with a custom poll interval
    retoot-relay --poll-interval 15

    # Run a single cycle and exit
    retoot-relay --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current post)

CONFIGURATION:
    Configuration file: ~/.config/retoot/config.toml (or $RETOOT_CONFIG)
    Dedup log:          ~/.local/share/retoot/relayed.ids
    Media staging:      ~/.local/share/retoot/media

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime or configuration error
    2 - Destination authentication failure
")]
struct Cli {
    /// Path to the config file (overrides $RETOOT_CONFIG)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Run a single relay cycle and exit
    #[arg(long)]
    once: bool,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::new(LogFormat::Text, "info".to_string(), cli.verbose).init();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    info!("retoot-relay starting");

    let timeline = TwitterTimeline::from_config(&config.source)?;
    let publisher = MastodonPublisher::from_config(&config.destination)?;

    // Authentication failure here is fatal: the daemon never runs without
    // a destination session.
    publisher.verify_session().await?;
    info!(instance = publisher.instance_url(), "destination session verified");

    let poller = SourcePoller::new(
        Box::new(timeline),
        config.source.account.clone(),
        config.source.page_size,
        config.relay.lookback_seconds,
    );
    let staging = MediaStaging::new(
        expand_path(&config.relay.media_dir),
        Box::new(HttpFetcher::new()),
    )?;
    let cache = RelayCache::open(expand_path(&config.relay.cache_file))?;
    let mut orchestrator = RelayOrchestrator::new(poller, staging, Box::new(publisher), cache);

    if cli.once {
        let relayed = orchestrator.run_cycle().await?;
        info!(relayed, "single cycle complete, exiting");
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone());

    let poll_interval = cli.poll_interval.unwrap_or(config.relay.poll_interval);
    info!(poll_interval, account = %config.source.account, "entering relay loop");

    orchestrator.run(poll_interval, shutdown).await?;

    info!("retoot-relay stopped");
    Ok(())
}

/// Route SIGINT/SIGTERM into the shutdown flag so the loop can finish the
/// post in flight before exiting.
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            error!(error = %e, "cannot install signal handlers, running without");
            return;
        }
    };

    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("received shutdown signal, stopping gracefully...");
                    shutdown.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) {}
