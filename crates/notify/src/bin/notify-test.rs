//! notify-test: send one test alert through every configured channel.
//!
//! Loads `.env`, the JSON config file and environment overrides, then
//! broadcasts a single alert and prints one line per channel.
//!
//! Exit codes: 0 when at least one channel delivered, 1 when every enabled
//! channel failed, 2 when no channel is enabled.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use pagewatch_core::config::{load_dotenv, Config};
use pagewatch_notify::{NotificationManager, Outcome};

// ── CLI ─────────────────────────────────────────────────────────────

/// Send a test notification to every configured channel.
#[derive(Parser, Debug)]
#[command(name = "notify-test", version, about)]
struct Cli {
    /// Path to the JSON config file.
    #[arg(long, env = "PAGEWATCH_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Alert title.
    #[arg(long, default_value = "Test Alert")]
    title: String,

    /// Alert body.
    #[arg(
        long,
        default_value = "This is a test notification from your website monitor!"
    )]
    message: String,

    /// Per-request timeout in seconds (overrides config).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,

    /// Print results as JSON instead of one line per channel.
    #[arg(long)]
    json: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    let mut notifications = config
        .notification_config()
        .context("invalid notification settings")?;
    if let Some(secs) = cli.timeout_secs {
        notifications.timeout = Duration::from_secs(secs);
    }
    notifications.log_summary();

    let manager = NotificationManager::configure(&notifications)
        .context("failed to set up notification channels")?;
    if manager.is_empty() {
        warn!("no notification channel is enabled; nothing to send");
        return Ok(ExitCode::from(2));
    }

    info!(channels = ?manager.channels(), "sending test notification");
    let results = manager.broadcast(&cli.title, &cli.message).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for r in &results {
            match &r.error {
                None => println!("{:<10} ok      {:>6} ms", r.channel, r.duration_ms),
                Some(err) => println!("{:<10} FAILED  {:>6} ms  {}", r.channel, r.duration_ms, err),
            }
        }
    }

    Ok(match Outcome::classify(&results) {
        Outcome::AllSucceeded => ExitCode::SUCCESS,
        Outcome::PartialFailure => {
            warn!("some notification channels failed");
            ExitCode::SUCCESS
        }
        Outcome::AllFailed => ExitCode::from(1),
        Outcome::NoChannels => ExitCode::from(2),
    })
}
