//! Standalone reaper CLI. Exit codes: 0 normal stop, 2 invalid
//! configuration, 130 cancelled (SIGINT).

use clap::Parser;
use sectify_reaper::ReaperConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Runs the Sectify HLS segment reaper in the foreground.
#[derive(Parser, Debug)]
#[command(name = "sectify-reaper", version)]
struct Args {
    /// HLS artifact root. Overrides HLS_ROOT if given.
    #[arg(long)]
    hls_root: Option<String>,

    /// Sweep interval in seconds. Overrides REAPER_INTERVAL_S if given.
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Segment max age in seconds. Overrides REAPER_AGE_S if given.
    #[arg(long)]
    age_secs: Option<u64>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if let Some(root) = &args.hls_root {
        std::env::set_var("HLS_ROOT", root);
    }
    if let Some(interval) = args.interval_secs {
        std::env::set_var("REAPER_INTERVAL_S", interval.to_string());
    }
    if let Some(age) = args.age_secs {
        std::env::set_var("REAPER_AGE_S", age.to_string());
    }

    let config = match ReaperConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("sectify-reaper: invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_for_signal.cancel();
    });

    let cancelled = cancel.clone();
    sectify_reaper::run(config, cancel).await;

    if cancelled.is_cancelled() {
        std::process::exit(130);
    }
    std::process::exit(0);
}
