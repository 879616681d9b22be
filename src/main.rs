//! Mini TTL Cache - interactive shell
//!
//! Opens an in-process expiring cache configured from the environment and
//! serves commands read line by line from stdin.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_ttl_cache::shell::{execute, Command};
use mini_ttl_cache::{open, BackendKind, CacheConfig, CacheHandle};

/// Main entry point for the cache shell.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the cache (starts the expiry sweeper when enabled)
/// 4. Serve commands until QUIT, EOF, or Ctrl+C
/// 5. Close the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so replies on stdout stay clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_ttl_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting Mini TTL Cache shell");

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: capacity_hint={}B, cleaning_enabled={}, cleaning_interval={}ms, default_ttl={}s",
        config.capacity_hint_bytes,
        config.cleaning_enabled,
        config.cleaning_interval.as_millis(),
        config.default_ttl.as_secs()
    );

    let cache: CacheHandle<String> =
        open(BackendKind::Custom, &config).context("failed to open cache")?;

    tokio::select! {
        result = serve(&cache) => result?,
        _ = shutdown_signal() => {}
    }

    cache.close().context("failed to close cache")?;
    info!("Shutdown complete");
    Ok(())
}

/// Reads commands from stdin until QUIT or end of input.
async fn serve(cache: &CacheHandle<String>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        match Command::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => match execute(cache.as_ref(), command) {
                Ok(reply) => println!("{}", reply),
                Err(err) => println!("(error) {}", err),
            },
            Err(err) => println!("(error) {}", err),
        }
    }

    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
