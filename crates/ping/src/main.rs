//! Manual IndexNow ping for CI/CD and local testing.
//!
//! ```bash
//! INDEXNOW_KEY=... beacon-ping https://energie-profis.de/ https://energie-profis.de/solar
//! ```
//!
//! Exits 0 once every accepted URL was delivered, 1 if anything is still
//! pending (failed or waiting for a retry) when the wait expires.

use std::process::ExitCode;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use beacon_common::config::IndexNowConfig;
use beacon_notifier::NotificationQueue;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon_ping=info,beacon_notifier=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let urls: Vec<String> = std::env::args().skip(1).collect();
    if urls.is_empty() {
        eprintln!("Usage: beacon-ping <url1> <url2> ...");
        eprintln!(
            "Example: beacon-ping https://energie-profis.de/ https://energie-profis.de/solar"
        );
        return Ok(ExitCode::FAILURE);
    }

    let config = IndexNowConfig::from_env()?;
    if !config.is_enabled() {
        anyhow::bail!("INDEXNOW_KEY is not set; nothing can be submitted");
    }
    let wait = wait_from_env()?;

    let queue = NotificationQueue::from_config(&config)?;

    let (accepted, rejected): (Vec<String>, Vec<String>) =
        urls.into_iter().partition(|url| queue.accepts(url).is_some());
    for url in &rejected {
        tracing::warn!(url = %url, host = %config.host, "Skipping URL outside the site host");
    }
    if accepted.is_empty() {
        tracing::error!("No URLs left to submit");
        return Ok(ExitCode::FAILURE);
    }

    tracing::info!(count = accepted.len(), "Pinging IndexNow");
    queue.enqueue(&accepted);

    let delivered = wait_until_empty(&queue, wait).await;
    if delivered {
        tracing::info!(count = accepted.len(), "IndexNow ping completed successfully");
        Ok(ExitCode::SUCCESS)
    } else {
        let status = queue.status();
        tracing::error!(
            pending = status.size,
            urls = ?status.urls,
            "IndexNow ping failed or queued for retry"
        );
        Ok(ExitCode::FAILURE)
    }
}

/// How long to wait for delivery (`PING_WAIT_MS`, default 1000).
fn wait_from_env() -> anyhow::Result<Duration> {
    let ms: u64 = std::env::var("PING_WAIT_MS")
        .unwrap_or_else(|_| "1000".to_string())
        .parse()
        .map_err(|_| anyhow::anyhow!("PING_WAIT_MS must be a valid u64"))?;
    Ok(Duration::from_millis(ms))
}

/// Keep flushing (so due retries go out) until the queue drains or time is up.
async fn wait_until_empty(queue: &NotificationQueue, wait: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        queue.flush().await;
        if queue.status().size == 0 {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
