//! Watch a Google Cloud Runtime Configurator variable and print its value.
//!
//! Reads `PROJECT`, `CONFIG` and `VARIABLE` from the environment, primes the
//! cache, then prints the cached value on a fixed interval until Ctrl+C,
//! SIGTERM, or the optional `WATCH_RUN_FOR_SECS` deadline.

use runtimevar_watch::prelude::*;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runtimevar_watch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "runtimevar-watch failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let settings = WatchSettings::from_env()?;
    let id = settings.variable_id()?;

    let mut source = RuntimeConfigSource::builder();
    if let Some(endpoint) = settings.endpoint() {
        source = source.with_endpoint(endpoint);
    }
    if let Some(token) = settings.access_token() {
        source = source.with_auth_token(token);
    }
    let source = source.build()?;

    let cache = ValueCache::new();
    let mut watcher = Watcher::builder()
        .with_priming(settings.priming())
        .with_resolve_timeout(settings.resolve_timeout())
        .with_backoff(settings.backoff())
        .build(source, id.clone(), cache.clone());
    watcher.start().await?;

    let cancel = CancellationToken::new();
    let reporter = Reporter::new(cache.clone(), id.key(), settings.report_interval())
        .with_sink(|key, value| match value {
            Some(value) => println!("config key: {}, value: {}", key, value),
            None => println!("config key: {}, value: <unset>", key),
        })
        .spawn(cancel.clone());

    tokio::select! {
        _ = shutdown_signal() => {}
        _ = watcher.stopped() => {
            tracing::warn!(variable = %id, "Watch ended before shutdown");
        }
        _ = deadline(settings.run_for()) => {
            tracing::info!("Run time elapsed");
        }
    }

    cancel.cancel();
    if let Err(e) = reporter.await {
        tracing::error!(error = %e, "Reporter task failed");
    }
    watcher.stop().await;

    match cache.read(id.key().as_str()) {
        Some(value) => println!("config key: {}, value: {}", id.key(), value),
        None => println!("config key: {}, value: <unset>", id.key()),
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C detected"),
        _ = terminate => tracing::info!("SIGTERM detected"),
    }
}

/// Resolve after `run_for`, or never.
async fn deadline(run_for: Option<std::time::Duration>) {
    match run_for {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}
