//! Example demonstrating a watcher over an in-memory source.
//!
//! A writer task publishes a few values and a deletion while a reporter
//! prints the cached value every 200ms. The deletion shows up as a logged
//! transient error; the cache keeps serving the last good value.

use runtimevar_watch::prelude::*;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== In-Memory Watch Example ===\n");

    let source = MemorySource::new();
    let id = VariableId::new("p1", "c1", "v1");
    source.set(&id, "blue");

    let cache = ValueCache::new();
    let mut watcher = Watcher::builder()
        .with_backoff(Backoff::exponential(
            Duration::from_millis(50),
            Duration::from_millis(500),
        ))
        .build(source.clone(), id.clone(), cache.clone());
    watcher.start().await?;
    println!("✓ Watcher running, primed value: {:?}", cache.read("v1"));

    let cancel = CancellationToken::new();
    let reporter = Reporter::new(cache.clone(), id.key(), Duration::from_millis(200))
        .with_sink(|key, value| println!("  config key: {}, value: {:?}", key, value))
        .spawn(cancel.clone());

    for value in ["green", "red"] {
        tokio::time::sleep(Duration::from_millis(500)).await;
        println!("→ publishing {}", value);
        source.set(&id, value);
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    println!("→ deleting variable");
    source.delete(&id);

    tokio::time::sleep(Duration::from_millis(500)).await;
    println!("→ publishing yellow");
    source.set(&id, "yellow");
    tokio::time::sleep(Duration::from_millis(500)).await;

    cancel.cancel();
    let _ = reporter.await;
    watcher.stop().await;

    println!("\n✓ Watcher {}, final value: {:?}", watcher.state(), cache.read("v1"));
    Ok(())
}
