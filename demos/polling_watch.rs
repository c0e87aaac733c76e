//! Example demonstrating the polling fallback.
//!
//! Wraps an in-memory source in `PollingSource`, which notices changes by
//! fetching on a fixed interval instead of blocking on a subscription.
//! Lazy priming leaves the cache empty until the first poll lands.

use runtimevar_watch::prelude::*;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Polling Watch Example ===\n");

    let memory = MemorySource::new();
    let id = VariableId::new("p1", "c1", "v1");
    memory.set(&id, "blue");

    let source = PollingSource::new(memory.clone(), Duration::from_millis(250));
    let cache = ValueCache::new();
    let mut watcher = Watcher::builder()
        .with_priming(Priming::Lazy)
        .build(source, id.clone(), cache.clone());

    watcher.start().await?;
    println!("Right after start: {:?}", cache.read("v1"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("After first poll:  {:?}", cache.read("v1"));

    memory.set(&id, "green");
    println!("Published green, waiting for the next poll...");
    tokio::time::sleep(Duration::from_millis(300)).await;
    println!("After next poll:   {:?}", cache.read("v1"));

    watcher.stop().await;
    println!("\n✓ Watcher {}", watcher.state());
    Ok(())
}
