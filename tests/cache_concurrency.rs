//! Concurrent readers against a single writer.

mod common;

use common::{variable, wait_for_value};
use runtimevar_watch::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const WRITES: usize = 1000;
const READERS: usize = 8;

fn parse(value: &ConfigValue) -> usize {
    value
        .strip_prefix("value-")
        .and_then(|n| n.parse().ok())
        .unwrap_or_else(|| panic!("corrupted read: {:?}", value))
}

#[test]
fn test_readers_never_observe_torn_or_stale_values() {
    let cache = ValueCache::new();
    let done = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(READERS + 1));

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let cache = cache.clone();
            let done = Arc::clone(&done);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut last_seen: Option<usize> = None;
                let mut reads = 0usize;
                loop {
                    let finished = done.load(Ordering::SeqCst);
                    if let Some(value) = cache.read("v1") {
                        let n = parse(&value);
                        // One writer: a later read never goes back in time.
                        if let Some(prev) = last_seen {
                            assert!(n >= prev, "read {} after {}", n, prev);
                        }
                        last_seen = Some(n);
                    } else {
                        assert!(last_seen.is_none(), "value disappeared after being set");
                    }
                    reads += 1;
                    if finished {
                        break;
                    }
                }
                (last_seen, reads)
            })
        })
        .collect();

    barrier.wait();
    for n in 0..WRITES {
        cache.write("v1", format!("value-{}", n));
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        let (last_seen, reads) = reader.join().unwrap();
        assert!(reads > 0);
        // The final read started after the last write completed.
        assert_eq!(last_seen, Some(WRITES - 1));
    }
    assert_eq!(cache.read("v1").unwrap(), format!("value-{}", WRITES - 1).as_str());
}

#[test]
fn test_writes_to_other_keys_do_not_disturb_reads() {
    let cache = ValueCache::new();
    cache.write("v1", "stable");

    let writer = {
        let cache = cache.clone();
        thread::spawn(move || {
            for n in 0..WRITES {
                cache.write("other", n.to_string());
            }
        })
    };

    for _ in 0..WRITES {
        assert_eq!(cache.read("v1").unwrap(), "stable");
    }
    writer.join().unwrap();
    assert_eq!(cache.read("other").unwrap(), (WRITES - 1).to_string().as_str());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_watcher_with_concurrent_readers() {
    let source = MemorySource::new();
    let id = variable();
    source.set(&id, "value-0");

    let cache = ValueCache::new();
    let mut watcher = Watcher::builder().build(source.clone(), id.clone(), cache.clone());
    watcher.start().await.unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let cache = cache.clone();
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                let mut last_seen = 0usize;
                while !done.load(Ordering::SeqCst) {
                    let value = cache.read("v1").expect("primed value disappeared");
                    let n = parse(&value);
                    assert!(n >= last_seen, "read {} after {}", n, last_seen);
                    last_seen = n;
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for n in 1..WRITES {
        source.set(&id, format!("value-{}", n));
        if n % 100 == 0 {
            tokio::task::yield_now().await;
        }
    }

    wait_for_value(&cache, "v1", &format!("value-{}", WRITES - 1)).await;
    done.store(true, Ordering::SeqCst);
    for reader in readers {
        reader.await.unwrap();
    }

    watcher.stop().await;
    assert_eq!(watcher.state(), WatchState::Stopped);
}
