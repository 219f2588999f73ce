mod common;

use any_spawner::Executor;
use common::Probe;
use source_cache::{CacheOptions, PrunePolicy, SubscriptionCache};
use std::time::Duration;
use tokio::time::sleep;

fn next_tick_cache() -> SubscriptionCache<u32, String> {
    SubscriptionCache::new(
        CacheOptions::builder()
            .prune(PrunePolicy::NextTick)
            .label("next-tick")
            .build(),
    )
}

#[tokio::test]
async fn next_tick_prunes_after_the_current_task_yields() {
    _ = Executor::init_tokio();

    let cache = next_tick_cache();
    let probe = Probe::new();

    let mut handle = cache.acquire("/a", || probe.open()).unwrap();
    handle.release().unwrap();
    assert!(cache.entry_info("/a").unwrap().pending_release);

    sleep(Duration::from_millis(10)).await;
    assert!(!cache.contains("/a"));
    assert_eq!(probe.closed(), 1);
}

#[tokio::test]
async fn next_tick_keeps_entries_reacquired_in_the_same_pass() {
    _ = Executor::init_tokio();

    let cache = next_tick_cache();
    let probe = Probe::new();

    let mut handle = cache.acquire("/a", || probe.open()).unwrap();
    handle.release().unwrap();
    let _handle = cache.acquire("/a", || probe.open()).unwrap();

    sleep(Duration::from_millis(10)).await;
    assert!(cache.contains("/a"));
    assert_eq!(probe.opened(), 1);
    assert_eq!(probe.closed(), 0);
}

#[tokio::test]
async fn next_tick_queues_one_prune_for_many_releases() {
    _ = Executor::init_tokio();

    let cache = next_tick_cache();
    let probe = Probe::new();

    let handles = ["/a", "/b", "/c"]
        .into_iter()
        .map(|key| cache.acquire(key, || probe.open()).unwrap())
        .collect::<Vec<_>>();
    drop(handles);
    assert_eq!(cache.pending_release_count(), 3);

    sleep(Duration::from_millis(10)).await;
    assert!(cache.is_empty());
    assert_eq!(probe.closed(), 3);

    // the next release queues a new prune
    let handle = cache.acquire("/a", || probe.open()).unwrap();
    drop(handle);
    sleep(Duration::from_millis(10)).await;
    assert!(cache.is_empty());
    assert_eq!(probe.closed(), 4);
}
