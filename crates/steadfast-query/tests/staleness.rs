//! Staleness and eviction windows, background refresh and invalidation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use steadfast_query::{CachePolicy, QueryClient, QueryError, QueryKey, QueryStatus};

/// Fetcher returning 1, 2, 3, ... on successive calls.
fn versioned(
    counter: &Arc<AtomicU32>,
) -> impl Fn() -> BoxFuture<'static, Result<u32, QueryError>> + Send + Sync + 'static {
    let counter = Arc::clone(counter);
    move || {
        let counter = Arc::clone(&counter);
        async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1) }.boxed()
    }
}

fn short_windows() -> CachePolicy {
    CachePolicy::default()
        .with_stale_after(Duration::from_secs(1))
        .with_evict_after(Duration::from_secs(10))
}

#[tokio::test(start_paused = true)]
async fn fresh_result_is_served_without_refetch() {
    let client = QueryClient::new(CachePolicy::default());
    let counter = Arc::new(AtomicU32::new(0));

    assert_eq!(client.get_or_fetch("feed", versioned(&counter)).await, Ok(1));
    tokio::time::advance(Duration::from_secs(4 * 60)).await;
    assert_eq!(client.get_or_fetch("feed", versioned(&counter)).await, Ok(1));

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_result_is_served_and_refreshed_in_background() {
    let client = QueryClient::new(short_windows());
    let counter = Arc::new(AtomicU32::new(0));
    let key = QueryKey::new("feed");

    assert_eq!(client.get_or_fetch(key.clone(), versioned(&counter)).await, Ok(1));
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(client.status(&key), QueryStatus::Ready { stale: true });

    assert_eq!(client.get_or_fetch(key.clone(), versioned(&counter)).await, Ok(1));

    // Let the background refresh run.
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(client.status(&key), QueryStatus::Ready { stale: false });
    assert_eq!(client.get_or_fetch(key, versioned(&counter)).await, Ok(2));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn only_one_background_refresh_per_key() {
    let client = QueryClient::new(short_windows());
    let counter = Arc::new(AtomicU32::new(0));

    client.get_or_fetch("feed", versioned(&counter)).await.unwrap();
    tokio::time::advance(Duration::from_secs(2)).await;

    for _ in 0..3 {
        assert_eq!(client.get_or_fetch("feed", versioned(&counter)).await, Ok(1));
    }
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn evicted_result_is_fetched_in_foreground() {
    let client = QueryClient::new(short_windows());
    let counter = Arc::new(AtomicU32::new(0));

    client.get_or_fetch("feed", versioned(&counter)).await.unwrap();
    tokio::time::advance(Duration::from_secs(11)).await;

    assert_eq!(client.get_or_fetch("feed", versioned(&counter)).await, Ok(2));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_keeps_serving_stale_data() {
    let client = QueryClient::new(short_windows().with_query_retry(steadfast_query::RetryPolicy::none()));
    let key = QueryKey::new("feed");
    client.set_data(key.clone(), 7u32);
    tokio::time::advance(Duration::from_secs(2)).await;

    let value = client
        .get_or_fetch(key.clone(), || async { Err::<u32, _>(QueryError::http(500, "down")) })
        .await;
    assert_eq!(value, Ok(7));

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(client.status(&key), QueryStatus::Ready { stale: true });
    assert_eq!(client.get_data::<u32>(&key), Some(7));
}

#[tokio::test(start_paused = true)]
async fn invalidation_marks_matching_entries_stale() {
    let client = QueryClient::new(CachePolicy::default());
    client.set_data(QueryKey::from(["questions", "1"]), 1u32);
    client.set_data(QueryKey::from(["questions", "2"]), 2u32);
    client.set_data(QueryKey::from(["users", "1"]), 3u32);

    assert_eq!(client.invalidate(&QueryKey::new("questions")), 2);
    assert_eq!(
        client.status(&QueryKey::from(["questions", "1"])),
        QueryStatus::Ready { stale: true }
    );
    assert_eq!(
        client.status(&QueryKey::from(["users", "1"])),
        QueryStatus::Ready { stale: false }
    );
}

#[tokio::test(start_paused = true)]
async fn focus_does_not_invalidate_when_reconnect_only() {
    let client = QueryClient::new(CachePolicy::default());
    client.set_data("feed", 1u32);

    assert_eq!(client.on_window_focus(), 0);
    assert_eq!(
        client.status(&QueryKey::new("feed")),
        QueryStatus::Ready { stale: false }
    );

    assert_eq!(client.on_reconnect(), 1);
    assert_eq!(
        client.status(&QueryKey::new("feed")),
        QueryStatus::Ready { stale: true }
    );
}

#[tokio::test(start_paused = true)]
async fn focus_invalidates_when_enabled() {
    let client = QueryClient::new(CachePolicy::default().with_refetch_on_reconnect_only(false));
    client.set_data("feed", 1u32);

    assert_eq!(client.on_window_focus(), 1);
}

#[tokio::test(start_paused = true)]
async fn unread_keys_are_released_after_eviction_window() {
    let client = QueryClient::new(CachePolicy::default());
    for i in 0..1000u32 {
        client.set_data(QueryKey::from_parts(["item".to_string(), i.to_string()]), i);
    }
    assert_eq!(client.len(), 1000);

    tokio::time::advance(Duration::from_secs(31 * 60)).await;
    assert_eq!(client.len(), 0);
    assert_eq!(client.tracked_keys(), 1000);

    client.set_data("latest", 7u32);
    assert_eq!(client.len(), 1);
    assert_eq!(client.tracked_keys(), 1);
}

#[tokio::test(start_paused = true)]
async fn evict_expired_releases_old_results_and_failures() {
    let client = QueryClient::new(short_windows());
    client.set_data("kept", 1u32);
    client.set_data("old", 2u32);
    let failed = client
        .get_or_fetch("broken", || async {
            Err::<u32, _>(QueryError::http(404, "missing"))
        })
        .await;
    assert!(failed.is_err());
    assert_eq!(client.tracked_keys(), 3);

    tokio::time::advance(Duration::from_secs(11)).await;
    client.set_data("kept", 3u32);

    assert_eq!(client.evict_expired(), 0);
    assert_eq!(client.tracked_keys(), 1);
    assert_eq!(client.status(&QueryKey::new("broken")), QueryStatus::Idle);
    assert_eq!(client.get_data::<u32>(&QueryKey::new("kept")), Some(3));
}

#[tokio::test(start_paused = true)]
async fn evict_expired_without_writes() {
    let client = QueryClient::new(short_windows());
    client.set_data("a", 1u8);
    client.set_data("b", 2u8);

    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(client.evict_expired(), 2);
    assert_eq!(client.tracked_keys(), 0);
    assert!(client.is_empty());
}

#[tokio::test]
async fn remove_releases_the_key() {
    let client = QueryClient::new(CachePolicy::default());
    client.set_data("feed", 1u8);
    assert!(client.remove(&QueryKey::new("feed")));
    assert_eq!(client.tracked_keys(), 0);
}
