//! Request cache client
//!
//! Results are cached per [`QueryKey`] and classified on every read:
//!
//! - younger than `stale_after`: served as is
//! - younger than `evict_after`: served, with one background refresh
//! - older: discarded and fetched in the foreground
//!
//! Expired results, and failures older than `evict_after`, are swept out of
//! the store on every write and by [`QueryClient::evict_expired`]; a key with
//! nothing left and nothing running is released entirely.
//!
//! Store writes go through a single `std::sync::Mutex` that is never held
//! across an await point, so reads of different keys proceed independently.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::context::ExecutionContext;
use crate::error::{QueryError, QueryFailure};
use crate::key::QueryKey;
use crate::policy::CachePolicy;
use crate::retry::run_with_retry;

type CachedValue = Arc<dyn Any + Send + Sync>;
type Store = Arc<Mutex<HashMap<QueryKey, Slot>>>;

struct Entry {
    value: CachedValue,
    fetched_at: Instant,
    invalidated: bool,
}

#[derive(Default)]
struct Slot {
    entry: Option<Entry>,
    in_flight: u32,
    refreshing: bool,
    failure: Option<QueryFailure>,
    failed_at: Option<Instant>,
}

impl Slot {
    fn is_idle(&self) -> bool {
        self.entry.is_none() && self.failure.is_none() && self.in_flight == 0 && !self.refreshing
    }

    /// Drop whatever has outlived `evict_after`; `true` when the slot is still needed.
    fn sweep(&mut self, policy: &CachePolicy, now: Instant) -> bool {
        if self
            .entry
            .as_ref()
            .is_some_and(|entry| freshness(policy, entry, now) == Freshness::Expired)
        {
            self.entry = None;
        }
        if self
            .failed_at
            .is_some_and(|at| now.saturating_duration_since(at) >= policy.evict_after)
        {
            self.failure = None;
            self.failed_at = None;
        }
        !self.is_idle()
    }
}

/// Observable state of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Nothing cached and nothing running
    Idle,
    /// A foreground fetch (possibly retrying) is running and nothing is cached
    Loading,
    /// A cached result is available
    Ready { stale: bool },
    /// The last fetch exhausted its retries and nothing is cached
    Failed { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Freshness {
    Fresh,
    Stale,
    Expired,
}

enum Lookup<T> {
    Fresh(T),
    Stale(T),
    Miss,
}

/// Releases an in-flight or refreshing marker when the owning future
/// completes or is dropped.
struct SlotFlag {
    store: Store,
    key: QueryKey,
    refreshing: bool,
}

impl SlotFlag {
    fn in_flight(store: &Store, key: &QueryKey) -> Self {
        lock(store).entry(key.clone()).or_default().in_flight += 1;
        Self {
            store: Arc::clone(store),
            key: key.clone(),
            refreshing: false,
        }
    }

    /// `None` when a refresh for `key` is already running.
    fn refreshing(store: &Store, key: &QueryKey) -> Option<Self> {
        let mut slots = lock(store);
        let slot = slots.entry(key.clone()).or_default();
        if slot.refreshing {
            return None;
        }
        slot.refreshing = true;
        Some(Self {
            store: Arc::clone(store),
            key: key.clone(),
            refreshing: true,
        })
    }
}

impl Drop for SlotFlag {
    fn drop(&mut self) {
        let mut slots = lock(&self.store);
        let Some(slot) = slots.get_mut(&self.key) else {
            return;
        };
        if self.refreshing {
            slot.refreshing = false;
        } else {
            slot.in_flight = slot.in_flight.saturating_sub(1);
        }
        if slot.is_idle() {
            slots.remove(&self.key);
        }
    }
}

fn lock(store: &Mutex<HashMap<QueryKey, Slot>>) -> MutexGuard<'_, HashMap<QueryKey, Slot>> {
    // A panic while holding the lock leaves every slot internally consistent.
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

fn freshness(policy: &CachePolicy, entry: &Entry, now: Instant) -> Freshness {
    let age = now.saturating_duration_since(entry.fetched_at);
    if age >= policy.evict_after {
        Freshness::Expired
    } else if entry.invalidated || age >= policy.stale_after {
        Freshness::Stale
    } else {
        Freshness::Fresh
    }
}

fn sweep(slots: &mut HashMap<QueryKey, Slot>, policy: &CachePolicy, now: Instant) -> usize {
    let before = slots.len();
    slots.retain(|_, slot| slot.sweep(policy, now));
    before - slots.len()
}

fn record<T>(
    store: &Store,
    policy: &CachePolicy,
    key: &QueryKey,
    result: &Result<T, QueryFailure>,
) where
    T: Clone + Send + Sync + 'static,
{
    let now = Instant::now();
    let mut slots = lock(store);
    let slot = slots.entry(key.clone()).or_default();
    match result {
        Ok(value) => {
            slot.entry = Some(Entry {
                value: Arc::new(value.clone()),
                fetched_at: now,
                invalidated: false,
            });
            slot.failure = None;
            slot.failed_at = None;
        }
        Err(failure) => {
            slot.failure = Some(failure.clone());
            slot.failed_at = Some(now);
        }
    }

    let evicted = sweep(&mut slots, policy, now);
    if evicted > 0 {
        debug!(evicted, "released expired cache keys");
    }
}

static PERSISTENT: OnceLock<Arc<QueryClient>> = OnceLock::new();

/// Caches request results and applies the retry policies of a [`CachePolicy`].
pub struct QueryClient {
    policy: Arc<CachePolicy>,
    store: Store,
    context: ExecutionContext,
}

impl QueryClient {
    /// Create a standalone client. It shares nothing with any other handle.
    pub fn new(policy: CachePolicy) -> Self {
        Self::with_context(policy, ExecutionContext::Ephemeral)
    }

    fn with_context(policy: CachePolicy, context: ExecutionContext) -> Self {
        QueryClient {
            policy: Arc::new(policy),
            store: Arc::new(Mutex::new(HashMap::new())),
            context,
        }
    }

    /// Obtain a handle for `context`.
    ///
    /// Ephemeral contexts get a fresh handle on every call. The persistent
    /// handle is created on first use and every later call returns that
    /// same handle, including calls racing from other threads.
    pub fn acquire(context: ExecutionContext) -> Arc<QueryClient> {
        match context {
            ExecutionContext::Ephemeral => {
                debug!("creating ephemeral query client");
                Arc::new(Self::with_context(
                    CachePolicy::default(),
                    ExecutionContext::Ephemeral,
                ))
            }
            ExecutionContext::Persistent => Arc::clone(PERSISTENT.get_or_init(|| {
                info!("creating persistent query client");
                Arc::new(Self::with_context(
                    CachePolicy::default(),
                    ExecutionContext::Persistent,
                ))
            })),
        }
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Return the cached result for `key`, fetching it when needed.
    ///
    /// A stale hit returns immediately and schedules at most one background
    /// refresh per key. Concurrent foreground fetches for the same key are
    /// not coalesced; whichever finishes last is what stays cached.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        key: impl Into<QueryKey>,
        fetcher: F,
    ) -> Result<T, QueryFailure>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        let key = key.into();
        let fetcher = Arc::new(fetcher);

        match self.lookup::<T>(&key) {
            Lookup::Fresh(value) => {
                debug!(key = %key, "cache hit");
                Ok(value)
            }
            Lookup::Stale(value) => {
                debug!(key = %key, "stale cache hit");
                self.spawn_refresh(key, fetcher);
                Ok(value)
            }
            Lookup::Miss => self.fetch_now(key, fetcher).await,
        }
    }

    /// Run a write under the mutation retry policy. Nothing is cached.
    pub async fn mutate<T, F, Fut>(&self, mutation: F) -> Result<T, QueryFailure>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, QueryError>>,
    {
        run_with_retry(&self.policy.mutation_retry, "mutation", mutation).await
    }

    /// Seed or overwrite the cached result for `key` as if freshly fetched.
    pub fn set_data<T>(&self, key: impl Into<QueryKey>, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        record(&self.store, &self.policy, &key.into(), &Ok(value));
    }

    /// Cached result for `key` if present, unexpired and of type `T`.
    pub fn get_data<T>(&self, key: &QueryKey) -> Option<T>
    where
        T: Clone + 'static,
    {
        let slots = lock(&self.store);
        let entry = slots.get(key)?.entry.as_ref()?;
        if freshness(&self.policy, entry, Instant::now()) == Freshness::Expired {
            return None;
        }
        entry.value.downcast_ref::<T>().cloned()
    }

    pub fn status(&self, key: &QueryKey) -> QueryStatus {
        let slots = lock(&self.store);
        let Some(slot) = slots.get(key) else {
            return QueryStatus::Idle;
        };

        let usable = slot
            .entry
            .as_ref()
            .map(|entry| freshness(&self.policy, entry, Instant::now()))
            .filter(|f| *f != Freshness::Expired);

        match (usable, &slot.failure) {
            (Some(f), _) => QueryStatus::Ready {
                stale: f == Freshness::Stale,
            },
            (None, _) if slot.in_flight > 0 => QueryStatus::Loading,
            (None, Some(failure)) => QueryStatus::Failed {
                attempts: failure.attempts,
            },
            (None, None) => QueryStatus::Idle,
        }
    }

    /// Mark every entry under `prefix` stale. Returns how many were marked.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut slots = lock(&self.store);
        let mut marked = 0;
        for (key, slot) in slots.iter_mut() {
            if let Some(entry) = slot.entry.as_mut().filter(|_| key.starts_with(prefix)) {
                entry.invalidated = true;
                marked += 1;
            }
        }
        debug!(prefix = %prefix, marked, "invalidated entries");
        marked
    }

    pub fn invalidate_all(&self) -> usize {
        let mut slots = lock(&self.store);
        let mut marked = 0;
        for entry in slots.values_mut().filter_map(|slot| slot.entry.as_mut()) {
            entry.invalidated = true;
            marked += 1;
        }
        marked
    }

    /// The host regained focus.
    pub fn on_window_focus(&self) -> usize {
        if self.policy.refetch_on_reconnect_only {
            return 0;
        }
        self.invalidate_all()
    }

    /// Connectivity came back; everything cached may be outdated.
    pub fn on_reconnect(&self) -> usize {
        info!("network reconnected; invalidating cached results");
        self.invalidate_all()
    }

    /// Drop the cached result and any recorded failure for `key`.
    ///
    /// The key itself is released unless a fetch for it is still running.
    pub fn remove(&self, key: &QueryKey) -> bool {
        let mut slots = lock(&self.store);
        let Some(slot) = slots.get_mut(key) else {
            return false;
        };
        slot.failure = None;
        slot.failed_at = None;
        let had_entry = slot.entry.take().is_some();
        if slot.is_idle() {
            slots.remove(key);
        }
        had_entry
    }

    /// Release every key whose result and failure have outlived `evict_after`
    /// and that has no fetch running. Returns how many keys were released.
    pub fn evict_expired(&self) -> usize {
        sweep(&mut lock(&self.store), &self.policy, Instant::now())
    }

    /// Number of keys with an unexpired cached result.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        lock(&self.store)
            .values()
            .filter_map(|slot| slot.entry.as_ref())
            .filter(|entry| freshness(&self.policy, entry, now) != Freshness::Expired)
            .count()
    }

    /// Number of keys currently held in the store, including failed and loading ones.
    pub fn tracked_keys(&self) -> usize {
        lock(&self.store).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup<T>(&self, key: &QueryKey) -> Lookup<T>
    where
        T: Clone + 'static,
    {
        let mut slots = lock(&self.store);
        let Some(slot) = slots.get_mut(key) else {
            return Lookup::Miss;
        };

        let state = match slot.entry.as_ref() {
            Some(entry) => freshness(&self.policy, entry, Instant::now()),
            None => return Lookup::Miss,
        };
        if state == Freshness::Expired {
            debug!(key = %key, "evicting expired entry");
            slot.entry = None;
            return Lookup::Miss;
        }

        let value = slot
            .entry
            .as_ref()
            .and_then(|entry| entry.value.downcast_ref::<T>())
            .cloned();
        match value {
            Some(value) if state == Freshness::Fresh => Lookup::Fresh(value),
            Some(value) => Lookup::Stale(value),
            None => {
                warn!(key = %key, "cached value has a different type; refetching");
                slot.entry = None;
                Lookup::Miss
            }
        }
    }

    async fn fetch_now<T, F, Fut>(&self, key: QueryKey, fetcher: Arc<F>) -> Result<T, QueryFailure>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, QueryError>>,
    {
        let _in_flight = SlotFlag::in_flight(&self.store, &key);
        let label = key.to_string();
        let result = run_with_retry(&self.policy.query_retry, &label, || (*fetcher)()).await;
        record(&self.store, &self.policy, &key, &result);
        result
    }

    fn spawn_refresh<T, F, Fut>(&self, key: QueryKey, fetcher: Arc<F>)
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(key = %key, "no async runtime; stale entry not refreshed");
                return;
            }
        };
        let Some(flag) = SlotFlag::refreshing(&self.store, &key) else {
            debug!(key = %key, "refresh already running");
            return;
        };

        let store = Arc::clone(&self.store);
        let policy = Arc::clone(&self.policy);
        runtime.spawn(async move {
            let _flag = flag;
            let label = key.to_string();
            let result = run_with_retry(&policy.query_retry, &label, || (*fetcher)()).await;
            record(&store, &policy, &key, &result);
        });
    }
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("context", &self.context)
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn set_data_is_served_fresh() {
        let client = QueryClient::new(CachePolicy::default());
        client.set_data("answer", 42u32);

        let value = client
            .get_or_fetch("answer", || async { Err::<u32, _>(QueryError::Timeout) })
            .await;
        assert_eq!(value, Ok(42));
        assert_eq!(
            client.status(&QueryKey::new("answer")),
            QueryStatus::Ready { stale: false }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn type_mismatch_refetches() {
        let client = QueryClient::new(CachePolicy::default());
        client.set_data("k", "text".to_string());

        let value = client.get_or_fetch("k", || async { Ok(7u64) }).await;
        assert_eq!(value, Ok(7));
        assert_eq!(client.get_data::<u64>(&QueryKey::new("k")), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_data_is_not_returned_by_get_data() {
        let client = QueryClient::new(
            CachePolicy::default()
                .with_stale_after(Duration::from_secs(1))
                .with_evict_after(Duration::from_secs(2)),
        );
        client.set_data("k", 1u8);
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(client.get_data::<u8>(&QueryKey::new("k")), None);
        assert_eq!(client.status(&QueryKey::new("k")), QueryStatus::Idle);
    }

    #[test]
    fn remove_clears_entry() {
        let client = QueryClient::new(CachePolicy::default());
        client.set_data("k", 1u8);
        assert_eq!(client.len(), 1);
        assert!(client.remove(&QueryKey::new("k")));
        assert!(client.is_empty());
        assert!(!client.remove(&QueryKey::new("missing")));
    }
}
