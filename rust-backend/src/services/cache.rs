//! Freshness-bounded response cache
//! -----------------------------------------------------------------
//! ‣ One entry per query key: `(payload, computed_at)`, replaced wholesale.
//! ‣ A lookup is a hit iff `now - computed_at < ttl`.
//! ‣ Misses are single-flight: the first caller starts the computation,
//!   everyone arriving before it settles awaits the same `Shared` future.
//! ‣ A failed computation stores nothing; the previous entry stays readable.
//! ‣ The computation runs as its own task, so it finishes (and stores) even
//!   when every caller has gone away.
//!
//! The clock is always passed in (`now`) so tests can drive time by hand.
//! -----------------------------------------------------------------

use chrono::{DateTime, Duration, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::Arc;

type Flight<T, E> = Shared<BoxFuture<'static, Result<Arc<T>, E>>>;

/// Error handed to waiters when a compute task dies (panics or is
/// cancelled) without producing a result.
pub trait Abandoned {
    fn abandoned(key: &str) -> Self;
}

/// Removes the key's flight when the compute task ends, however it ends.
struct Deregister<T, E> {
    in_flight: Arc<DashMap<String, Flight<T, E>>>,
    key: String,
}

impl<T, E> Drop for Deregister<T, E> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

#[derive(Debug)]
struct CacheEntry<T> {
    payload: Arc<T>,
    computed_at: DateTime<Utc>,
}

/// What a lookup produced. `hit` is true only when served from a fresh entry.
#[derive(Debug, Clone)]
pub struct Lookup<T> {
    pub payload: Arc<T>,
    pub computed_at: DateTime<Utc>,
    pub hit: bool,
}

pub struct FreshnessCache<T, E> {
    ttl: Duration,
    max_entries: usize,
    entries: Arc<DashMap<String, CacheEntry<T>>>,
    in_flight: Arc<DashMap<String, Flight<T, E>>>,
}

impl<T, E> FreshnessCache<T, E>
where
    T: Send + Sync + 'static,
    E: Abandoned + Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Latest entry for `key`, fresh or not.
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<Lookup<T>> {
        self.entries.get(key).map(|e| Lookup {
            payload: Arc::clone(&e.payload),
            computed_at: e.computed_at,
            hit: now - e.computed_at < self.ttl,
        })
    }

    pub fn put(&self, key: &str, payload: T, now: DateTime<Utc>) {
        store(
            &self.entries,
            self.max_entries,
            key.to_string(),
            CacheEntry { payload: Arc::new(payload), computed_at: now },
        );
    }

    /// Serve a fresh entry, or join / start the single in-flight
    /// recomputation for `key`.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        now: DateTime<Utc>,
        compute: F,
    ) -> Result<Lookup<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        if let Some(hit) = self.get(key, now).filter(|l| l.hit) {
            return Ok(hit);
        }

        let flight = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(e) => {
                log::debug!("cache: joining in-flight compute for {key}");
                e.get().clone()
            }
            Entry::Vacant(e) => {
                // a flight may have landed between the first check and here;
                // it always stores before it deregisters
                if let Some(hit) = self.get(key, now).filter(|l| l.hit) {
                    return Ok(hit);
                }

                let entries = Arc::clone(&self.entries);
                let max_entries = self.max_entries;
                let registered = Deregister {
                    in_flight: Arc::clone(&self.in_flight),
                    key: key.to_string(),
                };
                let fut = compute();

                // the shard lock is held until `insert` below, so the task
                // can't deregister before it is registered
                let task = tokio::spawn(async move {
                    let out = fut.await.map(Arc::new);
                    if let Ok(payload) = &out {
                        store(
                            &entries,
                            max_entries,
                            registered.key.clone(),
                            CacheEntry { payload: Arc::clone(payload), computed_at: now },
                        );
                    }
                    drop(registered);
                    out
                });

                let lost_key = key.to_string();
                let flight = async move {
                    task.await.unwrap_or_else(|e| {
                        log::error!("cache: compute task for {lost_key} died: {e}");
                        Err(E::abandoned(&lost_key))
                    })
                }
                .boxed()
                .shared();

                e.insert(flight.clone());
                flight
            }
        };

        let payload = flight.await?;
        let computed_at = self
            .entries
            .get(key)
            .filter(|e| Arc::ptr_eq(&e.payload, &payload))
            .map(|e| e.computed_at)
            .unwrap_or(now);

        Ok(Lookup { payload, computed_at, hit: false })
    }

    /// Drop every entry older than `max_age`. Returns how many went.
    pub fn sweep(&self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| now - e.computed_at < max_age);
        before.saturating_sub(self.entries.len())
    }
}

fn store<T>(
    entries: &DashMap<String, CacheEntry<T>>,
    max_entries: usize,
    key: String,
    entry: CacheEntry<T>,
) {
    if !entries.contains_key(&key) && entries.len() >= max_entries {
        let oldest = entries
            .iter()
            .min_by_key(|e| e.computed_at)
            .map(|e| e.key().clone());
        if let Some(victim) = oldest {
            log::debug!("cache: evicting {victim}");
            entries.remove(&victim);
        }
    }
    entries.insert(key, entry);
}
