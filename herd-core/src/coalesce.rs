//! Read-while-writer request coalescing.
//!
//! The first caller to [`CoalescingQueue::join`] a key becomes its leader and
//! does the real work. Every caller that joins the same key while the leader
//! is working becomes a follower and waits for the leader's result instead of
//! repeating the work.
//!
//! Per key the queue moves `absent -> leading -> absent`:
//!
//! - `join` on an absent key registers a leader and returns a [`LeaderGuard`].
//! - `join` on a leading key registers a follower and returns a [`Follower`].
//! - [`LeaderGuard::complete`] removes the key and sends one copy of the
//!   result to each follower registered at that moment. Callers that join
//!   afterwards start a new cycle with a new leader.
//!
//! A leader that is dropped without completing (panic, early return, a
//! cancelled future) still removes its key. Its followers see
//! [`CoalesceError::LeaderAbandoned`] rather than waiting forever.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::error::CoalesceError;
use crate::stats::{CoalesceStats, Counter};

type Waiters<T> = Vec<oneshot::Sender<T>>;

#[derive(Debug, Default)]
struct Counters {
    leaders: Counter,
    followers: Counter,
    completions: Counter,
    abandonments: Counter,
}

/// Keyed registry of in-flight leaders and their waiting followers.
#[derive(Debug)]
pub struct CoalescingQueue<K, T> {
    registry: Mutex<HashMap<K, Waiters<T>>>,
    counters: Counters,
}

/// What a caller must do after joining a key.
#[derive(Debug)]
pub enum Role<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    /// No one was working on the key: do the work and complete the guard.
    Leader(LeaderGuard<K, T>),
    /// Someone already is: wait for their result.
    Follower(Follower<T>),
}

impl<K, T> CoalescingQueue<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Atomically become the leader for `key` or register as its follower.
    pub fn join(self: &Arc<Self>, key: K) -> Role<K, T> {
        let mut registry = self.registry();
        match registry.entry(key) {
            Entry::Occupied(mut entry) => {
                let (tx, rx) = oneshot::channel();
                entry.get_mut().push(tx);
                self.counters.followers.incr();
                Role::Follower(Follower { rx })
            }
            Entry::Vacant(entry) => {
                let key = entry.key().clone();
                entry.insert(Vec::new());
                self.counters.leaders.incr();
                Role::Leader(LeaderGuard {
                    queue: Arc::clone(self),
                    key: Some(key),
                })
            }
        }
    }

    /// True while a leader is working on `key`.
    pub fn is_in_flight(&self, key: &K) -> bool {
        self.registry().contains_key(key)
    }

    pub fn stats(&self) -> CoalesceStats {
        let registry = self.registry();
        let waiting = registry
            .values()
            .flat_map(|waiters| waiters.iter())
            .filter(|tx| !tx.is_closed())
            .count();

        CoalesceStats {
            in_flight_keys: registry.len() as u64,
            waiting_followers: waiting as u64,
            leaders: self.counters.leaders.get(),
            followers: self.counters.followers.get(),
            completions: self.counters.completions.get(),
            abandonments: self.counters.abandonments.get(),
        }
    }

    fn take_waiters(&self, key: &K) -> Waiters<T> {
        self.registry().remove(key).unwrap_or_default()
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<K, Waiters<T>>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.registry.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl<K, T> Default for CoalescingQueue<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Held by the leader of a key for as long as it is doing the work.
#[derive(Debug)]
pub struct LeaderGuard<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    queue: Arc<CoalescingQueue<K, T>>,
    /// `None` once the guard has been completed.
    key: Option<K>,
}

impl<K, T> LeaderGuard<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    pub fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    /// Release the key and hand `result` to every registered follower.
    ///
    /// Returns the number of followers that received it. Followers that
    /// stopped waiting (timed out, cancelled) are skipped.
    pub fn complete(mut self, result: T) -> usize {
        let Some(key) = self.key.take() else {
            return 0;
        };

        let waiters = self.queue.take_waiters(&key);
        self.queue.counters.completions.incr();

        waiters
            .into_iter()
            .filter(|tx| !tx.is_closed())
            .map(|tx| tx.send(result.clone()).is_ok())
            .filter(|delivered| *delivered)
            .count()
    }
}

impl<K, T> Drop for LeaderGuard<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };

        // Dropping the senders wakes every follower with a receive error.
        let waiters = self.queue.take_waiters(&key);
        self.queue.counters.abandonments.incr();
        tracing::warn!(
            followers = waiters.len(),
            panicking = std::thread::panicking(),
            "Coalescing leader dropped without delivering a result"
        );
    }
}

/// Single-use handle on which a follower receives the leader's result.
#[derive(Debug)]
pub struct Follower<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Follower<T> {
    /// Wait for the leader's result, optionally bounded by `timeout`.
    pub async fn wait(self, timeout: Option<Duration>) -> Result<T, CoalesceError> {
        match timeout {
            None => self.rx.await.map_err(|_| CoalesceError::LeaderAbandoned),
            Some(after) => match tokio::time::timeout(after, self.rx).await {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(_)) => Err(CoalesceError::LeaderAbandoned),
                Err(_) => Err(CoalesceError::TimedOut { after }),
            },
        }
    }
}
