//! Query cache with tag invalidation and in-flight deduplication.
//!
//! Entries are keyed by request signature. A read either hits a fresh entry,
//! joins the fetch already running for its key, or starts one. All waiters
//! of a fetch receive the same outcome over a broadcast channel.
//!
//! Invalidation only marks entries stale and bumps their version; the next
//! read refetches. Subscribers watch the version to learn about it. A fetch
//! that was already running when its tags were invalidated is detached: its
//! own waiters still get its outcome, later reads start a new fetch, and the
//! outcome is never cached.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use super::tags::{Endpoint, Tag};
use crate::error::AppResult;

/// Outcome shared by every waiter of one fetch
pub type Outcome = AppResult<Value>;

/// Identity of a cached read: endpoint plus request signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub endpoint: Endpoint,
    pub args: String,
}

impl QueryKey {
    pub fn new(endpoint: Endpoint, args: impl Into<String>) -> Self {
        Self {
            endpoint,
            args: args.into(),
        }
    }
}

struct Entry {
    data: Option<Value>,
    tags: Vec<Tag>,
    stale: bool,
    subscribers: usize,
    last_used: Instant,
    version: watch::Sender<u64>,
}

impl Entry {
    fn new(tags: Vec<Tag>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            data: None,
            tags,
            stale: false,
            subscribers: 0,
            last_used: Instant::now(),
            version,
        }
    }

    fn is_fresh(&self) -> bool {
        self.data.is_some() && !self.stale
    }

    fn matches(&self, tags: &[Tag]) -> bool {
        self.tags.iter().any(|t| tags.contains(t))
    }
}

/// Identifies one fetch started by [`QueryCache::lookup`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchId(u64);

struct InFlight {
    id: FetchId,
    sender: broadcast::Sender<Outcome>,
    tags: Vec<Tag>,
}

impl InFlight {
    fn matches(&self, tags: &[Tag]) -> bool {
        self.tags.iter().any(|t| tags.contains(t))
    }
}

#[derive(Default)]
struct State {
    entries: HashMap<QueryKey, Entry>,
    in_flight: HashMap<QueryKey, InFlight>,
    detached: HashMap<FetchId, InFlight>,
    next_fetch: u64,
}

/// Result of looking a key up before a read
pub enum Lookup {
    /// Cached and current
    Fresh(Value),
    /// Another caller is fetching this key; wait for its outcome
    Join(broadcast::Receiver<Outcome>),
    /// This caller must run the fetch and then call [`QueryCache::complete`]
    Fetch(FetchId, broadcast::Receiver<Outcome>),
}

#[derive(Clone)]
pub struct QueryCache {
    state: Arc<Mutex<State>>,
    keep_unused: Duration,
}

impl QueryCache {
    /// `keep_unused` is how long an entry without subscribers survives its
    /// last read
    pub fn new(keep_unused: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            keep_unused,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide how a read for `key` is served
    pub fn lookup(&self, key: &QueryKey, tags: &[Tag]) -> Lookup {
        let mut state = self.lock();
        self.prune(&mut state);

        if let Some(entry) = state.entries.get_mut(key) {
            if let (true, Some(data)) = (entry.is_fresh(), &entry.data) {
                let data = data.clone();
                entry.last_used = Instant::now();
                tracing::debug!("Cache hit for {} {}", key.endpoint, key.args);
                return Lookup::Fresh(data);
            }
        }

        if let Some(flight) = state.in_flight.get(key) {
            tracing::debug!("Joining in-flight request for {} {}", key.endpoint, key.args);
            return Lookup::Join(flight.sender.subscribe());
        }

        tracing::debug!("Cache miss for {} {}", key.endpoint, key.args);
        let (sender, receiver) = broadcast::channel(1);
        state.next_fetch += 1;
        let id = FetchId(state.next_fetch);
        state.in_flight.insert(
            key.clone(),
            InFlight {
                id,
                sender,
                tags: tags.to_vec(),
            },
        );
        Lookup::Fetch(id, receiver)
    }

    /// Store the outcome of a fetch started by [`Lookup::Fetch`] and wake
    /// every waiter. Errors and detached fetches are delivered but not cached.
    pub fn complete(&self, key: &QueryKey, id: FetchId, outcome: Outcome) {
        let mut state = self.lock();
        let current = state.in_flight.get(key).is_some_and(|f| f.id == id);
        let flight = if current {
            state.in_flight.remove(key)
        } else {
            state.detached.remove(&id)
        };
        let Some(flight) = flight else {
            return;
        };

        if let (true, Ok(value)) = (current, &outcome) {
            let entry = state
                .entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(flight.tags.clone()));
            entry.data = Some(value.clone());
            entry.tags = flight.tags;
            entry.stale = false;
            entry.last_used = Instant::now();
        } else if !current {
            tracing::debug!("Dropping detached result for {} {}", key.endpoint, key.args);
        }

        // No receivers left only means every caller went away
        let _ = flight.sender.send(outcome);
    }

    /// Mark every entry carrying one of `tags` stale and detach matching
    /// in-flight fetches. Returns the number of cached entries affected.
    pub fn invalidate(&self, tags: &[Tag]) -> usize {
        if tags.is_empty() {
            return 0;
        }

        let mut state = self.lock();
        let mut count = 0;
        for entry in state.entries.values_mut().filter(|e| e.matches(tags)) {
            entry.stale = true;
            entry.version.send_modify(|v| *v += 1);
            count += 1;
        }
        let overtaken = state
            .in_flight
            .iter()
            .filter(|(_, f)| f.matches(tags))
            .map(|(k, _)| k.clone())
            .collect::<Vec<_>>();
        for key in overtaken {
            if let Some(flight) = state.in_flight.remove(&key) {
                tracing::debug!("Detaching in-flight request for {} {}", key.endpoint, key.args);
                state.detached.insert(flight.id, flight);
            }
        }

        let labels = tags.iter().map(Tag::to_string).collect::<Vec<_>>();
        tracing::info!("Invalidated {} cached queries for tags [{}]", count, labels.join(", "));
        count
    }

    /// Register a consumer of `key`; the entry is kept while it has any
    pub fn subscribe(&self, key: &QueryKey, tags: &[Tag]) -> watch::Receiver<u64> {
        let mut state = self.lock();
        self.prune(&mut state);

        let entry = state
            .entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(tags.to_vec()));
        entry.subscribers += 1;
        entry.version.subscribe()
    }

    /// Drop a consumer registered with [`QueryCache::subscribe`]
    pub fn release(&self, key: &QueryKey) {
        let mut state = self.lock();
        if let Some(entry) = state.entries.get_mut(key) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            entry.last_used = Instant::now();
        }
        self.prune(&mut state);
    }

    /// `Some(true)` when cached but stale, `None` when not cached
    pub fn is_stale(&self, key: &QueryKey) -> Option<bool> {
        self.lock().entries.get(key).map(|e| !e.is_fresh())
    }

    pub fn subscribers(&self, key: &QueryKey) -> usize {
        self.lock().entries.get(key).map_or(0, |e| e.subscribers)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(&self, state: &mut State) {
        let keep_unused = self.keep_unused;
        state
            .entries
            .retain(|_, e| e.subscribers > 0 || e.last_used.elapsed() < keep_unused);
    }
}
