use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

/// Returns `false` once the subscriber wants no further updates
type Callback = Box<dyn Fn(i64) -> bool + Send + Sync>;

/// Handle returned by [`CounterHub::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Subscribers {
    /// Set by the first increment or seed
    live: bool,
    entries: Vec<(SubscriptionId, Callback)>,
}

/// One counter per token plus its ordered subscribers.
///
/// Reads are lock-free. Increments, seeding and subscriber changes serialize
/// on the subscriber lock, and callbacks run while it is held, so every
/// subscriber sees the counts of a token in increment order. Callbacks must
/// therefore be quick and must not increment the same token.
pub struct AtomicCounter {
    token: String,
    count: AtomicI64,
    subscribers: Mutex<Subscribers>,
}

impl AtomicCounter {
    fn new(token: &str) -> Self {
        Self { token: token.to_string(), count: AtomicI64::new(0), subscribers: Mutex::new(Subscribers::default()) }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn get(&self) -> i64 {
        self.count.load(Ordering::Acquire)
    }

    /// Add one and notify every subscriber with the new value.
    ///
    /// Subscribers whose callback returns `false` are dropped.
    pub fn increment(&self) -> i64 {
        let mut subscribers = self.subscribers.lock();
        subscribers.live = true;
        let count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        subscribers.entries.retain(|(_, callback)| callback(count));
        count
    }

    /// Overwrite the count, used when restoring from a durable store
    pub fn seed(&self, count: i64) {
        let mut subscribers = self.subscribers.lock();
        subscribers.live = true;
        self.count.store(count, Ordering::Release);
    }

    /// Seed only a counter that was never incremented or seeded.
    ///
    /// Returns whether the count was written.
    pub fn seed_if_fresh(&self, count: i64) -> bool {
        let mut subscribers = self.subscribers.lock();
        if subscribers.live {
            return false;
        }
        subscribers.live = true;
        self.count.store(count, Ordering::Release);
        true
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().entries.len()
    }

    fn subscribe(&self, id: SubscriptionId, callback: Callback) {
        self.subscribers.lock().entries.push((id, callback));
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.entries.len();
        subscribers.entries.retain(|(existing, _)| *existing != id);
        subscribers.entries.len() != before
    }
}

impl fmt::Debug for AtomicCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicCounter")
            .field("token", &self.token)
            .field("count", &self.get())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Registry of live counters keyed by token.
///
/// Counters are created on first reference and live as long as the hub;
/// dropping the last subscriber does not retire them.
#[derive(Debug, Default)]
pub struct CounterHub {
    counters: DashMap<String, Arc<AtomicCounter>>,
    next_id: AtomicU64,
}

impl CounterHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// The counter for `token`, created on first use
    pub fn counter(&self, token: &str) -> Arc<AtomicCounter> {
        if let Some(counter) = self.counters.get(token) {
            return counter.value().clone();
        }
        self.counters
            .entry(token.to_string())
            .or_insert_with(|| {
                debug!(token, "Creating atomic counter");
                Arc::new(AtomicCounter::new(token))
            })
            .value()
            .clone()
    }

    /// Increment `token` and return the new count.
    ///
    /// This is the entry point for external events such as webhooks.
    pub fn increment(&self, token: &str) -> i64 {
        self.counter(token).increment()
    }

    /// Current count, `None` when the token was never referenced
    pub fn get(&self, token: &str) -> Option<i64> {
        self.counters.get(token).map(|counter| counter.get())
    }

    pub fn seed(&self, token: &str, count: i64) {
        info!(token, count, "Seeding atomic counter");
        self.counter(token).seed(count);
    }

    /// Seed `token` unless its counter already holds a live count
    pub fn seed_if_fresh(&self, token: &str, count: i64) -> bool {
        let seeded = self.counter(token).seed_if_fresh(count);
        if seeded {
            info!(token, count, "Seeding atomic counter");
        } else {
            debug!(token, count, "Counter already live, keeping in-memory count");
        }
        seeded
    }

    /// Register `callback` for every future change of `token`.
    ///
    /// An already live counter keeps its count. The subscription ends the
    /// first time `callback` returns `false`.
    pub fn subscribe(
        &self,
        token: &str,
        callback: impl Fn(i64) -> bool + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.counter(token).subscribe(id, Box::new(callback));
        debug!(token, subscription = id.0, "Registered counter subscriber");
        id
    }

    pub fn unsubscribe(&self, token: &str, id: SubscriptionId) -> bool {
        self.counters.get(token).map(|counter| counter.unsubscribe(id)).unwrap_or(false)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.counters.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_lazy_creation_and_read() {
        let hub = CounterHub::new();
        assert_eq!(hub.get("hits"), None);
        assert_eq!(hub.increment("hits"), 1);
        assert_eq!(hub.increment("hits"), 2);
        assert_eq!(hub.get("hits"), Some(2));
        assert_eq!(hub.get("other"), None);
    }

    #[test]
    fn test_subscribers_notified_in_registration_order() {
        let hub = CounterHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second"] {
            let seen = seen.clone();
            hub.subscribe("t", move |count| {
                seen.lock().push((name, count));
                true
            });
        }
        hub.increment("t");

        assert_eq!(*seen.lock(), vec![("first", 1), ("second", 1)]);
    }

    #[test]
    fn test_second_subscription_keeps_count() {
        let hub = CounterHub::new();
        hub.subscribe("t", |_| true);
        hub.increment("t");
        hub.increment("t");
        hub.subscribe("t", |_| true);

        assert_eq!(hub.get("t"), Some(2));
        assert_eq!(hub.counter("t").subscriber_count(), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let hub = CounterHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = hub.subscribe("t", move |count| {
            sink.lock().push(count);
            true
        });

        hub.increment("t");
        assert!(hub.unsubscribe("t", id));
        assert!(!hub.unsubscribe("t", id));
        hub.increment("t");

        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(hub.get("t"), Some(2));
    }

    #[test]
    fn test_seed_then_increment() {
        let hub = CounterHub::new();
        hub.seed("t", 41);
        assert_eq!(hub.get("t"), Some(41));
        assert_eq!(hub.increment("t"), 42);
    }

    #[test]
    fn test_seed_if_fresh_leaves_live_counter_alone() {
        let hub = CounterHub::new();
        hub.subscribe("t", |_| true);
        assert!(hub.seed_if_fresh("t", 41));
        assert_eq!(hub.increment("t"), 42);

        assert!(!hub.seed_if_fresh("t", 41));
        assert_eq!(hub.get("t"), Some(42));

        hub.increment("fresh-after-increment");
        assert!(!hub.seed_if_fresh("fresh-after-increment", 10));
        assert_eq!(hub.get("fresh-after-increment"), Some(1));
    }

    #[test]
    fn test_declining_subscriber_is_dropped() {
        let hub = CounterHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        hub.subscribe("t", move |count| {
            sink.lock().push(count);
            count < 2
        });
        hub.subscribe("t", |_| true);

        hub.increment("t");
        hub.increment("t");
        assert_eq!(hub.counter("t").subscriber_count(), 1);
        hub.increment("t");

        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn test_concurrent_increments_are_totally_ordered() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 250;

        let hub = Arc::new(CounterHub::new());
        let observers: Vec<_> = (0..3)
            .map(|_| {
                let seen = Arc::new(Mutex::new(Vec::new()));
                let sink = seen.clone();
                hub.subscribe("shared", move |count| {
                    sink.lock().push(count);
                    true
                });
                seen
            })
            .collect();

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let hub = hub.clone();
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        hub.increment("shared");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let total = (THREADS * PER_THREAD) as i64;
        assert_eq!(hub.get("shared"), Some(total));
        for seen in observers {
            let seen = seen.lock();
            assert_eq!(seen.len(), THREADS * PER_THREAD);
            assert_eq!(seen.last().copied(), Some(total));
            assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }
}
