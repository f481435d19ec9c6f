use std::sync::Arc;

use dashmap::DashMap;
use metrics::counter;
use tracing::trace;

use crate::domain::types::EntityKind;

pub(crate) const METRIC_COUNTER_INCREMENT_TOTAL: &str = "pressroom_counter_increment_total";

/// One drained key and the delta accumulated since the previous drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCount {
    pub kind: EntityKind,
    /// Raw identifier as recorded; it is parsed only when flushed.
    pub id: String,
    pub delta: u64,
}

/// Accumulates per-entity deltas off the request path.
pub trait CounterStore: Send + Sync {
    /// Add one to the pending delta of `(kind, id)`. Never fails.
    fn increment(&self, kind: EntityKind, id: &str);

    /// Remove and return every pending entry of `kind`.
    ///
    /// Each key is removed atomically on its own, so an increment racing the drain
    /// either lands in the returned delta or in a fresh entry for the next drain.
    fn drain_matching(&self, kind: EntityKind) -> Vec<PendingCount>;

    /// Put a drained delta back, merging with anything recorded since.
    fn restore(&self, pending: PendingCount);

    /// Sum of pending deltas for `kind`.
    fn pending(&self, kind: EntityKind) -> u64;
}

#[derive(Default)]
struct Shard {
    counts: DashMap<Arc<str>, u64>,
}

impl Shard {
    fn increment(&self, id: &str, by: u64) {
        if let Some(mut entry) = self.counts.get_mut(id) {
            *entry = entry.saturating_add(by);
        } else {
            self.counts
                .entry(Arc::from(id))
                .and_modify(|value| *value = value.saturating_add(by))
                .or_insert(by);
        }
    }

    fn drain(&self, kind: EntityKind) -> Vec<PendingCount> {
        let keys: Vec<Arc<str>> = self.counts.iter().map(|entry| entry.key().clone()).collect();

        let mut drained = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some((id, delta)) = self.counts.remove(&key) {
                drained.push(PendingCount {
                    kind,
                    id: id.to_string(),
                    delta,
                });
            }
        }

        drained
    }

    // Summed from the map itself so it cannot drift from what a drain would return.
    fn pending(&self) -> u64 {
        self.counts
            .iter()
            .fold(0u64, |total, entry| total.saturating_add(*entry.value()))
    }
}

/// Process-local [`CounterStore`] sharded by entity kind.
#[derive(Default)]
pub struct MemoryCounterStore {
    posts: Shard,
    categories: Shard,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, kind: EntityKind) -> &Shard {
        match kind {
            EntityKind::Post => &self.posts,
            EntityKind::Category => &self.categories,
        }
    }
}

impl CounterStore for MemoryCounterStore {
    fn increment(&self, kind: EntityKind, id: &str) {
        self.shard(kind).increment(id, 1);
        counter!(METRIC_COUNTER_INCREMENT_TOTAL, "kind" => kind.as_str()).increment(1);
        trace!(kind = kind.as_str(), id, "impression recorded");
    }

    fn drain_matching(&self, kind: EntityKind) -> Vec<PendingCount> {
        self.shard(kind).drain(kind)
    }

    fn restore(&self, pending: PendingCount) {
        self.shard(pending.kind).increment(&pending.id, pending.delta);
    }

    fn pending(&self, kind: EntityKind) -> u64 {
        self.shard(kind).pending()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn drain_returns_accumulated_deltas_and_empties_the_shard() {
        let store = MemoryCounterStore::new();
        store.increment(EntityKind::Post, "a");
        store.increment(EntityKind::Post, "a");
        store.increment(EntityKind::Post, "b");
        store.increment(EntityKind::Category, "a");

        let mut drained = store.drain_matching(EntityKind::Post);
        drained.sort_by(|left, right| left.id.cmp(&right.id));

        assert_eq!(
            drained,
            vec![
                PendingCount {
                    kind: EntityKind::Post,
                    id: "a".to_string(),
                    delta: 2,
                },
                PendingCount {
                    kind: EntityKind::Post,
                    id: "b".to_string(),
                    delta: 1,
                },
            ]
        );
        assert_eq!(store.pending(EntityKind::Post), 0);
        assert!(store.drain_matching(EntityKind::Post).is_empty());
        assert_eq!(store.pending(EntityKind::Category), 1);
    }

    #[test]
    fn restore_merges_with_newer_increments() {
        let store = MemoryCounterStore::new();
        store.increment(EntityKind::Category, "tech");
        let drained = store.drain_matching(EntityKind::Category);

        store.increment(EntityKind::Category, "tech");
        for pending in drained {
            store.restore(pending);
        }

        let drained = store.drain_matching(EntityKind::Category);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].delta, 2);
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryCounterStore::new());

        const TASKS: u64 = 10;
        const PER_TASK: u64 = 1000;

        let mut handles = Vec::new();
        for _ in 0..TASKS {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for _ in 0..PER_TASK {
                    store.increment(EntityKind::Post, "shared");
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.pending(EntityKind::Post), TASKS * PER_TASK);
        let drained = store.drain_matching(EntityKind::Post);
        assert_eq!(drained[0].delta, TASKS * PER_TASK);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn increments_racing_drains_land_exactly_once() {
        let store = Arc::new(MemoryCounterStore::new());

        const TASKS: u64 = 8;
        const PER_TASK: u64 = 2000;

        let mut handles = Vec::new();
        for _ in 0..TASKS {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for i in 0..PER_TASK {
                    store.increment(EntityKind::Post, "hot");
                    if i % 64 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }

        let drainer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut drained = 0u64;
                for _ in 0..20 {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    drained += store
                        .drain_matching(EntityKind::Post)
                        .iter()
                        .map(|pending| pending.delta)
                        .sum::<u64>();
                }
                drained
            })
        };

        for handle in handles {
            handle.await.unwrap();
        }
        let drained = drainer.await.unwrap();
        let remaining: u64 = store
            .drain_matching(EntityKind::Post)
            .iter()
            .map(|pending| pending.delta)
            .sum();

        assert_eq!(drained + remaining, TASKS * PER_TASK);
        assert_eq!(store.pending(EntityKind::Post), 0);
    }

    #[test]
    fn pending_returns_to_zero_after_racing_drains() {
        const THREADS: u64 = 4;
        const PER_THREAD: u64 = 20_000;

        for _ in 0..10 {
            let store = Arc::new(MemoryCounterStore::new());
            let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

            let drainer = {
                let store = Arc::clone(&store);
                let done = Arc::clone(&done);
                std::thread::spawn(move || {
                    let mut drained = 0u64;
                    while !done.load(std::sync::atomic::Ordering::Acquire) {
                        drained += store
                            .drain_matching(EntityKind::Post)
                            .iter()
                            .map(|pending| pending.delta)
                            .sum::<u64>();
                    }
                    drained
                })
            };

            let writers: Vec<_> = (0..THREADS)
                .map(|_| {
                    let store = Arc::clone(&store);
                    std::thread::spawn(move || {
                        for _ in 0..PER_THREAD {
                            store.increment(EntityKind::Post, "hot");
                        }
                    })
                })
                .collect();
            for writer in writers {
                writer.join().expect("writer thread");
            }
            done.store(true, std::sync::atomic::Ordering::Release);
            let drained = drainer.join().expect("drainer thread");
            let remaining: u64 = store
                .drain_matching(EntityKind::Post)
                .iter()
                .map(|pending| pending.delta)
                .sum();

            assert_eq!(drained + remaining, THREADS * PER_THREAD);
            assert_eq!(store.pending(EntityKind::Post), 0);
        }
    }
}
