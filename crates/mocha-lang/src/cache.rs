//! Source-keyed cache of compiled expressions.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use smol_str::SmolStr;

use crate::compiler::CompiledExpression;

#[derive(Debug, Default)]
struct CacheSlot {
    compiled: Mutex<Option<Arc<CompiledExpression>>>,
    last_used: AtomicU64,
}

/// Thread-safe cache keyed by exact source text.
///
/// Each key owns a slot with its own lock: concurrent requests for the same
/// source wait for the first one to finish compiling and then share its
/// result, while different sources compile in parallel. Failures are not
/// cached. When `capacity` is non-zero, the least recently used entries are
/// evicted once it is exceeded.
#[derive(Debug, Default)]
pub struct ExpressionCache {
    slots: DashMap<SmolStr, Arc<CacheSlot>>,
    capacity: usize,
    tick: AtomicU64,
    compilations: AtomicUsize,
}

impl ExpressionCache {
    /// `capacity == 0` disables eviction.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn get_or_compile<E, F>(&self, source: &str, compile: F) -> Result<Arc<CompiledExpression>, E>
    where
        F: FnOnce() -> Result<CompiledExpression, E>,
    {
        // Clone the slot out so the shard lock is released before waiting on the slot.
        let slot = self
            .slots
            .entry(SmolStr::new(source))
            .or_default()
            .value()
            .clone();
        slot.last_used.store(self.next_tick(), Ordering::Relaxed);

        let mut compiled = slot.compiled.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(compiled) = compiled.as_ref() {
            tracing::trace!(source, "expression cache hit");
            return Ok(Arc::clone(compiled));
        }

        tracing::debug!(source, "expression cache miss");

        match compile() {
            Ok(expr) => {
                let expr = Arc::new(expr);
                *compiled = Some(Arc::clone(&expr));
                drop(compiled);

                self.compilations.fetch_add(1, Ordering::Relaxed);
                self.evict(source);
                Ok(expr)
            }
            Err(err) => {
                drop(compiled);
                self.slots
                    .remove_if(source, |_, current| Arc::ptr_eq(current, &slot) && is_empty_slot(current));
                Err(err)
            }
        }
    }

    pub fn get(&self, source: &str) -> Option<Arc<CompiledExpression>> {
        let slot = self.slots.get(source)?.value().clone();
        let compiled = slot.compiled.lock().unwrap_or_else(PoisonError::into_inner).clone();

        if compiled.is_some() {
            slot.last_used.store(self.next_tick(), Ordering::Relaxed);
        }

        compiled
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    /// Number of successful compilations performed through this cache.
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::Relaxed)
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed)
    }

    /// Once over capacity, drops least recently used entries down to three
    /// quarters of it so the scan is not repeated on every miss. Slots that are
    /// still compiling or in use are skipped, as is `keep`.
    fn evict(&self, keep: &str) {
        if self.capacity == 0 || self.slots.len() <= self.capacity {
            return;
        }

        let target = self.capacity - self.capacity / 4;
        let mut entries = self
            .slots
            .iter()
            .filter(|entry| entry.key().as_str() != keep && is_ready_slot(entry.value()))
            .map(|entry| (entry.key().clone(), entry.value().last_used.load(Ordering::Relaxed)))
            .collect::<Vec<_>>();
        entries.sort_unstable_by_key(|(_, last_used)| *last_used);

        let excess = self.slots.len().saturating_sub(target);
        for (key, _) in entries.into_iter().take(excess) {
            if self.slots.remove_if(&key, |_, slot| is_ready_slot(slot)).is_some() {
                tracing::debug!(source = %key, "evicting cached expression");
            }
        }
    }
}

/// A slot that holds a compiled expression and is not locked by anyone.
fn is_ready_slot(slot: &CacheSlot) -> bool {
    slot.compiled
        .try_lock()
        .map(|compiled| compiled.is_some())
        .unwrap_or(false)
}

fn is_empty_slot(slot: &CacheSlot) -> bool {
    slot.compiled
        .try_lock()
        .map(|compiled| compiled.is_none())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use rstest::rstest;

    fn constant(source: &str, value: f64) -> Result<CompiledExpression, String> {
        Ok(CompiledExpression::new(source, Box::new(move |_| Ok(value)), true))
    }

    #[test]
    fn test_hit_returns_same_arc() {
        let cache = ExpressionCache::new(8);

        let first = cache.get_or_compile("1", || constant("1", 1.0)).unwrap();
        let second = cache
            .get_or_compile("1", || -> Result<_, String> { panic!("compiled twice") })
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.compilations(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let cache = ExpressionCache::new(8);

        let err = cache.get_or_compile("bad", || Err::<CompiledExpression, _>("nope".to_string()));
        assert_eq!(err.unwrap_err(), "nope");
        assert!(cache.is_empty());
        assert!(cache.get("bad").is_none());

        let retried = cache.get_or_compile("bad", || constant("bad", 2.0));
        assert!(retried.is_ok());
        assert_eq!(cache.compilations(), 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = ExpressionCache::new(2);

        cache.get_or_compile("a", || constant("a", 1.0)).unwrap();
        cache.get_or_compile("b", || constant("b", 2.0)).unwrap();
        // Touch `a` so that `b` becomes the oldest entry.
        cache.get_or_compile("a", || constant("a", 1.0)).unwrap();
        cache.get_or_compile("c", || constant("c", 3.0)).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[rstest]
    #[case::unbounded(0, 5)]
    #[case::bounded(3, 3)]
    fn test_capacity(#[case] capacity: usize, #[case] expected: usize) {
        let cache = ExpressionCache::new(capacity);

        for i in 0..5 {
            let source = i.to_string();
            cache.get_or_compile(&source, || constant(&source, i as f64)).unwrap();
        }

        assert_eq!(cache.len(), expected);
        assert_eq!(cache.compilations(), 5);
    }

    #[test]
    fn test_clear() {
        let cache = ExpressionCache::new(4);
        cache.get_or_compile("1", || constant("1", 1.0)).unwrap();
        cache.clear();

        assert!(cache.is_empty());
        cache.get_or_compile("1", || constant("1", 1.0)).unwrap();
        assert_eq!(cache.compilations(), 2);
    }

    #[test]
    fn test_eviction_skips_compiling_slots() {
        let cache = ExpressionCache::new(1);
        let started = Barrier::new(2);

        let (slow, waited) = thread::scope(|s| {
            let slow = s.spawn(|| {
                cache
                    .get_or_compile("a", || {
                        started.wait();
                        thread::sleep(Duration::from_millis(200));
                        constant("a", 1.0)
                    })
                    .unwrap()
            });

            started.wait();
            cache.get_or_compile("b", || constant("b", 2.0)).unwrap();
            let waited = cache.get_or_compile("a", || constant("a", 1.0)).unwrap();

            (slow.join().unwrap(), waited)
        });

        assert_eq!(cache.compilations(), 2);
        assert!(Arc::ptr_eq(&slow, &waited));
    }

    #[test]
    fn test_evicts_in_batches() {
        let cache = ExpressionCache::new(8);

        for i in 0..9 {
            let source = i.to_string();
            cache.get_or_compile(&source, || constant(&source, i as f64)).unwrap();
        }

        assert_eq!(cache.len(), 6);
        assert!(cache.get("8").is_some());
        assert!(cache.get("0").is_none());
        assert!(cache.get("2").is_none());
        assert!(cache.get("3").is_some());
    }

    #[test]
    fn test_single_flight() {
        let cache = ExpressionCache::new(16);
        let barrier = Barrier::new(8);

        let results = thread::scope(|s| {
            let handles = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache
                            .get_or_compile("v.x + 1", || {
                                thread::sleep(Duration::from_millis(20));
                                constant("v.x + 1", 1.0)
                            })
                            .unwrap()
                    })
                })
                .collect::<Vec<_>>();

            handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
        });

        assert_eq!(cache.compilations(), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }
}
