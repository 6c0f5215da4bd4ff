//! Most-recently-used proxy cache for generated meshes (§4.6). `get` returns
//! the cached value if present, else calls the generator and inserts the
//! result at the front. Eviction is strict LRU, skips any entry with a
//! nonzero borrow count, and calls the generator's `on_evict` hook so
//! underlying storage can be freed.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex};

/// Produces (and optionally tears down) cached values on demand.
pub trait ProxyGenerator<K, V> {
    fn generate(&self, key: &K) -> V;
    fn on_evict(&self, _key: &K, _value: Arc<V>) {}
}

struct CacheEntry<V> {
    value: Arc<V>,
    borrows: u32,
}

struct Inner<K, V> {
    order: VecDeque<K>, // front = most recently used
    entries: HashMap<K, CacheEntry<V>>,
}

pub struct MruCache<K, V, G> {
    capacity: usize,
    generator: G,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V, G> MruCache<K, V, G>
where
    K: Eq + Hash + Clone,
    G: ProxyGenerator<K, V>,
{
    pub fn new(capacity: usize, generator: G) -> Self {
        Self {
            capacity: capacity.max(1),
            generator,
            inner: Mutex::new(Inner {
                order: VecDeque::new(),
                entries: HashMap::new(),
            }),
        }
    }

    /// Returns the cached value for `key`, generating and inserting it at
    /// the front if absent. Bumps an already-present entry to the front.
    /// The returned [`ProxyHandle`] holds a borrow on the entry until
    /// dropped (§4.6: "proxies obtained by the caller must be returned
    /// before they can be evicted").
    pub fn get(&self, key: K) -> ProxyHandle<'_, K, V, G> {
        let mut guard = self.inner.lock().unwrap();
        if let Some(entry) = guard.entries.get_mut(&key) {
            entry.borrows += 1;
            let value = entry.value.clone();
            Self::bump_to_front(&mut guard.order, &key);
            return ProxyHandle { cache: self, key, value };
        }
        drop(guard);

        let value = Arc::new(self.generator.generate(&key));
        let mut guard = self.inner.lock().unwrap();
        // Another thread may have inserted the same key while we generated;
        // prefer the existing entry to avoid orphaning the one we just built.
        if let Some(entry) = guard.entries.get_mut(&key) {
            entry.borrows += 1;
            let existing = entry.value.clone();
            Self::bump_to_front(&mut guard.order, &key);
            return ProxyHandle { cache: self, key, value: existing };
        }
        guard.order.push_front(key.clone());
        guard.entries.insert(
            key.clone(),
            CacheEntry { value: value.clone(), borrows: 1 },
        );
        self.evict_locked(&mut guard);
        ProxyHandle { cache: self, key, value }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bump_to_front(order: &mut VecDeque<K>, key: &K) {
        if let Some(pos) = order.iter().position(|k| k == key) {
            if pos != 0 {
                let k = order.remove(pos).unwrap();
                order.push_front(k);
            }
        }
    }

    fn release(&self, key: &K) {
        let mut guard = self.inner.lock().unwrap();
        if let Some(entry) = guard.entries.get_mut(key) {
            entry.borrows = entry.borrows.saturating_sub(1);
        }
        self.evict_locked(&mut guard);
    }

    fn evict_locked(&self, guard: &mut Inner<K, V>) {
        while guard.entries.len() > self.capacity {
            let Some(idx) = guard
                .order
                .iter()
                .rposition(|k| guard.entries.get(k).is_some_and(|e| e.borrows == 0))
            else {
                break; // everything beyond capacity is still borrowed
            };
            let key = guard.order.remove(idx).unwrap();
            if let Some(entry) = guard.entries.remove(&key) {
                self.generator.on_evict(&key, entry.value);
            }
        }
    }
}

/// A handle on a cache entry. Dereferences to the cached value; dropping it
/// decrements the entry's borrow count, making it eligible for eviction
/// again once no other handle references it.
pub struct ProxyHandle<'a, K, V, G>
where
    K: Eq + Hash + Clone,
    G: ProxyGenerator<K, V>,
{
    cache: &'a MruCache<K, V, G>,
    key: K,
    value: Arc<V>,
}

impl<'a, K, V, G> std::ops::Deref for ProxyHandle<'a, K, V, G>
where
    K: Eq + Hash + Clone,
    G: ProxyGenerator<K, V>,
{
    type Target = V;
    fn deref(&self) -> &V {
        &self.value
    }
}

impl<'a, K, V, G> Drop for ProxyHandle<'a, K, V, G>
where
    K: Eq + Hash + Clone,
    G: ProxyGenerator<K, V>,
{
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGenerator {
        generated: AtomicUsize,
        evicted: AtomicUsize,
    }

    impl ProxyGenerator<u32, String> for CountingGenerator {
        fn generate(&self, key: &u32) -> String {
            self.generated.fetch_add(1, Ordering::SeqCst);
            format!("mesh-{key}")
        }

        fn on_evict(&self, _key: &u32, _value: Arc<String>) {
            self.evicted.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn returning_a_value_moves_it_to_the_front() {
        let gen = CountingGenerator { generated: AtomicUsize::new(0), evicted: AtomicUsize::new(0) };
        let cache = MruCache::new(3, gen);
        {
            let _a = cache.get(1);
            let _b = cache.get(2);
        }
        let _c = cache.get(1);
        let guard = cache.inner.lock().unwrap();
        assert_eq!(guard.order.front(), Some(&1));
    }

    #[test]
    fn eviction_is_strict_lru_and_skips_borrowed_entries() {
        let gen = CountingGenerator { generated: AtomicUsize::new(0), evicted: AtomicUsize::new(0) };
        let cache = MruCache::new(2, gen);
        let pinned = cache.get(1); // stays borrowed
        {
            let _b = cache.get(2);
        }
        {
            let _c = cache.get(3); // would evict LRU (1), but 1 is pinned -> evicts 2
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.inner.lock().unwrap().entries.contains_key(&1));
        drop(pinned);
        let _d = cache.get(4);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn cache_hit_does_not_regenerate() {
        let gen = CountingGenerator { generated: AtomicUsize::new(0), evicted: AtomicUsize::new(0) };
        let cache = MruCache::new(4, gen);
        let _a = cache.get(7);
        let _b = cache.get(7);
        assert_eq!(cache.generator.generated.load(Ordering::SeqCst), 1);
    }
}
