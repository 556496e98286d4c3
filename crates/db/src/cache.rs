// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use ahash::AHasher;
use protocosm_var::Obj;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::debug;

type FastMap<K, V> = HashMap<K, V, BuildHasherDefault<AHasher>>;

/// An object's ancestors, ordered from its immediate parent toward the root.
#[derive(Clone, Debug, PartialEq)]
pub struct ParentChain {
    pub ancestors: Vec<Obj>,
    /// The walk revisited an identity or ran past its hop limit. Lookups through a cyclic chain
    /// must not trust the ancestors past the object itself.
    pub cyclic: bool,
    /// The missing or recycled identity the walk stopped at, if it stopped short of the root.
    /// Reusing that identity makes this chain stale.
    pub terminated_at: Option<Obj>,
    pub computed_at: SystemTime,
}

impl ParentChain {
    pub fn new(ancestors: Vec<Obj>, cyclic: bool) -> Self {
        Self {
            ancestors,
            cyclic,
            terminated_at: None,
            computed_at: SystemTime::now(),
        }
    }

    pub fn terminated_at(mut self, obj: Obj) -> Self {
        self.terminated_at = Some(obj);
        self
    }

    pub fn contains(&self, obj: Obj) -> bool {
        self.ancestors.contains(&obj)
    }

    /// Whether a change to `obj` could alter this chain.
    pub fn depends_on(&self, obj: Obj) -> bool {
        self.terminated_at == Some(obj) || self.contains(obj)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub objects: usize,
    pub methods: usize,
    pub chains: usize,
    pub invalidations: u64,
    pub preloads: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, or 0 if there were none.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

struct Inner<O, M> {
    objects: FastMap<Obj, O>,
    methods: FastMap<Obj, FastMap<String, M>>,
    chains: FastMap<Obj, ParentChain>,
}

/// Per-process cache of loaded objects (`O`), compiled methods (`M`) keyed by the defining object
/// and method name, and materialised parent chains.
///
/// Nothing is ever evicted on a timer or for size; entries leave only through `invalidate`, which
/// is driven by the change feed.
pub struct ObjectCache<O, M> {
    inner: Mutex<Inner<O, M>>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    preloads: AtomicU64,
}

impl<O: Clone, M: Clone> Default for ObjectCache<O, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Clone, M: Clone> ObjectCache<O, M> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                objects: FastMap::default(),
                methods: FastMap::default(),
                chains: FastMap::default(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            preloads: AtomicU64::new(0),
        }
    }

    fn record<T>(&self, found: Option<T>) -> Option<T> {
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn get_object(&self, id: Obj) -> Option<O> {
        let found = self.inner.lock().unwrap().objects.get(&id).cloned();
        self.record(found)
    }

    pub fn has_object(&self, id: Obj) -> bool {
        self.inner.lock().unwrap().objects.contains_key(&id)
    }

    pub fn set_object(&self, id: Obj, object: O) {
        self.inner.lock().unwrap().objects.insert(id, object);
    }

    pub fn get_compiled_method(&self, id: Obj, name: &str) -> Option<M> {
        let found = self
            .inner
            .lock()
            .unwrap()
            .methods
            .get(&id)
            .and_then(|methods| methods.get(name))
            .cloned();
        self.record(found)
    }

    pub fn set_compiled_method(&self, id: Obj, name: &str, method: M) {
        self.inner
            .lock()
            .unwrap()
            .methods
            .entry(id)
            .or_default()
            .insert(name.to_string(), method);
    }

    pub fn remove_compiled_method(&self, id: Obj, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(methods) = inner.methods.get_mut(&id) {
            methods.remove(name);
            if methods.is_empty() {
                inner.methods.remove(&id);
            }
        }
    }

    pub fn get_parent_chain(&self, id: Obj) -> Option<ParentChain> {
        let found = self.inner.lock().unwrap().chains.get(&id).cloned();
        self.record(found)
    }

    pub fn set_parent_chain(&self, id: Obj, chain: ParentChain) {
        self.inner.lock().unwrap().chains.insert(id, chain);
    }

    /// Bulk-fill objects, e.g. the whole live population at startup.
    pub fn preload<I: IntoIterator<Item = (Obj, O)>>(&self, objects: I) {
        let mut inner = self.inner.lock().unwrap();
        let mut count = 0;
        for (id, object) in objects {
            inner.objects.insert(id, object);
            count += 1;
        }
        self.preloads.fetch_add(count, Ordering::Relaxed);
    }

    /// Drop everything cached about `id`: the object, its compiled methods, its parent chain, and
    /// every other chain that passes through it or stopped at it.
    pub fn invalidate(&self, id: Obj) {
        let mut inner = self.inner.lock().unwrap();
        inner.objects.remove(&id);
        inner.methods.remove(&id);
        inner.chains.remove(&id);
        inner.chains.retain(|_, chain| !chain.depends_on(id));
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        debug!(?id, "Invalidated cache entries");
    }

    pub fn invalidate_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.objects.clear();
        inner.methods.clear();
        inner.chains.clear();
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        debug!("Flushed object cache");
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            objects: inner.objects.len(),
            methods: inner.methods.values().map(|methods| methods.len()).sum(),
            chains: inner.chains.len(),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            preloads: self.preloads.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestCache = ObjectCache<String, u32>;

    fn o(id: i64) -> Obj {
        Obj::mk_id(id)
    }

    #[test]
    fn test_hit_rate_with_no_accesses_is_zero() {
        let cache = TestCache::new();
        assert_eq!(cache.stats().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_arithmetic() {
        let cache = TestCache::new();
        cache.set_object(o(1), "one".into());
        for _ in 0..3 {
            assert!(cache.get_object(o(1)).is_some());
        }
        for _ in 0..2 {
            assert!(cache.get_object(o(2)).is_none());
        }
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (3, 2));
        assert!((stats.hit_rate() - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalidate_cascades_through_chains() {
        let cache = TestCache::new();
        // #10 -> #5 -> #1 and #20 -> #1, with #5 being invalidated.
        for id in [1, 5, 10, 20] {
            cache.set_object(o(id), format!("#{id}"));
        }
        cache.set_compiled_method(o(5), "greet", 1);
        cache.set_compiled_method(o(5), "look", 2);
        cache.set_compiled_method(o(10), "greet", 3);
        cache.set_parent_chain(o(5), ParentChain::new(vec![o(1)], false));
        cache.set_parent_chain(o(10), ParentChain::new(vec![o(5), o(1)], false));
        cache.set_parent_chain(o(20), ParentChain::new(vec![o(1)], false));

        cache.invalidate(o(5));

        assert!(!cache.has_object(o(5)));
        assert!(cache.has_object(o(10)));
        assert!(cache.get_compiled_method(o(5), "greet").is_none());
        assert!(cache.get_compiled_method(o(5), "look").is_none());
        assert_eq!(cache.get_compiled_method(o(10), "greet"), Some(3));
        assert!(cache.get_parent_chain(o(5)).is_none());
        assert!(cache.get_parent_chain(o(10)).is_none());
        assert!(cache.get_parent_chain(o(20)).is_some());

        let stats = cache.stats();
        assert_eq!(stats.invalidations, 1);
        assert_eq!((stats.objects, stats.methods, stats.chains), (3, 1, 1));
    }

    #[test]
    fn test_invalidate_drops_chains_that_stopped_at_it() {
        let cache = TestCache::new();
        // #3 -> #2 -> (recycled #1); #2 -> (recycled #1); #4 -> #2 -> #7.
        cache.set_parent_chain(o(3), ParentChain::new(vec![o(2)], false).terminated_at(o(1)));
        cache.set_parent_chain(o(2), ParentChain::new(vec![], false).terminated_at(o(1)));
        cache.set_parent_chain(o(4), ParentChain::new(vec![o(2), o(7)], false));

        cache.invalidate(o(1));

        assert!(cache.get_parent_chain(o(3)).is_none());
        assert!(cache.get_parent_chain(o(2)).is_none());
        assert!(cache.get_parent_chain(o(4)).is_some());
    }

    #[test]
    fn test_compiled_methods_by_object_and_name() {
        let cache = TestCache::new();
        cache.set_compiled_method(o(1), "look", 1);
        cache.set_compiled_method(o(1), "greet", 2);
        cache.set_compiled_method(o(2), "look", 3);
        assert_eq!(cache.get_compiled_method(o(1), "greet"), Some(2));
        assert_eq!(cache.get_compiled_method(o(2), "look"), Some(3));
        assert_eq!(cache.get_compiled_method(o(2), "greet"), None);

        cache.remove_compiled_method(o(1), "look");
        cache.remove_compiled_method(o(2), "look");
        assert_eq!(cache.get_compiled_method(o(1), "look"), None);
        assert_eq!(cache.get_compiled_method(o(1), "greet"), Some(2));
        assert_eq!(cache.stats().methods, 1);
    }

    #[test]
    fn test_preload_counts() {
        let cache = TestCache::new();
        cache.preload((0..4).map(|i| (o(i), i.to_string())));
        let stats = cache.stats();
        assert_eq!(stats.preloads, 4);
        assert_eq!(stats.objects, 4);
        // Preloading is not a lookup.
        assert_eq!(stats.hits + stats.misses, 0);
    }

    #[test]
    fn test_invalidate_all() {
        let cache = TestCache::new();
        cache.set_object(o(1), "x".into());
        cache.set_compiled_method(o(1), "m", 1);
        cache.invalidate_all();
        let stats = cache.stats();
        assert_eq!((stats.objects, stats.methods, stats.chains), (0, 0, 0));
    }
}
