//! Content-addressed cache of published components.
//!
//! Every factory invocation goes through here, so the same factory called
//! with the same normalized settings always yields the very same
//! `Arc<Component>`.
//!
//! # Features
//! - Keys are `(factory id, canonical settings)`; numeric noise is normalized away
//! - Single flight: concurrent requests for one key run the factory once
//! - Failed builds leave nothing behind, so a retry calls the factory again
//! - A factory id is bound to one settings schema for the cache's lifetime
//! - Hit/miss/failure statistics for diagnostics
//!
//! # Example
//! ```ignore
//! let cache = FactoryCache::new();
//! let straight = cache.get_or_build("straight", schema, &params, |p| build_straight(p))?;
//! let stats = cache.stats();
//! println!("entries: {}, hits: {}", stats.entries, stats.hits);
//! ```

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::layout::{Component, LayoutError};
use crate::params::{CacheKey, Params, normalize_params};

/// Per-key build lock. Holding it for the whole build is what makes
/// concurrent requests for the same key wait for a single build.
type BuildLock = Mutex<()>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fingerprint of a factory's settings schema (its set of setting names).
#[must_use]
pub fn schema_signature(defaults: &Params) -> u64 {
    let mut hasher = DefaultHasher::new();
    for key in defaults.keys() {
        key.hash(&mut hasher);
    }
    hasher.finish()
}

/// Cache statistics for diagnostics and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    /// Number of published components held.
    pub entries: usize,
    /// Requests answered from the cache.
    pub hits: usize,
    /// Requests that ran a factory.
    pub misses: usize,
    /// Factory runs that returned an error.
    pub failures: usize,
}

impl CacheStats {
    /// Returns the hit rate as a value between 0.0 and 1.0.
    /// Returns 0.0 if the cache has not been used.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Process-wide store of published components. Entries are never evicted.
#[derive(Debug, Default)]
pub struct FactoryCache {
    published: Mutex<HashMap<CacheKey, Arc<Component>>>,
    building: Mutex<HashMap<CacheKey, Arc<BuildLock>>>,
    schemas: Mutex<HashMap<String, u64>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    failures: AtomicUsize,
}

impl FactoryCache {
    /// Creates a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: lock(&self.published).len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// Whether a published component is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        lock(&self.published).contains_key(key)
    }

    /// Drops every entry and schema binding and resets the counters.
    ///
    /// Components already handed out stay valid; they are just no longer
    /// shared with future requests.
    pub fn clear(&self) {
        lock(&self.published).clear();
        lock(&self.building).clear();
        lock(&self.schemas).clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
    }

    fn bind_schema(&self, factory: &str, schema: u64) -> Result<(), LayoutError> {
        let mut schemas = lock(&self.schemas);
        match schemas.get(factory) {
            Some(bound) if *bound != schema => Err(LayoutError::CacheKeyCollision {
                factory: factory.to_owned(),
            }),
            Some(_) => Ok(()),
            None => {
                schemas.insert(factory.to_owned(), schema);
                Ok(())
            }
        }
    }

    /// Return the component cached for `(factory, params)`, or run `build`
    /// with the normalized settings, publish the result and cache it.
    ///
    /// A component built without a name is named after its cache key. `build`
    /// may request other keys from this cache, but never its own.
    pub fn get_or_build<F>(
        &self,
        factory: &str,
        schema: u64,
        params: &Params,
        build: F,
    ) -> Result<Arc<Component>, LayoutError>
    where
        F: FnOnce(&Params) -> Result<Component, LayoutError>,
    {
        self.bind_schema(factory, schema)?;
        let params = normalize_params(factory, params)?;
        let key = CacheKey::new(factory, &params);

        if let Some(component) = self.lookup(&key) {
            return Ok(component);
        }

        let build_lock = Arc::clone(lock(&self.building).entry(key.clone()).or_default());
        let _building = lock(&*build_lock);
        // Another requester may have finished this key while we waited.
        if let Some(component) = self.lookup(&key) {
            return Ok(component);
        }

        let outcome = self.build_and_publish(&key, &params, build);
        lock(&self.building).remove(&key);
        outcome
    }

    fn build_and_publish<F>(
        &self,
        key: &CacheKey,
        params: &Params,
        build: F,
    ) -> Result<Arc<Component>, LayoutError>
    where
        F: FnOnce(&Params) -> Result<Component, LayoutError>,
    {
        self.misses.fetch_add(1, Ordering::Relaxed);
        log::debug!("cache miss {key}: building");
        let mut component = match build(params) {
            Ok(component) => component,
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                log::debug!("building {key} failed: {err}");
                return Err(err);
            }
        };
        if component.name().is_empty() {
            component.set_name(key.cell_name())?;
        }
        component.lock();
        let component = Arc::new(component);
        lock(&self.published).insert(key.clone(), Arc::clone(&component));
        Ok(component)
    }

    fn lookup(&self, key: &CacheKey) -> Option<Arc<Component>> {
        let component = lock(&self.published).get(key).cloned()?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        log::trace!("cache hit {key}");
        Some(component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ErrorKind;
    use crate::params;

    fn schema() -> u64 {
        schema_signature(&params! { "length" => 10.0 })
    }

    fn build_ok(_: &Params) -> Result<Component, LayoutError> {
        Ok(Component::default())
    }

    #[test]
    fn same_settings_share_one_instance() {
        let cache = FactoryCache::new();
        let a = cache
            .get_or_build("straight", schema(), &params! { "length" => 10.0 }, build_ok)
            .unwrap();
        let b = cache
            .get_or_build("straight", schema(), &params! { "length" => 10_i64 }, build_ok)
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.is_locked());
        assert!(a.name().starts_with("straight_"));

        let stats = cache.stats();
        assert_eq!((stats.entries, stats.hits, stats.misses), (1, 1, 1));
        assert!((stats.hit_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn distinct_settings_build_distinct_instances() {
        let cache = FactoryCache::new();
        let a = cache
            .get_or_build("straight", schema(), &params! { "length" => 10.0 }, build_ok)
            .unwrap();
        let b = cache
            .get_or_build("straight", schema(), &params! { "length" => 11.0 }, build_ok)
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.name(), b.name());
        assert_eq!(cache.stats().entries, 2);
    }

    #[test]
    fn huge_settings_build_distinct_instances() {
        let cache = FactoryCache::new();
        let seen = Mutex::new(Vec::new());
        let record = |params: &Params| {
            lock(&seen).push(params["length"].as_f64());
            build_ok(params)
        };
        let a = cache
            .get_or_build("straight", schema(), &params! { "length" => 1e300 }, record)
            .unwrap();
        let b = cache
            .get_or_build("straight", schema(), &params! { "length" => 2e300 }, record)
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(*lock(&seen), vec![Some(1e300), Some(2e300)]);
    }

    #[test]
    fn failed_builds_are_not_cached() {
        let cache = FactoryCache::new();
        let params = params! { "length" => -1.0 };
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            let err = cache
                .get_or_build("straight", schema(), &params, |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(LayoutError::config("straight", "length must not be negative"))
                })
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(lock(&cache.building).is_empty());
        assert!(!cache.contains(&CacheKey::new("straight", &normalize_params("straight", &params).unwrap())));

        let stats = cache.stats();
        assert_eq!((stats.entries, stats.failures), (0, 2));
        assert!(cache.get_or_build("straight", schema(), &params, build_ok).is_ok());
    }

    #[test]
    fn schema_change_under_one_id_collides() {
        let cache = FactoryCache::new();
        cache
            .get_or_build("straight", schema(), &Params::new(), build_ok)
            .unwrap();
        let other = schema_signature(&params! { "radius" => 10.0 });
        let err = cache
            .get_or_build("straight", other, &Params::new(), build_ok)
            .unwrap_err();
        assert!(matches!(err, LayoutError::CacheKeyCollision { ref factory } if factory == "straight"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn explicit_names_are_kept() {
        let cache = FactoryCache::new();
        let named = cache
            .get_or_build("custom", schema(), &Params::new(), |_| Ok(Component::new("my_cell")))
            .unwrap();
        assert_eq!(named.name(), "my_cell");
    }

    #[test]
    fn concurrent_requests_build_once() {
        let cache = FactoryCache::new();
        let builds = AtomicUsize::new(0);
        let results: Vec<Arc<Component>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        cache
                            .get_or_build("straight", schema(), &params! { "length" => 3.0 }, |_| {
                                builds.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(std::time::Duration::from_millis(20));
                                Ok(Component::default())
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|c| Arc::ptr_eq(c, &results[0])));
        assert_eq!(cache.stats().hits, 7);
    }

    #[test]
    fn clear_forgets_entries() {
        let cache = FactoryCache::new();
        let a = cache
            .get_or_build("straight", schema(), &Params::new(), build_ok)
            .unwrap();
        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
        let b = cache
            .get_or_build("straight", schema(), &Params::new(), build_ok)
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
