//! Geometry factories, their registry and the library that builds through the
//! cache.

pub mod cache;

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::layout::{Component, LayoutError, closest_match};
use crate::params::{FactoryRef, Params, Settings};

pub use cache::{CacheStats, FactoryCache, schema_signature};

/// A pure generator `settings -> Component`.
///
/// `defaults` lists every accepted setting with its default value; the
/// settings handed to `build` are those defaults overlaid with the caller's
/// values and normalized. Sub-components are requested from `library`.
pub trait GeometryFactory: Send + Sync {
    fn name(&self) -> &str;
    fn defaults(&self) -> Params;
    fn build(&self, settings: Settings<'_>, library: &Library) -> Result<Component, LayoutError>;
}

/// Factories by name.
#[derive(Default)]
pub struct FactoryRegistry {
    by_name: BTreeMap<String, Arc<dyn GeometryFactory>>,
}

impl std::fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("names", &self.by_name.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FactoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under its name. Registering the same factory twice
    /// is a no-op; a different factory under a taken name is an error.
    pub fn register(&mut self, factory: Arc<dyn GeometryFactory>) -> Result<(), LayoutError> {
        let name = factory.name().to_owned();
        if let Some(existing) = self.by_name.get(&name) {
            if std::ptr::addr_eq(Arc::as_ptr(existing), Arc::as_ptr(&factory)) {
                return Ok(());
            }
            return Err(LayoutError::config(
                name,
                "a different factory is already registered under this name",
            ));
        }
        self.by_name.insert(name, factory);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn GeometryFactory>, LayoutError> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| LayoutError::FactoryNotFound {
                name: name.to_owned(),
                suggestion: closest_match(name, self.by_name.keys().map(String::as_str)),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

/// Registry plus cache: the entry point for building components.
#[derive(Debug, Default)]
pub struct Library {
    registry: RwLock<FactoryRegistry>,
    cache: FactoryCache,
}

impl Library {
    /// An empty library without any factories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A library holding the built-in factories.
    #[must_use]
    pub fn with_builtins() -> Self {
        let library = Self::new();
        {
            let mut registry = library
                .registry
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            crate::factories::register_builtins(&mut registry);
        }
        library
    }

    /// Process-wide library with the built-in factories.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<Library> = OnceLock::new();
        GLOBAL.get_or_init(Self::with_builtins)
    }

    #[must_use]
    pub fn cache(&self) -> &FactoryCache {
        &self.cache
    }

    pub fn register(&self, factory: Arc<dyn GeometryFactory>) -> Result<(), LayoutError> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(factory)
    }

    pub fn factory(&self, name: &str) -> Result<Arc<dyn GeometryFactory>, LayoutError> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
    }

    #[must_use]
    pub fn factory_names(&self) -> Vec<String> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .names()
            .map(str::to_owned)
            .collect()
    }

    /// Build (or fetch) `name` with `params` overlaid on the factory defaults.
    ///
    /// Settings the factory does not know are rejected.
    pub fn get(&self, name: &str, params: &Params) -> Result<Arc<Component>, LayoutError> {
        let factory = self.factory(name)?;
        let defaults = factory.defaults();
        if let Some(unknown) = params.keys().find(|key| !defaults.contains_key(*key)) {
            let hint = closest_match(unknown, defaults.keys().map(String::as_str))
                .map(|s| format!(" (did you mean `{s}`?)"))
                .unwrap_or_default();
            return Err(LayoutError::config(
                factory.name(),
                format!("unknown setting `{unknown}`{hint}"),
            ));
        }

        let schema = schema_signature(&defaults);
        let mut merged = defaults;
        merged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.cache
            .get_or_build(factory.name(), schema, &merged, |settings| {
                factory.build(Settings::new(factory.name(), settings), self)
            })
    }

    /// Build a sub-generator named in settings.
    ///
    /// `inherited` values (for example the parent's `width` and `layer`) apply
    /// only where the factory accepts them and are overridden by the
    /// reference's own settings, which are overridden by `overrides`.
    pub fn get_ref(
        &self,
        factory: &FactoryRef,
        inherited: &Params,
        overrides: &Params,
    ) -> Result<Arc<Component>, LayoutError> {
        let defaults = self.factory(&factory.name)?.defaults();
        let mut params: Params = inherited
            .iter()
            .filter(|(key, _)| defaults.contains_key(*key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        params.extend(factory.settings.clone());
        params.extend(overrides.clone());
        self.get(&factory.name, &params)
    }

    /// Warm the cache with several requests, in parallel when the `parallel`
    /// feature is on. Results come back in request order.
    #[must_use]
    pub fn prebuild(&self, requests: &[(String, Params)]) -> Vec<Result<Arc<Component>, LayoutError>> {
        let build = |(name, params): &(String, Params)| self.get(name, params);
        #[cfg(feature = "parallel")]
        let results = {
            use rayon::prelude::*;
            requests.par_iter().map(build).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let results = requests.iter().map(build).collect();
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Layer, Point2};
    use crate::layout::{ErrorKind, Port};
    use crate::params;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Stub {
        calls: AtomicUsize,
    }

    impl GeometryFactory for Stub {
        fn name(&self) -> &str {
            "stub"
        }

        fn defaults(&self) -> Params {
            params! { "length" => 10.0, "width" => 0.5 }
        }

        fn build(&self, settings: Settings<'_>, _: &Library) -> Result<Component, LayoutError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let length = settings.non_negative("length")?;
            let mut c = Component::default();
            c.add_port(
                1_usize,
                Port::new("", Point2::ORIGIN, 180.0, settings.f64("width")?, Layer::WG),
            )?;
            c.set_info("length", length)?;
            Ok(c)
        }
    }

    fn library() -> (Library, Arc<Stub>) {
        let stub = Arc::new(Stub {
            calls: AtomicUsize::new(0),
        });
        let library = Library::new();
        library.register(stub.clone()).unwrap();
        (library, stub)
    }

    #[test]
    fn defaults_fill_missing_settings() {
        let (library, stub) = library();
        let a = library.get("stub", &Params::new()).unwrap();
        let b = library.get("stub", &params! { "length" => 10.0 }).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.info_f64("length"), Some(10.0));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_settings_are_rejected_with_a_hint() {
        let (library, _) = library();
        let err = library.get("stub", &params! { "lenght" => 3.0 }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("did you mean `length`"), "{err}");
    }

    #[test]
    fn unknown_factory_suggests_a_name() {
        let (library, _) = library();
        let err = library.get("stbu", &Params::new()).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::FactoryNotFound { ref suggestion, .. } if suggestion.as_deref() == Some("stub")
        ));
    }

    #[test]
    fn a_taken_name_cannot_be_reused() {
        let (library, stub) = library();
        assert!(library.register(stub).is_ok());
        let other = Arc::new(Stub {
            calls: AtomicUsize::new(0),
        });
        assert!(library.register(other).is_err());
    }

    #[test]
    fn failing_build_propagates_and_retries() {
        let (library, stub) = library();
        for _ in 0..2 {
            assert!(library.get("stub", &params! { "length" => -1.0 }).is_err());
        }
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
        assert_eq!(library.cache().stats().entries, 0);
    }

    #[test]
    fn references_inherit_only_known_settings() {
        let (library, _) = library();
        let inherited = params! { "width" => 0.8, "layer" => Layer::HEATER };
        let fref = FactoryRef {
            name: "stub".to_owned(),
            settings: params! { "length" => 2.0 },
        };
        let c = library
            .get_ref(&fref, &inherited, &params! { "length" => 4.0 })
            .unwrap();
        assert_eq!(c.info_f64("length"), Some(4.0));
        assert_eq!(c.port(1_usize).unwrap().width, 0.8);
    }

    #[test]
    fn prebuild_keeps_request_order() {
        let (library, _) = library();
        let requests = vec![
            ("stub".to_owned(), params! { "length" => 1.0 }),
            ("stub".to_owned(), params! { "length" => 2.0 }),
            ("nope".to_owned(), Params::new()),
        ];
        let results = library.prebuild(&requests);
        assert_eq!(results[0].as_ref().unwrap().info_f64("length"), Some(1.0));
        assert_eq!(results[1].as_ref().unwrap().info_f64("length"), Some(2.0));
        assert!(results[2].is_err());
    }
}
