#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod factories;
pub mod factory;
pub mod geom;
pub mod layout;
pub mod params;
pub mod simulation;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

pub use factory::{CacheStats, FactoryCache, FactoryRegistry, GeometryFactory, Library};
pub use geom::{Layer, Point2, Transform2};
pub use layout::{
    Component, ConnectOptions, ErrorKind, FlatLayout, LayoutError, Port, PortClassifier, PortName,
    RefId, Reference,
};
pub use params::{ParamValue, Params};

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {}

#[cfg(all(feature = "parallel", target_arch = "wasm32"))]
#[wasm_bindgen]
pub async fn initialize_parallel(worker_count: Option<u32>) -> Result<(), JsError> {
    let threads = worker_count
        .map(|count| count.max(1) as usize)
        .or_else(|| {
            std::thread::available_parallelism()
                .map(|value| value.get())
                .ok()
        })
        .unwrap_or(1);

    wasm_bindgen_rayon::init_thread_pool(threads)
        .await
        .map_err(|err| JsError::new(&format!("could not start the rayon thread pool: {err}")))
}

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            #[cfg(target_arch = "wasm32")]
            {
                ::web_sys::console::log_1(&::wasm_bindgen::JsValue::from_str(&format!($($t)*)));
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                println!("{}", format!($($t)*));
            }
        }
    }};
}

#[derive(Debug, Serialize)]
struct PortExport {
    name: String,
    x: f64,
    y: f64,
    orientation: f64,
    width: f64,
    layer: [u16; 2],
}

impl From<&Port> for PortExport {
    fn from(port: &Port) -> Self {
        Self {
            name: port.name.to_string(),
            x: port.x(),
            y: port.y(),
            orientation: port.orientation,
            width: port.width,
            layer: [port.layer.0, port.layer.1],
        }
    }
}

#[derive(Debug, Serialize)]
struct BuildSummary<'a> {
    name: &'a str,
    ports: usize,
    references: usize,
    cache: CacheStats,
}

/// Public entry point for consumers.
///
/// Builds go through the process-wide [`Library`], so identical requests from
/// several engines share one published component.
#[wasm_bindgen]
pub struct Engine {
    initialized: bool,
    current: Option<Arc<Component>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl Engine {
    #[wasm_bindgen(constructor)]
    #[must_use]
    pub fn new() -> Engine {
        Engine {
            initialized: true,
            current: None,
        }
    }

    /// Whether the engine went through its minimal initialization.
    #[wasm_bindgen]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Names of every registered factory.
    #[wasm_bindgen]
    pub fn factory_names(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&Library::global().factory_names()).map_err(to_js_error)
    }

    /// Build `factory` with `settings` (a plain object, or `undefined` for the
    /// defaults) and make it the current component.
    #[wasm_bindgen]
    pub fn build(&mut self, factory: &str, settings: JsValue) -> Result<JsValue, JsValue> {
        let params: Params = if settings.is_undefined() || settings.is_null() {
            Params::new()
        } else {
            serde_wasm_bindgen::from_value(settings).map_err(to_js_error)?
        };
        let component = self.build_component(factory, &params).map_err(to_js_error)?;
        let summary = BuildSummary {
            name: component.name(),
            ports: component.port_count(),
            references: component.references().len(),
            cache: Library::global().cache().stats(),
        };
        serde_wasm_bindgen::to_value(&summary).map_err(to_js_error)
    }

    /// Flattened polygons, ports and instances of the current component.
    #[wasm_bindgen]
    pub fn get_layout(&self) -> Result<JsValue, JsValue> {
        let component = self.current_component()?;
        serde_wasm_bindgen::to_value(&component.flatten()).map_err(to_js_error)
    }

    /// Ports of the current component, optionally filtered by a wildcard
    /// pattern such as `DC_*`.
    #[wasm_bindgen]
    pub fn get_ports(&self, pattern: Option<String>) -> Result<JsValue, JsValue> {
        let component = self.current_component()?;
        let ports: Vec<PortExport> = match pattern.as_deref() {
            Some(pattern) => component
                .ports_matching(pattern)
                .into_iter()
                .map(PortExport::from)
                .collect(),
            None => component.ports().map(PortExport::from).collect(),
        };
        serde_wasm_bindgen::to_value(&ports).map_err(to_js_error)
    }
}

impl Engine {
    /// Native counterpart of [`Engine::build`].
    pub fn build_component(
        &mut self,
        factory: &str,
        params: &Params,
    ) -> Result<Arc<Component>, LayoutError> {
        let component = Library::global().get(factory, params)?;
        debug_log!(
            "built `{}`: {} ports, {} references",
            component.name(),
            component.port_count(),
            component.references().len()
        );
        self.current = Some(Arc::clone(&component));
        Ok(component)
    }

    /// The most recently built component.
    #[must_use]
    pub fn current(&self) -> Option<&Arc<Component>> {
        self.current.as_ref()
    }

    fn current_component(&self) -> Result<&Arc<Component>, JsValue> {
        self.current
            .as_ref()
            .ok_or_else(|| js_error("no component has been built yet"))
    }
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
        JsValue::NULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_tracks_the_last_build() {
        let mut engine = Engine::new();
        assert!(engine.is_initialized());
        assert!(engine.current().is_none());

        let built = engine
            .build_component("straight", &params! { "length" => 3.0 })
            .unwrap();
        assert!(Arc::ptr_eq(engine.current().unwrap(), &built));
        assert_eq!(built.port_count(), 2);
    }

    #[test]
    fn unknown_factory_is_reported() {
        let mut engine = Engine::new();
        let err = engine.build_component("stright", &Params::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("straight"), "{err}");
        assert!(engine.current().is_none());
    }

    #[test]
    fn port_export_flattens_the_layer() {
        let port = Port::new("E0", Point2::new(1.0, 2.0), 0.0, 0.5, Layer::WG);
        let export = PortExport::from(&port);
        assert_eq!(export.name, "E0");
        assert_eq!(export.layer, [1, 0]);
    }
}
