//! Factory settings: dynamically typed values, canonical cache keys and typed
//! accessors.

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt::{self, Write as _};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::geom::Layer;
use crate::layout::LayoutError;

/// Settings map. Keys are kept sorted so iteration order is canonical.
pub type Params = BTreeMap<String, ParamValue>;

/// A single setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ParamValue>),
    Map(Params),
}

/// Above 2^53 every `f64` is already integral.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;
/// 2^63: integral floats below this magnitude convert to `i64` exactly.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
const FLOAT_QUANTUM: f64 = 1e9;

impl ParamValue {
    /// Variant name, used in error messages.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) | Self::Float(_) => ValueKind::Number,
            Self::Text(_) => ValueKind::Text,
            Self::List(_) => ValueKind::List,
            Self::Map(_) => ValueKind::Map,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&Params> {
        match self {
            Self::Map(value) => Some(value),
            _ => None,
        }
    }

    /// Canonical form: integral floats within `i64` range become integers,
    /// `-0.0` becomes `0`, other floats are rounded to 1e-9. Floats too large
    /// for a 1e-9 grid are kept as given. Non-finite numbers are rejected.
    #[allow(clippy::cast_possible_truncation)]
    fn normalized(&self, path: &str) -> Result<Self, String> {
        Ok(match self {
            Self::Float(value) => {
                if !value.is_finite() {
                    return Err(format!("setting `{path}` is not a finite number ({value})"));
                }
                let rounded = if value.abs() * FLOAT_QUANTUM < MAX_EXACT_INT {
                    (value * FLOAT_QUANTUM).round() / FLOAT_QUANTUM
                } else {
                    *value
                };
                if rounded.fract() == 0.0 && rounded.abs() < I64_BOUND {
                    Self::Int(rounded as i64)
                } else {
                    Self::Float(rounded)
                }
            }
            Self::List(items) => Self::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| item.normalized(&format!("{path}[{i}]")))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Map(map) => Self::Map(normalize_map(map, &format!("{path}."))?),
            other => other.clone(),
        })
    }

    fn write_canonical(&self, out: &mut String) {
        match self {
            Self::Null => out.push_str("null"),
            Self::Bool(value) => {
                let _ = write!(out, "{value}");
            }
            Self::Int(value) => {
                let _ = write!(out, "{value}");
            }
            Self::Float(value) => {
                let _ = write!(out, "{value:?}");
            }
            Self::Text(value) => {
                let _ = write!(out, "{value:?}");
            }
            Self::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out);
                }
                out.push(']');
            }
            Self::Map(map) => write_map(map, out),
        }
    }
}

fn normalize_map(map: &Params, prefix: &str) -> Result<Params, String> {
    map.iter()
        .map(|(key, value)| {
            value
                .normalized(&format!("{prefix}{key}"))
                .map(|value| (key.clone(), value))
        })
        .collect()
}

fn write_map(map: &Params, out: &mut String) {
    out.push('{');
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{key:?}:");
        value.write_canonical(out);
    }
    out.push('}');
}

/// Describes the kind of a [`ParamValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    Text,
    List,
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::Text => "text",
            Self::List => "list",
            Self::Map => "map",
        };
        f.write_str(name)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<ParamValue>> for ParamValue {
    fn from(value: Vec<ParamValue>) -> Self {
        Self::List(value)
    }
}

impl From<Params> for ParamValue {
    fn from(value: Params) -> Self {
        Self::Map(value)
    }
}

impl From<Layer> for ParamValue {
    fn from(layer: Layer) -> Self {
        Self::List(vec![
            Self::Int(i64::from(layer.0)),
            Self::Int(i64::from(layer.1)),
        ])
    }
}

/// Build a [`Params`] map from `key => value` pairs.
#[macro_export]
macro_rules! params {
    () => { $crate::params::Params::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::params::Params::new();
        $( map.insert(::std::string::String::from($key), $crate::params::ParamValue::from($value)); )+
        map
    }};
}

/// Canonicalize every value of `params`; see [`ParamValue`] for the rules.
pub fn normalize_params(factory: &str, params: &Params) -> Result<Params, LayoutError> {
    normalize_map(params, "").map_err(|message| LayoutError::config(factory, message))
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache keys
// ─────────────────────────────────────────────────────────────────────────────

/// Identity of a built component: factory id plus canonical settings text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    factory: String,
    canonical: String,
}

impl CacheKey {
    /// Key for already normalized `params`.
    #[must_use]
    pub fn new(factory: &str, params: &Params) -> Self {
        let mut canonical = String::new();
        write_map(params, &mut canonical);
        Self {
            factory: factory.to_owned(),
            canonical,
        }
    }

    #[must_use]
    pub fn factory(&self) -> &str {
        &self.factory
    }

    #[must_use]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Stable cell name `<factory>_<8 hex digits>`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn cell_name(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.canonical.hash(&mut hasher);
        format!("{}_{:08x}", self.factory, hasher.finish() as u32)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.factory, self.canonical)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Typed access
// ─────────────────────────────────────────────────────────────────────────────

/// A sub-generator named in settings, with optional setting overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct FactoryRef {
    pub name: String,
    pub settings: Params,
}

impl FactoryRef {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: Params::new(),
        }
    }
}

/// Read-only view of a factory's merged settings with typed accessors.
///
/// Every failure is a configuration error naming the factory and the key.
#[derive(Debug, Clone, Copy)]
pub struct Settings<'a> {
    factory: &'a str,
    params: &'a Params,
}

impl<'a> Settings<'a> {
    #[must_use]
    pub fn new(factory: &'a str, params: &'a Params) -> Self {
        Self { factory, params }
    }

    #[must_use]
    pub fn factory(&self) -> &'a str {
        self.factory
    }

    #[must_use]
    pub fn params(&self) -> &'a Params {
        self.params
    }

    fn error(&self, message: impl Into<String>) -> LayoutError {
        LayoutError::config(self.factory, message)
    }

    fn mismatch(&self, key: &str, expected: &str, found: &ParamValue) -> LayoutError {
        self.error(format!(
            "setting `{key}` expects {expected}, got {}",
            found.kind()
        ))
    }

    pub fn get(&self, key: &str) -> Result<&'a ParamValue, LayoutError> {
        self.params
            .get(key)
            .ok_or_else(|| self.error(format!("missing setting `{key}`")))
    }

    pub fn f64(&self, key: &str) -> Result<f64, LayoutError> {
        let value = self.get(key)?;
        value
            .as_f64()
            .ok_or_else(|| self.mismatch(key, "a number", value))
    }

    /// A number that must be strictly positive.
    pub fn positive(&self, key: &str) -> Result<f64, LayoutError> {
        let value = self.f64(key)?;
        if value > 0.0 {
            Ok(value)
        } else {
            Err(self.error(format!("setting `{key}` must be positive, got {value}")))
        }
    }

    /// A number that must not be negative.
    pub fn non_negative(&self, key: &str) -> Result<f64, LayoutError> {
        let value = self.f64(key)?;
        if value >= 0.0 {
            Ok(value)
        } else {
            Err(self.error(format!("setting `{key}` must not be negative, got {value}")))
        }
    }

    pub fn bool(&self, key: &str) -> Result<bool, LayoutError> {
        let value = self.get(key)?;
        value
            .as_bool()
            .ok_or_else(|| self.mismatch(key, "a bool", value))
    }

    /// A layer written as `[layer, datatype]`.
    pub fn layer(&self, key: &str) -> Result<Layer, LayoutError> {
        let value = self.get(key)?;
        let pair = match value {
            ParamValue::List(items) if items.len() == 2 => items,
            other => return Err(self.mismatch(key, "a [layer, datatype] pair", other)),
        };
        let part = |item: &ParamValue| match item {
            ParamValue::Int(v) => u16::try_from(*v).ok(),
            _ => None,
        };
        match (part(&pair[0]), part(&pair[1])) {
            (Some(layer), Some(datatype)) => Ok(Layer(layer, datatype)),
            _ => Err(self.error(format!(
                "setting `{key}` must hold two integers in 0..=65535"
            ))),
        }
    }

    /// A nested settings map; `null` reads as empty.
    pub fn params_map(&self, key: &str) -> Result<Params, LayoutError> {
        match self.get(key)? {
            ParamValue::Null => Ok(Params::new()),
            ParamValue::Map(map) => Ok(map.clone()),
            other => Err(self.mismatch(key, "a settings map", other)),
        }
    }

    /// A sub-generator given as a factory name or as
    /// `{ "component": name, "settings": {...} }`; `null` reads as `None`.
    pub fn factory_ref(&self, key: &str) -> Result<Option<FactoryRef>, LayoutError> {
        match self.get(key)? {
            ParamValue::Null => Ok(None),
            ParamValue::Text(name) => Ok(Some(FactoryRef::named(name.clone()))),
            ParamValue::Map(map) => {
                let name = map
                    .get("component")
                    .and_then(ParamValue::as_str)
                    .ok_or_else(|| {
                        self.error(format!("setting `{key}` needs a `component` name"))
                    })?;
                let settings = match map.get("settings") {
                    None | Some(ParamValue::Null) => Params::new(),
                    Some(ParamValue::Map(settings)) => settings.clone(),
                    Some(other) => {
                        return Err(self.mismatch(&format!("{key}.settings"), "a settings map", other));
                    }
                };
                Ok(Some(FactoryRef {
                    name: name.to_owned(),
                    settings,
                }))
            }
            other => Err(self.mismatch(key, "a factory name", other)),
        }
    }
}
