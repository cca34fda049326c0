//! Built-in geometry factories.

use std::sync::Arc;

use crate::factory::{FactoryRegistry, GeometryFactory, Library};
use crate::geom::Layer;
use crate::layout::{Component, LayoutError, PortName, auto_rename_ports};
use crate::params::{Params, Settings};

pub mod bend;
pub mod mmi;
pub mod mzi;
pub mod straight;

/// Metadata for entries in the factory registry.
#[derive(Debug, Clone, Copy)]
pub struct Registration<T> {
    pub name: &'static str,
    pub kind: T,
}

/// Every built-in factory.
#[derive(Debug, Clone, Copy)]
pub enum FactoryKind {
    Straight(straight::FactoryKind),
    Bend(bend::FactoryKind),
    Mmi(mmi::FactoryKind),
    Mzi(mzi::FactoryKind),
}

impl GeometryFactory for FactoryKind {
    fn name(&self) -> &str {
        match self {
            Self::Straight(kind) => kind.name(),
            Self::Bend(kind) => kind.name(),
            Self::Mmi(kind) => kind.name(),
            Self::Mzi(kind) => kind.name(),
        }
    }

    fn defaults(&self) -> Params {
        match self {
            Self::Straight(kind) => kind.defaults(),
            Self::Bend(kind) => kind.defaults(),
            Self::Mmi(kind) => kind.defaults(),
            Self::Mzi(kind) => kind.defaults(),
        }
    }

    fn build(&self, settings: Settings<'_>, library: &Library) -> Result<Component, LayoutError> {
        match self {
            Self::Straight(kind) => kind.build(settings),
            Self::Bend(kind) => kind.build(settings),
            Self::Mmi(kind) => kind.build(settings),
            Self::Mzi(kind) => kind.build(settings, library),
        }
    }
}

/// Add every built-in factory to `registry`.
pub fn register_builtins(registry: &mut FactoryRegistry) {
    let kinds = straight::REGISTRATIONS
        .iter()
        .map(|r| FactoryKind::Straight(r.kind))
        .chain(bend::REGISTRATIONS.iter().map(|r| FactoryKind::Bend(r.kind)))
        .chain(mmi::REGISTRATIONS.iter().map(|r| FactoryKind::Mmi(r.kind)))
        .chain(mzi::REGISTRATIONS.iter().map(|r| FactoryKind::Mzi(r.kind)));

    for kind in kinds {
        if let Err(err) = registry.register(Arc::new(kind)) {
            log::warn!("skipping built-in factory: {err}");
        }
    }
}

/// Positional port name.
pub(crate) const fn port(index: usize) -> PortName {
    PortName::Index(index)
}

/// Number optical ports positionally, the convention every leaf follows.
pub(crate) fn finish_leaf(mut component: Component, layer: Layer) -> Result<Component, LayoutError> {
    auto_rename_ports(&mut component, &[layer])?;
    Ok(component)
}
