//! Circular 90° bend.

use std::f64::consts::FRAC_PI_2;

use crate::geom::{Layer, Point2, Shape};
use crate::layout::{Component, LayoutError, Port};
use crate::params;
use crate::params::{Params, Settings};

use super::{Registration, finish_leaf};

/// Segments used to approximate the arc outline.
const ARC_SEGMENTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryKind {
    Circular,
}

pub const REGISTRATIONS: &[Registration<FactoryKind>] = &[Registration {
    name: "bend_circular",
    kind: FactoryKind::Circular,
}];

impl FactoryKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Circular => "bend_circular",
        }
    }

    #[must_use]
    pub fn defaults(self) -> Params {
        params! {
            "radius" => 10.0,
            "width" => 0.5,
            "layer" => Layer::WG,
        }
    }

    /// Left turn: enters at the origin heading east, leaves at `(r, r)`
    /// heading north.
    pub fn build(self, settings: Settings<'_>) -> Result<Component, LayoutError> {
        let radius = settings.positive("radius")?;
        let width = settings.positive("width")?;
        let layer = settings.layer("layer")?;
        if radius <= width / 2.0 {
            return Err(LayoutError::config(
                settings.factory(),
                format!("radius {radius} must exceed half the width {width}"),
            ));
        }

        let mut c = Component::default();
        c.add_shape(arc_outline(layer, radius, width))?;
        c.add_port("o1", Port::new("", Point2::ORIGIN, 180.0, width, layer))?;
        c.add_port("o2", Port::new("", Point2::new(radius, radius), 90.0, width, layer))?;
        c.set_info("radius", radius)?;
        c.set_info("length", FRAC_PI_2 * radius)?;
        c.set_info("width", width)?;
        c.set_info("layer", layer)?;
        finish_leaf(c, layer)
    }
}

/// Quarter annulus centred on `(0, radius)`, sweeping from -90° to 0°.
#[allow(clippy::cast_precision_loss)]
fn arc_outline(layer: Layer, radius: f64, width: f64) -> Shape {
    let center = Point2::new(0.0, radius);
    let at = |r: f64, step: usize| {
        let theta = -FRAC_PI_2 + FRAC_PI_2 * step as f64 / ARC_SEGMENTS as f64;
        Point2::new(center.x + r * theta.cos(), center.y + r * theta.sin())
    };
    let outer = radius + width / 2.0;
    let inner = radius - width / 2.0;
    let points = (0..=ARC_SEGMENTS)
        .map(|i| at(outer, i))
        .chain((0..=ARC_SEGMENTS).rev().map(|i| at(inner, i)))
        .collect();
    Shape::polygon(layer, points)
}
