//! Layer tags and the opaque polygons contributed by geometry factories.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::core::{BBox2, Point2, Transform2};

/// Process layer as a `(layer, datatype)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Layer(pub u16, pub u16);

impl Layer {
    /// Waveguide core.
    pub const WG: Self = Self(1, 0);
    /// Resistive heater.
    pub const HEATER: Self = Self(47, 0);
    /// Routing metal carrying the electrical ports.
    pub const M3: Self = Self(49, 0);
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// A closed polygon on a single layer.
///
/// The engine never interprets the outline; it only moves it around.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub layer: Layer,
    pub points: Vec<Point2>,
}

impl Shape {
    #[must_use]
    pub fn polygon(layer: Layer, points: Vec<Point2>) -> Self {
        Self { layer, points }
    }

    /// Axis-aligned rectangle spanning two opposite corners.
    #[must_use]
    pub fn rectangle(layer: Layer, a: Point2, b: Point2) -> Self {
        let (x0, x1) = (a.x.min(b.x), a.x.max(b.x));
        let (y0, y1) = (a.y.min(b.y), a.y.max(b.y));
        Self::polygon(
            layer,
            vec![
                Point2::new(x0, y0),
                Point2::new(x1, y0),
                Point2::new(x1, y1),
                Point2::new(x0, y1),
            ],
        )
    }

    #[must_use]
    pub fn transformed(&self, transform: Transform2) -> Self {
        Self {
            layer: self.layer,
            points: self
                .points
                .iter()
                .map(|p| transform.apply_point(*p))
                .collect(),
        }
    }

    #[must_use]
    pub fn bbox(&self) -> Option<BBox2> {
        BBox2::from_points(self.points.iter().copied())
    }
}
