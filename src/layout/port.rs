//! Oriented connection points.

use std::fmt;

use serde::Serialize;

use crate::geom::{Layer, Point2, Tolerance, Transform2, Vec2, angle_approx_eq, normalize_angle};

use super::LayoutError;

/// Name of a port: either a positional index or a free-form label.
///
/// Both forms are interchangeable: a label made of decimal digits only is
/// stored as an index, so `PortName::from("2") == PortName::from(2_usize)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum PortName {
    Index(usize),
    Label(String),
}

/// Key used to look up a port on a component or reference.
pub type PortKey = PortName;

impl PortName {
    #[must_use]
    pub fn new(name: &str) -> Self {
        let trimmed = name.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = trimmed.parse::<usize>() {
                return Self::Index(index);
            }
        }
        Self::Label(name.to_owned())
    }

    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Label(_) => None,
        }
    }
}

impl fmt::Display for PortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

impl From<usize> for PortName {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

impl From<&str> for PortName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PortName {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&PortName> for PortName {
    fn from(value: &PortName) -> Self {
        value.clone()
    }
}

/// Manhattan side a port faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Facing {
    West,
    South,
    East,
    North,
}

impl Facing {
    /// All sides in the order used by positional renaming.
    pub const ALL: [Self; 4] = [Self::West, Self::South, Self::East, Self::North];

    #[must_use]
    pub const fn angle(self) -> f64 {
        match self {
            Self::East => 0.0,
            Self::North => 90.0,
            Self::West => 180.0,
            Self::South => 270.0,
        }
    }

    /// Side for an orientation, or `None` for non-Manhattan angles.
    #[must_use]
    pub fn from_angle(angle: f64, tol: Tolerance) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|facing| angle_approx_eq(angle, facing.angle(), tol))
    }
}

/// An oriented connection point in its owner's local frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Port {
    pub name: PortName,
    pub center: Point2,
    /// Degrees, normalized to `[0, 360)`.
    pub orientation: f64,
    pub width: f64,
    pub layer: Layer,
}

impl Port {
    #[must_use]
    pub fn new<N: Into<PortName>>(
        name: N,
        center: Point2,
        orientation: f64,
        width: f64,
        layer: Layer,
    ) -> Self {
        Self {
            name: name.into(),
            center,
            orientation: normalize_angle(orientation),
            width,
            layer,
        }
    }

    #[must_use]
    pub fn x(&self) -> f64 {
        self.center.x
    }

    #[must_use]
    pub fn y(&self) -> f64 {
        self.center.y
    }

    #[must_use]
    pub fn facing(&self) -> Option<Facing> {
        Facing::from_angle(self.orientation, Tolerance::ANGLE)
    }

    /// Unit vector pointing out of the port.
    #[must_use]
    pub fn direction(&self) -> Vec2 {
        Vec2::from_angle(self.orientation)
    }

    #[must_use]
    pub fn renamed<N: Into<PortName>>(&self, name: N) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// The same port expressed in the frame `transform` maps into.
    #[must_use]
    pub fn transformed(&self, transform: Transform2) -> Self {
        Self {
            name: self.name.clone(),
            center: transform.apply_point(self.center),
            orientation: transform.apply_angle(self.orientation),
            width: self.width,
            layer: self.layer,
        }
    }

    /// Two ports sit on top of each other facing the same way.
    #[must_use]
    pub fn coincides_with(&self, other: &Self, tol: Tolerance) -> bool {
        self.layer == other.layer
            && tol.approx_eq_point2(self.center, other.center)
            && angle_approx_eq(self.orientation, other.orientation, tol)
    }

    pub(crate) fn validate(&self) -> Result<(), LayoutError> {
        let reason = if !self.center.is_finite() {
            Some(format!("center ({}, {}) is not finite", self.center.x, self.center.y))
        } else if !self.orientation.is_finite() {
            Some(format!("orientation {} is not finite", self.orientation))
        } else if !(self.width.is_finite() && self.width > 0.0) {
            Some(format!("width {} must be positive", self.width))
        } else {
            None
        };

        match reason {
            Some(reason) => Err(LayoutError::InvalidPort {
                name: self.name.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_labels_are_indices() {
        assert_eq!(PortName::from("2"), PortName::Index(2));
        assert_eq!(PortName::from(2_usize), PortName::from("2"));
        assert_eq!(PortName::from("E0"), PortName::Label("E0".to_owned()));
        assert_eq!(PortName::Index(7).to_string(), "7");
        assert_eq!(PortName::from("o1").index(), None);
    }

    #[test]
    fn indices_sort_before_labels() {
        let mut names = vec![
            PortName::from("E0"),
            PortName::from(10_usize),
            PortName::from(2_usize),
        ];
        names.sort();
        assert_eq!(
            names,
            vec![PortName::Index(2), PortName::Index(10), PortName::from("E0")]
        );
    }

    #[test]
    fn orientation_is_normalized() {
        let port = Port::new("a", Point2::ORIGIN, -90.0, 0.5, Layer::WG);
        assert_eq!(port.orientation, 270.0);
        assert_eq!(port.facing(), Some(Facing::South));
        let skew = Port::new("b", Point2::ORIGIN, 45.0, 0.5, Layer::WG);
        assert_eq!(skew.facing(), None);
    }

    #[test]
    fn transformed_port_rotates_orientation() {
        let port = Port::new(1_usize, Point2::new(1.0, 0.0), 0.0, 0.5, Layer::WG);
        let moved = port.transformed(Transform2::rotate(90.0));
        assert_eq!(moved.center, Point2::new(0.0, 1.0));
        assert_eq!(moved.orientation, 90.0);
        assert_eq!(moved.name, port.name);
    }

    #[test]
    fn invalid_width_is_rejected() {
        let port = Port::new("bad", Point2::ORIGIN, 0.0, 0.0, Layer::WG);
        assert!(matches!(
            port.validate(),
            Err(LayoutError::InvalidPort { ref name, .. }) if name == "bad"
        ));
    }
}
