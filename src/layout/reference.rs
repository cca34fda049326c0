//! Placed instances of published components.

use std::sync::Arc;

use crate::geom::{Layer, Shape, Transform2};

use super::LayoutError;
use super::component::Component;
use super::connect::{self, ConnectOptions};
use super::port::{Port, PortName};

/// A published [`Component`] placed under a rigid transform.
///
/// World ports and world geometry are recomputed from the transform on every
/// query; nothing absolute is stored.
#[derive(Debug, Clone)]
pub struct Reference {
    component: Arc<Component>,
    transform: Transform2,
}

impl Reference {
    /// Reference `component` under the identity transform.
    pub fn new(component: Arc<Component>) -> Result<Self, LayoutError> {
        if !component.is_locked() {
            return Err(LayoutError::Unpublished {
                component: component.name().to_owned(),
            });
        }
        Ok(Self {
            component,
            transform: Transform2::identity(),
        })
    }

    #[must_use]
    pub fn component(&self) -> &Arc<Component> {
        &self.component
    }

    #[must_use]
    pub fn transform(&self) -> Transform2 {
        self.transform
    }

    /// Compose `transform` on top of the current placement.
    pub fn apply(&mut self, transform: Transform2) {
        self.transform = transform.compose(self.transform);
    }

    /// All ports of the referenced component in the parent frame.
    #[must_use]
    pub fn ports(&self) -> Vec<Port> {
        self.component
            .ports()
            .map(|port| port.transformed(self.transform))
            .collect()
    }

    /// Ports whose layer is not in `layers`.
    #[must_use]
    pub fn ports_excluding_layers(&self, layers: &[Layer]) -> Vec<Port> {
        self.component
            .ports()
            .filter(|port| !layers.contains(&port.layer))
            .map(|port| port.transformed(self.transform))
            .collect()
    }

    pub fn port<K: Into<PortName>>(&self, key: K) -> Result<Port, LayoutError> {
        let key = key.into();
        match self.component.port(key.clone()) {
            Ok(port) => Ok(port.transformed(self.transform)),
            Err(_) => {
                let owner = format!("reference to `{}`", self.component.name());
                Err(self.component.port_not_found(&owner, key))
            }
        }
    }

    /// Geometry of the referenced component, without descendants, in the parent frame.
    #[must_use]
    pub fn shapes(&self) -> Vec<Shape> {
        self.component
            .shapes()
            .iter()
            .map(|shape| shape.transformed(self.transform))
            .collect()
    }

    pub fn connect<K: Into<PortName>>(&mut self, key: K, target: &Port) -> Result<(), LayoutError> {
        self.connect_with(key, target, ConnectOptions::default())
    }

    pub fn connect_with<K: Into<PortName>>(
        &mut self,
        key: K,
        target: &Port,
        options: ConnectOptions,
    ) -> Result<(), LayoutError> {
        let port = self.port(key)?;
        let placement = connect::placement(&port, target, options)?;
        self.apply(placement);
        log::trace!(
            "connected `{}` port `{}` to `{}` at ({:.4}, {:.4})",
            self.component.name(),
            port.name,
            target.name,
            target.center.x,
            target.center.y
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Point2, Tolerance, Vec2};

    fn straight(length: f64) -> Arc<Component> {
        let mut c = Component::new(format!("straight_{length}"));
        c.add_port(1_usize, Port::new("", Point2::ORIGIN, 180.0, 0.5, Layer::WG))
            .unwrap();
        c.add_port(
            2_usize,
            Port::new("", Point2::new(length, 0.0), 0.0, 0.5, Layer::WG),
        )
        .unwrap();
        c.add_shape(Shape::rectangle(
            Layer::WG,
            Point2::new(0.0, -0.25),
            Point2::new(length, 0.25),
        ))
        .unwrap();
        c.publish()
    }

    #[test]
    fn world_ports_follow_the_transform() {
        let mut r = Reference::new(straight(10.0)).unwrap();
        r.apply(Transform2::translate(Vec2::new(1.0, 2.0)));
        r.apply(Transform2::rotate(90.0));
        let port = r.port(2_usize).unwrap();
        assert!(Tolerance::DEFAULT.approx_eq_point2(port.center, Point2::new(-2.0, 11.0)));
        assert_eq!(port.orientation, 90.0);
        assert_eq!(r.shapes()[0].points.len(), 4);
    }

    #[test]
    fn unknown_reference_port_is_not_found() {
        let r = Reference::new(straight(5.0)).unwrap();
        let err = r.port("o3").unwrap_err();
        assert!(matches!(err, LayoutError::PortNotFound { ref owner, .. } if owner.contains("straight_5")));
    }

    #[test]
    fn layer_filter_drops_optical_ports() {
        let r = Reference::new(straight(5.0)).unwrap();
        assert!(r.ports_excluding_layers(&[Layer::WG]).is_empty());
        assert_eq!(r.ports_excluding_layers(&[Layer::M3]).len(), 2);
    }
}
