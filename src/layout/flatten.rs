//! World-coordinate view of a component hierarchy, for export and display.

use serde::Serialize;

use crate::geom::{BBox2, Layer, Point2, Shape, Transform2};

use super::component::Component;
use super::port::Port;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatPolygon {
    pub layer: Layer,
    pub points: Vec<[f64; 2]>,
}

/// One placed instance, addressed by the reference indices leading to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatInstance {
    pub path: Vec<usize>,
    pub component: String,
    pub transform: Transform2,
}

/// Everything an exporter needs, resolved to the top-level frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatLayout {
    pub name: String,
    pub polygons: Vec<FlatPolygon>,
    pub ports: Vec<Port>,
    pub instances: Vec<FlatInstance>,
}

impl Component {
    /// Resolve every polygon of the hierarchy into this component's frame.
    ///
    /// Instances are listed depth first; only this component's own ports are
    /// exported.
    #[must_use]
    pub fn flatten(&self) -> FlatLayout {
        let mut layout = FlatLayout {
            name: self.name().to_owned(),
            polygons: Vec::new(),
            ports: self.ports().cloned().collect(),
            instances: Vec::new(),
        };
        let mut path = Vec::new();
        collect(self, Transform2::identity(), &mut path, &mut layout);
        layout
    }

    /// Bounds of all geometry in the hierarchy, or `None` if it has none.
    #[must_use]
    pub fn bbox(&self) -> Option<BBox2> {
        let own = self.shapes().iter().filter_map(Shape::bbox);
        let children = self.references().iter().filter_map(|reference| {
            let child = reference.component().bbox()?;
            let t = reference.transform();
            let corners = [
                child.min,
                child.max,
                Point2::new(child.min.x, child.max.y),
                Point2::new(child.max.x, child.min.y),
            ];
            BBox2::from_points(corners.into_iter().map(|p| t.apply_point(p)))
        });
        own.chain(children).reduce(BBox2::union)
    }
}

fn collect(component: &Component, transform: Transform2, path: &mut Vec<usize>, out: &mut FlatLayout) {
    out.polygons.extend(component.shapes().iter().map(|shape| FlatPolygon {
        layer: shape.layer,
        points: shape
            .points
            .iter()
            .map(|p| transform.apply_point(*p).to_array())
            .collect(),
    }));

    for (index, reference) in component.references().iter().enumerate() {
        let world = transform.compose(reference.transform());
        path.push(index);
        out.instances.push(FlatInstance {
            path: path.clone(),
            component: reference.component().name().to_owned(),
            transform: world,
        });
        collect(reference.component(), world, path, out);
        path.pop();
    }
}
