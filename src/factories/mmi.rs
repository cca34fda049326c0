//! Multimode interference couplers: 1x2 splitter and 2x2 coupler.
//!
//! The body spans `x ∈ [0, length_mmi]`; every access waveguide is a linear
//! taper of `length_taper` from `width` at the port to `width_taper` at the
//! body. Ports on one side sit at `±(gap_mmi + width_taper) / 2`.

use crate::geom::{Layer, Point2, Shape};
use crate::layout::{Component, LayoutError, Port};
use crate::params;
use crate::params::{Params, Settings};

use super::{Registration, finish_leaf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryKind {
    Mmi1x2,
    Mmi2x2,
}

pub const REGISTRATIONS: &[Registration<FactoryKind>] = &[
    Registration {
        name: "mmi1x2",
        kind: FactoryKind::Mmi1x2,
    },
    Registration {
        name: "mmi2x2",
        kind: FactoryKind::Mmi2x2,
    },
];

struct Dimensions {
    width: f64,
    width_taper: f64,
    length_taper: f64,
    length_mmi: f64,
    width_mmi: f64,
    gap_mmi: f64,
}

impl Dimensions {
    fn read(settings: &Settings<'_>) -> Result<Self, LayoutError> {
        let dims = Self {
            width: settings.positive("width")?,
            width_taper: settings.positive("width_taper")?,
            length_taper: settings.positive("length_taper")?,
            length_mmi: settings.positive("length_mmi")?,
            width_mmi: settings.positive("width_mmi")?,
            gap_mmi: settings.non_negative("gap_mmi")?,
        };
        if 2.0 * dims.width_taper + dims.gap_mmi > dims.width_mmi {
            return Err(LayoutError::config(
                settings.factory(),
                format!(
                    "two tapers of width {} with gap {} do not fit in width_mmi {}",
                    dims.width_taper, dims.gap_mmi, dims.width_mmi
                ),
            ));
        }
        Ok(dims)
    }

    fn port_offset(&self) -> f64 {
        (self.gap_mmi + self.width_taper) / 2.0
    }

    /// Taper polygon from the port at `x_port` to the body edge at `x_body`.
    fn taper(&self, layer: Layer, x_port: f64, x_body: f64, y: f64) -> Shape {
        Shape::polygon(
            layer,
            vec![
                Point2::new(x_port, y - self.width / 2.0),
                Point2::new(x_body, y - self.width_taper / 2.0),
                Point2::new(x_body, y + self.width_taper / 2.0),
                Point2::new(x_port, y + self.width / 2.0),
            ],
        )
    }
}

impl FactoryKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Mmi1x2 => "mmi1x2",
            Self::Mmi2x2 => "mmi2x2",
        }
    }

    #[must_use]
    pub fn defaults(self) -> Params {
        params! {
            "width" => 0.5,
            "width_taper" => 1.0,
            "length_taper" => 10.0,
            "length_mmi" => 5.5,
            "width_mmi" => 2.5,
            "gap_mmi" => 0.25,
            "layer" => Layer::WG,
        }
    }

    pub fn build(self, settings: Settings<'_>) -> Result<Component, LayoutError> {
        let dims = Dimensions::read(&settings)?;
        let layer = settings.layer("layer")?;
        let offset = dims.port_offset();
        let west_ys = match self {
            Self::Mmi1x2 => vec![0.0],
            Self::Mmi2x2 => vec![-offset, offset],
        };
        let east_ys = [-offset, offset];
        let x_west = -dims.length_taper;
        let x_east = dims.length_mmi + dims.length_taper;

        let mut c = Component::default();
        c.add_shape(Shape::rectangle(
            layer,
            Point2::new(0.0, -dims.width_mmi / 2.0),
            Point2::new(dims.length_mmi, dims.width_mmi / 2.0),
        ))?;
        for (i, &y) in west_ys.iter().enumerate() {
            c.add_shape(dims.taper(layer, x_west, 0.0, y))?;
            c.add_port(
                format!("w{i}"),
                Port::new("", Point2::new(x_west, y), 180.0, dims.width, layer),
            )?;
        }
        for (i, &y) in east_ys.iter().enumerate() {
            c.add_shape(dims.taper(layer, x_east, dims.length_mmi, y))?;
            c.add_port(
                format!("e{i}"),
                Port::new("", Point2::new(x_east, y), 0.0, dims.width, layer),
            )?;
        }

        c.set_info("width", dims.width)?;
        c.set_info("layer", layer)?;
        finish_leaf(c, layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factories::port;

    fn build(kind: FactoryKind, overrides: Params) -> Result<Component, LayoutError> {
        let mut params = kind.defaults();
        params.extend(overrides);
        kind.build(Settings::new(kind.name(), &params))
    }

    fn placement(c: &Component, index: usize) -> (f64, f64, f64) {
        let p = c.port(port(index)).unwrap();
        (p.x(), p.y(), p.orientation)
    }

    #[test]
    fn mmi2x2_ports_are_numbered_counter_clockwise() {
        let c = build(FactoryKind::Mmi2x2, Params::new()).unwrap();
        assert_eq!(c.port_count(), 4);
        assert_eq!(placement(&c, 1), (-10.0, -0.625, 180.0));
        assert_eq!(placement(&c, 2), (-10.0, 0.625, 180.0));
        assert_eq!(placement(&c, 3), (15.5, 0.625, 0.0));
        assert_eq!(placement(&c, 4), (15.5, -0.625, 0.0));
    }

    #[test]
    fn mmi1x2_has_one_input() {
        let c = build(FactoryKind::Mmi1x2, Params::new()).unwrap();
        assert_eq!(c.port_count(), 3);
        assert_eq!(placement(&c, 1), (-10.0, 0.0, 180.0));
        assert_eq!(placement(&c, 2), (15.5, 0.625, 0.0));
        assert_eq!(placement(&c, 3), (15.5, -0.625, 0.0));
    }

    #[test]
    fn gap_moves_the_arm_ports() {
        let c = build(FactoryKind::Mmi2x2, params! { "gap_mmi" => 0.45 }).unwrap();
        assert!(crate::geom::Tolerance::DEFAULT.approx_eq_f64(placement(&c, 3).1, 0.725));
    }

    #[test]
    fn oversized_tapers_are_rejected() {
        let err = build(FactoryKind::Mmi2x2, params! { "width_taper" => 2.0 }).unwrap_err();
        assert!(err.to_string().contains("width_mmi"), "{err}");
    }
}
