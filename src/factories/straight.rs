//! Straight waveguides, with and without a heater.

use crate::geom::{Layer, Point2, Shape};
use crate::layout::{Component, LayoutError, Port};
use crate::params::{Params, Settings};
use crate::params;

use super::{Registration, finish_leaf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryKind {
    Straight,
    StraightHeater,
}

pub const REGISTRATIONS: &[Registration<FactoryKind>] = &[
    Registration {
        name: "straight",
        kind: FactoryKind::Straight,
    },
    Registration {
        name: "straight_heater",
        kind: FactoryKind::StraightHeater,
    },
];

impl FactoryKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Straight => "straight",
            Self::StraightHeater => "straight_heater",
        }
    }

    #[must_use]
    pub fn defaults(self) -> Params {
        let mut defaults = params! {
            "length" => 10.0,
            "width" => 0.5,
            "layer" => Layer::WG,
        };
        if self == Self::StraightHeater {
            defaults.insert("heater_width".to_owned(), 2.5.into());
        }
        defaults
    }

    pub fn build(self, settings: Settings<'_>) -> Result<Component, LayoutError> {
        let length = settings.non_negative("length")?;
        let width = settings.positive("width")?;
        let layer = settings.layer("layer")?;

        let mut c = Component::default();
        c.add_shape(Shape::rectangle(
            layer,
            Point2::new(0.0, -width / 2.0),
            Point2::new(length, width / 2.0),
        ))?;
        c.add_port("o1", Port::new("", Point2::ORIGIN, 180.0, width, layer))?;
        c.add_port("o2", Port::new("", Point2::new(length, 0.0), 0.0, width, layer))?;

        if self == Self::StraightHeater {
            let heater_width = settings.positive("heater_width")?;
            c.add_shape(Shape::rectangle(
                Layer::HEATER,
                Point2::new(0.0, -heater_width / 2.0),
                Point2::new(length, heater_width / 2.0),
            ))?;
            c.add_port("e1", Port::new("", Point2::ORIGIN, 180.0, heater_width, Layer::M3))?;
            c.add_port(
                "e2",
                Port::new("", Point2::new(length, 0.0), 0.0, heater_width, Layer::M3),
            )?;
            c.set_info("heater_width", heater_width)?;
        }

        c.set_info("length", length)?;
        c.set_info("width", width)?;
        c.set_info("layer", layer)?;
        finish_leaf(c, layer)
    }
}
