//! Interface to external electromagnetic mode solvers.
//!
//! No solver lives in this crate. A solver implements [`ModeSolver`] and is
//! fed the waveguide cross-section recorded in a component's info.

use serde::Serialize;

use crate::geom::Layer;
use crate::layout::{Component, LayoutError};
use crate::params::Settings;

/// Waveguide cross-section of a component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CrossSection {
    pub width: f64,
    pub layer: Layer,
}

impl CrossSection {
    /// Read `width` and `layer` from the component's info.
    pub fn of(component: &Component) -> Result<Self, LayoutError> {
        let info = Settings::new(component.name(), component.info());
        Ok(Self {
            width: info.positive("width")?,
            layer: info.layer("layer")?,
        })
    }
}

/// A guided mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Mode {
    pub index: usize,
    /// Effective refractive index.
    pub neff: f64,
}

pub trait ModeSolver {
    /// The first `count` modes of `cross_section`, fundamental first.
    fn find_modes(&self, cross_section: &CrossSection, count: usize) -> Result<Vec<Mode>, LayoutError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::Library;
    use crate::params;

    /// Slab approximation: neff falls off linearly with mode order.
    struct Slab;

    impl ModeSolver for Slab {
        #[allow(clippy::cast_precision_loss)]
        fn find_modes(&self, cs: &CrossSection, count: usize) -> Result<Vec<Mode>, LayoutError> {
            Ok((0..count)
                .map(|index| Mode {
                    index,
                    neff: 1.44 + cs.width - 0.1 * index as f64,
                })
                .collect())
        }
    }

    #[test]
    fn cross_section_comes_from_info() {
        let library = Library::with_builtins();
        let straight = library.get("straight", &params! { "width" => 0.45 }).unwrap();
        let cs = CrossSection::of(&straight).unwrap();
        assert_eq!(cs, CrossSection { width: 0.45, layer: Layer::WG });

        let modes = Slab.find_modes(&cs, 2).unwrap();
        assert_eq!(modes.len(), 2);
        assert!(modes[0].neff > modes[1].neff);
    }

    #[test]
    fn missing_info_is_a_configuration_error() {
        let bare = crate::layout::Component::new("bare");
        let err = CrossSection::of(&bare).unwrap_err();
        assert!(err.to_string().contains("width"), "{err}");
    }
}
