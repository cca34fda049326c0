//! Solver that mates one port onto another.
//!
//! Ports connect face to face: after placement the moved port sits on the
//! target's center and points exactly opposite to it. The placement is always
//! derived from the port's current world position, so repeated connects never
//! accumulate drift and connecting twice to the same target is a no-op.

use crate::geom::{Tolerance, Transform2, normalize_angle};

use super::LayoutError;
use super::port::Port;

/// Knobs for [`placement`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectOptions {
    /// Reflect the moving instance across the connecting port's axis before
    /// rotating it into place.
    pub mirror: bool,
    /// Accept ports of different widths.
    pub allow_width_mismatch: bool,
    pub tolerance: Tolerance,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            mirror: false,
            allow_width_mismatch: false,
            tolerance: Tolerance::DEFAULT,
        }
    }
}

impl ConnectOptions {
    #[must_use]
    pub fn mirrored() -> Self {
        Self {
            mirror: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn allowing_width_mismatch() -> Self {
        Self {
            allow_width_mismatch: true,
            ..Self::default()
        }
    }
}

/// Transform that, composed on top of an instance's current placement,
/// moves `port` (already in world coordinates) onto `target`.
pub fn placement(
    port: &Port,
    target: &Port,
    options: ConnectOptions,
) -> Result<Transform2, LayoutError> {
    if !options.allow_width_mismatch && !options.tolerance.approx_eq_f64(port.width, target.width)
    {
        return Err(LayoutError::WidthMismatch {
            port: port.name.to_string(),
            width: port.width,
            target: target.name.to_string(),
            target_width: target.width,
        });
    }
    if port.layer != target.layer {
        log::warn!(
            "connecting port `{}` on layer {} to `{}` on layer {}",
            port.name,
            port.layer,
            target.name,
            target.layer
        );
    }

    let reflect = if options.mirror {
        Transform2::mirror_about_axis(port.center, port.orientation)
    } else {
        Transform2::identity()
    };

    let rotation = normalize_angle(target.orientation - port.orientation + 180.0);
    let rotate = Transform2::rotate_about(port.center, rotation);
    let shift = Transform2::translate(target.center - port.center);

    Ok(shift.compose(rotate).compose(reflect))
}
