//! Mach-Zehnder interferometer assembled from a splitter, a combiner and two
//! bend/straight arms.
//!
//! ```text
//!                __Lx__
//!               |      |
//!               Ly     Lyr
//!               |      |
//!     splitter==|      |==combiner
//!               |      |
//!               Ly     Lyr
//!               |      |
//!               | delta_length/2
//!               |      |
//!               |__Lx__|
//! ```
//!
//! `Lyr = length_y + (dl - dr) / 2`, where `dl` and `dr` are the arm-port
//! separations of the splitter and the combiner.

use std::sync::Arc;

use crate::factory::Library;
use crate::geom::{Layer, Tolerance, angle_approx_eq};
use crate::layout::{
    Component, LayoutError, PortClassifier, PortName, RefId, Reference, classify_and_rename,
};
use crate::params;
use crate::params::{FactoryRef, ParamValue, Params, Settings};

use super::{Registration, port};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryKind {
    Mzi,
}

pub const REGISTRATIONS: &[Registration<FactoryKind>] = &[Registration {
    name: "mzi",
    kind: FactoryKind::Mzi,
}];

impl FactoryKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Mzi => "mzi",
        }
    }

    #[must_use]
    pub fn defaults(self) -> Params {
        params! {
            "delta_length" => 10.0,
            "length_y" => 0.1,
            "length_x" => 0.1,
            "bend" => "bend_circular",
            "straight" => "straight",
            "straight_vertical" => ParamValue::Null,
            "straight_delta_length" => ParamValue::Null,
            "straight_horizontal_top" => ParamValue::Null,
            "straight_horizontal_bot" => ParamValue::Null,
            "splitter" => "mmi2x2",
            "combiner" => ParamValue::Null,
            "with_splitter" => true,
            "splitter_settings" => Params::new(),
            "combiner_settings" => Params::new(),
            "width" => 0.5,
            "layer" => Layer::WG,
        }
    }

    pub fn build(self, settings: Settings<'_>, library: &Library) -> Result<Component, LayoutError> {
        match self {
            Self::Mzi => mzi(settings, library),
        }
    }
}

fn required_ref(settings: &Settings<'_>, key: &str) -> Result<FactoryRef, LayoutError> {
    settings.factory_ref(key)?.ok_or_else(|| {
        LayoutError::config(settings.factory(), format!("setting `{key}` needs a factory"))
    })
}

/// Highest positional port name, i.e. the far end of a leaf.
fn last_index(component: &Component) -> Result<PortName, LayoutError> {
    component
        .ports()
        .filter_map(|p| p.name.index())
        .max()
        .map(port)
        .ok_or_else(|| {
            LayoutError::config(
                component.name(),
                "component has no positional ports to connect",
            )
        })
}

/// The two arm ports of a splitter or combiner: its last two positional ports.
fn arm_ports(
    factory: &str,
    role: &str,
    component: &Component,
) -> Result<(PortName, PortName), LayoutError> {
    let count = component.port_count();
    if count < 2 {
        return Err(LayoutError::config(
            factory,
            format!("{role} `{}` needs at least two ports", component.name()),
        ));
    }
    Ok((port(count - 1), port(count)))
}

/// Fail unless the arm end meets the combiner port face to face.
fn ensure_mated(
    c: &Component,
    factory: &str,
    (end_id, end_key): (RefId, PortName),
    (target_id, target_key): (RefId, PortName),
) -> Result<(), LayoutError> {
    let end = c.reference_port(end_id, end_key)?;
    let target = c.reference_port(target_id, target_key)?;
    let tol = Tolerance::LOOSE;
    if tol.approx_eq_point2(end.center, target.center)
        && angle_approx_eq(end.orientation, target.orientation + 180.0, tol)
    {
        return Ok(());
    }
    let owner = |id: RefId| {
        c.reference(id)
            .map(|r| r.component().name().to_owned())
            .unwrap_or_default()
    };
    Err(LayoutError::Misaligned {
        component: factory.to_owned(),
        port: format!("{}:{}", owner(end_id), end.name),
        x: end.x(),
        y: end.y(),
        target: format!("{}:{}", owner(target_id), target.name),
        target_x: target.x(),
        target_y: target.y(),
    })
}

fn arm_separation(component: &Component, e1: &PortName, e0: &PortName) -> Result<f64, LayoutError> {
    Ok((component.port(e1)?.y() - component.port(e0)?.y()).abs())
}

/// Connect port `key` of `moving` onto port `anchor_key` of `anchor`.
fn link(
    c: &mut Component,
    moving: RefId,
    key: PortName,
    anchor: RefId,
    anchor_key: PortName,
) -> Result<(), LayoutError> {
    let target = c.reference_port(anchor, anchor_key)?;
    c.connect(moving, key, &target)
}

fn mzi(settings: Settings<'_>, library: &Library) -> Result<Component, LayoutError> {
    let factory = settings.factory();
    let delta_length = settings.non_negative("delta_length")?;
    let length_y = settings.f64("length_y")?;
    let length_x = settings.non_negative("length_x")?;
    let with_splitter = settings.bool("with_splitter")?;
    let layer = settings.layer("layer")?;
    let inherited = params! {
        "width" => settings.get("width")?.clone(),
        "layer" => layer,
    };
    let length = |value: f64| params! { "length" => value };

    let straight = required_ref(&settings, "straight")?;
    let or_straight = |key: &str| -> Result<FactoryRef, LayoutError> {
        Ok(settings.factory_ref(key)?.unwrap_or_else(|| straight.clone()))
    };
    let straight_vertical = or_straight("straight_vertical")?;
    let straight_delta_length = or_straight("straight_delta_length")?;
    let straight_horizontal_top = or_straight("straight_horizontal_top")?;
    let straight_horizontal_bot = or_straight("straight_horizontal_bot")?;
    let bend = required_ref(&settings, "bend")?;
    let splitter = required_ref(&settings, "splitter")?;
    let combiner = settings
        .factory_ref("combiner")?
        .unwrap_or_else(|| splitter.clone());

    let cp1 = library.get_ref(&splitter, &inherited, &settings.params_map("splitter_settings")?)?;
    let cp2 = library.get_ref(&combiner, &inherited, &settings.params_map("combiner_settings")?)?;
    let b90 = library.get_ref(&bend, &inherited, &Params::new())?;
    let l0 = library.get_ref(&straight_vertical, &inherited, &length(length_y))?;

    let (e1, e0) = arm_ports(factory, "splitter", &cp1)?;
    let (c_e1, c_e0) = arm_ports(factory, "combiner", &cp2)?;

    let dl = arm_separation(&cp1, &e1, &e0)?;
    let dr = arm_separation(&cp2, &c_e1, &c_e0)?;
    let delta_length_combiner = dl - dr;
    if delta_length_combiner + length_y <= 0.0 {
        return Err(LayoutError::config(
            factory,
            format!(
                "splitter/combiner port offset ({delta_length_combiner}) + length_y ({length_y}) must be positive"
            ),
        ));
    }

    let l0r = library.get_ref(
        &straight_vertical,
        &inherited,
        &length(length_y + delta_length_combiner / 2.0),
    )?;
    let l1 = library.get_ref(&straight_delta_length, &inherited, &length(delta_length / 2.0))?;
    let lxt = library.get_ref(&straight_horizontal_top, &inherited, &length(length_x))?;
    let lxb = library.get_ref(&straight_horizontal_bot, &inherited, &length(length_x))?;
    let top_end = last_index(&lxt)?;
    let bot_end = last_index(&lxb)?;

    log::debug!(
        "mzi: delta_length={delta_length} length_x={length_x} length_y={length_y} dl={dl} dr={dr}"
    );

    let mut c = Component::default();
    let cin = Reference::new(Arc::clone(&cp1))?;
    let cout = c.instantiate(&cp2)?;

    // top arm
    let blt = c.instantiate(&b90)?;
    let bltl = c.instantiate(&b90)?;
    let bltr = c.instantiate(&b90)?;
    let blmr = c.instantiate(&b90)?;
    let l0tl = c.instantiate(&l0)?;
    let lxtop = c.instantiate(&lxt)?;
    let l0tr = c.instantiate(&l0r)?;

    c.connect(blt, port(1), &cin.port(e1.clone())?)?;
    link(&mut c, l0tl, port(1), blt, port(2))?;
    link(&mut c, bltl, port(2), l0tl, port(2))?;
    link(&mut c, lxtop, port(1), bltl, port(1))?;
    link(&mut c, bltr, port(2), lxtop, top_end)?;
    link(&mut c, l0tr, port(1), bltr, port(1))?;
    link(&mut c, blmr, port(1), l0tr, port(2))?;
    link(&mut c, cout, c_e0, blmr, port(2))?;

    // bottom arm
    let blb = c.instantiate(&b90)?;
    let l0bl = c.instantiate(&l0)?;
    let l1l = c.instantiate(&l1)?;
    let blbl = c.instantiate(&b90)?;
    let lxbot = c.instantiate(&lxb)?;
    let brbr = c.instantiate(&b90)?;
    let l1r = c.instantiate(&l1)?;
    let l0br = c.instantiate(&l0r)?;
    let blbmrb = c.instantiate(&b90)?;

    c.connect(blb, port(2), &cin.port(e0)?)?;
    link(&mut c, l0bl, port(1), blb, port(1))?;
    link(&mut c, l1l, port(1), l0bl, port(2))?;
    link(&mut c, blbl, port(1), l1l, port(2))?;
    link(&mut c, lxbot, port(1), blbl, port(2))?;
    link(&mut c, brbr, port(1), lxbot, bot_end)?;
    link(&mut c, l1r, port(1), brbr, port(2))?;
    link(&mut c, l0br, port(1), l1r, port(2))?;
    link(&mut c, blbmrb, port(2), l0br, port(2))?;
    ensure_mated(&c, factory, (blbmrb, port(1)), (cout, c_e1))?;

    let mut classifier = PortClassifier::new(&[layer]);
    if with_splitter {
        let inputs = cin.ports();
        c.add_reference(cin)?;
        classifier.offer_inputs(inputs);
    } else {
        let top = c.reference_port(blt, port(1))?;
        let bottom = c.reference_port(blb, port(2))?;
        c.add_port(port(2), top)?;
        c.add_port(port(1), bottom)?;
    }
    classifier.offer_outputs(c.reference(cout)?.ports());
    classifier.offer_extra("DC_top", c.reference(lxtop)?.ports_excluding_layers(&[layer]));
    classifier.offer_extra("DC_bot", c.reference(lxbot)?.ports_excluding_layers(&[layer]));
    classify_and_rename(&mut c, &classifier)?;

    for (alias, id) in [
        ("blt", blt),
        ("bltl", bltl),
        ("bltr", bltr),
        ("blmr", blmr),
        ("l0tl", l0tl),
        ("lxtop", lxtop),
        ("l0tr", l0tr),
        ("blb", blb),
        ("l0bl", l0bl),
        ("l1l", l1l),
        ("blbl", blbl),
        ("lxbot", lxbot),
        ("brbr", brbr),
        ("l1r", l1r),
        ("l0br", l0br),
        ("blbmrb", blbmrb),
    ] {
        c.add_alias(alias, id)?;
    }

    c.set_info("delta_length", delta_length)?;
    c.set_info("length_x", length_x)?;
    c.set_info("length_y", length_y)?;
    c.set_info("width", settings.get("width")?.clone())?;
    c.set_info("layer", layer)?;
    Ok(c)
}
