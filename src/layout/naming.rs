//! Deterministic port naming.
//!
//! Names derive from geometry only: two components with the same ports end up
//! with the same name-to-port mapping whatever order the ports or references
//! were created in.

use std::cmp::Ordering;

use crate::geom::{Layer, Tolerance};

use super::LayoutError;
use super::component::Component;
use super::port::{Facing, Port, PortName};

/// Coordinates are compared on a 1e-9 grid so float noise from different
/// construction orders cannot flip an ordering.
fn snap(value: f64) -> f64 {
    let snapped = (value / Tolerance::DEFAULT.eps).round();
    if snapped == 0.0 { 0.0 } else { snapped }
}

fn cmp_keys(a: &[f64], b: &[f64]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| snap(*x).total_cmp(&snap(*y)))
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Side rank and sort keys: west ports south to north, south ports east to
/// west, east ports north to south, north ports west to east, then anything
/// non-Manhattan by angle.
fn positional_key(port: &Port) -> (u8, [f64; 3]) {
    match port.facing() {
        Some(Facing::West) => (0, [port.y(), port.x(), 0.0]),
        Some(Facing::South) => (1, [-port.x(), port.y(), 0.0]),
        Some(Facing::East) => (2, [-port.y(), port.x(), 0.0]),
        Some(Facing::North) => (3, [port.x(), port.y(), 0.0]),
        None => (4, [port.orientation, port.x(), port.y()]),
    }
}

pub(crate) fn positional_order(a: &Port, b: &Port) -> Ordering {
    let (rank_a, keys_a) = positional_key(a);
    let (rank_b, keys_b) = positional_key(b);
    rank_a.cmp(&rank_b).then_with(|| cmp_keys(&keys_a, &keys_b))
}

/// Order along the axis perpendicular to `facing`.
fn perpendicular_order(facing: Facing) -> impl Fn(&Port, &Port) -> Ordering {
    move |a, b| match facing {
        Facing::West | Facing::East => cmp_keys(&[a.y(), a.x()], &[b.y(), b.x()]),
        Facing::South | Facing::North => cmp_keys(&[a.x(), a.y()], &[b.x(), b.y()]),
    }
}

/// Fail if two ports would be indistinguishable once renamed.
fn ensure_distinct<F>(component: &str, ports: &[Port], name_of: F) -> Result<(), LayoutError>
where
    F: Fn(usize) -> String,
{
    for (i, a) in ports.iter().enumerate() {
        if let Some(b) = ports[i + 1..]
            .iter()
            .find(|b| a.coincides_with(b, Tolerance::DEFAULT))
        {
            return Err(LayoutError::AmbiguousPortName {
                component: component.to_owned(),
                name: name_of(i),
                first: a.name.to_string(),
                second: b.name.to_string(),
            });
        }
    }
    Ok(())
}

/// Renumber the ports on `layers` as `1..=n` in positional order. Ports on
/// other layers keep their names.
pub fn auto_rename_ports(component: &mut Component, layers: &[Layer]) -> Result<(), LayoutError> {
    let (mut renamed, kept): (Vec<Port>, Vec<Port>) = component
        .ports()
        .cloned()
        .partition(|port| layers.contains(&port.layer));
    renamed.sort_by(positional_order);
    ensure_distinct(component.name(), &renamed, |i| (i + 1).to_string())?;

    let renamed = renamed
        .into_iter()
        .enumerate()
        .map(|(i, port)| port.renamed(i + 1));
    component.replace_ports(renamed.chain(kept))
}

/// Collects candidate ports for an assembled component and decides its final
/// port surface.
///
/// Inputs become `1..=n` and outputs `E0..E{n-1}`, both ordered by position
/// along the axis perpendicular to the port direction. Extra groups keep only
/// non-optical ports, named `<prefix>_<k>` in positional order.
#[derive(Debug, Clone)]
pub struct PortClassifier {
    input_side: Facing,
    output_side: Facing,
    output_prefix: String,
    optical_layers: Vec<Layer>,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
    extras: Vec<(String, Vec<Port>)>,
}

impl PortClassifier {
    /// West-facing inputs and east-facing outputs on `optical_layers`.
    #[must_use]
    pub fn new(optical_layers: &[Layer]) -> Self {
        Self {
            input_side: Facing::West,
            output_side: Facing::East,
            output_prefix: "E".to_owned(),
            optical_layers: optical_layers.to_vec(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            extras: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_sides(mut self, inputs: Facing, outputs: Facing) -> Self {
        self.input_side = inputs;
        self.output_side = outputs;
        self
    }

    #[must_use]
    pub fn with_output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = prefix.into();
        self
    }

    fn is_optical(&self, port: &Port) -> bool {
        self.optical_layers.contains(&port.layer)
    }

    fn faces(port: &Port, side: Facing) -> bool {
        port.facing() == Some(side)
    }

    /// Offer ports as inputs; those not facing the input side are ignored.
    pub fn offer_inputs<I: IntoIterator<Item = Port>>(&mut self, ports: I) {
        let side = self.input_side;
        let accepted: Vec<Port> = ports
            .into_iter()
            .filter(|port| self.is_optical(port) && Self::faces(port, side))
            .collect();
        self.inputs.extend(accepted);
    }

    /// Offer ports as outputs; those not facing the output side are ignored.
    pub fn offer_outputs<I: IntoIterator<Item = Port>>(&mut self, ports: I) {
        let side = self.output_side;
        let accepted: Vec<Port> = ports
            .into_iter()
            .filter(|port| self.is_optical(port) && Self::faces(port, side))
            .collect();
        self.outputs.extend(accepted);
    }

    /// Re-export the non-optical ports among `ports` under `prefix`.
    pub fn offer_extra<I: IntoIterator<Item = Port>>(&mut self, prefix: impl Into<String>, ports: I) {
        let accepted: Vec<Port> = ports
            .into_iter()
            .filter(|port| !self.is_optical(port))
            .collect();
        if !accepted.is_empty() {
            self.extras.push((prefix.into(), accepted));
        }
    }

    /// Final port list for `component`: offered candidates plus the ports it
    /// already carries, classified by side. Everything else is dropped.
    pub fn classify(&self, component: &Component) -> Result<Vec<Port>, LayoutError> {
        let mut inputs = self.inputs.clone();
        let mut outputs = self.outputs.clone();
        for port in component.ports().filter(|port| self.is_optical(port)) {
            if Self::faces(port, self.input_side) {
                inputs.push(port.clone());
            } else if Self::faces(port, self.output_side) {
                outputs.push(port.clone());
            }
        }

        inputs.sort_by(perpendicular_order(self.input_side));
        outputs.sort_by(perpendicular_order(self.output_side));
        ensure_distinct(component.name(), &inputs, |i| (i + 1).to_string())?;
        ensure_distinct(component.name(), &outputs, |i| format!("{}{i}", self.output_prefix))?;

        let mut result: Vec<Port> = Vec::new();
        result.extend(
            inputs
                .into_iter()
                .enumerate()
                .map(|(i, port)| port.renamed(i + 1)),
        );
        result.extend(
            outputs
                .into_iter()
                .enumerate()
                .map(|(i, port)| port.renamed(format!("{}{i}", self.output_prefix))),
        );
        for (prefix, ports) in &self.extras {
            let mut ports = ports.clone();
            ports.sort_by(positional_order);
            ensure_distinct(component.name(), &ports, |k| format!("{prefix}_{}", k + 1))?;
            result.extend(
                ports
                    .into_iter()
                    .enumerate()
                    .map(|(k, port)| port.renamed(PortName::Label(format!("{prefix}_{}", k + 1)))),
            );
        }
        Ok(result)
    }
}

/// Replace `component`'s ports with the classifier's verdict.
pub fn classify_and_rename(
    component: &mut Component,
    classifier: &PortClassifier,
) -> Result<(), LayoutError> {
    let ports = classifier.classify(component)?;
    log::debug!(
        "`{}` exposes {} ports: {}",
        component.name(),
        ports.len(),
        ports
            .iter()
            .map(|port| port.name.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    component.replace_ports(ports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point2;
    use crate::layout::ErrorKind;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;

    fn wg(name: &str, x: f64, y: f64, angle: f64) -> Port {
        Port::new(name, Point2::new(x, y), angle, 0.5, Layer::WG)
    }

    fn mapping(component: &Component) -> Vec<(String, f64, f64, f64)> {
        component
            .ports()
            .map(|p| (p.name.to_string(), p.x(), p.y(), p.orientation))
            .collect()
    }

    fn four_port_ports() -> Vec<Port> {
        vec![
            wg("a", -10.0, -0.625, 180.0),
            wg("b", -10.0, 0.625, 180.0),
            wg("c", 15.5, 0.625, 0.0),
            wg("d", 15.5, -0.625, 0.0),
            wg("e", 3.0, 4.0, 90.0),
            wg("f", 3.0, -4.0, 270.0),
        ]
    }

    #[test]
    fn auto_rename_walks_sides_counter_clockwise() {
        let mut c = Component::new("mmi");
        for port in four_port_ports() {
            let name = port.name.clone();
            c.add_port(name, port).unwrap();
        }
        auto_rename_ports(&mut c, &[Layer::WG]).unwrap();
        let names: Vec<(String, f64, f64)> = mapping(&c).into_iter().map(|(n, x, y, _)| (n, x, y)).collect();
        assert_eq!(
            names,
            vec![
                ("1".to_owned(), -10.0, -0.625),
                ("2".to_owned(), -10.0, 0.625),
                ("3".to_owned(), 3.0, -4.0),
                ("4".to_owned(), 15.5, 0.625),
                ("5".to_owned(), 15.5, -0.625),
                ("6".to_owned(), 3.0, 4.0),
            ]
        );
    }

    #[test]
    fn auto_rename_is_independent_of_insertion_order() {
        let mut expected = None;
        for seed in 0..16 {
            let mut ports = four_port_ports();
            ports.shuffle(&mut StdRng::seed_from_u64(seed));
            let mut c = Component::new("mmi");
            for port in ports {
                let name = port.name.clone();
                c.add_port(name, port).unwrap();
            }
            auto_rename_ports(&mut c, &[Layer::WG]).unwrap();
            let got = mapping(&c);
            match &expected {
                None => expected = Some(got),
                Some(first) => assert_eq!(first, &got, "seed {seed}"),
            }
        }
    }

    #[test]
    fn auto_rename_leaves_other_layers_alone() {
        let mut c = Component::new("heater");
        c.add_port("o1", wg("", 0.0, 0.0, 180.0)).unwrap();
        c.add_port("e1", Port::new("", Point2::ORIGIN, 180.0, 2.5, Layer::M3))
            .unwrap();
        auto_rename_ports(&mut c, &[Layer::WG]).unwrap();
        assert!(c.has_port(&PortName::Index(1)));
        assert!(c.has_port(&PortName::from("e1")));
    }

    #[test]
    fn coincident_ports_cannot_be_renamed() {
        let mut c = Component::new("twin");
        c.add_port("a", wg("", 0.0, 0.0, 180.0)).unwrap();
        c.add_port("b", wg("", 0.0, 0.0, 180.0)).unwrap();
        let err = auto_rename_ports(&mut c, &[Layer::WG]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NamingCollision);
        assert!(c.has_port(&PortName::from("a")), "failed rename leaves ports untouched");
    }

    #[test]
    fn classifier_names_inputs_outputs_and_extras() {
        let mut c = Component::new("assembly");
        let mut classifier = PortClassifier::new(&[Layer::WG]);
        classifier.offer_inputs(vec![
            wg("x", 0.0, 1.0, 180.0),
            wg("y", 0.0, -1.0, 180.0),
            wg("z", 5.0, 0.0, 0.0),
        ]);
        classifier.offer_outputs(vec![wg("p", 20.0, -1.0, 0.0), wg("q", 20.0, 1.0, 0.0)]);
        classifier.offer_extra(
            "DC_top",
            vec![
                wg("o1", 8.0, 3.0, 180.0),
                Port::new("e2", Point2::new(9.0, 3.0), 0.0, 2.5, Layer::M3),
                Port::new("e1", Point2::new(8.0, 3.0), 180.0, 2.5, Layer::M3),
            ],
        );
        classify_and_rename(&mut c, &classifier).unwrap();

        let names: Vec<String> = c.ports().map(|p| p.name.to_string()).collect();
        assert_eq!(names, vec!["1", "2", "DC_top_1", "DC_top_2", "E0", "E1"]);
        assert_eq!(c.port(1_usize).unwrap().y(), -1.0);
        assert_eq!(c.port("E0").unwrap().y(), -1.0);
        assert_eq!(c.port("DC_top_1").unwrap().x(), 8.0);
        assert_eq!(c.port("DC_top_2").unwrap().x(), 9.0);
    }

    #[test]
    fn classifier_picks_up_explicit_ports() {
        let mut c = Component::new("bare");
        c.add_port(2_usize, wg("", 0.0, 3.0, 180.0)).unwrap();
        c.add_port(1_usize, wg("", 0.0, 5.0, 180.0)).unwrap();
        c.add_port("side", wg("", 1.0, 6.0, 90.0)).unwrap();
        let classifier = PortClassifier::new(&[Layer::WG]);
        classify_and_rename(&mut c, &classifier).unwrap();
        assert_eq!(c.port_count(), 2);
        assert_eq!(c.port(1_usize).unwrap().y(), 3.0);
        assert_eq!(c.port(2_usize).unwrap().y(), 5.0);
    }

    #[test]
    fn explicit_metal_ports_are_not_optical_inputs() {
        let mut c = Component::new("pads");
        c.add_port(1_usize, wg("", 0.0, 0.0, 180.0)).unwrap();
        c.add_port("pad", Port::new("", Point2::new(0.0, 8.0), 180.0, 10.0, Layer::M3))
            .unwrap();
        let classifier = PortClassifier::new(&[Layer::WG]);
        classify_and_rename(&mut c, &classifier).unwrap();
        assert_eq!(c.port_count(), 1);
        assert_eq!(c.port(1_usize).unwrap().layer, Layer::WG);
    }

    #[test]
    fn classifier_rejects_coincident_candidates() {
        let mut c = Component::new("clash");
        let mut classifier = PortClassifier::new(&[Layer::WG]);
        classifier.offer_outputs(vec![wg("p", 1.0, 0.0, 0.0), wg("q", 1.0, 0.0, 0.0)]);
        let err = classify_and_rename(&mut c, &classifier).unwrap_err();
        assert!(matches!(err, LayoutError::AmbiguousPortName { ref name, .. } if name == "E0"));
    }
}
