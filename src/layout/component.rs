//! Hierarchical layout container.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use wildmatch::WildMatch;

use crate::geom::{Shape, Transform2};
use crate::params::{ParamValue, Params};

use super::connect::ConnectOptions;
use super::port::{Port, PortName};
use super::reference::Reference;
use super::{LayoutError, closest_match};

/// Handle to a reference owned by a [`Component`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct RefId(pub usize);

/// Geometry, ports and child references of one layout cell.
///
/// A component is freely mutable while it is being built. Once published
/// (through [`Component::publish`] or the factory cache) it is locked and
/// every mutator fails with [`LayoutError::Locked`], including on clones of
/// the published value.
#[derive(Debug, Clone, Default)]
pub struct Component {
    name: String,
    shapes: Vec<Shape>,
    ports: BTreeMap<PortName, Port>,
    aliases: BTreeMap<String, RefId>,
    references: Vec<Reference>,
    info: Params,
    locked: bool,
}

impl Component {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), LayoutError> {
        self.ensure_unlocked("rename it")?;
        self.name = name.into();
        Ok(())
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn lock(&mut self) {
        self.locked = true;
    }

    /// Lock the component and hand out a shareable handle.
    ///
    /// For components that do not go through the factory cache.
    #[must_use]
    pub fn publish(mut self) -> Arc<Self> {
        self.lock();
        Arc::new(self)
    }

    fn ensure_unlocked(&self, action: &'static str) -> Result<(), LayoutError> {
        if self.locked {
            return Err(LayoutError::Locked {
                component: self.name.clone(),
                action,
            });
        }
        Ok(())
    }

    // ── geometry ────────────────────────────────────────────────────────────

    #[must_use]
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn add_shape(&mut self, shape: Shape) -> Result<(), LayoutError> {
        self.ensure_unlocked("add geometry")?;
        self.shapes.push(shape);
        Ok(())
    }

    // ── ports ───────────────────────────────────────────────────────────────

    /// Ports ordered by name: positional indices first, then labels.
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }

    #[must_use]
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    #[must_use]
    pub fn has_port(&self, key: &PortName) -> bool {
        self.ports.contains_key(key)
    }

    pub fn port<K: Into<PortName>>(&self, key: K) -> Result<&Port, LayoutError> {
        let key = key.into();
        self.ports
            .get(&key)
            .ok_or_else(|| self.port_not_found(&self.name, key))
    }

    pub(crate) fn port_not_found(&self, owner: &str, key: PortName) -> LayoutError {
        let names: Vec<String> = self.ports.keys().map(ToString::to_string).collect();
        LayoutError::PortNotFound {
            owner: owner.to_owned(),
            suggestion: closest_match(&key.to_string(), names.iter().map(String::as_str)),
            key,
        }
    }

    /// Ports whose name matches a wildcard pattern such as `DC_*`.
    #[must_use]
    pub fn ports_matching(&self, pattern: &str) -> Vec<&Port> {
        let matcher = WildMatch::new(pattern);
        self.ports
            .values()
            .filter(|port| matcher.matches(&port.name.to_string()))
            .collect()
    }

    /// Add a port under `name`, overriding whatever name `port` carried.
    pub fn add_port<N: Into<PortName>>(&mut self, name: N, port: Port) -> Result<(), LayoutError> {
        self.ensure_unlocked("add a port")?;
        let port = port.renamed(name);
        port.validate()?;
        match self.ports.entry(port.name.clone()) {
            Entry::Occupied(entry) => Err(LayoutError::DuplicatePort {
                component: self.name.clone(),
                name: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(port);
                Ok(())
            }
        }
    }

    /// Replace the whole port surface. Either every port is accepted or the
    /// component is left untouched.
    pub fn replace_ports<I>(&mut self, ports: I) -> Result<(), LayoutError>
    where
        I: IntoIterator<Item = Port>,
    {
        self.ensure_unlocked("replace its ports")?;
        let mut next = BTreeMap::new();
        for port in ports {
            port.validate()?;
            match next.entry(port.name.clone()) {
                Entry::Occupied(entry) => {
                    return Err(LayoutError::DuplicatePort {
                        component: self.name.clone(),
                        name: entry.key().clone(),
                    });
                }
                Entry::Vacant(entry) => {
                    entry.insert(port);
                }
            }
        }
        self.ports = next;
        Ok(())
    }

    // ── references ──────────────────────────────────────────────────────────

    /// Place `child` in this component under the identity transform.
    pub fn instantiate(&mut self, child: &Arc<Component>) -> Result<RefId, LayoutError> {
        let reference = Reference::new(Arc::clone(child))?;
        self.add_reference(reference)
    }

    /// Take ownership of an already placed reference.
    pub fn add_reference(&mut self, reference: Reference) -> Result<RefId, LayoutError> {
        self.ensure_unlocked("add a reference")?;
        let id = RefId(self.references.len());
        self.references.push(reference);
        Ok(id)
    }

    #[must_use]
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn reference(&self, id: RefId) -> Result<&Reference, LayoutError> {
        self.references
            .get(id.0)
            .ok_or_else(|| LayoutError::ReferenceNotFound {
                component: self.name.clone(),
                index: id.0,
            })
    }

    fn reference_mut(
        &mut self,
        id: RefId,
        action: &'static str,
    ) -> Result<&mut Reference, LayoutError> {
        self.ensure_unlocked(action)?;
        let component = &self.name;
        self.references
            .get_mut(id.0)
            .ok_or_else(|| LayoutError::ReferenceNotFound {
                component: component.clone(),
                index: id.0,
            })
    }

    /// World-frame port of one of this component's references.
    pub fn reference_port<K: Into<PortName>>(&self, id: RefId, key: K) -> Result<Port, LayoutError> {
        self.reference(id)?.port(key)
    }

    /// Move reference `id` so its port `key` mates `target` face to face.
    pub fn connect<K: Into<PortName>>(
        &mut self,
        id: RefId,
        key: K,
        target: &Port,
    ) -> Result<(), LayoutError> {
        self.connect_with(id, key, target, ConnectOptions::default())
    }

    pub fn connect_with<K: Into<PortName>>(
        &mut self,
        id: RefId,
        key: K,
        target: &Port,
        options: ConnectOptions,
    ) -> Result<(), LayoutError> {
        self.reference_mut(id, "move a reference")?
            .connect_with(key, target, options)
    }

    /// Apply an extra transform on top of a reference's current placement.
    pub fn transform_reference(&mut self, id: RefId, transform: Transform2) -> Result<(), LayoutError> {
        self.reference_mut(id, "move a reference")?.apply(transform);
        Ok(())
    }

    // ── aliases ─────────────────────────────────────────────────────────────

    /// Record a debugging name for a reference. Later aliases overwrite earlier ones.
    pub fn add_alias(&mut self, name: impl Into<String>, id: RefId) -> Result<(), LayoutError> {
        self.ensure_unlocked("add an alias")?;
        self.reference(id)?;
        self.aliases.insert(name.into(), id);
        Ok(())
    }

    #[must_use]
    pub fn alias(&self, name: &str) -> Option<&Reference> {
        self.aliases
            .get(name)
            .and_then(|id| self.references.get(id.0))
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, RefId)> {
        self.aliases.iter().map(|(name, id)| (name.as_str(), *id))
    }

    // ── info ────────────────────────────────────────────────────────────────

    /// Free-form metadata: factory settings and derived values such as `length`.
    #[must_use]
    pub fn info(&self) -> &Params {
        &self.info
    }

    pub fn set_info(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Result<(), LayoutError> {
        self.ensure_unlocked("change its info")?;
        self.info.insert(key.into(), value.into());
        Ok(())
    }

    #[must_use]
    pub fn info_f64(&self, key: &str) -> Option<f64> {
        self.info.get(key).and_then(ParamValue::as_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Layer, Point2};
    use crate::layout::ErrorKind;

    fn port(x: f64, y: f64, angle: f64) -> Port {
        Port::new("tmp", Point2::new(x, y), angle, 0.5, Layer::WG)
    }

    fn leaf(name: &str) -> Arc<Component> {
        let mut c = Component::new(name);
        c.add_port(1_usize, port(0.0, 0.0, 180.0)).unwrap();
        c.add_port(2_usize, port(10.0, 0.0, 0.0)).unwrap();
        c.publish()
    }

    #[test]
    fn duplicate_port_names_collide() {
        let mut c = Component::new("c");
        c.add_port("o1", port(0.0, 0.0, 180.0)).unwrap();
        let err = c.add_port("o1", port(5.0, 0.0, 0.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NamingCollision);
        assert_eq!(c.port_count(), 1);
    }

    #[test]
    fn index_and_digit_label_are_the_same_name() {
        let mut c = Component::new("c");
        c.add_port(3_usize, port(0.0, 0.0, 180.0)).unwrap();
        assert!(c.add_port("3", port(1.0, 0.0, 0.0)).is_err());
        assert_eq!(c.port("3").unwrap().name, PortName::Index(3));
    }

    #[test]
    fn published_component_rejects_mutation() {
        let published = leaf("leaf");
        let mut copy = (*published).clone();
        let err = copy.add_port("extra", port(1.0, 1.0, 90.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Immutability);
        assert!(copy.add_shape(crate::geom::Shape::polygon(Layer::WG, Vec::new())).is_err());
        assert!(copy.instantiate(&leaf("other")).is_err());
        assert!(copy.set_info("length", 1.0).is_err());
    }

    #[test]
    fn instantiating_unpublished_child_fails() {
        let mut parent = Component::new("parent");
        let child = Arc::new(Component::new("draft"));
        let err = parent.instantiate(&child).unwrap_err();
        assert!(matches!(err, LayoutError::Unpublished { ref component } if component == "draft"));
        assert!(parent.references().is_empty());
    }

    #[test]
    fn shared_child_is_not_copied() {
        let child = leaf("leaf");
        let mut a = Component::new("a");
        let mut b = Component::new("b");
        let ra = a.instantiate(&child).unwrap();
        let rb = b.instantiate(&child).unwrap();
        assert!(Arc::ptr_eq(a.reference(ra).unwrap().component(), &child));
        assert!(Arc::ptr_eq(b.reference(rb).unwrap().component(), &child));
        assert_eq!(a.port_count(), 0, "child ports are never re-exported implicitly");
    }

    #[test]
    fn missing_port_suggests_close_name() {
        let mut c = Component::new("c");
        c.add_port("heater", port(0.0, 0.0, 180.0)).unwrap();
        let err = c.port("heatr").unwrap_err();
        match err {
            LayoutError::PortNotFound { suggestion, .. } => {
                assert_eq!(suggestion.as_deref(), Some("heater"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn aliases_are_last_write_wins() {
        let child = leaf("leaf");
        let mut c = Component::new("c");
        let first = c.instantiate(&child).unwrap();
        let second = c.instantiate(&child).unwrap();
        c.transform_reference(second, Transform2::rotate(90.0)).unwrap();
        c.add_alias("arm", first).unwrap();
        c.add_alias("arm", second).unwrap();
        assert_eq!(c.alias("arm").unwrap().transform().rotation, 90.0);
        assert!(c.add_alias("ghost", RefId(9)).is_err());
    }

    #[test]
    fn replace_ports_is_all_or_nothing() {
        let mut c = Component::new("c");
        c.add_port("keep", port(0.0, 0.0, 180.0)).unwrap();
        let result = c.replace_ports(vec![
            port(0.0, 0.0, 0.0).renamed("x"),
            port(1.0, 0.0, 0.0).renamed("x"),
        ]);
        assert!(result.is_err());
        assert!(c.has_port(&PortName::from("keep")));
    }

    #[test]
    fn ports_matching_uses_wildcards() {
        let mut c = Component::new("c");
        c.add_port("DC_top_1", port(0.0, 0.0, 180.0)).unwrap();
        c.add_port("DC_bot_1", port(0.0, 1.0, 180.0)).unwrap();
        c.add_port("E0", port(5.0, 0.0, 0.0)).unwrap();
        assert_eq!(c.ports_matching("DC_*").len(), 2);
        assert_eq!(c.ports_matching("E?").len(), 1);
    }
}
