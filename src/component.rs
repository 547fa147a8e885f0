//! Component hierarchy: flat automata and networks of instantiated children.
//!
//! A [`NetworkComponent`] owns its children through [`ComponentInstance`]s, each binding the
//! child's variables to the network's through [`ComponentMapping`]s. Children do not point back
//! to their parent; instead every component records its [`ComponentPath`] (the instance names
//! leading to it from the root), which the [`Configuration`][crate::config::Configuration]
//! resolves on demand.

use std::fmt;

use indexmap::{IndexMap, IndexSet};

use crate::automaton::BaseComponent;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::interval::Interval;

/// Instance names from the root of the tree down to a component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ComponentPath(Vec<String>);

impl ComponentPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, instance: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(instance.into());
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.0.split_last()?;
        Some(Self(init.to_vec()))
    }

    /// Name of the instantiation this component was created by, `None` for the root.
    pub fn instance_name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// `name` prefixed by every instance name of the path, joined with `.`.
    pub fn qualify(&self, name: &str) -> String {
        if self.0.is_empty() {
            return name.to_string();
        }
        format!("{}.{}", self.0.join("."), name)
    }
}

impl fmt::Display for ComponentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0.join("."))
        }
    }
}

/// Aliasing of a child variable to a variable (or constant) of the parent network.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentMapping {
    pub parent_var: String,
    pub child_var: String,
}

/// One instantiation of a child component inside a network.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentInstance {
    pub child: Component,
    pub mappings: Vec<ComponentMapping>,
}

impl ComponentInstance {
    pub fn new(child: impl Into<Component>) -> Self {
        Self {
            child: child.into(),
            mappings: Vec::new(),
        }
    }

    pub fn with_mapping(mut self, parent_var: impl Into<String>, child_var: impl Into<String>) -> Self {
        self.mappings.push(ComponentMapping {
            parent_var: parent_var.into(),
            child_var: child_var.into(),
        });
        self
    }

    /// The parent variable aliased to `child_var`, if any.
    pub fn parent_var_for(&self, child_var: &str) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| m.child_var == child_var)
            .map(|m| m.parent_var.as_str())
    }
}

/// A hierarchical composition of instantiated components.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkComponent {
    pub variables: IndexSet<String>,
    pub constants: IndexMap<String, Interval>,
    pub children: IndexMap<String, ComponentInstance>,
    pub path: ComponentPath,
}

impl NetworkComponent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variables<S: Into<String>>(variables: impl IntoIterator<Item = S>) -> Self {
        Self {
            variables: variables.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Adds a child instance, updating the paths of the whole child subtree.
    pub fn add_child(&mut self, name: impl Into<String>, mut instance: ComponentInstance) {
        let name = name.into();
        instance.child.set_path(self.path.child(name.clone()));
        self.children.insert(name, instance);
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.variables.contains(name) || self.constants.contains_key(name)
    }

    fn validate(&self) -> Result<()> {
        for (name, instance) in &self.children {
            let entity = || format!("instance '{}'", self.path.child(name.clone()));
            for m in &instance.mappings {
                if !self.is_declared(&m.parent_var) {
                    return Err(Error::validation(
                        entity(),
                        format!("maps to undeclared parent variable '{}'", m.parent_var),
                    ));
                }
                if !instance.child.is_declared(&m.child_var) {
                    return Err(Error::validation(
                        entity(),
                        format!("maps undeclared child variable '{}'", m.child_var),
                    ));
                }
            }
            if instance.child.path() != &self.path.child(name.clone()) {
                return Err(Error::validation(entity(), "child path does not match its instantiation"));
            }
            instance.child.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Base(BaseComponent),
    Network(NetworkComponent),
}

impl From<BaseComponent> for Component {
    fn from(base: BaseComponent) -> Self {
        Component::Base(base)
    }
}

impl From<NetworkComponent> for Component {
    fn from(network: NetworkComponent) -> Self {
        Component::Network(network)
    }
}

// Getters
impl Component {
    pub fn variables(&self) -> &IndexSet<String> {
        match self {
            Component::Base(base) => &base.variables,
            Component::Network(net) => &net.variables,
        }
    }

    pub fn constants(&self) -> &IndexMap<String, Interval> {
        match self {
            Component::Base(base) => &base.constants,
            Component::Network(net) => &net.constants,
        }
    }

    pub fn path(&self) -> &ComponentPath {
        match self {
            Component::Base(base) => &base.path,
            Component::Network(net) => &net.path,
        }
    }

    pub fn as_base(&self) -> Option<&BaseComponent> {
        match self {
            Component::Base(base) => Some(base),
            Component::Network(_) => None,
        }
    }

    pub fn as_base_mut(&mut self) -> Option<&mut BaseComponent> {
        match self {
            Component::Base(base) => Some(base),
            Component::Network(_) => None,
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, Component::Base(_))
    }
}

// Queries
impl Component {
    pub fn is_declared(&self, name: &str) -> bool {
        self.variables().contains(name) || self.constants().contains_key(name)
    }

    /// The component at `path` below (or equal to) this one.
    pub fn find(&self, path: &ComponentPath) -> Option<&Component> {
        let mut current = self;
        let depth = self.path().segments().len();
        for segment in path.segments().get(depth..)? {
            match current {
                Component::Network(net) => current = &net.children.get(segment)?.child,
                Component::Base(_) => return None,
            }
        }
        (current.path() == path).then_some(current)
    }

    /// All flat automata of the subtree, in depth-first instantiation order.
    pub fn base_components(&self) -> Vec<&BaseComponent> {
        let mut out = Vec::new();
        self.collect_bases(&mut out);
        out
    }

    fn collect_bases<'a>(&'a self, out: &mut Vec<&'a BaseComponent>) {
        match self {
            Component::Base(base) => out.push(base),
            Component::Network(net) => net.children.values().for_each(|i| i.child.collect_bases(out)),
        }
    }

    pub fn base_components_mut(&mut self) -> Vec<&mut BaseComponent> {
        let mut out = Vec::new();
        self.collect_bases_mut(&mut out);
        out
    }

    fn collect_bases_mut<'a>(&'a mut self, out: &mut Vec<&'a mut BaseComponent>) {
        match self {
            Component::Base(base) => out.push(base),
            Component::Network(net) => net
                .children
                .values_mut()
                .for_each(|i| i.child.collect_bases_mut(out)),
        }
    }

    /// Every declared name of the subtree, qualified by its path relative to this component.
    pub fn qualified_names(&self) -> IndexSet<String> {
        let mut out = IndexSet::new();
        self.collect_names(&ComponentPath::root(), &mut out);
        out
    }

    fn collect_names(&self, prefix: &ComponentPath, out: &mut IndexSet<String>) {
        out.extend(self.variables().iter().map(|v| prefix.qualify(v)));
        out.extend(self.constants().keys().map(|c| prefix.qualify(c)));
        if let Component::Network(net) = self {
            for (name, instance) in &net.children {
                instance.child.collect_names(&prefix.child(name.clone()), out);
            }
        }
    }
}

// Modification
impl Component {
    /// Sets the path of this component and re-derives the paths of all descendants.
    pub fn set_path(&mut self, path: ComponentPath) {
        match self {
            Component::Base(base) => base.path = path,
            Component::Network(net) => {
                for (name, instance) in net.children.iter_mut() {
                    instance.child.set_path(path.child(name.clone()));
                }
                net.path = path;
            }
        }
    }

    /// Applies `f` to every expression of every flat automaton in the subtree.
    pub fn map_expressions(&mut self, f: &mut impl FnMut(&Expr) -> Expr) {
        match self {
            Component::Base(base) => base.map_expressions(f),
            Component::Network(net) => {
                for instance in net.children.values_mut() {
                    instance.child.map_expressions(f);
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Component::Base(base) => base.validate(),
            Component::Network(net) => net.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::automaton::{AutomatonMode, AutomatonTransition};

    fn tank(level: &str) -> BaseComponent {
        let mut ha = BaseComponent::with_variables([level, "inflow"]);
        ha.add_mode(AutomatonMode::new("fill")).set_flow(level, Expr::var("inflow"));
        ha.add_mode(AutomatonMode::new("drain")).set_flow(level, Expr::num(-1.0));
        ha.add_transition(AutomatonTransition::new("fill", "drain"));
        ha
    }

    fn two_tanks() -> NetworkComponent {
        let mut net = NetworkComponent::with_variables(["h1", "h2", "q"]);
        net.add_child(
            "left",
            ComponentInstance::new(tank("h")).with_mapping("h1", "h").with_mapping("q", "inflow"),
        );
        net.add_child(
            "right",
            ComponentInstance::new(tank("h")).with_mapping("h2", "h").with_mapping("q", "inflow"),
        );
        net
    }

    #[test]
    fn test_paths() {
        let path = ComponentPath::root().child("a").child("b");
        assert_eq!(path.to_string(), "a.b");
        assert_eq!(path.qualify("x"), "a.b.x");
        assert_eq!(path.instance_name(), Some("b"));
        assert_eq!(path.parent(), Some(ComponentPath::root().child("a")));
        assert_eq!(ComponentPath::root().parent(), None);
        assert_eq!(ComponentPath::root().qualify("x"), "x");
    }

    #[test]
    fn test_network_tree() {
        let root = Component::from(two_tanks());
        assert!(root.validate().is_ok());
        assert!(!root.is_flat());
        assert_eq!(root.base_components().len(), 2);

        let left = root.find(&ComponentPath::root().child("left")).unwrap();
        assert_eq!(left.path().instance_name(), Some("left"));
        assert_eq!(left.as_base().unwrap().qualified_name("h"), "left.h");
        assert!(root.find(&ComponentPath::root().child("middle")).is_none());

        let names = root.qualified_names();
        assert!(names.contains("h1"));
        assert!(names.contains("right.inflow"));
    }

    #[test]
    fn test_bad_mapping_rejected() {
        let mut net = two_tanks();
        net.add_child("extra", ComponentInstance::new(tank("h")).with_mapping("nope", "h"));
        let err = Component::from(net).validate().unwrap_err();
        assert!(err.to_string().contains("instance 'extra'"), "{}", err);
        assert!(err.to_string().contains("'nope'"), "{}", err);
    }

    #[test]
    fn test_child_errors_name_the_component() {
        let mut net = two_tanks();
        let mut broken = tank("h");
        broken.add_transition(AutomatonTransition::new("fill", "overflow"));
        net.add_child("broken", ComponentInstance::new(broken));
        let err = Component::from(net).validate().unwrap_err();
        assert!(err.to_string().contains("component 'broken'"), "{}", err);
    }
}
