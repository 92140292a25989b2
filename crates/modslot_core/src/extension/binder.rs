//! Binds presentation components to one extension point.
//!
//! # Responsibility
//! - Trigger a collection pass the first time a group is mounted.
//! - Merge caller-supplied static elements with the group's contributions.
//! - Hand the merged list to the wrapped component as `objects`.
//!
//! # Invariants
//! - A group already collected by the registry is never re-collected here.
//! - Each mounted component memoizes one merged list per group, keyed by the
//!   static elements version, and reuses it as long as the registry snapshot
//!   for that group is unchanged. Siblings share registry snapshots, never
//!   merged lists.
//! - The group prop and `staticElements` never reach the wrapped component.

use crate::extension::context::ContributionSource;
use crate::extension::registry::Contributions;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Default prop key carrying the group identifier.
pub const DEFAULT_GROUP_PROP: &str = "group";
/// Prop key reserved for static elements; stripped before forwarding.
pub const STATIC_ELEMENTS_PROP: &str = "staticElements";

/// Caller-supplied contributions that bypass the registry.
///
/// `version` is the identity token of `items`: callers bump it whenever they
/// pass a different list, and keep it when they pass the same one again.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticElements {
    version: u64,
    items: Rc<[Value]>,
}

impl StaticElements {
    pub fn new(version: u64, items: Vec<Value>) -> Self {
        Self {
            version,
            items: Rc::from(items),
        }
    }

    /// Builds static elements whose version is derived from the JSON content
    /// of `items`, so equal lists share a version.
    pub fn from_items(items: Vec<Value>) -> Self {
        let mut hasher = DefaultHasher::new();
        Value::Array(items.clone()).to_string().hash(&mut hasher);
        Self::new(hasher.finish(), items)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }
}

/// Props accepted by an extended component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensibleProps {
    pub props: Map<String, Value>,
    pub static_elements: Option<StaticElements>,
}

impl ExtensibleProps {
    /// Builds props from a property map.
    ///
    /// An array under `staticElements` is moved out of the map and becomes the
    /// static elements; any other value under that key is dropped.
    pub fn new(mut props: Map<String, Value>) -> Self {
        let static_elements = match props.remove(STATIC_ELEMENTS_PROP) {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(StaticElements::from_items(items)),
            Some(other) => {
                warn!(
                    "event=props_parse module=binder status=ignored key={} reason=not_an_array value_type={}",
                    STATIC_ELEMENTS_PROP,
                    json_type(&other)
                );
                None
            }
        };
        Self {
            props,
            static_elements,
        }
    }

    /// Builds props from a JSON object; other JSON values yield empty props.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(props) => Self::new(props),
            _ => Self::default(),
        }
    }

    pub fn with_static_elements(mut self, static_elements: StaticElements) -> Self {
        self.static_elements = Some(static_elements);
        self
    }

    /// Reads the group identifier stored under `group_prop`.
    ///
    /// Missing or null values map to the empty group; non-string values use
    /// their JSON text.
    pub fn group(&self, group_prop: &str) -> String {
        match self.props.get(group_prop) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(group)) => group.clone(),
            Some(other) => other.to_string(),
        }
    }

    fn static_version(&self) -> Option<u64> {
        self.static_elements.as_ref().map(StaticElements::version)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Props delivered to the wrapped component.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderProps {
    pub props: Map<String, Value>,
    pub objects: Contributions,
}

/// Presentation component wrapped by a [`Binder`].
pub trait Component {
    type Output;

    fn render(&self, props: &RenderProps) -> Self::Output;
}

impl<F, O> Component for F
where
    F: Fn(&RenderProps) -> O,
{
    type Output = O;

    fn render(&self, props: &RenderProps) -> O {
        self(props)
    }
}

/// Binder configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BindOptions {
    /// Prop key holding the group identifier.
    pub group_prop: String,
    /// Extra arguments forwarded to every collection pass.
    pub collect_args: Vec<Value>,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            group_prop: DEFAULT_GROUP_PROP.to_string(),
            collect_args: Vec::new(),
        }
    }
}

impl BindOptions {
    pub fn with_group_prop(mut self, group_prop: impl Into<String>) -> Self {
        self.group_prop = group_prop.into();
        self
    }

    pub fn with_collect_args(mut self, collect_args: Vec<Value>) -> Self {
        self.collect_args = collect_args;
        self
    }
}

/// Latest merge of one group inside one mounted component.
struct MergeEntry {
    static_version: Option<u64>,
    snapshot: Contributions,
    merged: Contributions,
}

impl MergeEntry {
    fn is_current(&self, static_version: Option<u64>, snapshot: &Contributions) -> bool {
        self.static_version == static_version
            && (Rc::ptr_eq(&self.snapshot, snapshot)
                || (self.snapshot.is_empty() && snapshot.is_empty()))
    }
}

/// Wrapping combinator for one extension point.
#[derive(Clone)]
pub struct Binder<S> {
    source: S,
    point: String,
    options: BindOptions,
}

impl<S> Binder<S>
where
    S: ContributionSource + Clone,
{
    pub fn new(source: S, point: impl Into<String>, options: BindOptions) -> Self {
        Self {
            source,
            point: point.into(),
            options,
        }
    }

    pub fn point(&self) -> &str {
        &self.point
    }

    pub fn options(&self) -> &BindOptions {
        &self.options
    }

    /// Mounts `component`, collecting contributions for its group if the
    /// registry has not seen that group yet.
    pub fn mount<C: Component>(&self, component: C, props: ExtensibleProps) -> ExtendedComponent<C, S> {
        let group = props.group(&self.options.group_prop);
        self.ensure_collected(&group);
        ExtendedComponent {
            binder: self.clone(),
            component,
            props,
            group,
            objects: None,
            merges: HashMap::new(),
        }
    }

    fn ensure_collected(&self, group: &str) {
        if self.source.has_collected(&self.point, group) {
            return;
        }
        debug!(
            "event=bind_collect module=binder status=start point={} group={}",
            self.point, group
        );
        self.source
            .collect(&self.point, group, &self.options.collect_args);
    }

    fn merge(&self, group: &str, static_elements: Option<&StaticElements>) -> MergeEntry {
        let snapshot = self.source.contributions_for(&self.point, group);
        let statics = static_elements.map_or(&[][..], StaticElements::items);
        let merged: Contributions = statics.iter().chain(snapshot.iter()).cloned().collect();
        debug!(
            "event=bind_merge module=binder status=ok point={} group={} static={} registered={}",
            self.point,
            group,
            statics.len(),
            snapshot.len()
        );
        MergeEntry {
            static_version: static_elements.map(StaticElements::version),
            snapshot,
            merged,
        }
    }
}

/// Component instance mounted through a [`Binder`].
pub struct ExtendedComponent<C, S> {
    binder: Binder<S>,
    component: C,
    props: ExtensibleProps,
    group: String,
    objects: Option<Contributions>,
    merges: HashMap<String, MergeEntry>,
}

impl<C, S> ExtendedComponent<C, S>
where
    C: Component,
    S: ContributionSource + Clone,
{
    /// Current group identifier.
    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn props(&self) -> &ExtensibleProps {
        &self.props
    }

    /// Applies new props.
    ///
    /// A group change collects the new group when unseen and drops the
    /// memoized list; a static elements version change drops it as well.
    pub fn set_props(&mut self, next: ExtensibleProps) {
        let next_group = next.group(&self.binder.options.group_prop);
        if next_group != self.group {
            self.binder.ensure_collected(&next_group);
            self.objects = None;
        }
        if next.static_version() != self.props.static_version() {
            self.objects = None;
        }
        self.group = next_group;
        self.props = next;
    }

    /// Renders the wrapped component with the memoized merged list.
    pub fn render(&mut self) -> C::Output {
        let objects = self.objects().clone();
        let mut props = self.props.props.clone();
        props.remove(&self.binder.options.group_prop);
        props.remove(STATIC_ELEMENTS_PROP);
        self.component.render(&RenderProps { props, objects })
    }

    /// Returns the merged list, computing it on first use.
    pub fn objects(&mut self) -> &Contributions {
        let merged = match self.objects.as_ref().map(Rc::clone) {
            Some(objects) => objects,
            None => self.cached_merge(),
        };
        self.objects.insert(merged)
    }

    /// Returns the number of groups with a memoized merge in this instance.
    pub fn cached_merges(&self) -> usize {
        self.merges.len()
    }

    /// Reuses this group's merge when still current, otherwise replaces it.
    fn cached_merge(&mut self) -> Contributions {
        let static_elements = self.props.static_elements.as_ref();
        let static_version = static_elements.map(StaticElements::version);
        let snapshot = self
            .binder
            .source
            .contributions_for(&self.binder.point, &self.group);
        if let Some(entry) = self.merges.get(&self.group) {
            if entry.is_current(static_version, &snapshot) {
                return Rc::clone(&entry.merged);
            }
        }

        let entry = self.binder.merge(&self.group, static_elements);
        let merged = Rc::clone(&entry.merged);
        self.merges.insert(self.group.clone(), entry);
        merged
    }

    /// Releases the instance and returns the wrapped component.
    pub fn unmount(self) -> C {
        debug!(
            "event=unmount module=binder status=ok point={} group={}",
            self.binder.point, self.group
        );
        self.component
    }
}
