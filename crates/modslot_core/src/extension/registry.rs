//! In-process extension point registry.
//!
//! # Responsibility
//! - Own the one registration callback per extension point.
//! - Keep plugin providers per point in registration order.
//! - Hold per-group contribution snapshots produced by collection passes.
//!
//! # Invariants
//! - The first declaration of a point wins; later ones are logged and ignored.
//! - A collection pass replaces the group snapshot as a whole, so order always
//!   follows declaration callback first, then providers in registration order.
//! - Collecting an undeclared point stores nothing.
//! - A failing or panicking provider never aborts the pass for other providers.

use crate::extension::point::{ExtensionPointName, PointNameError};
use crate::extension::provider::{Contribution, SharedProvider};
use crate::logging::panic_payload_summary;
use log::{debug, error, warn};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

/// Immutable, shareable contribution sequence.
pub type Contributions = Rc<[Contribution]>;

/// Outcome of one extension point declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declaration {
    Declared,
    AlreadyDeclared,
}

/// Registry errors. Only malformed input is reported; runtime failures of
/// providers degrade to missing contributions instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidPointName(PointNameError),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPointName(err) => write!(f, "invalid extension point: {err}"),
        }
    }
}

impl Error for RegistryError {}

impl From<PointNameError> for RegistryError {
    fn from(value: PointNameError) -> Self {
        Self::InvalidPointName(value)
    }
}

/// Process-wide extension point registry.
#[derive(Default)]
pub struct ExtensionRegistry {
    callbacks: BTreeMap<ExtensionPointName, SharedProvider>,
    providers: BTreeMap<ExtensionPointName, Vec<SharedProvider>>,
    snapshots: BTreeMap<ExtensionPointName, HashMap<String, Contributions>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares one extension point with its registration callback.
    ///
    /// Re-declaring an existing point keeps the first callback and returns
    /// [`Declaration::AlreadyDeclared`].
    pub fn declare_extension_point(
        &mut self,
        name: &str,
        callback: SharedProvider,
    ) -> Result<Declaration, RegistryError> {
        let name = ExtensionPointName::parse(name)?;
        if self.callbacks.contains_key(name.as_str()) {
            warn!(
                "event=point_declare module=registry status=ignored point={} reason=already_declared",
                name
            );
            return Ok(Declaration::AlreadyDeclared);
        }

        debug!(
            "event=point_declare module=registry status=ok point={} callback={}",
            name,
            callback.provider_id()
        );
        self.callbacks.insert(name, callback);
        Ok(Declaration::Declared)
    }

    /// Appends one plugin provider under `name`.
    ///
    /// The point does not need to be declared yet. Returns the provider's
    /// zero-based position among the plugin providers of this point.
    pub fn register_provider(
        &mut self,
        name: &str,
        provider: SharedProvider,
    ) -> Result<usize, RegistryError> {
        let name = ExtensionPointName::parse(name)?;
        debug!(
            "event=provider_register module=registry status=ok point={} provider={}",
            name,
            provider.provider_id()
        );
        let entries = self.providers.entry(name).or_default();
        entries.push(provider);
        Ok(entries.len() - 1)
    }

    /// Runs one collection pass for `(name, group)` and stores the snapshot.
    ///
    /// Undeclared or malformed names are a no-op.
    pub fn collect(&mut self, name: &str, group: &str, args: &[Value]) {
        let Some(plan) = self.collection_plan(name) else {
            return;
        };
        let contributions = run_collection(&plan, group, args);
        self.store_snapshot(plan.point, group, contributions);
    }

    /// Returns the latest snapshot for `(name, group)`, or an empty sequence.
    pub fn contributions_for(&self, name: &str, group: &str) -> Contributions {
        self.snapshots
            .get(name.trim())
            .and_then(|groups| groups.get(group))
            .cloned()
            .unwrap_or_else(|| Rc::from(Vec::new()))
    }

    /// Returns whether a collection pass already ran for `(name, group)`.
    pub fn has_collected(&self, name: &str, group: &str) -> bool {
        self.snapshots
            .get(name.trim())
            .is_some_and(|groups| groups.contains_key(group))
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.callbacks.contains_key(name.trim())
    }

    /// Returns sorted declared point names.
    pub fn extension_points(&self) -> Vec<String> {
        self.callbacks.keys().map(|name| name.to_string()).collect()
    }

    /// Returns the number of plugin providers registered under `name`.
    pub fn provider_count(&self, name: &str) -> usize {
        self.providers.get(name.trim()).map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Snapshots the providers a pass for `name` would invoke.
    ///
    /// Returns `None` when the point is not declared.
    pub(crate) fn collection_plan(&self, name: &str) -> Option<CollectionPlan> {
        let point = match ExtensionPointName::parse(name) {
            Ok(point) => point,
            Err(err) => {
                warn!(
                    "event=collect module=registry status=skipped reason=invalid_point error={}",
                    err
                );
                return None;
            }
        };
        let Some(callback) = self.callbacks.get(point.as_str()) else {
            debug!(
                "event=collect module=registry status=skipped point={} reason=undeclared",
                point
            );
            return None;
        };

        let mut providers = Vec::with_capacity(1 + self.provider_count(point.as_str()));
        providers.push(Rc::clone(callback));
        if let Some(registered) = self.providers.get(point.as_str()) {
            providers.extend(registered.iter().cloned());
        }
        Some(CollectionPlan { point, providers })
    }

    pub(crate) fn store_snapshot(
        &mut self,
        point: ExtensionPointName,
        group: &str,
        contributions: Vec<Contribution>,
    ) {
        debug!(
            "event=collect module=registry status=ok point={} group={} count={}",
            point,
            group,
            contributions.len()
        );
        self.snapshots
            .entry(point)
            .or_default()
            .insert(group.to_string(), Rc::from(contributions));
    }
}

/// Providers selected for one collection pass.
pub(crate) struct CollectionPlan {
    pub(crate) point: ExtensionPointName,
    providers: Vec<SharedProvider>,
}

/// Invokes every planned provider in order, isolating failures.
pub(crate) fn run_collection(
    plan: &CollectionPlan,
    group: &str,
    args: &[Value],
) -> Vec<Contribution> {
    let mut contributions = Vec::with_capacity(plan.providers.len());
    for provider in &plan.providers {
        let outcome = catch_unwind(AssertUnwindSafe(|| provider.provide(group, args)));
        match outcome {
            Ok(Ok(Some(value))) => contributions.push(value),
            Ok(Ok(None)) => {}
            Ok(Err(err)) => {
                warn!(
                    "event=provider_invoke module=registry status=error point={} group={} provider={} error={}",
                    plan.point,
                    group,
                    provider.provider_id(),
                    err
                );
            }
            Err(payload) => {
                error!(
                    "event=provider_invoke module=registry status=panic point={} group={} provider={} payload={}",
                    plan.point,
                    group,
                    provider.provider_id(),
                    panic_payload_summary(payload.as_ref())
                );
            }
        }
    }
    contributions
}

#[cfg(test)]
mod tests {
    use super::{Declaration, ExtensionRegistry, RegistryError};
    use crate::extension::provider::{infallible_provider, provider_fn, ProviderError};
    use serde_json::{json, Value};
    use std::cell::Cell;
    use std::rc::Rc;

    fn echo(id: &str, tag: &'static str) -> crate::extension::provider::SharedProvider {
        infallible_provider(id, move |group, args| {
            Some(json!({ "tag": tag, "group": group, "args": Value::Array(args.to_vec()) }))
        })
    }

    #[test]
    fn returns_empty_contributions_before_collect() {
        let mut registry = ExtensionRegistry::new();
        assert!(registry.contributions_for("registerDashlet", "main").is_empty());

        registry
            .declare_extension_point("registerDashlet", echo("core/dashlet", "core"))
            .expect("declare");
        assert!(registry.contributions_for("registerDashlet", "main").is_empty());
        assert!(!registry.has_collected("registerDashlet", "main"));
    }

    #[test]
    fn collects_callback_result_with_group_and_args() {
        let mut registry = ExtensionRegistry::new();
        registry
            .declare_extension_point("registerDashlet", echo("core/dashlet", "core"))
            .expect("declare");

        registry.collect("registerDashlet", "main", &[json!("x")]);
        let contributions = registry.contributions_for("registerDashlet", "main");
        assert_eq!(
            contributions.to_vec(),
            vec![json!({ "tag": "core", "group": "main", "args": ["x"] })]
        );
        assert!(registry.has_collected("registerDashlet", "main"));
    }

    #[test]
    fn keeps_registration_order_and_skips_none() {
        let mut registry = ExtensionRegistry::new();
        registry
            .declare_extension_point("registerDashlet", infallible_provider("core", |_, _| None))
            .expect("declare");
        registry
            .register_provider("registerDashlet", infallible_provider("p1", |_, _| Some(json!(1))))
            .expect("p1");
        registry
            .register_provider("registerDashlet", infallible_provider("p2", |_, _| None))
            .expect("p2");
        registry
            .register_provider("registerDashlet", infallible_provider("p3", |_, _| Some(json!(3))))
            .expect("p3");

        registry.collect("registerDashlet", "main", &[]);
        assert_eq!(
            registry.contributions_for("registerDashlet", "main").to_vec(),
            vec![json!(1), json!(3)]
        );
        assert_eq!(registry.provider_count("registerDashlet"), 3);
    }

    #[test]
    fn redeclaration_keeps_first_callback() {
        let mut registry = ExtensionRegistry::new();
        let first = registry
            .declare_extension_point("registerDashlet", echo("first", "first"))
            .expect("first declare");
        let second = registry
            .declare_extension_point("registerDashlet", echo("second", "second"))
            .expect("second declare must not fail");
        assert_eq!(first, Declaration::Declared);
        assert_eq!(second, Declaration::AlreadyDeclared);
        assert_eq!(registry.len(), 1);

        registry.collect("registerDashlet", "g", &[]);
        let contributions = registry.contributions_for("registerDashlet", "g");
        assert_eq!(contributions.len(), 1);
        assert_eq!(contributions[0]["tag"], "first");
    }

    #[test]
    fn collecting_undeclared_point_is_noop() {
        let mut registry = ExtensionRegistry::new();
        registry
            .register_provider("registerDashlet", echo("early", "early"))
            .expect("providers may arrive before declaration");

        registry.collect("registerDashlet", "main", &[]);
        registry.collect("not a point", "main", &[]);
        assert!(registry.contributions_for("registerDashlet", "main").is_empty());
        assert!(!registry.has_collected("registerDashlet", "main"));
    }

    #[test]
    fn early_providers_join_once_point_is_declared() {
        let mut registry = ExtensionRegistry::new();
        registry
            .register_provider("registerDashlet", infallible_provider("early", |_, _| Some(json!("early"))))
            .expect("early provider");
        registry
            .declare_extension_point("registerDashlet", infallible_provider("core", |_, _| Some(json!("core"))))
            .expect("declare");

        registry.collect("registerDashlet", "main", &[]);
        assert_eq!(
            registry.contributions_for("registerDashlet", "main").to_vec(),
            vec![json!("core"), json!("early")]
        );
    }

    #[test]
    fn failing_and_panicking_providers_are_isolated() {
        let mut registry = ExtensionRegistry::new();
        registry
            .declare_extension_point("registerDashlet", infallible_provider("core", |_, _| None))
            .expect("declare");
        registry
            .register_provider(
                "registerDashlet",
                provider_fn("broken", |_, _| Err(ProviderError::new("broken", "boom"))),
            )
            .expect("broken");
        registry
            .register_provider(
                "registerDashlet",
                infallible_provider("panicking", |_, _| panic!("provider exploded")),
            )
            .expect("panicking");
        registry
            .register_provider("registerDashlet", infallible_provider("healthy", |_, _| Some(json!("ok"))))
            .expect("healthy");

        registry.collect("registerDashlet", "main", &[]);
        assert_eq!(
            registry.contributions_for("registerDashlet", "main").to_vec(),
            vec![json!("ok")]
        );
    }

    #[test]
    fn recollect_replaces_snapshot_and_includes_late_providers() {
        let mut registry = ExtensionRegistry::new();
        registry
            .declare_extension_point("registerDashlet", infallible_provider("core", |_, _| Some(json!("core"))))
            .expect("declare");
        registry.collect("registerDashlet", "main", &[]);

        registry
            .register_provider("registerDashlet", infallible_provider("late", |_, _| Some(json!("late"))))
            .expect("late");
        assert_eq!(
            registry.contributions_for("registerDashlet", "main").to_vec(),
            vec![json!("core")]
        );

        registry.collect("registerDashlet", "main", &[]);
        assert_eq!(
            registry.contributions_for("registerDashlet", "main").to_vec(),
            vec![json!("core"), json!("late")]
        );
    }

    #[test]
    fn groups_are_collected_independently() {
        let calls = Rc::new(Cell::new(0usize));
        let counter = Rc::clone(&calls);
        let mut registry = ExtensionRegistry::new();
        registry
            .declare_extension_point(
                "registerDashlet",
                infallible_provider("core", move |group, _| {
                    counter.set(counter.get() + 1);
                    Some(json!(group))
                }),
            )
            .expect("declare");

        registry.collect("registerDashlet", "a", &[]);
        registry.collect("registerDashlet", "b", &[]);
        assert_eq!(calls.get(), 2);
        assert_eq!(registry.contributions_for("registerDashlet", "a").to_vec(), vec![json!("a")]);
        assert_eq!(registry.contributions_for("registerDashlet", "b").to_vec(), vec![json!("b")]);
    }

    #[test]
    fn rejects_malformed_point_names_on_declare() {
        let mut registry = ExtensionRegistry::new();
        let err = registry
            .declare_extension_point("bad name", echo("x", "x"))
            .expect_err("malformed name must fail");
        assert!(matches!(err, RegistryError::InvalidPointName(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn lists_declared_points_sorted() {
        let mut registry = ExtensionRegistry::new();
        for name in ["settings.page", "registerDashlet", "registerAction"] {
            registry
                .declare_extension_point(name, echo(name, "x"))
                .expect("declare");
        }
        assert_eq!(
            registry.extension_points(),
            vec!["registerAction", "registerDashlet", "settings.page"]
        );
        assert!(registry.is_declared(" settings.page "));
    }
}
