//! Shared registry handle injected into binders and plugin loaders.
//!
//! # Responsibility
//! - Give every consumer a non-owning view of the one registry created at
//!   startup.
//! - Run collection passes without holding a registry borrow while providers
//!   execute, so providers may read the registry re-entrantly.

use crate::extension::provider::SharedProvider;
use crate::extension::registry::{
    run_collection, Contributions, Declaration, ExtensionRegistry, RegistryError,
};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Registry view consumed by binders.
pub trait ContributionSource {
    /// Runs one collection pass for `(point, group)`.
    fn collect(&self, point: &str, group: &str, args: &[Value]);

    /// Reads the latest snapshot for `(point, group)`.
    fn contributions_for(&self, point: &str, group: &str) -> Contributions;

    /// Returns whether `(point, group)` already has a snapshot.
    fn has_collected(&self, point: &str, group: &str) -> bool;
}

/// Cloneable handle to the process registry.
#[derive(Clone, Default)]
pub struct ExtensionContext {
    registry: Rc<RefCell<ExtensionRegistry>>,
}

impl ExtensionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_registry(registry: ExtensionRegistry) -> Self {
        Self {
            registry: Rc::new(RefCell::new(registry)),
        }
    }

    pub fn declare_extension_point(
        &self,
        name: &str,
        callback: SharedProvider,
    ) -> Result<Declaration, RegistryError> {
        self.registry
            .borrow_mut()
            .declare_extension_point(name, callback)
    }

    pub fn register_provider(
        &self,
        name: &str,
        provider: SharedProvider,
    ) -> Result<usize, RegistryError> {
        self.registry.borrow_mut().register_provider(name, provider)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.registry.borrow().is_declared(name)
    }

    pub fn extension_points(&self) -> Vec<String> {
        self.registry.borrow().extension_points()
    }

    pub fn provider_count(&self, name: &str) -> usize {
        self.registry.borrow().provider_count(name)
    }

    /// Returns whether both handles point at the same registry.
    pub fn same_registry(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.registry, &other.registry)
    }
}

impl ContributionSource for ExtensionContext {
    fn collect(&self, point: &str, group: &str, args: &[Value]) {
        let plan = self.registry.borrow().collection_plan(point);
        let Some(plan) = plan else {
            return;
        };
        let contributions = run_collection(&plan, group, args);
        self.registry
            .borrow_mut()
            .store_snapshot(plan.point, group, contributions);
    }

    fn contributions_for(&self, point: &str, group: &str) -> Contributions {
        self.registry.borrow().contributions_for(point, group)
    }

    fn has_collected(&self, point: &str, group: &str) -> bool {
        self.registry.borrow().has_collected(point, group)
    }
}
