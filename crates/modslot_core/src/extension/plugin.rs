//! Plugin contract and loader.
//!
//! # Responsibility
//! - Validate plugin manifests and reject duplicate plugin ids.
//! - Let plugins declare extension points and contribute providers.
//!
//! # Invariants
//! - A plugin only contributes to points listed in its manifest.
//! - Registrations are staged and committed only when `register` succeeds, so
//!   a failed plugin leaves no providers behind.
//! - Provider ids are namespaced as `<plugin id>/<point>`.
//! - A panic inside `register` fails that plugin with `PluginError::Init`.

use crate::extension::context::ExtensionContext;
use crate::extension::manifest::{ExtensionManifest, ManifestValidationError};
use crate::extension::point::ExtensionPointName;
use crate::extension::provider::{infallible_provider, Contribution, SharedProvider};
use crate::extension::registry::RegistryError;
use crate::logging::panic_payload_summary;
use log::{info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Contract implemented by every plugin.
pub trait ExtensionPlugin {
    fn manifest(&self) -> &ExtensionManifest;

    /// Declares points and contributes providers through `registrar`.
    fn register(&self, registrar: &mut PluginRegistrar<'_>) -> Result<(), PluginError>;
}

enum StagedRegistration {
    Declare {
        point: ExtensionPointName,
        callback: SharedProvider,
    },
    Contribute {
        point: ExtensionPointName,
        provider: SharedProvider,
    },
}

/// Registration surface handed to one plugin during load.
pub struct PluginRegistrar<'a> {
    manifest: &'a ExtensionManifest,
    staged: Vec<StagedRegistration>,
}

impl<'a> PluginRegistrar<'a> {
    fn new(manifest: &'a ExtensionManifest) -> Self {
        Self {
            manifest,
            staged: Vec::new(),
        }
    }

    pub fn plugin_id(&self) -> &str {
        self.manifest.id.trim()
    }

    /// Declares an extension point owned by this plugin.
    pub fn declare_extension_point<F>(&mut self, point: &str, callback: F) -> Result<(), PluginError>
    where
        F: Fn(&str, &[Value]) -> Option<Contribution> + 'static,
    {
        let point = ExtensionPointName::parse(point)
            .map_err(|err| PluginError::Registry(RegistryError::from(err)))?;
        let callback = infallible_provider(self.provider_id(&point), callback);
        self.staged
            .push(StagedRegistration::Declare { point, callback });
        Ok(())
    }

    /// Contributes a closure provider to `point`.
    pub fn contribute<F>(&mut self, point: &str, func: F) -> Result<(), PluginError>
    where
        F: Fn(&str, &[Value]) -> Option<Contribution> + 'static,
    {
        let point = self.contributed_point(point)?;
        let provider = infallible_provider(self.provider_id(&point), func);
        self.staged
            .push(StagedRegistration::Contribute { point, provider });
        Ok(())
    }

    /// Contributes a prebuilt provider to `point`.
    pub fn contribute_provider(
        &mut self,
        point: &str,
        provider: SharedProvider,
    ) -> Result<(), PluginError> {
        let point = self.contributed_point(point)?;
        self.staged
            .push(StagedRegistration::Contribute { point, provider });
        Ok(())
    }

    fn contributed_point(&self, point: &str) -> Result<ExtensionPointName, PluginError> {
        let parsed = ExtensionPointName::parse(point)
            .map_err(|err| PluginError::Registry(RegistryError::from(err)))?;
        if !self.manifest.contributes_to(parsed.as_str()) {
            return Err(PluginError::UndeclaredContribution {
                plugin_id: self.plugin_id().to_string(),
                point: parsed.to_string(),
            });
        }
        Ok(parsed)
    }

    fn provider_id(&self, point: &ExtensionPointName) -> String {
        format!("{}/{}", self.plugin_id(), point)
    }
}

/// Outcome of a batch load.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Loads plugins into one shared registry.
pub struct PluginLoader {
    context: ExtensionContext,
    loaded: BTreeMap<String, ExtensionManifest>,
}

impl PluginLoader {
    pub fn new(context: ExtensionContext) -> Self {
        Self {
            context,
            loaded: BTreeMap::new(),
        }
    }

    /// Validates and registers one plugin.
    pub fn load(&mut self, plugin: &dyn ExtensionPlugin) -> Result<(), PluginError> {
        let manifest = plugin.manifest();
        manifest.validate().map_err(PluginError::InvalidManifest)?;
        let plugin_id = manifest.id.trim().to_string();
        if self.loaded.contains_key(plugin_id.as_str()) {
            return Err(PluginError::DuplicatePluginId(plugin_id));
        }

        let mut registrar = PluginRegistrar::new(manifest);
        match catch_unwind(AssertUnwindSafe(|| plugin.register(&mut registrar))) {
            Ok(result) => result?,
            Err(payload) => {
                return Err(PluginError::Init {
                    plugin_id,
                    message: panic_payload_summary(payload.as_ref()),
                });
            }
        }
        let staged = registrar.staged;
        let staged_count = staged.len();

        for registration in staged {
            match registration {
                StagedRegistration::Declare { point, callback } => {
                    self.context
                        .declare_extension_point(point.as_str(), callback)
                        .map_err(PluginError::Registry)?;
                }
                StagedRegistration::Contribute { point, provider } => {
                    self.context
                        .register_provider(point.as_str(), provider)
                        .map_err(PluginError::Registry)?;
                }
            }
        }

        info!(
            "event=plugin_load module=plugin status=ok plugin={} version={} registrations={}",
            plugin_id,
            manifest.version.trim(),
            staged_count
        );
        self.loaded.insert(plugin_id, manifest.clone());
        Ok(())
    }

    /// Loads plugins in order, skipping the ones that fail.
    pub fn load_all<'p, I>(&mut self, plugins: I) -> LoadReport
    where
        I: IntoIterator<Item = &'p dyn ExtensionPlugin>,
    {
        let mut report = LoadReport::default();
        for plugin in plugins {
            let plugin_id = plugin.manifest().id.trim().to_string();
            match self.load(plugin) {
                Ok(()) => report.loaded.push(plugin_id),
                Err(err) => {
                    warn!(
                        "event=plugin_load module=plugin status=error plugin={} error={}",
                        plugin_id, err
                    );
                    report.failed.push((plugin_id, err.to_string()));
                }
            }
        }
        report
    }

    pub fn is_loaded(&self, plugin_id: &str) -> bool {
        self.loaded.contains_key(plugin_id.trim())
    }

    /// Returns sorted ids of loaded plugins.
    pub fn loaded_ids(&self) -> Vec<String> {
        self.loaded.keys().cloned().collect()
    }

    pub fn context(&self) -> &ExtensionContext {
        &self.context
    }
}

/// Plugin load errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    InvalidManifest(ManifestValidationError),
    DuplicatePluginId(String),
    UndeclaredContribution { plugin_id: String, point: String },
    Registry(RegistryError),
    Init { plugin_id: String, message: String },
}

impl Display for PluginError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidManifest(err) => write!(f, "invalid plugin manifest: {err}"),
            Self::DuplicatePluginId(value) => write!(f, "plugin id already loaded: {value}"),
            Self::UndeclaredContribution { plugin_id, point } => write!(
                f,
                "plugin `{plugin_id}` contributes to `{point}` without listing it in its manifest"
            ),
            Self::Registry(err) => write!(f, "plugin registration failed: {err}"),
            Self::Init { plugin_id, message } => {
                write!(f, "plugin `{plugin_id}` failed to initialize: {message}")
            }
        }
    }
}

impl Error for PluginError {}
