//! Core extension registry for the mod manager host.
//! Plugins, UI regions and the host share one registry through this crate.

pub mod extension;
pub mod logging;

pub use extension::binder::{
    BindOptions, Binder, Component, ExtendedComponent, ExtensibleProps, RenderProps,
    StaticElements, DEFAULT_GROUP_PROP, STATIC_ELEMENTS_PROP,
};
pub use extension::context::{ContributionSource, ExtensionContext};
pub use extension::manifest::{ExtensionManifest, ManifestValidationError};
pub use extension::plugin::{ExtensionPlugin, LoadReport, PluginError, PluginLoader, PluginRegistrar};
pub use extension::point::{ExtensionPointName, PointNameError};
pub use extension::provider::{
    infallible_provider, provider_fn, Contribution, ContributionProvider, ProviderError,
    ProviderResult, SharedProvider,
};
pub use extension::registry::{Contributions, Declaration, ExtensionRegistry, RegistryError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
