//! Contribution provider contracts.
//!
//! A provider turns one `(group, args)` request into zero or one
//! contribution. Providers are plain in-process objects; closures are adapted
//! through [`provider_fn`].

use serde_json::Value;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// Dynamic contribution value produced by a provider.
pub type Contribution = Value;

/// Result type for one provider invocation.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Contract implemented by plugin-supplied contribution providers.
pub trait ContributionProvider {
    /// Stable id used in diagnostics, e.g. `mods.nexus/registerDashlet`.
    fn provider_id(&self) -> &str;

    /// Produces the contribution for `group`, or `None` to contribute nothing.
    fn provide(&self, group: &str, args: &[Value]) -> ProviderResult<Option<Contribution>>;
}

/// Shared provider handle stored by the registry.
pub type SharedProvider = Rc<dyn ContributionProvider>;

/// Provider failure reported back to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub provider_id: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            message: message.into(),
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "provider `{}` failed: {}", self.provider_id, self.message)
    }
}

impl Error for ProviderError {}

/// Closure-backed provider.
pub struct FnProvider<F> {
    provider_id: String,
    func: F,
}

impl<F> Debug for FnProvider<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProvider")
            .field("provider_id", &self.provider_id)
            .finish_non_exhaustive()
    }
}

impl<F> ContributionProvider for FnProvider<F>
where
    F: Fn(&str, &[Value]) -> ProviderResult<Option<Contribution>>,
{
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn provide(&self, group: &str, args: &[Value]) -> ProviderResult<Option<Contribution>> {
        (self.func)(group, args)
    }
}

/// Wraps a fallible closure as a shared provider.
pub fn provider_fn<F>(provider_id: impl Into<String>, func: F) -> SharedProvider
where
    F: Fn(&str, &[Value]) -> ProviderResult<Option<Contribution>> + 'static,
{
    Rc::new(FnProvider {
        provider_id: provider_id.into(),
        func,
    })
}

/// Wraps an infallible closure as a shared provider.
pub fn infallible_provider<F>(provider_id: impl Into<String>, func: F) -> SharedProvider
where
    F: Fn(&str, &[Value]) -> Option<Contribution> + 'static,
{
    provider_fn(provider_id, move |group, args| Ok(func(group, args)))
}
