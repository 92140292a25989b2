//! Extension point registry and component binding.
//!
//! Plugins contribute providers to named extension points; UI regions mounted
//! with a group key receive the merged contributions for their group. The
//! registry is created once by the host and injected through
//! [`context::ExtensionContext`].

pub mod binder;
pub mod context;
pub mod manifest;
pub mod plugin;
pub mod point;
pub mod provider;
pub mod registry;
