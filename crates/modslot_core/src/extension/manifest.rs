//! Plugin manifest declaration and validation.

use crate::extension::point::{ExtensionPointName, PointNameError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Declarative plugin manifest.
///
/// Plugins list every extension point they contribute to; the loader refuses
/// provider registrations for points missing from `contributes`. Plugins that
/// only declare points leave `contributes` empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionManifest {
    /// Stable plugin identifier, e.g. `mods.nexus.integration`.
    pub id: String,
    /// Manifest semantic version string (`major.minor.patch`).
    pub version: String,
    /// Extension point names this plugin contributes to.
    #[serde(default)]
    pub contributes: Vec<String>,
}

impl ExtensionManifest {
    pub fn new(id: impl Into<String>, version: impl Into<String>, contributes: &[&str]) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            contributes: contributes.iter().map(|point| point.to_string()).collect(),
        }
    }

    /// Parses a manifest from JSON text and validates it.
    pub fn from_json(raw: &str) -> Result<Self, ManifestValidationError> {
        let manifest: Self = serde_json::from_str(raw)
            .map_err(|err| ManifestValidationError::Malformed(err.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validates declaration-level manifest invariants.
    pub fn validate(&self) -> Result<(), ManifestValidationError> {
        if self.id.trim().is_empty() {
            return Err(ManifestValidationError::EmptyId);
        }
        if !is_valid_plugin_id(self.id.trim()) {
            return Err(ManifestValidationError::InvalidId(self.id.clone()));
        }

        if self.version.trim().is_empty() {
            return Err(ManifestValidationError::EmptyVersion);
        }
        if !is_semver_triplet(self.version.trim()) {
            return Err(ManifestValidationError::InvalidVersion(
                self.version.clone(),
            ));
        }

        let mut dedup = BTreeSet::new();
        for raw in &self.contributes {
            let point = ExtensionPointName::parse(raw)
                .map_err(ManifestValidationError::InvalidPoint)?;
            if !dedup.insert(point.clone()) {
                return Err(ManifestValidationError::DuplicatePoint(point.to_string()));
            }
        }
        Ok(())
    }

    /// Returns whether this manifest lists `point` under `contributes`.
    pub fn contributes_to(&self, point: &str) -> bool {
        let point = point.trim();
        self.contributes.iter().any(|entry| entry.trim() == point)
    }
}

fn is_valid_plugin_id(value: &str) -> bool {
    let mut chars = value.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
        return false;
    }

    let mut prev_separator = false;
    for c in chars {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            prev_separator = false;
            continue;
        }
        if c == '.' || c == '_' || c == '-' {
            if prev_separator {
                return false;
            }
            prev_separator = true;
            continue;
        }
        return false;
    }
    !prev_separator
}

fn is_semver_triplet(value: &str) -> bool {
    let parts: Vec<&str> = value.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// Manifest validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestValidationError {
    Malformed(String),
    EmptyId,
    InvalidId(String),
    EmptyVersion,
    InvalidVersion(String),
    InvalidPoint(PointNameError),
    DuplicatePoint(String),
}

impl Display for ManifestValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(reason) => write!(f, "manifest is not valid JSON: {reason}"),
            Self::EmptyId => write!(f, "manifest id must not be empty"),
            Self::InvalidId(value) => write!(f, "manifest id is invalid: {value}"),
            Self::EmptyVersion => write!(f, "manifest version must not be empty"),
            Self::InvalidVersion(value) => write!(
                f,
                "manifest version is invalid: {value} (expected major.minor.patch)"
            ),
            Self::InvalidPoint(err) => write!(f, "manifest contributes invalid point: {err}"),
            Self::DuplicatePoint(value) => {
                write!(f, "manifest contributes point twice: {value}")
            }
        }
    }
}

impl Error for ManifestValidationError {}
