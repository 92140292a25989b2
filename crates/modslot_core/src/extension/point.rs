//! Extension point names.
//!
//! # Invariants
//! - A point name is a non-empty camelCase or dotted identifier, e.g.
//!   `registerDashlet` or `settings.page`.
//! - Names are compared after trimming surrounding whitespace.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Borrow;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MAX_POINT_NAME_CHARS: usize = 96;

static POINT_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)*$").expect("valid point name regex")
});

/// Validated name of one extension point.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExtensionPointName(String);

impl ExtensionPointName {
    /// Parses and validates one point name.
    pub fn parse(raw: &str) -> Result<Self, PointNameError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PointNameError::Empty);
        }
        if trimmed.chars().count() > MAX_POINT_NAME_CHARS {
            return Err(PointNameError::TooLong(trimmed.to_string()));
        }
        if !POINT_NAME_RE.is_match(trimmed) {
            return Err(PointNameError::Invalid(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ExtensionPointName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ExtensionPointName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ExtensionPointName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Point name validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointNameError {
    Empty,
    TooLong(String),
    Invalid(String),
}

impl Display for PointNameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "extension point name must not be empty"),
            Self::TooLong(value) => write!(
                f,
                "extension point name exceeds {MAX_POINT_NAME_CHARS} chars: {value}"
            ),
            Self::Invalid(value) => write!(f, "extension point name is invalid: {value}"),
        }
    }
}

impl Error for PointNameError {}
