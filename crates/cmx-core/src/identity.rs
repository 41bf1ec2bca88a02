//! # Identity Newtypes
//!
//! Validated wrappers for the identifiers the harness passes between
//! crates. You cannot hand a module name where an OS identifier is
//! expected, and neither can be constructed empty.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Identifier of a supported platform in the fact matrix, such as
/// `centos-7-x86_64` or `ubuntu-20.04`.
///
/// Identity of an [`OsEntry`](crate::OsEntry) is its `OsId`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OsId(String);

impl OsId {
    /// Create an OS identifier. Rejects empty identifiers and identifiers
    /// containing whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, ConfigurationError> {
        let id = id.into();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(ConfigurationError::InvalidOsId(id));
        }
        Ok(Self(id))
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OsId {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OsId> for String {
    fn from(id: OsId) -> Self {
        id.0
    }
}

impl std::fmt::Display for OsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of the configuration module under test, such as `tensor` or
/// `tensor::config`.
///
/// Format: one or more `::`-separated segments, each starting with a
/// lowercase ASCII letter followed by lowercase letters, digits, or `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleName(String);

impl ModuleName {
    /// Create a module name, validating its segment format.
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if name.split("::").all(is_valid_segment) {
            Ok(Self(name))
        } else {
            Err(ConfigurationError::InvalidModuleName(name))
        }
    }

    /// Access the module name string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl TryFrom<String> for ModuleName {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ModuleName> for String {
    fn from(name: ModuleName) -> Self {
        name.0
    }
}

impl std::fmt::Display for ModuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
