//! # Facts — Platform Descriptions
//!
//! A [`FactSet`] describes one target platform (OS family, release,
//! architecture, ...). An [`OsEntry`] pairs a fact set with the identifier
//! of the platform it describes; the fact matrix is an ordered list of
//! entries.
//!
//! ## Invariants
//!
//! - A `FactSet` is immutable once constructed. Merging produces a new set.
//! - Fact names are kept sorted, so the canonical JSON form (and therefore
//!   the fingerprint) does not depend on declaration order.
//! - A `null` fact decodes as an absent fact.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::identity::OsId;

/// A scalar fact value.
///
/// Variants are tried in declaration order when decoding, so `4` is an
/// `Integer` and `3832.38` a `Float`. An unquoted YAML release such as
/// `20.04` therefore arrives as a float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    /// Boolean fact, e.g. `is_virtual`.
    Bool(bool),
    /// Integer fact, e.g. `processorcount`.
    Integer(i64),
    /// Floating-point fact, e.g. `memorysize_mb`.
    Float(f64),
    /// String fact, e.g. `osfamily`.
    String(String),
}

impl FactValue {
    /// The value as a string slice, if it is a string fact.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            // Finite floats use serde_json's shortest round-trip form.
            // NaN and infinities have no JSON number; they hash as strings.
            Self::Float(x) => serde_json::Number::from_f64(*x)
                .map_or_else(|| Value::String(x.to_string()), Value::Number),
            Self::String(s) => Value::String(s.clone()),
        }
    }
}

impl std::fmt::Display for FactValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FactValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FactValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for FactValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for FactValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for FactValue {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for FactValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

/// Hex SHA-256 of a fact set's canonical JSON encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactFingerprint(String);

impl FactFingerprint {
    /// Access the lowercase hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for human-readable listings.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for FactFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable mapping from fact name to value for one platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FactSet(BTreeMap<String, FactValue>);

impl<'de> Deserialize<'de> for FactSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Option<FactValue>>::deserialize(deserializer)?;
        Ok(FactSet(
            raw.into_iter()
                .filter_map(|(name, value)| value.map(|v| (name, v)))
                .collect(),
        ))
    }
}

impl FactSet {
    /// Start building a fact set.
    pub fn builder() -> FactSetBuilder {
        FactSetBuilder::default()
    }

    /// Look up a fact.
    pub fn get(&self, name: &str) -> Option<&FactValue> {
        self.0.get(name)
    }

    /// Look up a string fact.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FactValue::as_str)
    }

    /// Number of facts.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no facts.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over facts in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FactValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Return a new fact set with `overrides` layered on top. Facts present
    /// in both take the override value.
    pub fn merged(&self, overrides: &FactSet) -> FactSet {
        let mut facts = self.0.clone();
        facts.extend(overrides.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        FactSet(facts)
    }

    /// The fact set as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// SHA-256 over the compact, key-sorted JSON encoding.
    pub fn fingerprint(&self) -> FactFingerprint {
        let canonical = self.to_json().to_string();
        let hash = Sha256::digest(canonical.as_bytes());
        FactFingerprint(hash.iter().map(|b| format!("{b:02x}")).collect())
    }
}

impl<K: Into<String>, V: Into<FactValue>> FromIterator<(K, V)> for FactSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        FactSet(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Builder for [`FactSet`].
#[derive(Debug, Default)]
pub struct FactSetBuilder {
    facts: BTreeMap<String, FactValue>,
}

impl FactSetBuilder {
    /// Add or replace a fact.
    pub fn fact(mut self, name: impl Into<String>, value: impl Into<FactValue>) -> Self {
        self.facts.insert(name.into(), value.into());
        self
    }

    /// Finish building.
    pub fn build(self) -> FactSet {
        FactSet(self.facts)
    }
}

/// One row of the fact matrix: a platform identifier and its facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsEntry {
    /// Platform identifier; the identity of the entry.
    pub os: OsId,
    /// Facts describing the platform.
    #[serde(default)]
    pub facts: FactSet,
}

impl OsEntry {
    /// Create a matrix entry.
    pub fn new(os: OsId, facts: FactSet) -> Self {
        Self { os, facts }
    }
}
