//! Named assertions and their recorded outcomes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use cmx_core::{CompiledCatalog, ModuleName};

use crate::engine::check;
use crate::predicate::Predicate;

/// A predicate with a human-readable name, as written in run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    /// Display name. Empty means "use the predicate description".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// The predicate to evaluate.
    pub predicate: Predicate,
}

impl Assertion {
    /// A named assertion. An empty name reports the predicate's description.
    pub fn new(name: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }

    /// The default assertion for a module: its own class is in the catalog.
    pub fn contains_class(module: &ModuleName) -> Self {
        Self::new(
            format!("contains class {module}"),
            Predicate::contains_class(module.as_str()),
        )
    }

    /// The name shown in reports.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.predicate.describe()
        } else {
            self.name.clone()
        }
    }
}

/// The recorded result of one assertion against one catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionOutcome {
    /// The assertion's label.
    pub name: String,
    /// Whether the predicate held.
    pub pass: bool,
    /// What was found, or what was expected and missing.
    pub message: String,
}

/// Evaluate every assertion against `catalog`, in order.
pub fn evaluate(catalog: &CompiledCatalog, assertions: &[Assertion]) -> Vec<AssertionOutcome> {
    assertions
        .iter()
        .map(|assertion| {
            let result = check(catalog, &assertion.predicate);
            if !result.pass {
                tracing::debug!(
                    catalog = %catalog.name,
                    assertion = %assertion.label(),
                    message = %result.message,
                    "assertion failed"
                );
            }
            AssertionOutcome {
                name: assertion.label(),
                pass: result.pass,
                message: result.message,
            }
        })
        .collect()
}

/// Decode raw predicate values. Never fails; undecodable entries come back
/// as [`Predicate::Malformed`].
pub fn parse_predicates(values: &[Value]) -> Vec<Predicate> {
    values.iter().map(Predicate::from_value).collect()
}
