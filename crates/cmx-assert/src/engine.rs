//! # Predicate Evaluation
//!
//! [`check`] evaluates a [`Predicate`] against a catalog. Failures carry a
//! diagnostic that explains the mismatch in terms of what the catalog
//! actually contains.

use serde::{Deserialize, Serialize};

use cmx_core::{normalize_type_name, CompiledCatalog, ResourceRef};

use crate::predicate::Predicate;

/// How many titles a "not found" diagnostic lists before truncating.
const LISTED_TITLES: usize = 5;

/// Result of evaluating one predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionResult {
    /// Whether the predicate holds.
    pub pass: bool,
    /// Explanation of the result.
    pub message: String,
}

impl AssertionResult {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            pass: true,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            pass: false,
            message: message.into(),
        }
    }
}

/// Evaluate `predicate` against `catalog`.
pub fn check(catalog: &CompiledCatalog, predicate: &Predicate) -> AssertionResult {
    match predicate {
        Predicate::ContainsResource { type_name, title } => {
            contains(catalog, &ResourceRef::new(type_name, title))
        }
        Predicate::ContainsClass { class } => contains(catalog, &ResourceRef::class(class)),
        Predicate::HasParameter {
            type_name,
            title,
            parameter,
            value,
        } => {
            let reference = ResourceRef::new(type_name, title);
            let Some(resource) = catalog.resource(&reference) else {
                return AssertionResult::fail(format!(
                    "expected {reference} with {parameter} = {value}, but {reference} is not in the catalog"
                ));
            };
            match resource.parameters.get(parameter) {
                Some(actual) if actual == value => {
                    AssertionResult::pass(format!("{reference} has {parameter} = {value}"))
                }
                Some(actual) => AssertionResult::fail(format!(
                    "{reference} parameter '{parameter}': expected {value}, got {actual}"
                )),
                None => AssertionResult::fail(format!(
                    "{reference} has no parameter '{parameter}' (expected {value})"
                )),
            }
        }
        Predicate::ResourceCount {
            type_name,
            min,
            max,
        } => {
            let type_name = normalize_type_name(type_name);
            let count = catalog.resources_of_type(&type_name).count();
            let below = min.is_some_and(|m| count < m);
            let above = max.is_some_and(|m| count > m);
            let message = format!("{count} {type_name} resources ({})", predicate.describe());
            if below || above {
                AssertionResult::fail(message)
            } else {
                AssertionResult::pass(message)
            }
        }
        Predicate::HasEdge { source, target } => {
            if catalog.has_edge(source, target) {
                AssertionResult::pass(format!("edge {source} -> {target} present"))
            } else {
                let outgoing: Vec<String> = catalog
                    .edges
                    .iter()
                    .filter(|e| &e.source == source)
                    .map(|e| e.target.to_string())
                    .collect();
                AssertionResult::fail(format!(
                    "expected edge {source} -> {target}; {source} has edges to [{}]",
                    outgoing.join(", ")
                ))
            }
        }
        Predicate::All { predicates } => {
            let failures: Vec<String> = predicates
                .iter()
                .map(|p| check(catalog, p))
                .filter(|r| !r.pass)
                .map(|r| r.message)
                .collect();
            if failures.is_empty() {
                AssertionResult::pass(format!("all {} predicates hold", predicates.len()))
            } else {
                AssertionResult::fail(failures.join("; "))
            }
        }
        Predicate::Any { predicates } => {
            // A passing sibling must not hide a malformed alternative.
            let malformed: Vec<String> = predicates
                .iter()
                .filter(|p| p.is_malformed())
                .map(|p| check(catalog, p).message)
                .collect();
            if !malformed.is_empty() {
                return AssertionResult::fail(malformed.join("; "));
            }
            let results: Vec<AssertionResult> =
                predicates.iter().map(|p| check(catalog, p)).collect();
            match results.iter().find(|r| r.pass) {
                Some(hit) => AssertionResult::pass(hit.message.clone()),
                None if results.is_empty() => {
                    AssertionResult::fail("any() with no predicates never holds")
                }
                None => AssertionResult::fail(format!(
                    "none of {} alternatives hold: {}",
                    results.len(),
                    results
                        .iter()
                        .map(|r| r.message.as_str())
                        .collect::<Vec<_>>()
                        .join("; ")
                )),
            }
        }
        Predicate::Not { predicate: inner } => {
            if inner.is_malformed() {
                // Negation must not turn a malformed predicate into a pass.
                return AssertionResult::fail(check(catalog, inner).message);
            }
            let result = check(catalog, inner);
            if result.pass {
                AssertionResult::fail(format!("expected not: {}", result.message))
            } else {
                AssertionResult::pass(format!("as expected, {}", result.message))
            }
        }
        Predicate::Malformed { raw, reason } => {
            AssertionResult::fail(format!("malformed predicate: {reason} (input: {raw})"))
        }
    }
}

fn contains(catalog: &CompiledCatalog, reference: &ResourceRef) -> AssertionResult {
    if catalog.contains(reference) {
        return AssertionResult::pass(format!("{reference} present"));
    }
    let titles: Vec<String> = catalog
        .resources_of_type(reference.type_name())
        .map(|r| r.reference().title().to_string())
        .collect();
    let listed = if titles.is_empty() {
        "none".to_string()
    } else if titles.len() > LISTED_TITLES {
        format!(
            "{}, ... ({} total)",
            titles[..LISTED_TITLES].join(", "),
            titles.len()
        )
    } else {
        titles.join(", ")
    };
    AssertionResult::fail(format!(
        "expected {reference} in catalog; {} resources present: {listed}",
        reference.type_name()
    ))
}
