//! # cmx-assert — Assertion Engine
//!
//! Evaluates predicates against a [`CompiledCatalog`](cmx_core::CompiledCatalog).
//!
//! - **Predicates** (`predicate.rs`): the composable predicate language.
//!   The base predicate is "catalog contains resource `Type[title]`";
//!   `contains_class` is sugar for `contains_resource Class[name]`.
//!
//! - **Engine** (`engine.rs`): [`check`] evaluates one predicate and
//!   returns pass/fail with a diagnostic.
//!
//! - **Assertions** (`assertion.rs`): named predicates and their outcomes,
//!   as configured for a run and recorded in reports.
//!
//! ## Fail-Closed Invariant
//!
//! A predicate that cannot be decoded (unknown kind, missing field, bad
//! resource reference) becomes [`Predicate::Malformed`] instead of a
//! decode error. Evaluating it always fails with the decode reason as its
//! diagnostic, so one bad assertion never aborts a matrix run. Neither
//! `any` nor `not` can turn a malformed child into a pass.
//!
//! Evaluation is pure: it borrows the catalog immutably and depends on
//! nothing else, so the same predicate over the same catalog always
//! yields the same result.

pub mod assertion;
pub mod engine;
pub mod predicate;

pub use assertion::{evaluate, parse_predicates, Assertion, AssertionOutcome};
pub use engine::{check, AssertionResult};
pub use predicate::Predicate;
