//! # cmx-core — Foundational Types for the Compliance Harness
//!
//! Defines the data model shared by every other `cmx-*` crate: fact sets,
//! OS matrix entries, module invocations, compiled catalogs, and the
//! structured error hierarchy.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `OsId` and `ModuleName` have
//!    validated constructors. No bare strings cross crate boundaries as
//!    identifiers.
//!
//! 2. **Immutable fact sets.** A `FactSet` is built once (builder,
//!    `FromIterator`, or serde) and exposes no mutating accessor.
//!
//! 3. **Catalog-compiler naming rules.** `ResourceRef` normalizes type
//!    names (and class titles) the way catalog compilers do, so
//!    `Class[tensor]` and `Class[Tensor]` identify the same resource.
//!
//! 4. **Fingerprints.** Every fact set has a SHA-256 fingerprint over its
//!    canonical JSON form, recorded in reports for reproducibility.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `cmx-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod catalog;
pub mod error;
pub mod facts;
pub mod identity;
pub mod invocation;

// Re-export primary types for ergonomic imports.
pub use catalog::{
    normalize_type_name, CompiledCatalog, Edge, Resource, ResourceRef, ResourceRefParseError,
};
pub use error::{CmxError, CompilationError, CompilationFailure, ConfigurationError, StateError};
pub use facts::{FactFingerprint, FactSet, FactSetBuilder, FactValue, OsEntry};
pub use identity::{ModuleName, OsId};
pub use invocation::{ModuleInvocation, Parameters};
