//! # Error Types — Structured Error Hierarchy
//!
//! Defines the error taxonomy used throughout the harness. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Compilation errors are per-entry. They are recorded in the report and
//!   never abort the run.
//! - Configuration errors are global. They are raised while the harness is
//!   being set up, before any entry executes.
//! - State machine errors include the current state and the attempted
//!   target state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::facts::FactSet;
use crate::identity::{ModuleName, OsId};

/// Top-level error type for the harness.
#[derive(Error, Debug)]
pub enum CmxError {
    /// Harness setup failed.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A module failed to compile for one entry.
    #[error("compilation error: {0}")]
    Compilation(#[from] CompilationError),

    /// Entry state machine transition rejected.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while setting up a run. Any of these aborts the run
/// before the first entry executes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The matrix produced no entries and coverage is required.
    #[error("fact matrix is empty: no platforms to evaluate")]
    EmptyMatrix,

    /// Two matrix entries share an OS identifier.
    #[error("duplicate matrix entry for OS '{0}'")]
    DuplicateEntry(String),

    /// OS identifier is empty or contains whitespace.
    #[error("invalid OS identifier '{0}'")]
    InvalidOsId(String),

    /// Module name does not follow `name(::name)*` form.
    #[error("invalid module name '{0}'")]
    InvalidModuleName(String),

    /// A module parameter is malformed.
    #[error("invalid module parameter '{name}': {reason}")]
    InvalidParameter {
        /// The offending parameter name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Concurrency limit of zero.
    #[error("concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    /// A matrix or metadata source could not be read or parsed.
    #[error("cannot load matrix source {path}: {reason}")]
    MatrixSource {
        /// Path of the source file.
        path: String,
        /// Underlying read or parse failure.
        reason: String,
    },

    /// Harness configuration file is unusable.
    #[error("invalid harness configuration: {0}")]
    Invalid(String),
}

/// Why a module could not be compiled for an entry.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompilationFailure {
    /// The compiler did not answer within the deadline.
    #[error("timed out after {after_ms} ms")]
    Timeout {
        /// Deadline that was exceeded, in milliseconds.
        after_ms: u64,
    },

    /// The module cannot be resolved against these facts (unsupported OS,
    /// missing dependency, type-check failure).
    #[error("module unresolved: {message}")]
    Unresolved {
        /// Compiler-provided explanation.
        message: String,
    },

    /// The external toolchain exited unsuccessfully.
    #[error("toolchain exited with {}: {stderr}", exit_status(.exit_code))]
    Toolchain {
        /// Process exit status, if the process exited normally.
        exit_code: Option<i32>,
        /// Trailing stderr output.
        stderr: String,
    },

    /// The toolchain produced output that is not a catalog.
    #[error("invalid catalog output: {message}")]
    InvalidCatalog {
        /// Parse failure detail.
        message: String,
    },

    /// The toolchain could not be started.
    #[error("cannot start toolchain: {message}")]
    Spawn {
        /// Spawn failure detail.
        message: String,
    },

    /// The compilation was abandoned because the run was cancelled.
    #[error("cancelled")]
    Cancelled,
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "signal".to_string(),
    }
}

impl CompilationFailure {
    /// Whether this failure is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// A module failed to compile for one matrix entry.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("failed to compile {module} for {os}: {reason}")]
pub struct CompilationError {
    /// What went wrong.
    pub reason: CompilationFailure,
    /// The module being compiled.
    pub module: ModuleName,
    /// The platform it was compiled for.
    pub os: OsId,
    /// The facts the compilation ran against.
    pub facts: FactSet,
}

impl CompilationError {
    /// Create a compilation error for an entry.
    pub fn new(reason: CompilationFailure, module: ModuleName, os: OsId, facts: FactSet) -> Self {
        Self {
            reason,
            module,
            os,
            facts,
        }
    }
}

/// Error in entry state machine transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Attempted an invalid state transition.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current state name.
        from: String,
        /// Attempted target state name.
        to: String,
    },
}
