//! # cmx-runner — Matrix Runner
//!
//! Drives one module across every entry of a fact matrix:
//!
//! 1. pull the entries from a [`FactMatrixProvider`](cmx_matrix::FactMatrixProvider),
//! 2. compile the module for each entry through a
//!    [`CatalogCompiler`](cmx_compiler::CatalogCompiler), under a deadline,
//! 3. evaluate the configured assertions against each catalog,
//! 4. aggregate the outcomes into a [`MatrixReport`] in declaration order.
//!
//! Each entry moves through the [`EntryState`] machine and ends in exactly
//! one terminal state. A run never aborts because of one entry: failures,
//! timeouts, and panics are recorded and the remaining entries continue.
//!
//! ## Metrics
//!
//! Emitted through the `metrics` facade; nothing is recorded unless the
//! embedding process installs a recorder.
//!
//! - `cmx_entries_total{state}` — entries per terminal state.
//! - `cmx_compile_duration_seconds` — time spent in the compiler per entry.

pub mod cancel;
pub mod report;
pub mod runner;
pub mod state;

pub use cancel::CancelToken;
pub use report::{EntryReport, MatrixReport, Summary};
pub use runner::{default_concurrency, MatrixRunner, RunnerConfig, DEFAULT_TIMEOUT};
pub use state::EntryState;
