//! # cmx-cli — Compliance Matrix Harness CLI
//!
//! Provides the `cmx` command-line interface.
//!
//! ## Subcommands
//!
//! - `cmx run` — compile a module for every platform in its fact matrix,
//!   evaluate assertions, and write a report.
//! - `cmx list` — print the resolved fact matrix without compiling.
//!
//! ```bash
//! cmx run --config cmx.yaml
//! cmx run --module tensor --metadata metadata.json --fixture --format text
//! cmx list --metadata metadata.json --include centos
//! ```
//!
//! ## Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0    | every entry passed |
//! | 1    | at least one entry did not pass |
//! | 2    | the harness could not be set up, or the report could not be written |
//! | 130  | the run was interrupted; the partial report is still written |

pub mod config;
pub mod harness;
pub mod list;
pub mod run;

/// Harness setup failed before any entry ran.
pub const EXIT_CONFIGURATION: u8 = 2;

/// The run was interrupted.
pub const EXIT_CANCELLED: u8 = 130;
