//! # cmx-matrix — Fact Matrix Providers
//!
//! A fact matrix is the ordered list of platforms a module claims to
//! support, each with the facts a compiler needs to evaluate the module
//! for that platform.
//!
//! ## Providers
//!
//! - [`StaticMatrix`] — an in-memory table, in declaration order.
//! - [`FileMatrix`] — a YAML or JSON matrix file loaded once.
//! - [`SupportedOsMatrix`] — derived from a module's `metadata.json`
//!   `operatingsystem_support` list, with generated platform facts.
//! - [`FilteredMatrix`] — include/exclude filters and extra facts layered
//!   over any other provider.
//!
//! ## Contract
//!
//! `entries()` is finite, deterministic (declaration order), and
//! restartable: calling it repeatedly yields the same sequence without side
//! effects. An empty matrix is an empty sequence, never an error at this
//! layer; whether zero coverage is acceptable is the caller's decision.

pub mod file;
pub mod filter;
pub mod static_matrix;
pub mod supported_os;

pub use file::FileMatrix;
pub use filter::{FilteredMatrix, MatrixFilter};
pub use static_matrix::StaticMatrix;
pub use supported_os::{os_family, SupportedOsMatrix, DEFAULT_ARCHITECTURE};

use cmx_core::OsEntry;

/// Supplies the ordered set of platforms to evaluate.
pub trait FactMatrixProvider: Send + Sync {
    /// All entries, in declaration order.
    fn entries(&self) -> Vec<OsEntry>;

    /// Human-readable description of where the matrix comes from, recorded
    /// in reports.
    fn describe(&self) -> String;
}

impl<P: FactMatrixProvider + ?Sized> FactMatrixProvider for Box<P> {
    fn entries(&self) -> Vec<OsEntry> {
        (**self).entries()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<P: FactMatrixProvider + ?Sized> FactMatrixProvider for std::sync::Arc<P> {
    fn entries(&self) -> Vec<OsEntry> {
        (**self).entries()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
