//! # Static Matrix
//!
//! In-memory fact matrix. Useful for matrices defined in code and as the
//! storage behind [`FileMatrix`](crate::FileMatrix).

use std::collections::HashSet;

use cmx_core::{ConfigurationError, OsEntry};

use crate::FactMatrixProvider;

/// A fixed, ordered list of matrix entries.
#[derive(Debug, Clone, Default)]
pub struct StaticMatrix {
    entries: Vec<OsEntry>,
    label: String,
}

impl StaticMatrix {
    /// Create a matrix from entries in declaration order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::DuplicateEntry` if two entries share an
    /// OS identifier.
    pub fn new(entries: Vec<OsEntry>) -> Result<Self, ConfigurationError> {
        Self::labelled("static", entries)
    }

    /// Create a matrix with a description used in reports.
    pub fn labelled(
        label: impl Into<String>,
        entries: Vec<OsEntry>,
    ) -> Result<Self, ConfigurationError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.os.as_str()) {
                return Err(ConfigurationError::DuplicateEntry(entry.os.to_string()));
            }
        }
        Ok(Self {
            entries,
            label: label.into(),
        })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the matrix has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FactMatrixProvider for StaticMatrix {
    fn entries(&self) -> Vec<OsEntry> {
        self.entries.clone()
    }

    fn describe(&self) -> String {
        format!("{} ({} entries)", self.label, self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmx_core::{FactSet, OsId};

    fn entry(os: &str, family: &str) -> OsEntry {
        OsEntry::new(
            OsId::new(os).unwrap(),
            [("osfamily", family)].into_iter().collect::<FactSet>(),
        )
    }

    #[test]
    fn preserves_declaration_order() {
        let matrix = StaticMatrix::new(vec![
            entry("ubuntu-20.04", "Debian"),
            entry("centos-7", "RedHat"),
        ])
        .unwrap();
        let ids: Vec<_> = matrix.entries().into_iter().map(|e| e.os.to_string()).collect();
        assert_eq!(ids, ["ubuntu-20.04", "centos-7"]);
    }

    #[test]
    fn is_restartable() {
        let matrix = StaticMatrix::new(vec![entry("centos-7", "RedHat")]).unwrap();
        assert_eq!(matrix.entries(), matrix.entries());
    }

    #[test]
    fn empty_matrix_is_not_an_error() {
        let matrix = StaticMatrix::new(Vec::new()).unwrap();
        assert!(matrix.entries().is_empty());
        assert!(matrix.is_empty());
    }

    #[test]
    fn rejects_duplicate_os_ids() {
        let result = StaticMatrix::new(vec![
            entry("centos-7", "RedHat"),
            entry("centos-7", "Debian"),
        ]);
        assert_eq!(
            result.unwrap_err(),
            ConfigurationError::DuplicateEntry("centos-7".into())
        );
    }

    #[test]
    fn describe_includes_label_and_size() {
        let matrix = StaticMatrix::labelled("inline", vec![entry("centos-7", "RedHat")]).unwrap();
        assert_eq!(matrix.describe(), "inline (1 entries)");
    }
}
