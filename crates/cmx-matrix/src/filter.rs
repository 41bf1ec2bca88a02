//! # Matrix Filtering
//!
//! Narrows a matrix to a subset of platforms and layers extra facts onto
//! every entry. Filters are OS-id prefixes: `centos` keeps `centos-6-x86_64`
//! and `centos-7-x86_64`.

use cmx_core::{FactSet, OsEntry};

use crate::FactMatrixProvider;

/// Include/exclude prefixes and facts merged into every entry.
#[derive(Debug, Clone, Default)]
pub struct MatrixFilter {
    /// Keep only entries whose OS id starts with one of these. Empty keeps all.
    pub include: Vec<String>,
    /// Drop entries whose OS id starts with one of these.
    pub exclude: Vec<String>,
    /// Facts added to every entry; they override facts of the same name.
    pub extra_facts: FactSet,
}

impl MatrixFilter {
    /// Whether an OS id passes the include/exclude prefixes.
    pub fn matches(&self, os: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| os.starts_with(p));
        included && !self.exclude.iter().any(|p| os.starts_with(p))
    }

    /// Whether the filter changes nothing.
    pub fn is_identity(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty() && self.extra_facts.is_empty()
    }
}

/// A provider with a [`MatrixFilter`] applied.
#[derive(Debug, Clone)]
pub struct FilteredMatrix<P> {
    inner: P,
    filter: MatrixFilter,
}

impl<P: FactMatrixProvider> FilteredMatrix<P> {
    /// Wrap a provider.
    pub fn new(inner: P, filter: MatrixFilter) -> Self {
        Self { inner, filter }
    }
}

impl<P: FactMatrixProvider> FactMatrixProvider for FilteredMatrix<P> {
    fn entries(&self) -> Vec<OsEntry> {
        self.inner
            .entries()
            .into_iter()
            .filter(|entry| self.filter.matches(entry.os.as_str()))
            .map(|entry| {
                if self.filter.extra_facts.is_empty() {
                    entry
                } else {
                    let facts = entry.facts.merged(&self.filter.extra_facts);
                    OsEntry::new(entry.os, facts)
                }
            })
            .collect()
    }

    fn describe(&self) -> String {
        if self.filter.is_identity() {
            return self.inner.describe();
        }
        let mut parts = Vec::new();
        if !self.filter.include.is_empty() {
            parts.push(format!("include={}", self.filter.include.join(",")));
        }
        if !self.filter.exclude.is_empty() {
            parts.push(format!("exclude={}", self.filter.exclude.join(",")));
        }
        if !self.filter.extra_facts.is_empty() {
            parts.push(format!("extra_facts={}", self.filter.extra_facts.len()));
        }
        format!("{} [{}]", self.inner.describe(), parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticMatrix;
    use cmx_core::OsId;

    fn matrix() -> StaticMatrix {
        let entry = |os: &str, family: &str| {
            OsEntry::new(
                OsId::new(os).unwrap(),
                [("osfamily", family)].into_iter().collect(),
            )
        };
        StaticMatrix::new(vec![
            entry("centos-6-x86_64", "RedHat"),
            entry("centos-7-x86_64", "RedHat"),
            entry("ubuntu-14.04-x86_64", "Debian"),
            entry("debian-8-x86_64", "Debian"),
        ])
        .unwrap()
    }

    fn ids(provider: &impl FactMatrixProvider) -> Vec<String> {
        provider.entries().into_iter().map(|e| e.os.to_string()).collect()
    }

    #[test]
    fn identity_filter_keeps_everything() {
        let filtered = FilteredMatrix::new(matrix(), MatrixFilter::default());
        assert_eq!(ids(&filtered), ids(&matrix()));
        assert_eq!(filtered.describe(), matrix().describe());
    }

    #[test]
    fn include_and_exclude_prefixes() {
        let filter = MatrixFilter {
            include: vec!["centos".into(), "ubuntu".into()],
            exclude: vec!["centos-6".into()],
            ..MatrixFilter::default()
        };
        let filtered = FilteredMatrix::new(matrix(), filter);
        assert_eq!(ids(&filtered), ["centos-7-x86_64", "ubuntu-14.04-x86_64"]);
        assert!(filtered.describe().contains("include=centos,ubuntu"));
    }

    #[test]
    fn extra_facts_override_entry_facts() {
        let filter = MatrixFilter {
            extra_facts: [("osfamily", "Override"), ("concat_basedir", "/tmp")]
                .into_iter()
                .collect(),
            ..MatrixFilter::default()
        };
        let filtered = FilteredMatrix::new(matrix(), filter);
        for entry in filtered.entries() {
            assert_eq!(entry.facts.get_str("osfamily"), Some("Override"));
            assert_eq!(entry.facts.get_str("concat_basedir"), Some("/tmp"));
        }
    }

    #[test]
    fn filter_can_empty_the_matrix() {
        let filter = MatrixFilter {
            include: vec!["windows".into()],
            ..MatrixFilter::default()
        };
        assert!(FilteredMatrix::new(matrix(), filter).entries().is_empty());
    }
}
