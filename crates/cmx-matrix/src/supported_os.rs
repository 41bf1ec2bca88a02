//! # Supported-OS Matrix
//!
//! Derives the fact matrix from the `operatingsystem_support` section of a
//! module's `metadata.json`, the list a module publishes to declare which
//! platforms it supports:
//!
//! ```json
//! {
//!   "name": "calston-tensor",
//!   "operatingsystem_support": [
//!     {"operatingsystem": "CentOS", "operatingsystemrelease": ["6", "7"]},
//!     {"operatingsystem": "Ubuntu", "operatingsystemrelease": ["14.04", "16.04"]}
//!   ]
//! }
//! ```
//!
//! Each (operatingsystem, release) pair becomes one entry named
//! `<os>-<release>-<arch>` (lower-cased, whitespace replaced by `_`) with
//! a generated fact set. An operating system listed without releases yields
//! a single `<os>-<arch>` entry.

use std::path::Path;

use serde::Deserialize;

use cmx_core::{ConfigurationError, FactSet, OsEntry, OsId};

use crate::{FactMatrixProvider, StaticMatrix};

/// Architecture used when none is configured.
pub const DEFAULT_ARCHITECTURE: &str = "x86_64";

/// Map an operating system name to its OS family.
pub fn os_family(operatingsystem: &str) -> &str {
    match operatingsystem {
        "RedHat" | "CentOS" | "Fedora" | "Scientific" | "OracleLinux" | "Amazon"
        | "Rocky" | "AlmaLinux" => "RedHat",
        "Debian" | "Ubuntu" => "Debian",
        "SLES" | "OpenSuSE" => "Suse",
        "Archlinux" => "Archlinux",
        "Gentoo" => "Gentoo",
        "FreeBSD" => "FreeBSD",
        "Windows" => "windows",
        other => other,
    }
}

fn kernel(operatingsystem: &str) -> &'static str {
    match operatingsystem {
        "Windows" => "windows",
        "FreeBSD" => "FreeBSD",
        _ => "Linux",
    }
}

/// Major release as platforms report it: Ubuntu keeps `YY.MM`, everything
/// else is truncated at the first dot.
fn major_release<'a>(operatingsystem: &str, release: &'a str) -> &'a str {
    if operatingsystem == "Ubuntu" {
        release
    } else {
        release.split('.').next().unwrap_or(release)
    }
}

fn id_segment(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

#[derive(Debug, Clone, Deserialize)]
struct SupportedOs {
    operatingsystem: String,
    #[serde(default)]
    operatingsystemrelease: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ModuleMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    operatingsystem_support: Vec<SupportedOs>,
}

/// Matrix generated from module metadata.
#[derive(Debug, Clone)]
pub struct SupportedOsMatrix {
    inner: StaticMatrix,
}

impl SupportedOsMatrix {
    /// Load `metadata.json` and generate entries for `architecture`.
    ///
    /// # Errors
    ///
    /// `ConfigurationError::MatrixSource` if the file cannot be read or is
    /// not valid metadata.
    pub fn load(path: impl AsRef<Path>, architecture: &str) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigurationError::MatrixSource {
                path: label.clone(),
                reason: e.to_string(),
            })?;
        Self::from_json(&label, &content, architecture)
    }

    /// Generate entries from metadata JSON text.
    pub fn from_json(
        label: &str,
        metadata_json: &str,
        architecture: &str,
    ) -> Result<Self, ConfigurationError> {
        let metadata: ModuleMetadata =
            serde_json::from_str(metadata_json).map_err(|e| ConfigurationError::MatrixSource {
                path: label.to_string(),
                reason: e.to_string(),
            })?;

        let mut entries = Vec::new();
        for os in &metadata.operatingsystem_support {
            if os.operatingsystemrelease.is_empty() {
                entries.push(generate_entry(&os.operatingsystem, None, architecture)?);
            }
            for release in &os.operatingsystemrelease {
                entries.push(generate_entry(
                    &os.operatingsystem,
                    Some(release),
                    architecture,
                )?);
            }
        }

        tracing::debug!(
            module = metadata.name.as_deref().unwrap_or("<unnamed>"),
            entries = entries.len(),
            architecture,
            "generated matrix from module metadata"
        );

        let description = match &metadata.name {
            Some(name) => format!("{name} supported OS ({label})"),
            None => format!("supported OS ({label})"),
        };
        Ok(Self {
            inner: StaticMatrix::labelled(description, entries)?,
        })
    }
}

fn generate_entry(
    operatingsystem: &str,
    release: Option<&str>,
    architecture: &str,
) -> Result<OsEntry, ConfigurationError> {
    let mut id = id_segment(operatingsystem);
    if let Some(release) = release {
        id.push('-');
        id.push_str(&id_segment(release));
    }
    id.push('-');
    id.push_str(&id_segment(architecture));

    let mut facts = FactSet::builder()
        .fact("operatingsystem", operatingsystem)
        .fact("osfamily", os_family(operatingsystem))
        .fact("kernel", kernel(operatingsystem))
        .fact("architecture", architecture)
        .fact("hardwaremodel", architecture);
    if let Some(release) = release {
        facts = facts
            .fact("operatingsystemrelease", release)
            .fact(
                "operatingsystemmajrelease",
                major_release(operatingsystem, release),
            );
    }

    Ok(OsEntry::new(OsId::new(id)?, facts.build()))
}

impl FactMatrixProvider for SupportedOsMatrix {
    fn entries(&self) -> Vec<OsEntry> {
        self.inner.entries()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}
