//! # Matrix Files
//!
//! Loads a fact matrix from a structured data file. The format is chosen by
//! extension: `.json` is parsed as JSON, anything else as YAML.
//!
//! ```yaml
//! entries:
//!   - os: centos-7
//!     facts:
//!       osfamily: RedHat
//!       operatingsystemmajrelease: "7"
//!   - os: ubuntu-20.04
//!     facts:
//!       osfamily: Debian
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use cmx_core::{ConfigurationError, OsEntry};

use crate::{FactMatrixProvider, StaticMatrix};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MatrixDocument {
    #[serde(default)]
    entries: Vec<OsEntry>,
}

/// A matrix read from a YAML or JSON file at construction time.
#[derive(Debug, Clone)]
pub struct FileMatrix {
    path: PathBuf,
    inner: StaticMatrix,
}

impl FileMatrix {
    /// Read and parse a matrix file.
    ///
    /// # Errors
    ///
    /// `ConfigurationError::MatrixSource` if the file cannot be read or
    /// parsed, `ConfigurationError::DuplicateEntry` on repeated OS ids.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let source_err = |reason: String| ConfigurationError::MatrixSource {
            path: path.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| source_err(e.to_string()))?;
        let document = Self::parse(path, &content).map_err(source_err)?;

        tracing::debug!(
            path = %path.display(),
            entries = document.entries.len(),
            "loaded matrix file"
        );

        let inner = StaticMatrix::labelled(path.display().to_string(), document.entries)?;
        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    fn parse(path: &Path, content: &str) -> Result<MatrixDocument, String> {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(content).map_err(|e| e.to_string())
        } else if content.trim().is_empty() {
            Ok(MatrixDocument {
                entries: Vec::new(),
            })
        } else {
            serde_yaml::from_str(content).map_err(|e| e.to_string())
        }
    }

    /// Path the matrix was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FactMatrixProvider for FileMatrix {
    fn entries(&self) -> Vec<OsEntry> {
        self.inner.entries()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}
