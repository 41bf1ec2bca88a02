//! # Harness Configuration
//!
//! A YAML file describing one harness run:
//!
//! ```yaml
//! module: tensor
//! parameters: {}
//! matrix:
//!   metadata: metadata.json
//!   architecture: x86_64
//!   include: [centos, ubuntu]
//!   extra_facts: {concat_basedir: /tmp}
//! compiler:
//!   command: ["bundle", "exec", "catalog-compile"]
//!   timeout_secs: 120
//! concurrency: 4
//! assertions:
//!   - name: contains class tensor
//!     predicate: {kind: contains_class, class: tensor}
//! report:
//!   format: json
//!   path: report.json
//! ```
//!
//! Every field is optional so a run can be described with flags alone.
//! Flags override the file. Relative input paths in the file (`matrix.file`,
//! `matrix.metadata`, `compiler.working_dir`) are resolved against the
//! directory containing the file; `report.path` is relative to the current
//! directory.

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use cmx_assert::Assertion;
use cmx_core::{ConfigurationError, FactSet, FactValue};

/// Output format of the run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Text,
}

/// The harness config file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    /// Module under test.
    pub module: Option<String>,
    /// Module parameters. Absent or empty means all defaults.
    #[serde(default)]
    pub parameters: Option<Value>,
    #[serde(default)]
    pub matrix: MatrixConfig,
    #[serde(default)]
    pub compiler: CompilerConfig,
    /// Maximum concurrent compilations.
    pub concurrency: Option<usize>,
    /// Assertions evaluated against every catalog. Empty means "the module's
    /// own class is declared".
    #[serde(default)]
    pub assertions: Vec<Assertion>,
    #[serde(default)]
    pub report: ReportConfig,
    /// Accept an empty matrix instead of failing setup.
    #[serde(default)]
    pub allow_empty_matrix: bool,
}

/// Where the fact matrix comes from.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatrixConfig {
    /// Matrix file (YAML or JSON).
    pub file: Option<PathBuf>,
    /// Module `metadata.json` to derive the matrix from.
    pub metadata: Option<PathBuf>,
    /// Architecture for metadata-derived entries.
    pub architecture: Option<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Facts merged into every entry.
    #[serde(default)]
    pub extra_facts: FactSet,
}

/// How catalogs are compiled.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompilerConfig {
    /// External compiler command line.
    #[serde(default)]
    pub command: Vec<String>,
    /// Use the in-process fixture compiler.
    #[serde(default)]
    pub fixture: bool,
    /// Per-entry compile deadline in seconds.
    pub timeout_secs: Option<u64>,
    /// Directory the external compiler runs in.
    pub working_dir: Option<PathBuf>,
}

/// Where and how the report is written.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    #[serde(default)]
    pub format: ReportFormat,
    /// Report file. Stdout when absent.
    pub path: Option<PathBuf>,
}

impl HarnessConfig {
    /// Load a config file.
    ///
    /// # Errors
    ///
    /// `ConfigurationError::Invalid` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let invalid = |reason: String| {
            ConfigurationError::Invalid(format!("config {}: {reason}", path.display()))
        };
        let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let mut config = Self::parse(&content).map_err(invalid)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        tracing::debug!(path = %path.display(), "loaded harness config");
        Ok(config)
    }

    /// Parse config YAML. An empty document is the default config.
    pub fn parse(content: &str) -> Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    }

    fn rebase(&mut self, base: &Path) {
        let rebase = |p: &mut Option<PathBuf>| {
            if let Some(path) = p.as_mut() {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        };
        rebase(&mut self.matrix.file);
        rebase(&mut self.matrix.metadata);
        rebase(&mut self.compiler.working_dir);
    }
}

/// Flags shared by every subcommand that resolves a matrix.
#[derive(Args, Debug, Default)]
pub struct SourceArgs {
    /// Harness config file (YAML).
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Module under test.
    #[arg(long)]
    pub module: Option<String>,

    /// Matrix file (YAML or JSON).
    #[arg(long, conflicts_with = "metadata")]
    pub matrix: Option<PathBuf>,

    /// Derive the matrix from a module metadata.json.
    #[arg(long)]
    pub metadata: Option<PathBuf>,

    /// Architecture for metadata-derived entries.
    #[arg(long)]
    pub arch: Option<String>,

    /// Keep only OS ids starting with this prefix. Repeatable.
    #[arg(long)]
    pub include: Vec<String>,

    /// Drop OS ids starting with this prefix. Repeatable.
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Extra fact for every entry, as NAME=VALUE. Repeatable.
    #[arg(long = "fact", value_name = "NAME=VALUE")]
    pub facts: Vec<String>,

    /// Accept an empty matrix.
    #[arg(long)]
    pub allow_empty: bool,
}

impl SourceArgs {
    /// Load the config file (if any) and apply these flags over it.
    pub fn resolve(&self) -> Result<HarnessConfig, ConfigurationError> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::load(path)?,
            None => HarnessConfig::default(),
        };

        if let Some(module) = &self.module {
            config.module = Some(module.clone());
        }
        if let Some(file) = &self.matrix {
            config.matrix.file = Some(file.clone());
            config.matrix.metadata = None;
        }
        if let Some(metadata) = &self.metadata {
            config.matrix.metadata = Some(metadata.clone());
            config.matrix.file = None;
        }
        if let Some(arch) = &self.arch {
            config.matrix.architecture = Some(arch.clone());
        }
        if !self.include.is_empty() {
            config.matrix.include = self.include.clone();
        }
        if !self.exclude.is_empty() {
            config.matrix.exclude = self.exclude.clone();
        }
        if !self.facts.is_empty() {
            let overrides = self
                .facts
                .iter()
                .map(|raw| parse_fact(raw))
                .collect::<Result<FactSet, _>>()?;
            config.matrix.extra_facts = config.matrix.extra_facts.merged(&overrides);
        }
        if self.allow_empty {
            config.allow_empty_matrix = true;
        }
        Ok(config)
    }
}

/// Split `NAME=VALUE`.
pub fn split_assignment(raw: &str) -> Result<(&str, &str), ConfigurationError> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => Err(ConfigurationError::Invalid(format!(
            "expected NAME=VALUE, got '{raw}'"
        ))),
    }
}

/// Parse a `--fact` flag. `true`/`false` and integers keep their type.
fn parse_fact(raw: &str) -> Result<(String, FactValue), ConfigurationError> {
    let (name, value) = split_assignment(raw)?;
    let value = match value {
        "true" => FactValue::Bool(true),
        "false" => FactValue::Bool(false),
        other => other
            .parse::<i64>()
            .map(FactValue::Integer)
            .unwrap_or_else(|_| FactValue::String(other.to_string())),
    };
    Ok((name.to_string(), value))
}
