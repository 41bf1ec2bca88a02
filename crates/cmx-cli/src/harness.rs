//! # Harness Setup
//!
//! Turns a resolved [`HarnessConfig`] into the pieces of a run: matrix
//! provider, compiler adapter, assertions, and runner settings. Everything
//! that can be wrong with a configuration is detected here, before any
//! entry runs.

use std::sync::Arc;
use std::time::Duration;

use cmx_assert::Assertion;
use cmx_compiler::{CatalogCompiler, CommandCompiler, FixtureCompiler};
use cmx_core::{ConfigurationError, ModuleName, Parameters};
use cmx_matrix::{
    FactMatrixProvider, FileMatrix, FilteredMatrix, MatrixFilter, SupportedOsMatrix,
    DEFAULT_ARCHITECTURE,
};
use cmx_runner::{default_concurrency, RunnerConfig, DEFAULT_TIMEOUT};

use crate::config::{CompilerConfig, HarnessConfig, MatrixConfig, ReportConfig};

/// A fully validated run.
pub struct Harness {
    pub module: ModuleName,
    pub parameters: Parameters,
    pub provider: Box<dyn FactMatrixProvider>,
    pub compiler: Arc<dyn CatalogCompiler>,
    pub assertions: Vec<Assertion>,
    pub runner: RunnerConfig,
    pub report: ReportConfig,
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("module", &self.module)
            .field("provider", &self.provider.describe())
            .field("compiler", &self.compiler.name())
            .field("assertions", &self.assertions.len())
            .field("runner", &self.runner)
            .finish()
    }
}

impl Harness {
    /// Validate `config` and assemble the run.
    ///
    /// # Errors
    ///
    /// Any `ConfigurationError`: missing or invalid module name, invalid
    /// parameters, no or conflicting matrix source, unreadable matrix,
    /// empty matrix (unless allowed), no or conflicting compiler, zero
    /// concurrency or timeout.
    pub fn from_config(config: &HarnessConfig) -> Result<Self, ConfigurationError> {
        let module = ModuleName::new(config.module.clone().unwrap_or_default())?;
        let parameters =
            Parameters::from_json(config.parameters.clone().unwrap_or(serde_json::Value::Null))?;
        let provider = build_provider(&config.matrix, config.allow_empty_matrix)?;
        let compiler = build_compiler(&config.compiler)?;

        let runner = RunnerConfig {
            concurrency: config.concurrency.unwrap_or_else(default_concurrency),
            timeout: config
                .compiler
                .timeout_secs
                .map_or(DEFAULT_TIMEOUT, Duration::from_secs),
        };
        runner.validate()?;

        Ok(Self {
            module,
            parameters,
            provider,
            compiler,
            assertions: config.assertions.clone(),
            runner,
            report: config.report.clone(),
        })
    }
}

/// Build the matrix provider described by `matrix`.
///
/// With `allow_empty` unset, a matrix with no entries is rejected: a run
/// over zero platforms would verify nothing.
pub fn build_provider(
    matrix: &MatrixConfig,
    allow_empty: bool,
) -> Result<Box<dyn FactMatrixProvider>, ConfigurationError> {
    let base: Box<dyn FactMatrixProvider> = match (&matrix.file, &matrix.metadata) {
        (Some(_), Some(_)) => {
            return Err(ConfigurationError::Invalid(
                "matrix.file and matrix.metadata are mutually exclusive".into(),
            ))
        }
        (Some(file), None) => Box::new(FileMatrix::load(file)?),
        (None, Some(metadata)) => Box::new(SupportedOsMatrix::load(
            metadata,
            matrix.architecture.as_deref().unwrap_or(DEFAULT_ARCHITECTURE),
        )?),
        (None, None) => {
            return Err(ConfigurationError::Invalid(
                "no fact matrix configured (set matrix.file or matrix.metadata)".into(),
            ))
        }
    };

    let filter = MatrixFilter {
        include: matrix.include.clone(),
        exclude: matrix.exclude.clone(),
        extra_facts: matrix.extra_facts.clone(),
    };
    let provider: Box<dyn FactMatrixProvider> = if filter.is_identity() {
        base
    } else {
        Box::new(FilteredMatrix::new(base, filter))
    };

    if !allow_empty && provider.entries().is_empty() {
        return Err(ConfigurationError::EmptyMatrix);
    }
    Ok(provider)
}

/// Build the compiler adapter described by `compiler`.
pub fn build_compiler(
    compiler: &CompilerConfig,
) -> Result<Arc<dyn CatalogCompiler>, ConfigurationError> {
    if compiler.fixture {
        if !compiler.command.is_empty() {
            return Err(ConfigurationError::Invalid(
                "compiler.command and compiler.fixture are mutually exclusive".into(),
            ));
        }
        return Ok(Arc::new(FixtureCompiler::new()));
    }

    let mut command = CommandCompiler::from_argv(&compiler.command).ok_or_else(|| {
        ConfigurationError::Invalid(
            "no compiler configured (set compiler.command or compiler.fixture)".into(),
        )
    })?;
    if let Some(dir) = &compiler.working_dir {
        command = command.with_working_dir(dir);
    }
    tracing::debug!(command = %command.command_line(), "using external compiler");
    Ok(Arc::new(command))
}
