//! # cmx-compiler — Catalog Compiler Adapters
//!
//! The harness never compiles configuration modules itself. It reaches the
//! compilation toolchain through one contract, [`CatalogCompiler::compile`]:
//! given a [`ModuleInvocation`], produce a [`CompiledCatalog`] or a
//! [`CompilationError`].
//!
//! ## Adapters
//!
//! - [`CommandCompiler`] — runs an external toolchain command, sending the
//!   invocation as JSON on stdin and reading catalog JSON from stdout.
//! - [`FixtureCompiler`] — deterministic in-process compiler for tests and
//!   dry runs. Can be told to fail or hang for chosen platforms.
//!
//! ## Deadlines
//!
//! [`compile_with_timeout`] wraps any adapter call in a deadline. An expired
//! deadline becomes `CompilationFailure::Timeout` for that entry only, and
//! dropping the compile future abandons the work (for `CommandCompiler`,
//! the child process is killed).

pub mod command;
pub mod fixture;

pub use command::CommandCompiler;
pub use fixture::FixtureCompiler;

use std::time::Duration;

use async_trait::async_trait;

use cmx_core::{CompilationError, CompilationFailure, CompiledCatalog, ModuleInvocation};

/// Compiles a module for one platform.
///
/// Implementations must be side-effect free from the harness's point of
/// view: the only observable result is the returned value.
#[async_trait]
pub trait CatalogCompiler: Send + Sync {
    /// Short name of the adapter, recorded in reports.
    fn name(&self) -> &str;

    /// Compile `invocation.module` with `invocation.parameters` against
    /// `invocation.facts`.
    async fn compile(
        &self,
        invocation: &ModuleInvocation,
    ) -> Result<CompiledCatalog, CompilationError>;
}

/// Run a compilation with a deadline.
///
/// # Errors
///
/// Whatever the adapter returns, or `CompilationFailure::Timeout` when the
/// deadline passes first.
pub async fn compile_with_timeout(
    compiler: &dyn CatalogCompiler,
    invocation: &ModuleInvocation,
    timeout: Duration,
) -> Result<CompiledCatalog, CompilationError> {
    match tokio::time::timeout(timeout, compiler.compile(invocation)).await {
        Ok(result) => result,
        Err(_) => {
            let after_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            tracing::warn!(
                os = %invocation.os,
                module = %invocation.module,
                compiler = compiler.name(),
                after_ms,
                "compilation timed out"
            );
            Err(invocation.failed(CompilationFailure::Timeout { after_ms }))
        }
    }
}
