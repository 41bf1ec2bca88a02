//! # External Toolchain Adapter
//!
//! Runs a compilation toolchain as a child process, one process per
//! invocation.
//!
//! ## Protocol
//!
//! - stdin: the [`ModuleInvocation`] as JSON.
//! - environment: `CMX_MODULE` and `CMX_OS` are set for wrappers that
//!   prefer arguments over stdin.
//! - exit 0: stdout holds catalog JSON.
//! - non-zero exit: if stdout holds `{"error": "..."}` the module could not
//!   be resolved for these facts (`Unresolved`); otherwise the toolchain
//!   itself failed (`Toolchain`, with the tail of stderr).
//!
//! The child is spawned with `kill_on_drop`, so a compilation abandoned by
//! a timeout or cancellation does not leave the process running.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use cmx_core::{CompilationError, CompilationFailure, CompiledCatalog, ModuleInvocation};

use crate::CatalogCompiler;

/// Maximum stderr retained in a `Toolchain` failure.
const STDERR_TAIL_BYTES: usize = 4096;

#[derive(Debug, Deserialize)]
struct ResolutionError {
    error: String,
}

/// Adapter for an external compilation command.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    working_dir: Option<PathBuf>,
}

impl CommandCompiler {
    /// Create an adapter for `program args...`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: Vec::new(),
            working_dir: None,
        }
    }

    /// Create an adapter from a full command line split into words. Returns
    /// `None` for an empty command.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    /// Set an extra environment variable for the child.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Run the child in a specific directory (typically the module root).
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The command line, for logs and reports.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}

#[async_trait]
impl CatalogCompiler for CommandCompiler {
    fn name(&self) -> &str {
        &self.program
    }

    async fn compile(
        &self,
        invocation: &ModuleInvocation,
    ) -> Result<CompiledCatalog, CompilationError> {
        let payload = serde_json::to_vec(invocation).map_err(|e| {
            invocation.failed(CompilationFailure::Spawn {
                message: format!("cannot encode invocation: {e}"),
            })
        })?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env("CMX_MODULE", invocation.module.as_str())
            .env("CMX_OS", invocation.os.as_str())
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        tracing::debug!(
            os = %invocation.os,
            command = %self.command_line(),
            "spawning compiler"
        );

        let mut child = command.spawn().map_err(|e| {
            invocation.failed(CompilationFailure::Spawn {
                message: format!("{}: {e}", self.program),
            })
        })?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A child that never reads stdin closes the pipe early; its
                // exit status decides the outcome, not the write.
                if let Err(e) = stdin.write_all(&payload).await {
                    tracing::debug!(error = %e, "compiler did not consume stdin");
                }
            }
        };
        let ((), output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(|e| {
            invocation.failed(CompilationFailure::Spawn {
                message: format!("waiting for {}: {e}", self.program),
            })
        })?;

        if !output.status.success() {
            if let Ok(resolution) = serde_json::from_slice::<ResolutionError>(&output.stdout) {
                return Err(invocation.failed(CompilationFailure::Unresolved {
                    message: resolution.error,
                }));
            }
            return Err(invocation.failed(CompilationFailure::Toolchain {
                exit_code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            }));
        }

        CompiledCatalog::from_json_slice(&output.stdout).map_err(|e| {
            invocation.failed(CompilationFailure::InvalidCatalog {
                message: e.to_string(),
            })
        })
    }
}
