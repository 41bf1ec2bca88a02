//! # Run Subcommand
//!
//! `cmx run` compiles the module for every matrix entry, evaluates the
//! assertions, and writes the report.
//!
//! ```bash
//! cmx run --config cmx.yaml
//! cmx run --module tensor --metadata metadata.json --fixture --format text
//! cmx run --module tensor --matrix matrix.yaml --command "bundle exec catalog-compile"
//! ```
//!
//! `--command` is split on whitespace. A compiler whose arguments contain
//! spaces is configured as a list under `compiler.command` instead.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Map, Value};

use cmx_core::ConfigurationError;
use cmx_runner::{CancelToken, MatrixReport, MatrixRunner};

use crate::config::{split_assignment, HarnessConfig, ReportConfig, ReportFormat, SourceArgs};
use crate::harness::Harness;
use crate::EXIT_CANCELLED;

/// Arguments for `cmx run`.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// External compiler command line, split on whitespace with no shell
    /// quoting. For arguments that contain spaces, list them under
    /// `compiler.command` in the config file instead.
    #[arg(long, conflicts_with = "fixture")]
    pub command: Option<String>,

    /// Use the in-process fixture compiler (dry run).
    #[arg(long)]
    pub fixture: bool,

    /// Per-entry compile deadline in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum concurrent compilations.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Report format.
    #[arg(long, value_enum)]
    pub format: Option<ReportFormat>,

    /// Write the report to a file instead of stdout.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,

    /// Module parameter as NAME=VALUE; VALUE is JSON, or a plain string.
    /// Repeatable.
    #[arg(long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,
}

impl RunArgs {
    /// Load the config file and apply every flag over it.
    pub fn resolve(&self) -> Result<HarnessConfig, ConfigurationError> {
        let mut config = self.source.resolve()?;

        if let Some(command) = &self.command {
            config.compiler.command = command.split_whitespace().map(str::to_string).collect();
            config.compiler.fixture = false;
        }
        if self.fixture {
            config.compiler.fixture = true;
            config.compiler.command.clear();
        }
        if let Some(timeout) = self.timeout {
            config.compiler.timeout_secs = Some(timeout);
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = Some(concurrency);
        }
        if let Some(format) = self.format {
            config.report.format = format;
        }
        if let Some(out) = &self.out {
            config.report.path = Some(out.clone());
        }
        if !self.params.is_empty() {
            let mut parameters = match config.parameters.take() {
                None | Some(Value::Null) => Map::new(),
                Some(Value::Object(map)) => map,
                Some(_) => {
                    return Err(ConfigurationError::InvalidParameter {
                        name: "<root>".into(),
                        reason: "parameters must be a mapping".into(),
                    })
                }
            };
            for raw in &self.params {
                let (name, value) = split_assignment(raw)?;
                let value = serde_json::from_str(value)
                    .unwrap_or_else(|_| Value::String(value.to_string()));
                parameters.insert(name.to_string(), value);
            }
            config.parameters = Some(Value::Object(parameters));
        }
        Ok(config)
    }
}

/// Execute `cmx run`. Returns the process exit code.
///
/// # Errors
///
/// Configuration problems found during setup, and failure to write the
/// report.
pub async fn run_run(args: &RunArgs, cancel: &CancelToken) -> Result<u8> {
    let config = args.resolve().context("resolving harness configuration")?;
    let harness = Harness::from_config(&config).context("harness setup failed")?;
    tracing::debug!(?harness, "harness ready");

    let runner = MatrixRunner::new(Arc::clone(&harness.compiler), harness.runner.clone())?
        .with_assertions(harness.assertions.clone());
    let report = runner
        .run(&harness.module, &harness.parameters, &*harness.provider, cancel)
        .await;

    write_report(&report, &harness.report)?;

    if report.cancelled {
        tracing::warn!("run cancelled; report is partial");
        return Ok(EXIT_CANCELLED);
    }
    Ok(report.exit_code())
}

/// Render a report in the requested format.
pub fn render_report(report: &MatrixReport, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => {
            let mut json = report.to_json().context("serializing report")?;
            json.push('\n');
            Ok(json)
        }
        ReportFormat::Text => Ok(report.render_text()),
    }
}

/// Write a report to its configured destination.
pub fn write_report(report: &MatrixReport, config: &ReportConfig) -> Result<()> {
    let rendered = render_report(report, config.format)?;
    match &config.path {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("writing report to {}", path.display()))?;
            tracing::info!(path = %path.display(), "report written");
            eprintln!("{}", report.summary);
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use cmx_runner::EntryState;

    const MATRIX: &str = "\
entries:
  - os: centos-7
    facts: {osfamily: RedHat}
  - os: ubuntu-20.04
    facts: {osfamily: Debian}
";

    fn workspace(config: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("matrix.yaml"), MATRIX).unwrap();
        let path = dir.path().join("cmx.yaml");
        std::fs::write(&path, config).unwrap();
        (dir, path)
    }

    fn args(config: &Path, out: &Path) -> RunArgs {
        RunArgs {
            source: SourceArgs {
                config: Some(config.to_path_buf()),
                ..SourceArgs::default()
            },
            out: Some(out.to_path_buf()),
            ..RunArgs::default()
        }
    }

    fn read_report(path: &Path) -> MatrixReport {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn fixture_run_passes_every_entry() {
        let (dir, config) = workspace("module: tensor\nmatrix: {file: matrix.yaml}\ncompiler: {fixture: true}\n");
        let out = dir.path().join("report.json");

        let code = run_run(&args(&config, &out), &CancelToken::new()).await.unwrap();
        assert_eq!(code, 0);

        let report = read_report(&out);
        assert_eq!(report.module.as_str(), "tensor");
        assert_eq!(report.summary.passed, 2);
        assert_eq!(report.entries[0].os.as_str(), "centos-7");
        assert_eq!(report.entries[1].os.as_str(), "ubuntu-20.04");
    }

    #[tokio::test]
    async fn failing_assertion_exits_one() {
        let (dir, config) = workspace(
            "module: tensor
matrix: {file: matrix.yaml}
compiler: {fixture: true}
assertions:
  - name: riemann
    predicate: {kind: contains_class, class: riemann}
",
        );
        let out = dir.path().join("report.json");

        let code = run_run(&args(&config, &out), &CancelToken::new()).await.unwrap();
        assert_eq!(code, 1);
        let report = read_report(&out);
        assert!(report.entries.iter().all(|e| e.state == EntryState::Failed));
    }

    #[tokio::test]
    async fn text_report() {
        let (dir, config) = workspace("module: tensor\nmatrix: {file: matrix.yaml}\ncompiler: {fixture: true}\n");
        let out = dir.path().join("report.txt");
        let mut args = args(&config, &out);
        args.format = Some(ReportFormat::Text);

        run_run(&args, &CancelToken::new()).await.unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.starts_with("PASSED centos-7\nPASSED ubuntu-20.04\n"));
        assert!(text.ends_with("2 entries: 2 passed, 0 failed, 0 compilation failed, 0 cancelled\n"));
    }

    #[tokio::test]
    async fn cancelled_run_exits_130_and_still_writes_report() {
        let (dir, config) = workspace("module: tensor\nmatrix: {file: matrix.yaml}\ncompiler: {fixture: true}\n");
        let out = dir.path().join("report.json");
        let cancel = CancelToken::new();
        cancel.cancel();

        let code = run_run(&args(&config, &out), &cancel).await.unwrap();
        assert_eq!(code, EXIT_CANCELLED);
        let report = read_report(&out);
        assert!(report.cancelled);
        assert_eq!(report.summary.cancelled, 2);
    }

    #[tokio::test]
    async fn empty_matrix_fails_setup() {
        let (dir, config) = workspace("module: tensor\nmatrix: {file: matrix.yaml}\ncompiler: {fixture: true}\n");
        let out = dir.path().join("report.json");
        let mut args = args(&config, &out);
        args.source.include = vec!["sles".into()];

        let err = run_run(&args, &CancelToken::new()).await.unwrap_err();
        assert!(err
            .chain()
            .any(|cause| cause.to_string().contains("empty")));
        assert!(!out.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn external_compiler_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("compile.sh");
        std::fs::write(
            &script,
            r#"if [ "$CMX_OS" = "ubuntu-20.04" ]; then
  echo '{"error":"Unsupported osfamily Debian"}'
  exit 1
fi
cat >/dev/null
printf '{"name":"%s","resources":[{"type":"Class","title":"Tensor"}]}' "$CMX_OS"
"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("matrix.yaml"), MATRIX).unwrap();
        let config = dir.path().join("cmx.yaml");
        std::fs::write(
            &config,
            format!(
                "module: tensor\nmatrix: {{file: matrix.yaml}}\ncompiler: {{command: [sh, \"{}\"], timeout_secs: 30}}\n",
                script.display()
            ),
        )
        .unwrap();
        let out = dir.path().join("report.json");

        let code = run_run(&args(&config, &out), &CancelToken::new()).await.unwrap();
        assert_eq!(code, 1);

        let report = read_report(&out);
        assert_eq!(report.entry("centos-7").unwrap().state, EntryState::Passed);
        let ubuntu = report.entry("ubuntu-20.04").unwrap();
        assert_eq!(ubuntu.state, EntryState::CompilationFailed);
        assert_eq!(
            ubuntu.diagnostics,
            vec!["module unresolved: Unsupported osfamily Debian".to_string()]
        );
    }

    #[test]
    fn config_command_keeps_arguments_with_spaces() {
        let (dir, config) = workspace(
            "module: tensor\nmatrix: {file: matrix.yaml}\ncompiler: {command: [sh, \"/opt/catalog tools/compile.sh\"]}\n",
        );
        let from_file = args(&config, &dir.path().join("report.json"))
            .resolve()
            .unwrap();
        assert_eq!(
            from_file.compiler.command,
            vec!["sh", "/opt/catalog tools/compile.sh"]
        );

        let mut flagged = args(&config, &dir.path().join("report.json"));
        flagged.command = Some("sh /opt/catalog tools/compile.sh".into());
        assert_eq!(
            flagged.resolve().unwrap().compiler.command,
            vec!["sh", "/opt/catalog", "tools/compile.sh"]
        );
    }

    #[test]
    fn flags_select_compiler_and_parameters() {
        let run = RunArgs {
            source: SourceArgs {
                module: Some("tensor".into()),
                ..SourceArgs::default()
            },
            command: Some("bundle exec catalog-compile".into()),
            timeout: Some(5),
            params: vec![
                "version=\"1.2\"".into(),
                "manage_repo=false".into(),
                "server=riemann.local".into(),
            ],
            ..RunArgs::default()
        };
        let config = run.resolve().unwrap();
        assert_eq!(
            config.compiler.command,
            vec!["bundle", "exec", "catalog-compile"]
        );
        assert_eq!(config.compiler.timeout_secs, Some(5));
        assert_eq!(
            config.parameters,
            Some(serde_json::json!({
                "version": "1.2",
                "manage_repo": false,
                "server": "riemann.local",
            }))
        );
    }
}
