//! # Matrix Runner
//!
//! Compiles a module for every entry of a fact matrix and evaluates the
//! configured assertions against each resulting catalog.
//!
//! ## Concurrency
//!
//! Each entry runs as its own task in a [`JoinSet`]. A [`Semaphore`] with
//! `concurrency` permits bounds how many compilations are in flight. Tasks
//! return `(index, EntryReport)` and the runner writes each report into a
//! slot vector indexed by declaration position, so the report order never
//! depends on completion order.
//!
//! ## Isolation
//!
//! A failed, timed-out, or panicking entry never affects another entry.
//! A panicked task leaves its slot empty; empty slots are recorded as
//! `CompilationFailed` once every task has been joined.
//!
//! ## Cancellation
//!
//! Waiting for a permit and compiling both race the [`CancelToken`]. When
//! it fires, the compile future is dropped (killing any child process) and
//! the entry ends `Cancelled`. Entries that already reached a terminal
//! state keep it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;

use cmx_assert::{evaluate, Assertion, AssertionOutcome};
use cmx_compiler::{compile_with_timeout, CatalogCompiler};
use cmx_core::{
    CompilationFailure, ConfigurationError, FactFingerprint, ModuleInvocation, ModuleName,
    OsEntry, OsId, Parameters,
};
use cmx_matrix::FactMatrixProvider;

use crate::cancel::CancelToken;
use crate::report::{EntryReport, MatrixReport, Summary};
use crate::state::EntryState;

/// Default per-entry compile deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Runner tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Maximum number of entries compiling at once.
    pub concurrency: usize,
    /// Per-entry compile deadline.
    pub timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RunnerConfig {
    /// Reject settings the runner cannot honor.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.concurrency == 0 {
            return Err(ConfigurationError::InvalidConcurrency(self.concurrency));
        }
        if self.timeout.is_zero() {
            return Err(ConfigurationError::Invalid(
                "compile timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Available parallelism, at least 1.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Runs a module across a fact matrix.
pub struct MatrixRunner {
    compiler: Arc<dyn CatalogCompiler>,
    assertions: Vec<Assertion>,
    config: RunnerConfig,
}

impl std::fmt::Debug for MatrixRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixRunner")
            .field("compiler", &self.compiler.name())
            .field("assertions", &self.assertions.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Everything an entry task needs, shared across tasks.
struct EntryContext {
    compiler: Arc<dyn CatalogCompiler>,
    module: ModuleName,
    parameters: Parameters,
    assertions: Vec<Assertion>,
    timeout: Duration,
    semaphore: Semaphore,
    cancel: CancelToken,
}

impl MatrixRunner {
    /// Create a runner.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` if `config` is invalid.
    pub fn new(
        compiler: Arc<dyn CatalogCompiler>,
        config: RunnerConfig,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            compiler,
            assertions: Vec::new(),
            config,
        })
    }

    /// Assertions to evaluate against every catalog. When none are set, the
    /// module's own class is asserted.
    pub fn with_assertions(mut self, assertions: Vec<Assertion>) -> Self {
        self.assertions = assertions;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run `module` with `parameters` against every entry of `provider`.
    ///
    /// Never fails: per-entry problems are recorded in the report.
    pub async fn run(
        &self,
        module: &ModuleName,
        parameters: &Parameters,
        provider: &dyn FactMatrixProvider,
        cancel: &CancelToken,
    ) -> MatrixReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let entries = provider.entries();
        let span = tracing::info_span!("matrix_run", %run_id, %module);

        async {
            tracing::info!(
                provider = %provider.describe(),
                compiler = self.compiler.name(),
                entries = entries.len(),
                concurrency = self.config.concurrency,
                "starting matrix run"
            );
            if entries.is_empty() {
                tracing::warn!("fact matrix is empty; nothing will be verified");
            }

            let assertions = if self.assertions.is_empty() {
                vec![Assertion::contains_class(module)]
            } else {
                self.assertions.clone()
            };
            let context = Arc::new(EntryContext {
                compiler: Arc::clone(&self.compiler),
                module: module.clone(),
                parameters: parameters.clone(),
                assertions,
                timeout: self.config.timeout,
                semaphore: Semaphore::new(self.config.concurrency),
                cancel: cancel.clone(),
            });

            let reports = run_entries(&context, entries).await;
            let summary = Summary::from_entries(&reports);
            tracing::info!(%summary, "matrix run finished");

            MatrixReport {
                run_id,
                module: module.clone(),
                provider: provider.describe(),
                compiler: self.compiler.name().to_string(),
                started_at,
                finished_at: Utc::now(),
                cancelled: cancel.is_cancelled() && summary.cancelled > 0,
                entries: reports,
                summary,
            }
        }
        .instrument(span)
        .await
    }
}

async fn run_entries(context: &Arc<EntryContext>, entries: Vec<OsEntry>) -> Vec<EntryReport> {
    let placeholders: Vec<(OsId, FactFingerprint)> = entries
        .iter()
        .map(|e| (e.os.clone(), e.facts.fingerprint()))
        .collect();
    let mut slots: Vec<Option<EntryReport>> = (0..entries.len()).map(|_| None).collect();

    let mut tasks = JoinSet::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let context = Arc::clone(context);
        let span = tracing::debug_span!("entry", os = %entry.os);
        tasks.spawn(async move { (index, run_entry(&context, entry).await) }.instrument(span));
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, report)) => slots[index] = Some(report),
            Err(e) => tracing::error!(error = %e, "entry task did not complete"),
        }
    }

    slots
        .into_iter()
        .zip(placeholders)
        .map(|(slot, (os, fact_fingerprint))| {
            slot.unwrap_or_else(|| {
                record(EntryReport {
                    os,
                    fact_fingerprint,
                    state: EntryState::CompilationFailed,
                    duration_ms: 0,
                    diagnostics: vec!["entry task panicked before producing a result".into()],
                    failure: None,
                    assertions: Vec::new(),
                })
            })
        })
        .collect()
}

/// Tracks one entry through the state machine.
struct Progress {
    os: OsId,
    state: EntryState,
    diagnostics: Vec<String>,
    started: Instant,
}

impl Progress {
    fn new(os: OsId) -> Self {
        Self {
            os,
            state: EntryState::Pending,
            diagnostics: Vec::new(),
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: EntryState) {
        match self.state.transition(next) {
            Ok(state) => {
                tracing::debug!(from = %self.state, to = %state, "entry transition");
                self.state = state;
            }
            Err(e) => {
                tracing::error!(os = %self.os, error = %e, "rejected entry transition");
                self.diagnostics.push(e.to_string());
            }
        }
    }

    fn finish(
        self,
        entry: &OsEntry,
        failure: Option<CompilationFailure>,
        assertions: Vec<AssertionOutcome>,
    ) -> EntryReport {
        record(EntryReport {
            os: self.os,
            fact_fingerprint: entry.facts.fingerprint(),
            state: self.state,
            duration_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            diagnostics: self.diagnostics,
            failure,
            assertions,
        })
    }

    fn cancelled(mut self, entry: &OsEntry, when: &str) -> EntryReport {
        self.advance(EntryState::Cancelled);
        self.diagnostics.push(format!("cancelled {when}"));
        self.finish(entry, None, Vec::new())
    }
}

async fn run_entry(context: &EntryContext, entry: OsEntry) -> EntryReport {
    let mut progress = Progress::new(entry.os.clone());

    let _permit = tokio::select! {
        biased;
        _ = context.cancel.cancelled() => return progress.cancelled(&entry, "while waiting for a worker"),
        permit = context.semaphore.acquire() => match permit {
            Ok(permit) => permit,
            Err(_) => return progress.cancelled(&entry, "while waiting for a worker"),
        },
    };
    if context.cancel.is_cancelled() {
        return progress.cancelled(&entry, "while waiting for a worker");
    }

    progress.advance(EntryState::Compiling);
    let invocation = ModuleInvocation::for_entry(&context.module, &context.parameters, &entry);
    let compile_started = Instant::now();
    let compiled = tokio::select! {
        biased;
        _ = context.cancel.cancelled() => None,
        result = compile_with_timeout(context.compiler.as_ref(), &invocation, context.timeout) => Some(result),
    };
    let Some(compiled) = compiled else {
        return progress.cancelled(&entry, "while compiling");
    };
    // Abandoned compilations have no meaningful duration.
    metrics::histogram!("cmx_compile_duration_seconds")
        .record(compile_started.elapsed().as_secs_f64());

    let catalog = match compiled {
        Err(e) => {
            progress.advance(EntryState::CompilationFailed);
            progress.diagnostics.push(e.reason.to_string());
            return progress.finish(&entry, Some(e.reason), Vec::new());
        }
        Ok(catalog) => catalog,
    };

    progress.advance(EntryState::Compiled);
    if context.cancel.is_cancelled() {
        return progress.cancelled(&entry, "after compiling");
    }

    progress.advance(EntryState::Asserting);
    let outcomes = evaluate(&catalog, &context.assertions);
    drop(catalog);

    let failures: Vec<String> = outcomes
        .iter()
        .filter(|o| !o.pass)
        .map(|o| format!("{}: {}", o.name, o.message))
        .collect();
    if failures.is_empty() {
        progress.advance(EntryState::Passed);
    } else {
        progress.advance(EntryState::Failed);
        progress.diagnostics.extend(failures);
    }
    progress.finish(&entry, None, outcomes)
}

fn record(report: EntryReport) -> EntryReport {
    metrics::counter!("cmx_entries_total", "state" => report.state.as_str()).increment(1);
    if report.passed() {
        tracing::info!(
            os = %report.os,
            state = %report.state,
            duration_ms = report.duration_ms,
            "entry finished"
        );
    } else {
        tracing::info!(
            os = %report.os,
            state = %report.state,
            duration_ms = report.duration_ms,
            diagnostics = ?report.diagnostics,
            "entry finished"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmx_compiler::FixtureCompiler;
    use cmx_matrix::StaticMatrix;

    fn matrix(ids: &[&str]) -> StaticMatrix {
        StaticMatrix::new(
            ids.iter()
                .map(|id| OsEntry::new(OsId::new(*id).unwrap(), Default::default()))
                .collect(),
        )
        .unwrap()
    }

    fn runner(compiler: FixtureCompiler, config: RunnerConfig) -> MatrixRunner {
        MatrixRunner::new(Arc::new(compiler), config).unwrap()
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = RunnerConfig {
            concurrency: 0,
            ..RunnerConfig::default()
        };
        let err = MatrixRunner::new(Arc::new(FixtureCompiler::new()), config).unwrap_err();
        assert_eq!(err, ConfigurationError::InvalidConcurrency(0));
    }

    #[test]
    fn defaults() {
        let config = RunnerConfig::default();
        assert!(config.concurrency >= 1);
        assert_eq!(config.timeout, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn default_assertion_is_module_class() {
        let module = ModuleName::new("tensor").unwrap();
        let report = runner(FixtureCompiler::new(), RunnerConfig::default())
            .run(&module, &Parameters::defaults(), &matrix(&["centos-7"]), &CancelToken::new())
            .await;
        let entry = &report.entries[0];
        assert_eq!(entry.state, EntryState::Passed);
        assert_eq!(entry.assertions.len(), 1);
        assert_eq!(entry.assertions[0].name, "contains class tensor");
        assert!(entry.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn failing_assertion_marks_entry_failed_not_compilation_failed() {
        let module = ModuleName::new("tensor").unwrap();
        let report = runner(FixtureCompiler::new(), RunnerConfig::default())
            .with_assertions(vec![Assertion::new(
                "riemann present",
                cmx_assert::Predicate::contains_class("riemann"),
            )])
            .run(&module, &Parameters::defaults(), &matrix(&["centos-7"]), &CancelToken::new())
            .await;
        let entry = &report.entries[0];
        assert_eq!(entry.state, EntryState::Failed);
        assert!(entry.diagnostics[0].starts_with("riemann present: expected Class[Riemann]"));
        assert!(entry.failure.is_none());
    }

    #[tokio::test]
    async fn cancelled_before_start_marks_everything_cancelled() {
        let module = ModuleName::new("tensor").unwrap();
        let compiler = Arc::new(FixtureCompiler::new());
        let runner = MatrixRunner::new(compiler.clone(), RunnerConfig::default()).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let report = runner
            .run(&module, &Parameters::defaults(), &matrix(&["a", "b"]), &cancel)
            .await;
        assert!(report.cancelled);
        assert!(report.entries.iter().all(|e| e.state == EntryState::Cancelled));
        assert_eq!(compiler.calls(), 0);
    }

    /// Counts samples recorded to the compile-duration histogram.
    #[derive(Default)]
    struct CompileSamples(std::sync::atomic::AtomicUsize);

    impl metrics::HistogramFn for CompileSamples {
        fn record(&self, _value: f64) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    struct SampleRecorder {
        samples: Arc<CompileSamples>,
    }

    impl metrics::Recorder for SampleRecorder {
        fn describe_counter(
            &self,
            _: metrics::KeyName,
            _: Option<metrics::Unit>,
            _: metrics::SharedString,
        ) {
        }
        fn describe_gauge(
            &self,
            _: metrics::KeyName,
            _: Option<metrics::Unit>,
            _: metrics::SharedString,
        ) {
        }
        fn describe_histogram(
            &self,
            _: metrics::KeyName,
            _: Option<metrics::Unit>,
            _: metrics::SharedString,
        ) {
        }

        fn register_counter(
            &self,
            _: &metrics::Key,
            _: &metrics::Metadata<'_>,
        ) -> metrics::Counter {
            metrics::Counter::noop()
        }

        fn register_gauge(&self, _: &metrics::Key, _: &metrics::Metadata<'_>) -> metrics::Gauge {
            metrics::Gauge::noop()
        }

        fn register_histogram(
            &self,
            key: &metrics::Key,
            _: &metrics::Metadata<'_>,
        ) -> metrics::Histogram {
            if key.name() == "cmx_compile_duration_seconds" {
                metrics::Histogram::from_arc(Arc::clone(&self.samples))
            } else {
                metrics::Histogram::noop()
            }
        }
    }

    #[test]
    fn compile_duration_skips_abandoned_compilations() {
        let recorder = SampleRecorder {
            samples: Arc::new(CompileSamples::default()),
        };
        let module = ModuleName::new("tensor").unwrap();
        let runner = runner(
            FixtureCompiler::new().hang_on("sles-15"),
            RunnerConfig {
                concurrency: 2,
                timeout: Duration::from_secs(30),
            },
        );
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let cancel = CancelToken::new();

        let report = metrics::with_local_recorder(&recorder, || {
            rt.block_on(async {
                let trigger = cancel.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    trigger.cancel();
                });
                runner
                    .run(
                        &module,
                        &Parameters::defaults(),
                        &matrix(&["centos-7", "sles-15"]),
                        &cancel,
                    )
                    .await
            })
        });

        assert_eq!(report.entries[0].state, EntryState::Passed);
        assert_eq!(report.entries[1].state, EntryState::Cancelled);
        assert_eq!(recorder.samples.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
