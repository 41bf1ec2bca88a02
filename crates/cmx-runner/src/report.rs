//! # Matrix Report
//!
//! The aggregated result of a run: every entry's terminal state in
//! declaration order, with diagnostics for each entry that did not pass.
//!
//! Two renderings are provided: the JSON serialization of
//! [`MatrixReport`], and a line-oriented text form:
//!
//! ```text
//! PASSED centos-7
//! COMPILATION_FAILED ubuntu-20.04
//!     module unresolved: Unsupported osfamily Debian
//! 2 entries: 1 passed, 0 failed, 1 compilation failed, 0 cancelled
//! ```

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cmx_assert::AssertionOutcome;
use cmx_core::{CompilationFailure, FactFingerprint, ModuleName, OsId};

use crate::state::EntryState;

/// Outcome of one matrix entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryReport {
    /// The matrix entry this report describes.
    pub os: OsId,
    /// Fingerprint of the facts the entry was compiled against.
    pub fact_fingerprint: FactFingerprint,
    /// Terminal state of the entry.
    pub state: EntryState,
    /// Wall time from start to terminal state, including the wait for a
    /// worker.
    pub duration_ms: u64,
    /// Why the entry did not pass. Empty for passed entries.
    #[serde(default)]
    pub diagnostics: Vec<String>,
    /// The compilation failure, for `CompilationFailed` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<CompilationFailure>,
    /// Assertion outcomes, for entries whose catalog was evaluated.
    #[serde(default)]
    pub assertions: Vec<AssertionOutcome>,
}

impl EntryReport {
    /// Whether the entry ended `Passed`.
    pub fn passed(&self) -> bool {
        self.state == EntryState::Passed
    }
}

/// Per-state counts over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of entries in the run.
    pub total: usize,
    /// Entries whose assertions all held.
    pub passed: usize,
    /// Entries with a failing assertion.
    pub failed: usize,
    /// Entries whose compilation failed or timed out.
    pub compilation_failed: usize,
    /// Entries stopped by cancellation.
    pub cancelled: usize,
    /// The matrix had no entries, so nothing was verified.
    pub zero_coverage: bool,
}

impl Summary {
    /// Count terminal states over `entries`.
    pub fn from_entries(entries: &[EntryReport]) -> Self {
        let mut summary = Self {
            total: entries.len(),
            zero_coverage: entries.is_empty(),
            ..Self::default()
        };
        for entry in entries {
            match entry.state {
                EntryState::Passed => summary.passed += 1,
                EntryState::Failed => summary.failed += 1,
                EntryState::CompilationFailed => summary.compilation_failed += 1,
                EntryState::Cancelled => summary.cancelled += 1,
                // Reports only hold terminal entries; anything else counts
                // against the run.
                _ => summary.failed += 1,
            }
        }
        summary
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.zero_coverage {
            return f.write_str("0 entries: zero coverage, nothing was verified");
        }
        write!(
            f,
            "{} entries: {} passed, {} failed, {} compilation failed, {} cancelled",
            self.total, self.passed, self.failed, self.compilation_failed, self.cancelled
        )
    }
}

/// The result of running a module across a fact matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixReport {
    pub run_id: Uuid,
    pub module: ModuleName,
    /// Description of the matrix provider.
    pub provider: String,
    /// Name of the compiler adapter.
    pub compiler: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Whether the run was cancelled before every entry finished.
    #[serde(default)]
    pub cancelled: bool,
    /// Entries in declaration order.
    pub entries: Vec<EntryReport>,
    pub summary: Summary,
}

impl MatrixReport {
    /// Whether every entry passed. Vacuously true for an empty matrix.
    pub fn all_passed(&self) -> bool {
        self.entries.iter().all(EntryReport::passed)
    }

    /// 0 when every entry passed, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }

    /// Look up an entry by OS identifier.
    pub fn entry(&self, os: &str) -> Option<&EntryReport> {
        self.entries.iter().find(|e| e.os.as_str() == os)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Line-oriented text rendering.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let _ = writeln!(out, "{} {}", entry.state, entry.os);
            for diagnostic in &entry.diagnostics {
                let _ = writeln!(out, "    {diagnostic}");
            }
        }
        let _ = writeln!(out, "{}", self.summary);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmx_core::FactSet;

    fn entry(os: &str, state: EntryState, diagnostics: &[&str]) -> EntryReport {
        EntryReport {
            os: OsId::new(os).unwrap(),
            fact_fingerprint: FactSet::default().fingerprint(),
            state,
            duration_ms: 3,
            diagnostics: diagnostics.iter().map(|d| d.to_string()).collect(),
            failure: None,
            assertions: Vec::new(),
        }
    }

    fn report(entries: Vec<EntryReport>) -> MatrixReport {
        let now = Utc::now();
        MatrixReport {
            run_id: Uuid::new_v4(),
            module: ModuleName::new("tensor").unwrap(),
            provider: "static (2 entries)".into(),
            compiler: "fixture".into(),
            started_at: now,
            finished_at: now,
            cancelled: false,
            summary: Summary::from_entries(&entries),
            entries,
        }
    }

    #[test]
    fn exit_code_reflects_every_entry() {
        let ok = report(vec![
            entry("centos-7", EntryState::Passed, &[]),
            entry("ubuntu-20.04", EntryState::Passed, &[]),
        ]);
        assert_eq!(ok.exit_code(), 0);

        let bad = report(vec![
            entry("centos-7", EntryState::Passed, &[]),
            entry("ubuntu-20.04", EntryState::CompilationFailed, &["boom"]),
        ]);
        assert_eq!(bad.exit_code(), 1);
        assert_eq!(bad.summary.compilation_failed, 1);
    }

    #[test]
    fn empty_matrix_is_zero_coverage_with_exit_zero() {
        let empty = report(Vec::new());
        assert_eq!(empty.exit_code(), 0);
        assert!(empty.summary.zero_coverage);
        assert!(empty.render_text().contains("zero coverage"));
    }

    #[test]
    fn text_rendering() {
        let r = report(vec![
            entry("centos-7", EntryState::Passed, &[]),
            entry(
                "ubuntu-20.04",
                EntryState::CompilationFailed,
                &["module unresolved: Unsupported osfamily Debian"],
            ),
        ]);
        assert_eq!(
            r.render_text(),
            "PASSED centos-7\n\
             COMPILATION_FAILED ubuntu-20.04\n    module unresolved: Unsupported osfamily Debian\n\
             2 entries: 1 passed, 0 failed, 1 compilation failed, 0 cancelled\n"
        );
    }

    #[test]
    fn json_round_trips_for_downstream_tools() {
        let r = report(vec![entry("centos-7", EntryState::Failed, &["x"])]);
        let json = r.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["entries"][0]["state"], "failed");
        assert_eq!(value["summary"]["failed"], 1);
        assert!(value["entries"][0].get("failure").is_none());
        let back: MatrixReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
