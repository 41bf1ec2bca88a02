//! # Entry State Machine
//!
//! Lifecycle of one matrix entry within a run.
//!
//! ## States
//!
//! PENDING → COMPILING → COMPILED → ASSERTING → PASSED | FAILED
//!
//! COMPILING → COMPILATION_FAILED
//!
//! PENDING | COMPILING | COMPILED | ASSERTING → CANCELLED
//!
//! PASSED, FAILED, COMPILATION_FAILED and CANCELLED are terminal. A
//! compilation failure is never reported as FAILED: FAILED means the
//! catalog compiled and an assertion did not hold.

use serde::{Deserialize, Serialize};

use cmx_core::StateError;

/// The state of a matrix entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Waiting for a worker.
    Pending,
    /// The compiler is running.
    Compiling,
    /// A catalog was produced.
    Compiled,
    /// Assertions are being evaluated.
    Asserting,
    /// Every assertion held (terminal).
    Passed,
    /// At least one assertion did not hold (terminal).
    Failed,
    /// No catalog could be produced (terminal).
    CompilationFailed,
    /// The run was cancelled before this entry finished (terminal).
    Cancelled,
}

impl EntryState {
    /// Every state, in lifecycle order.
    pub const ALL: [EntryState; 8] = [
        Self::Pending,
        Self::Compiling,
        Self::Compiled,
        Self::Asserting,
        Self::Passed,
        Self::Failed,
        Self::CompilationFailed,
        Self::Cancelled,
    ];

    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Passed | Self::Failed | Self::CompilationFailed | Self::Cancelled
        )
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(&self, next: EntryState) -> bool {
        use EntryState::*;
        matches!(
            (self, next),
            (Pending, Compiling)
                | (Compiling, Compiled)
                | (Compiling, CompilationFailed)
                | (Compiled, Asserting)
                | (Asserting, Passed)
                | (Asserting, Failed)
                | (Pending | Compiling | Compiled | Asserting, Cancelled)
        )
    }

    /// Validate and perform a transition.
    pub fn transition(self, next: EntryState) -> Result<EntryState, StateError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StateError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Lowercase name, used as a metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Compiling => "compiling",
            Self::Compiled => "compiled",
            Self::Asserting => "asserting",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::CompilationFailed => "compilation_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for EntryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Compiling => "COMPILING",
            Self::Compiled => "COMPILED",
            Self::Asserting => "ASSERTING",
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::CompilationFailed => "COMPILATION_FAILED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut state = EntryState::Pending;
        for next in [
            EntryState::Compiling,
            EntryState::Compiled,
            EntryState::Asserting,
            EntryState::Passed,
        ] {
            state = state.transition(next).unwrap();
        }
        assert!(state.is_terminal());
    }

    #[test]
    fn compilation_failure_never_reaches_failed() {
        assert!(EntryState::Compiling.can_transition_to(EntryState::CompilationFailed));
        assert!(!EntryState::Compiling.can_transition_to(EntryState::Failed));
        assert!(!EntryState::Compiled.can_transition_to(EntryState::CompilationFailed));
    }

    #[test]
    fn terminal_states_have_no_successors() {
        for from in EntryState::ALL.iter().filter(|s| s.is_terminal()) {
            for to in EntryState::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn every_live_state_can_be_cancelled() {
        for from in EntryState::ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(from.can_transition_to(EntryState::Cancelled), "{from}");
        }
    }

    #[test]
    fn invalid_transition_is_an_error() {
        let err = EntryState::Passed.transition(EntryState::Compiling).unwrap_err();
        assert_eq!(err.to_string(), "invalid transition from PASSED to COMPILING");
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&EntryState::CompilationFailed).unwrap();
        assert_eq!(json, r#""compilation_failed""#);
    }
}
