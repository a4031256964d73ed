//! Initialization state types.

use serde::{Deserialize, Serialize};

/// Process-wide initialization state.
///
/// Transitions only move forward:
/// `Uninitialized → Initializing → Ready | Failed`, and `Ready → TornDown`.
/// `Failed` and `TornDown` are terminal for the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitializationState {
    /// No VM has been bound yet.
    Uninitialized,

    /// A thread is creating the VM.
    Initializing,

    /// A VM is bound and the reflection cache is populated.
    Ready,

    /// Initialization failed.
    Failed,

    /// The VM was destroyed.
    TornDown,
}

impl InitializationState {
    /// Check if the state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::TornDown)
    }

    /// Check if a transition to `next` is allowed.
    pub fn can_transition_to(&self, next: InitializationState) -> bool {
        use InitializationState::*;
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Uninitialized, Ready)
                | (Uninitialized, Failed)
                | (Initializing, Ready)
                | (Initializing, Failed)
                | (Ready, TornDown)
        )
    }

    /// Get the state name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::TornDown => "torn-down",
        }
    }
}

impl std::fmt::Display for InitializationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How a successful initialization call obtained its VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum InitOutcome {
    /// The calling thread created the VM.
    Created,

    /// A dedicated worker thread created the VM and the caller attached.
    CreatedOnWorker,

    /// The caller attached to a VM that was already resident.
    Attached {
        /// Position of the VM in the locator's result.
        index: usize,
    },
}

impl InitOutcome {
    /// Status code reported by the initialization entry point.
    pub fn status_code(&self) -> i32 {
        match self {
            InitOutcome::Created => 0,
            InitOutcome::CreatedOnWorker | InitOutcome::Attached { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InitializationState::*;

    #[test]
    fn test_state_transitions() {
        // (from, to, allowed)
        let cases = [
            (Uninitialized, Initializing, true),
            (Uninitialized, Ready, true),
            (Initializing, Ready, true),
            (Initializing, Failed, true),
            (Ready, TornDown, true),
            (Ready, Initializing, false),
            (Failed, Initializing, false),
            (Failed, Ready, false),
            (TornDown, Uninitialized, false),
            (TornDown, Initializing, false),
        ];

        for (from, to, allowed) in cases {
            assert_eq!(from.can_transition_to(to), allowed, "{} -> {}", from, to);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(Failed.is_terminal());
        assert!(TornDown.is_terminal());
        assert!(!Ready.is_terminal());
        assert!(!Uninitialized.is_terminal());
    }

    #[test]
    fn test_outcome_status_codes() {
        assert_eq!(InitOutcome::Created.status_code(), 0);
        assert_eq!(InitOutcome::CreatedOnWorker.status_code(), 1);
        assert_eq!(InitOutcome::Attached { index: 1 }.status_code(), 1);
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&InitOutcome::Attached { index: 2 }).unwrap();
        assert_eq!(json, r#"{"path":"attached","index":2}"#);
    }
}
