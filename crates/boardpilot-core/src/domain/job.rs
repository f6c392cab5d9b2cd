//! Upload jobs and the phase state machine that drives them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::board::{BoardIdentity, BoardProfileId};

/// Phase of an upload job.
///
/// Phases advance strictly forward:
///
/// `Idle → Detecting → Gating → {Blocked | Unverified} → PreparingSources →
/// Compiling → {CompileFailed | WaitingForPort} → Uploading →
/// {UploadFailed | Succeeded}`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadPhase {
    Idle,
    Detecting,
    Gating,
    /// Terminal: the compatibility gate refused the upload.
    Blocked,
    /// No identity could be resolved for the requested port; the job
    /// proceeds with a warning.
    Unverified,
    PreparingSources,
    Compiling,
    /// Terminal: compile or source staging failed.
    CompileFailed,
    WaitingForPort,
    Uploading,
    /// Terminal: the upload invocation failed.
    UploadFailed,
    /// Terminal: firmware is on the board.
    Succeeded,
}

impl UploadPhase {
    /// Whether the state machine stops here.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadPhase::Blocked
                | UploadPhase::CompileFailed
                | UploadPhase::UploadFailed
                | UploadPhase::Succeeded
        )
    }
}

/// One user-initiated flashing request.
///
/// Mutated only by the orchestrator as it advances phases; discarded on a
/// terminal phase, never persisted.
#[derive(Debug, Clone)]
pub struct UploadJob {
    /// Unique identifier for this job.
    pub id: Uuid,

    /// The sketch/program text to flash.
    pub source_text: String,

    /// The board profile the user selected.
    pub target: BoardProfileId,

    /// Serial endpoint to upload through.
    pub port_name: String,

    /// Human-facing programmer label, for families that need external
    /// programming hardware.
    pub programmer: Option<String>,

    /// Current phase.
    pub phase: UploadPhase,

    /// When the job was created.
    pub created_at: DateTime<Utc>,
}

impl UploadJob {
    /// Create a new job in the `Idle` phase.
    pub fn new(
        source_text: impl Into<String>,
        target: BoardProfileId,
        port_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_text: source_text.into(),
            target,
            port_name: port_name.into(),
            programmer: None,
            phase: UploadPhase::Idle,
            created_at: Utc::now(),
        }
    }

    /// Attach a programmer label (builder pattern).
    pub fn with_programmer(mut self, label: impl Into<String>) -> Self {
        self.programmer = Some(label.into());
        self
    }
}

/// Terminal outcome of an upload job, always carrying a specific rationale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// The compatibility gate blocked the job before any destructive step.
    Blocked { rationale: String },

    /// A required supporting resource was missing; nothing was compiled.
    SetupFailed { reason: String },

    /// The external compile invocation failed; `output` is the tool's own
    /// diagnostic text, verbatim.
    CompileFailed { output: String },

    /// The external upload invocation failed. `guidance` carries curated
    /// remediation lines when the target family is known to need special
    /// hardware.
    UploadFailed {
        output: String,
        guidance: Vec<String>,
    },

    Succeeded,
}

impl UploadOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, UploadOutcome::Succeeded)
    }

    /// The terminal phase this outcome corresponds to.
    pub fn phase(&self) -> UploadPhase {
        match self {
            UploadOutcome::Blocked { .. } => UploadPhase::Blocked,
            UploadOutcome::SetupFailed { .. } | UploadOutcome::CompileFailed { .. } => {
                UploadPhase::CompileFailed
            }
            UploadOutcome::UploadFailed { .. } => UploadPhase::UploadFailed,
            UploadOutcome::Succeeded => UploadPhase::Succeeded,
        }
    }
}

/// Result of a complete upload job execution.
#[derive(Debug, Clone)]
pub struct UploadReport {
    /// Job this report belongs to.
    pub job_id: Uuid,

    /// Terminal outcome with rationale.
    pub outcome: UploadOutcome,

    /// Every identity discovered during the job's detection pass.
    pub identities: Vec<BoardIdentity>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl UploadReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.succeeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_phases() {
        assert!(UploadPhase::Blocked.is_terminal());
        assert!(UploadPhase::CompileFailed.is_terminal());
        assert!(UploadPhase::UploadFailed.is_terminal());
        assert!(UploadPhase::Succeeded.is_terminal());
        assert!(!UploadPhase::Idle.is_terminal());
        assert!(!UploadPhase::Unverified.is_terminal());
        assert!(!UploadPhase::WaitingForPort.is_terminal());
    }

    #[test]
    fn test_new_job_starts_idle() {
        let job = UploadJob::new("void setup() {}", "arduino:avr:uno".parse().unwrap(), "COM3");
        assert_eq!(job.phase, UploadPhase::Idle);
        assert!(job.programmer.is_none());

        let job = job.with_programmer("SerialUPDI");
        assert_eq!(job.programmer.as_deref(), Some("SerialUPDI"));
    }

    #[test]
    fn test_outcome_phase_mapping() {
        let blocked = UploadOutcome::Blocked {
            rationale: "incompatible".to_string(),
        };
        assert_eq!(blocked.phase(), UploadPhase::Blocked);
        assert!(!blocked.succeeded());
        assert!(UploadOutcome::Succeeded.succeeded());
        assert_eq!(UploadOutcome::Succeeded.phase(), UploadPhase::Succeeded);
    }
}
