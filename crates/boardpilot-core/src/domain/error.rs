//! Error taxonomy for boardpilot.
//!
//! Only genuinely fatal conditions are errors. Resolution-layer ambiguity is
//! absorbed as [`Confidence`](super::board::Confidence) metadata, and
//! orchestrator-layer failures (blocked gate, failed compile or upload)
//! surface as terminal [`UploadOutcome`](super::job::UploadOutcome) states
//! with a rationale, not as `Err` values.

/// Boardpilot domain errors.
#[derive(Debug, thiserror::Error)]
pub enum BoardpilotError {
    /// The toolchain executable could not be located at all. Reported once
    /// at construction, never per detection call.
    #[error("toolchain unavailable: {0}")]
    DetectionUnavailable(String),

    /// A required supporting resource is missing before any external
    /// process was spawned.
    #[error("setup failure: {0}")]
    Setup(String),

    #[error("invalid board profile id: {0}")]
    InvalidProfileId(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for boardpilot domain operations.
pub type Result<T> = std::result::Result<T, BoardpilotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BoardpilotError::DetectionUnavailable("arduino-cli not found".to_string());
        assert!(err.to_string().contains("toolchain unavailable"));

        let err = BoardpilotError::Setup("headers.h not found".to_string());
        assert!(err.to_string().contains("setup failure"));

        let err = BoardpilotError::InvalidProfileId("a:b".to_string());
        assert!(err.to_string().contains("a:b"));
    }
}
