//! Boardpilot Core Library
//!
//! Domain logic for board identification and safe sketch uploads: profile
//! identifiers, the compatibility gate, programmer and board-label tables,
//! and the ordered progress-event channel.

pub mod catalog;
pub mod compat;
pub mod domain;
pub mod programmer;
pub mod progress;
pub mod telemetry;

pub use compat::{validate, CompatibilityRuleSet, GateDecision, SymmetryGap};

pub use domain::{
    BoardIdentity, BoardProfileId, BoardpilotError, Confidence, Family, Result, UploadJob,
    UploadOutcome, UploadPhase, UploadReport,
};

pub use progress::{ProgressEvent, ProgressSink, Severity};

pub use telemetry::init_tracing;

/// Boardpilot version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
