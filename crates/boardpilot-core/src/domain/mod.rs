//! Domain model for board identification and upload jobs.

pub mod board;
pub mod error;
pub mod job;

pub use board::{BoardIdentity, BoardProfileId, Confidence, Family};
pub use error::{BoardpilotError, Result};
pub use job::{UploadJob, UploadOutcome, UploadPhase, UploadReport};
