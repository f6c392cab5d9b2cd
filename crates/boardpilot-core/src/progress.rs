//! Ordered progress events pushed to a caller-owned channel.
//!
//! The core never touches a caller's execution context: it only pushes
//! sequence-numbered events onto an unbounded channel that the caller
//! drains on whatever thread it chooses. Events for a given job are
//! delivered in phase order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Severity implied by a progress event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single human-readable progress event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    /// Position in the job's ordered event stream (1-based).
    pub seq: u64,

    pub severity: Severity,

    pub message: String,

    pub timestamp: DateTime<Utc>,
}

/// Sending half of a progress channel.
///
/// Cloning shares the sequence counter, so every clone feeds the same
/// ordered stream. A disabled sink swallows events, letting library code
/// report unconditionally.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: Option<UnboundedSender<ProgressEvent>>,
    seq: Arc<AtomicU64>,
}

impl ProgressSink {
    /// Create a connected sink and the receiver the caller drains.
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Some(tx),
                seq: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// A sink that drops every event.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an informational event.
    pub fn info(&self, message: impl Into<String>) {
        self.emit(Severity::Info, message.into());
    }

    /// Emit a warning event.
    pub fn warn(&self, message: impl Into<String>) {
        self.emit(Severity::Warning, message.into());
    }

    /// Emit an error event.
    pub fn error(&self, message: impl Into<String>) {
        self.emit(Severity::Error, message.into());
    }

    fn emit(&self, severity: Severity, message: String) {
        let Some(tx) = &self.tx else {
            return;
        };
        let event = ProgressEvent {
            seq: self.seq.fetch_add(1, Ordering::SeqCst) + 1,
            severity,
            message,
            timestamp: Utc::now(),
        };
        // A dropped receiver means the caller stopped listening; events are
        // then discarded, never an error.
        let _ = tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_ordered() {
        let (sink, mut rx) = ProgressSink::channel();
        sink.info("one");
        sink.warn("two");
        sink.error("three");

        let a = rx.try_recv().unwrap();
        let b = rx.try_recv().unwrap();
        let c = rx.try_recv().unwrap();
        assert_eq!((a.seq, b.seq, c.seq), (1, 2, 3));
        assert_eq!(a.message, "one");
        assert_eq!(b.severity, Severity::Warning);
        assert_eq!(c.severity, Severity::Error);
    }

    #[test]
    fn test_clones_share_the_sequence() {
        let (sink, mut rx) = ProgressSink::channel();
        let clone = sink.clone();
        sink.info("first");
        clone.info("second");

        assert_eq!(rx.try_recv().unwrap().seq, 1);
        assert_eq!(rx.try_recv().unwrap().seq, 2);
    }

    #[test]
    fn test_disabled_sink_swallows_events() {
        let sink = ProgressSink::disabled();
        sink.info("nobody hears this");
    }

    #[test]
    fn test_dropped_receiver_does_not_panic() {
        let (sink, rx) = ProgressSink::channel();
        drop(rx);
        sink.info("still fine");
    }
}
