//! Port for structured review logging.
//!
//! Defines the [`ReviewLogger`] trait for recording what the service did with
//! each request (answer keys loaded, reviews dispatched and completed,
//! shutdowns) to a machine-readable log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostics, this port keeps an audit trail (JSONL).

use serde_json::Value;

/// A structured review event.
pub struct ReviewEvent {
    /// Event type identifier (e.g., "review_completed", "answers_loaded").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl ReviewEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging review events.
///
/// `log` is synchronous and infallible so that a broken log never disturbs
/// request handling; implementations swallow their own failures.
pub trait ReviewLogger: Send + Sync {
    fn log(&self, event: ReviewEvent);
}

/// No-op implementation for tests and when the review log is disabled.
pub struct NoReviewLogger;

impl ReviewLogger for NoReviewLogger {
    fn log(&self, _event: ReviewEvent) {}
}
