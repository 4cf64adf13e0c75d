//! Logging infrastructure — structured review logging.
//!
//! Provides [`JsonlReviewLogger`], a JSONL file writer that implements the
//! [`ReviewLogger`](scorehive_application::ReviewLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlReviewLogger;
