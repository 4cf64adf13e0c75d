//! Domain layer for scorehive
//!
//! This crate contains the grading logic and the data that flows between the
//! coordinator and its workers. It has no dependencies on sockets, processes
//! or configuration files.
//!
//! # Core Concepts
//!
//! ## Answer keys
//!
//! Every exam belongs to a **stage**. The [`AnswerStore`] keeps one
//! [`AnswerSet`] per stage and derives a question → response lookup that the
//! [`EvaluationEngine`] scores against.
//!
//! ## Distribution
//!
//! A review batch is cut into contiguous slices, one per worker rank
//! ([`slice_exams`]). Slices, answer keys, commands and results travel over
//! four logical [`Channel`]s using the portable [`codec`](distribution::codec).

pub mod answers;
pub mod core;
pub mod distribution;
pub mod evaluation;
pub mod exam;

// Re-export commonly used types
pub use answers::{
    entities::{Answer, AnswerSet},
    store::{AnswerLookup, AnswerStore},
};
pub use core::{
    error::DomainError,
    ids::{ExamId, StageId},
};
pub use distribution::{
    channel::{Channel, ChannelTags},
    codec::{CodecError, WIRE_VERSION},
    command::WorkerCommand,
    rank::{PoolSize, Rank},
    slicing::{exams_per_worker, slice_exams},
};
pub use evaluation::{engine::EvaluationEngine, weights::ScoreWeights};
pub use exam::entities::{ExamResponse, ScoreResult, StudentExam};
