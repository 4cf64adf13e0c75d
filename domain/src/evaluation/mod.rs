//! Exam scoring
//!
//! - [`weights::ScoreWeights`] — points per correct/wrong/unscored answer
//! - [`engine::EvaluationEngine`] — scores exams against an [`AnswerStore`](crate::AnswerStore)

pub mod engine;
pub mod weights;
