//! Exam entities
//!
//! - [`StudentExam`] — one submitted exam, transient for a single review
//! - [`ScoreResult`] — the score of one exam, produced once by the engine

use crate::core::error::DomainError;
use crate::core::ids::{ExamId, StageId};
use serde::{Deserialize, Serialize};

/// One submitted response: the option a student chose for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamResponse {
    #[serde(rename = "qst_idx")]
    pub question: i32,
    #[serde(rename = "ans_idx")]
    pub response: i32,
}

impl ExamResponse {
    pub fn new(question: i32, response: i32) -> Self {
        Self { question, response }
    }
}

/// A student's submitted exam for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentExam {
    pub stage: StageId,
    #[serde(rename = "id_exam")]
    pub exam_id: ExamId,
    pub answers: Vec<ExamResponse>,
}

impl StudentExam {
    pub fn new(
        stage: impl Into<StageId>,
        exam_id: impl Into<ExamId>,
        answers: Vec<ExamResponse>,
    ) -> Self {
        Self {
            stage: stage.into(),
            exam_id: exam_id.into(),
            answers,
        }
    }

    /// Parse a JSON array of exams (`[{"stage": 1, "id_exam": 100, "answers": [...]}]`).
    pub fn parse_batch(json: &str) -> Result<Vec<StudentExam>, DomainError> {
        serde_json::from_str(json).map_err(|e| DomainError::InvalidExamPayload(e.to_string()))
    }
}

/// Score of one exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub stage: StageId,
    #[serde(rename = "id_exam")]
    pub exam_id: ExamId,
    #[serde(rename = "correct_answers")]
    pub correct: i32,
    #[serde(rename = "wrong_answers")]
    pub wrong: i32,
    #[serde(rename = "unscored_answers")]
    pub unscored: i32,
    pub score: f64,
}

impl ScoreResult {
    /// Result for an exam whose stage has no answer key: everything unscored.
    pub fn unscored(exam: &StudentExam) -> Self {
        Self {
            stage: exam.stage,
            exam_id: exam.exam_id,
            correct: 0,
            wrong: 0,
            unscored: count(exam.answers.len()),
            score: 0.0,
        }
    }

    /// Serialize a result list as a JSON array.
    pub fn to_json_array(results: &[ScoreResult]) -> Result<String, DomainError> {
        serde_json::to_string(results).map_err(|e| DomainError::Serialization(e.to_string()))
    }
}

/// Clamp a collection length into the 32-bit counters used on the wire.
pub(crate) fn count(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}
