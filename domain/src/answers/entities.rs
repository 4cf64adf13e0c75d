//! Answer key entities

use crate::core::error::DomainError;
use crate::core::ids::StageId;
use serde::{Deserialize, Serialize};

/// The correct response for one question of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Question index within the stage
    #[serde(rename = "qst_idx")]
    pub question: i32,
    /// Index of the correct response
    #[serde(rename = "rans_idx")]
    pub response: i32,
}

impl Answer {
    pub fn new(question: i32, response: i32) -> Self {
        Self { question, response }
    }
}

/// The full answer key of one stage.
///
/// Duplicate question indices are allowed; when a lookup is derived, the
/// last occurrence wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSet {
    pub stage: StageId,
    pub answers: Vec<Answer>,
}

impl AnswerSet {
    pub fn new(stage: impl Into<StageId>, answers: Vec<Answer>) -> Self {
        Self {
            stage: stage.into(),
            answers,
        }
    }

    /// Parse a JSON array of answer sets (`[{"stage": 1, "answers": [...]}]`).
    pub fn parse_list(json: &str) -> Result<Vec<AnswerSet>, DomainError> {
        serde_json::from_str(json).map_err(|e| DomainError::InvalidAnswerPayload(e.to_string()))
    }
}
