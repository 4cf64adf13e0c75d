//! Identifier value objects
//!
//! Both identifiers are 32-bit signed integers on every wire the system
//! speaks (JSON payloads and the cluster codec).

use serde::{Deserialize, Serialize};

/// Identifier of an exam stage (Value Object)
///
/// A stage groups one question set with its answer key; stages are the keys
/// of the [`AnswerStore`](crate::AnswerStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(i32);

impl StageId {
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Returns the raw integer value.
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for StageId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one submitted exam (Value Object)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExamId(i32);

impl ExamId {
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Returns the raw integer value.
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for ExamId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ExamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
