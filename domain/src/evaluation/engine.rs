//! Evaluation engine

use crate::answers::store::AnswerStore;
use crate::evaluation::weights::ScoreWeights;
use crate::exam::entities::{ScoreResult, StudentExam};

/// Scores exams against the answer keys of an [`AnswerStore`].
///
/// The only state is the fixed [`ScoreWeights`]; scoring the same exam
/// against the same store always yields the same result. The store is taken
/// mutably because its lookup cache fills lazily.
#[derive(Debug, Clone, Default)]
pub struct EvaluationEngine {
    weights: ScoreWeights,
}

impl EvaluationEngine {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    /// Score every exam, one result per exam in input order.
    pub fn evaluate_batch(&self, store: &mut AnswerStore, exams: &[StudentExam]) -> Vec<ScoreResult> {
        exams
            .iter()
            .map(|exam| self.evaluate_one(store, exam))
            .collect()
    }

    /// Score one exam.
    ///
    /// An empty lookup (unknown stage, or a stage whose key has no answers)
    /// counts every submitted answer as unscored with a score of `0.0`.
    pub fn evaluate_one(&self, store: &mut AnswerStore, exam: &StudentExam) -> ScoreResult {
        let lookup = store.get_lookup(exam.stage);
        if lookup.is_empty() {
            return ScoreResult::unscored(exam);
        }

        let (mut correct, mut wrong, mut unscored) = (0, 0, 0);
        for answer in &exam.answers {
            match lookup.get(&answer.question) {
                None => unscored += 1,
                Some(&expected) if expected == answer.response => correct += 1,
                Some(_) => wrong += 1,
            }
        }

        ScoreResult {
            stage: exam.stage,
            exam_id: exam.exam_id,
            correct,
            wrong,
            unscored,
            score: self.weights.score(correct, wrong, unscored),
        }
    }
}
