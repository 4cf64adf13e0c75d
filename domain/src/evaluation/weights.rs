//! Score weights value object

use serde::{Deserialize, Serialize};

/// Points awarded per answer category.
///
/// Defaults to +1 per correct answer and nothing for wrong or unscored ones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub correct: f64,
    pub wrong: f64,
    pub unscored: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            correct: 1.0,
            wrong: 0.0,
            unscored: 0.0,
        }
    }
}

impl ScoreWeights {
    pub fn new(correct: f64, wrong: f64, unscored: f64) -> Self {
        Self {
            correct,
            wrong,
            unscored,
        }
    }

    /// Weighted sum of the three counters
    pub fn score(&self, correct: i32, wrong: i32, unscored: i32) -> f64 {
        f64::from(correct) * self.correct
            + f64::from(wrong) * self.wrong
            + f64::from(unscored) * self.unscored
    }

    /// All weights are finite numbers
    pub fn is_finite(&self) -> bool {
        self.correct.is_finite() && self.wrong.is_finite() && self.unscored.is_finite()
    }
}
