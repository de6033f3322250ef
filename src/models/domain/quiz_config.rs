use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{AppError, AppResult};

fn default_positive_marks() -> f64 {
    4.0
}

fn default_negative_marks() -> f64 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, Validate)]
pub struct QuizConfiguration {
    #[validate(range(min = 1))]
    pub total_questions: u32,
    #[validate(range(min = 1))]
    pub time_limit_minutes: u32,
    #[serde(default = "default_positive_marks")]
    #[validate(range(min = 0.0))]
    pub positive_marks: f64,
    #[serde(default = "default_negative_marks")]
    #[validate(range(min = 0.0))]
    pub negative_marks: f64,
}

impl QuizConfiguration {
    pub fn new(total_questions: u32, time_limit_minutes: u32) -> Self {
        QuizConfiguration {
            total_questions,
            time_limit_minutes,
            positive_marks: default_positive_marks(),
            negative_marks: default_negative_marks(),
        }
    }

    pub fn with_marks(mut self, positive_marks: f64, negative_marks: f64) -> Self {
        self.positive_marks = positive_marks;
        self.negative_marks = negative_marks;
        self
    }

    pub fn time_limit_seconds(&self) -> u64 {
        u64::from(self.time_limit_minutes) * 60
    }

    /// Validate against the bank the session will sample from.
    pub fn check_against(&self, bank_size: usize) -> AppResult<()> {
        self.validate()?;

        if self.total_questions as usize > bank_size {
            return Err(AppError::InvalidConfiguration(format!(
                "requested {} questions but the bank only has {}",
                self.total_questions, bank_size
            )));
        }

        Ok(())
    }
}
