use serde::{Deserialize, Serialize};

use crate::models::domain::question::Question;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum QuestionOutcome {
    Correct,
    Incorrect,
    Unanswered,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct QuestionReview {
    pub question: Question,
    pub selected: Option<String>,
    pub outcome: QuestionOutcome,
    pub points: f64,
}

/// Outcome of a submitted quiz session. Computed once at submission.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct QuizResult {
    pub total_questions: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub unanswered_count: u32,
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub time_spent_seconds: u64,
    pub reviews: Vec<QuestionReview>,
}

impl QuizResult {
    pub fn is_perfect(&self) -> bool {
        self.total_questions > 0 && self.correct_count == self.total_questions
    }

    /// Questions that were missed or skipped, to seed a follow-up session.
    pub fn retry_bank(&self) -> Vec<Question> {
        self.reviews
            .iter()
            .filter(|r| r.outcome != QuestionOutcome::Correct)
            .map(|r| r.question.clone())
            .collect()
    }
}
