use crate::errors::{AppError, AppResult};
use crate::models::domain::{
    Question, QuestionOutcome, QuestionReview, QuizConfiguration, QuizResult,
};

pub struct QuizGradingService;

impl QuizGradingService {
    /// Grade a finished session. `answers` is aligned with `questions`; `None` means unanswered.
    pub fn grade(
        questions: &[Question],
        answers: &[Option<String>],
        config: &QuizConfiguration,
        time_spent_seconds: u64,
    ) -> AppResult<QuizResult> {
        if questions.len() != answers.len() {
            return Err(AppError::InvalidState(format!(
                "{} answers recorded for {} questions",
                answers.len(),
                questions.len()
            )));
        }

        let mut correct_count = 0_u32;
        let mut incorrect_count = 0_u32;
        let mut unanswered_count = 0_u32;
        let mut reviews = Vec::with_capacity(questions.len());

        for (question, answer) in questions.iter().zip(answers) {
            let (outcome, points) = Self::grade_question(question, answer.as_deref(), config);

            match outcome {
                QuestionOutcome::Correct => correct_count += 1,
                QuestionOutcome::Incorrect => incorrect_count += 1,
                QuestionOutcome::Unanswered => unanswered_count += 1,
            }

            reviews.push(QuestionReview {
                question: question.clone(),
                selected: answer.clone(),
                outcome,
                points,
            });
        }

        let total_questions = questions.len() as u32;
        let score = f64::from(correct_count) * config.positive_marks
            - f64::from(incorrect_count) * config.negative_marks;
        let percentage = if total_questions == 0 {
            0.0
        } else {
            f64::from(correct_count) / f64::from(total_questions) * 100.0
        };

        Ok(QuizResult {
            total_questions,
            correct_count,
            incorrect_count,
            unanswered_count,
            score,
            max_score: f64::from(total_questions) * config.positive_marks,
            percentage,
            time_spent_seconds,
            reviews,
        })
    }

    /// Unanswered questions score zero; only a wrong pick costs the negative mark.
    fn grade_question(
        question: &Question,
        answer: Option<&str>,
        config: &QuizConfiguration,
    ) -> (QuestionOutcome, f64) {
        match answer {
            None => (QuestionOutcome::Unanswered, 0.0),
            Some(option) if question.is_correct(option) => {
                (QuestionOutcome::Correct, config.positive_marks)
            }
            Some(_) => (QuestionOutcome::Incorrect, -config.negative_marks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::sample_bank;

    #[test]
    fn scores_mixed_answers_with_negative_marking() {
        let questions = sample_bank(10);
        let config = QuizConfiguration::new(10, 10).with_marks(4.0, 1.0);

        let mut answers: Vec<Option<String>> = Vec::new();
        for q in &questions[..6] {
            answers.push(Some(q.correct_answer.clone()));
        }
        for q in &questions[6..8] {
            let wrong = q.options.iter().find(|o| **o != q.correct_answer).cloned();
            answers.push(wrong);
        }
        answers.push(None);
        answers.push(None);

        let result = QuizGradingService::grade(&questions, &answers, &config, 300).unwrap();

        assert_eq!(result.correct_count, 6);
        assert_eq!(result.incorrect_count, 2);
        assert_eq!(result.unanswered_count, 2);
        assert_eq!(result.score, 22.0);
        assert_eq!(result.percentage, 60.0);
        assert_eq!(result.max_score, 40.0);
        assert_eq!(result.time_spent_seconds, 300);
    }

    #[test]
    fn unanswered_questions_score_zero() {
        let questions = sample_bank(3);
        let config = QuizConfiguration::new(3, 5);

        let result =
            QuizGradingService::grade(&questions, &[None, None, None], &config, 10).unwrap();

        assert_eq!(result.score, 0.0);
        assert_eq!(result.unanswered_count, 3);
        assert!(result.reviews.iter().all(|r| r.points == 0.0));
    }

    #[test]
    fn review_records_points_per_question() {
        let questions = sample_bank(2);
        let config = QuizConfiguration::new(2, 5).with_marks(3.0, 0.5);
        let answers = vec![
            Some(questions[0].correct_answer.clone()),
            Some("definitely wrong".to_string()),
        ];

        let result = QuizGradingService::grade(&questions, &answers, &config, 0).unwrap();

        assert_eq!(result.reviews[0].outcome, QuestionOutcome::Correct);
        assert_eq!(result.reviews[0].points, 3.0);
        assert_eq!(result.reviews[1].outcome, QuestionOutcome::Incorrect);
        assert_eq!(result.reviews[1].points, -0.5);
        assert_eq!(result.score, 2.5);
    }

    #[test]
    fn rejects_misaligned_answers() {
        let questions = sample_bank(2);
        let config = QuizConfiguration::new(2, 5);

        assert!(QuizGradingService::grade(&questions, &[None], &config, 0).is_err());
    }
}
