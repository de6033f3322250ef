use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Routes `log` output through the test harness. Safe to call from every test.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub mod fixtures {
    use crate::models::domain::{Question, QuizConfiguration, QuizResult};
    use crate::services::quiz_grading_service::QuizGradingService;

    /// A question whose prompt and options are unique to `n`. The answer is always the second
    /// option.
    pub fn sample_question(n: usize) -> Question {
        let a = format!("{} m/s", n * 2);
        let b = format!("{} m/s", n * 2 + 1);
        let c = format!("{} km/h", n);
        let d = format!("{} mph", n);
        Question::new(
            &format!("Question {}: what is the speed of cart {}?", n, n),
            [a.as_str(), b.as_str(), c.as_str(), d.as_str()],
            &b,
            &format!("Cart {} covers {} m each second.", n, n * 2 + 1),
        )
    }

    pub fn sample_bank(size: usize) -> Vec<Question> {
        (1..=size).map(sample_question).collect()
    }

    /// A graded result with `correct` right answers, then `incorrect` wrong ones, the rest blank.
    pub fn quiz_result(
        total: u32,
        correct: u32,
        incorrect: u32,
        time_spent_seconds: u64,
    ) -> QuizResult {
        let questions = sample_bank(total as usize);
        let answers: Vec<Option<String>> = questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let i = i as u32;
                if i < correct {
                    Some(q.correct_answer.clone())
                } else if i < correct + incorrect {
                    Some(q.options[0].clone())
                } else {
                    None
                }
            })
            .collect();

        let config = QuizConfiguration::new(total.max(1), 10);
        QuizGradingService::grade(&questions, &answers, &config, time_spent_seconds)
            .expect("fixture answers align with questions")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::fixtures::*;

    #[test]
    fn sample_bank_has_distinct_valid_questions() {
        let bank = sample_bank(25);
        let prompts: HashSet<_> = bank.iter().map(|q| q.prompt.as_str()).collect();

        assert_eq!(prompts.len(), 25);
        for question in &bank {
            assert!(question.check().is_ok());
            assert!(question.has_option(&question.correct_answer));
        }
    }

    #[test]
    fn quiz_result_counts_outcomes() {
        let result = quiz_result(10, 6, 2, 300);
        assert_eq!(result.correct_count, 6);
        assert_eq!(result.incorrect_count, 2);
        assert_eq!(result.unanswered_count, 2);
        assert_eq!(result.percentage, 60.0);
    }
}
