use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::domain::{Question, QuizConfiguration, QuizResult};
use crate::services::quiz_grading_service::QuizGradingService;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum SessionPhase {
    Configuring,
    InProgress,
    Submitted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum QuestionStatus {
    NotVisited,
    Answered,
    MarkedForReview,
    AnsweredAndMarked,
}

impl QuestionStatus {
    fn is_marked(self) -> bool {
        matches!(
            self,
            QuestionStatus::MarkedForReview | QuestionStatus::AnsweredAndMarked
        )
    }

    fn answered(self) -> Self {
        if self.is_marked() {
            QuestionStatus::AnsweredAndMarked
        } else {
            QuestionStatus::Answered
        }
    }

    fn marked(self) -> Self {
        match self {
            QuestionStatus::NotVisited | QuestionStatus::MarkedForReview => {
                QuestionStatus::MarkedForReview
            }
            QuestionStatus::Answered | QuestionStatus::AnsweredAndMarked => {
                QuestionStatus::AnsweredAndMarked
            }
        }
    }
}

/// Counts behind the question palette.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PaletteSummary {
    pub not_visited: usize,
    pub answered: usize,
    pub marked_for_review: usize,
    pub answered_and_marked: usize,
}

/// A timed multiple-choice quiz: `Configuring` → `InProgress` → `Submitted`.
#[derive(Clone, Debug)]
pub struct QuizSession {
    id: Uuid,
    phase: SessionPhase,
    config: Option<QuizConfiguration>,
    questions: Vec<Question>,
    answers: Vec<Option<String>>,
    statuses: Vec<QuestionStatus>,
    current_index: usize,
    remaining_seconds: u64,
    result: Option<QuizResult>,
}

impl Default for QuizSession {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizSession {
    pub fn new() -> Self {
        QuizSession {
            id: Uuid::new_v4(),
            phase: SessionPhase::Configuring,
            config: None,
            questions: Vec::new(),
            answers: Vec::new(),
            statuses: Vec::new(),
            current_index: 0,
            remaining_seconds: 0,
            result: None,
        }
    }

    pub fn configure(&mut self, config: QuizConfiguration, bank: &[Question]) -> AppResult<()> {
        self.configure_with_rng(config, bank, &mut rand::thread_rng())
    }

    /// Samples `total_questions` distinct questions by shuffling a copy of the bank and taking
    /// a prefix.
    pub fn configure_with_rng<R: Rng + ?Sized>(
        &mut self,
        config: QuizConfiguration,
        bank: &[Question],
        rng: &mut R,
    ) -> AppResult<()> {
        if self.phase != SessionPhase::Configuring {
            return Err(AppError::InvalidState(
                "session has already been configured".to_string(),
            ));
        }
        config.check_against(bank.len())?;

        let mut pool = bank.to_vec();
        pool.shuffle(rng);
        pool.truncate(config.total_questions as usize);

        let count = pool.len();
        self.questions = pool;
        self.answers = vec![None; count];
        self.statuses = vec![QuestionStatus::NotVisited; count];
        self.current_index = 0;
        self.remaining_seconds = config.time_limit_seconds();
        self.config = Some(config);
        self.phase = SessionPhase::InProgress;

        log::debug!(
            "Quiz session {} started with {} questions, {}s on the clock",
            self.id,
            count,
            self.remaining_seconds
        );
        Ok(())
    }

    fn ensure_in_progress(&self, action: &str) -> AppResult<()> {
        match self.phase {
            SessionPhase::InProgress => Ok(()),
            phase => Err(AppError::InvalidState(format!(
                "cannot {} while session is {:?}",
                action, phase
            ))),
        }
    }

    fn check_index(&self, index: usize) -> AppResult<()> {
        if index >= self.questions.len() {
            return Err(AppError::IndexOutOfRange {
                index,
                len: self.questions.len(),
            });
        }
        Ok(())
    }

    pub fn select_answer(&mut self, index: usize, option: &str) -> AppResult<()> {
        self.ensure_in_progress("select an answer")?;
        self.check_index(index)?;

        if !self.questions[index].has_option(option) {
            return Err(AppError::InvalidAnswer(format!(
                "'{}' is not an option for question {}",
                option,
                index + 1
            )));
        }

        self.answers[index] = Some(option.to_string());
        self.statuses[index] = self.statuses[index].answered();
        Ok(())
    }

    pub fn mark_for_review(&mut self, index: usize) -> AppResult<()> {
        self.ensure_in_progress("mark for review")?;
        self.check_index(index)?;

        self.statuses[index] = self.statuses[index].marked();
        Ok(())
    }

    pub fn navigate(&mut self, index: usize) -> AppResult<()> {
        self.ensure_in_progress("navigate")?;
        self.check_index(index)?;

        self.current_index = index;
        Ok(())
    }

    /// Moves forward one question. Returns false when already on the last one.
    pub fn next(&mut self) -> AppResult<bool> {
        self.ensure_in_progress("navigate")?;
        if self.current_index + 1 >= self.questions.len() {
            return Ok(false);
        }
        self.current_index += 1;
        Ok(true)
    }

    pub fn previous(&mut self) -> AppResult<bool> {
        self.ensure_in_progress("navigate")?;
        if self.current_index == 0 {
            return Ok(false);
        }
        self.current_index -= 1;
        Ok(true)
    }

    /// One second of the countdown. Returns the result when this tick ran the clock out.
    pub fn tick(&mut self) -> AppResult<Option<QuizResult>> {
        match self.phase {
            SessionPhase::Configuring => {
                return Err(AppError::InvalidState(
                    "cannot run the clock before the session starts".to_string(),
                ))
            }
            SessionPhase::Submitted => return Ok(None),
            SessionPhase::InProgress => {}
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            log::debug!("Quiz session {} ran out of time", self.id);
            return self.submit().map(Some);
        }
        Ok(None)
    }

    /// Grades the session. Later calls return the first result unchanged.
    pub fn submit(&mut self) -> AppResult<QuizResult> {
        if let Some(result) = &self.result {
            return Ok(result.clone());
        }
        self.ensure_in_progress("submit")?;

        let config = self
            .config
            .as_ref()
            .ok_or_else(|| AppError::InvalidState("session has no configuration".to_string()))?;
        let time_spent = config
            .time_limit_seconds()
            .saturating_sub(self.remaining_seconds);

        let result =
            QuizGradingService::grade(&self.questions, &self.answers, config, time_spent)?;

        self.phase = SessionPhase::Submitted;
        self.result = Some(result.clone());

        log::info!(
            "Quiz session {} submitted: {}/{} correct, score {}",
            self.id,
            result.correct_count,
            result.total_questions,
            result.score
        );
        Ok(result)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn config(&self) -> Option<&QuizConfiguration> {
        self.config.as_ref()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    pub fn answer(&self, index: usize) -> Option<&str> {
        self.answers.get(index).and_then(|a| a.as_deref())
    }

    pub fn status(&self, index: usize) -> Option<QuestionStatus> {
        self.statuses.get(index).copied()
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn result(&self) -> Option<&QuizResult> {
        self.result.as_ref()
    }

    pub fn palette(&self) -> PaletteSummary {
        self.statuses
            .iter()
            .fold(PaletteSummary::default(), |mut summary, status| {
                match status {
                    QuestionStatus::NotVisited => summary.not_visited += 1,
                    QuestionStatus::Answered => summary.answered += 1,
                    QuestionStatus::MarkedForReview => summary.marked_for_review += 1,
                    QuestionStatus::AnsweredAndMarked => summary.answered_and_marked += 1,
                }
                summary
            })
    }
}
