use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{AppError, AppResult};

pub const OPTIONS_PER_QUESTION: usize = 4;

/// A multiple-choice question as it appears in a question bank document.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct Question {
    #[serde(rename = "question")]
    #[validate(length(min = 1))]
    pub prompt: String,
    #[validate(length(equal = 4))]
    pub options: Vec<String>,
    #[serde(rename = "answer")]
    pub correct_answer: String,
    #[serde(rename = "solution", default)]
    pub explanation: String,
}

impl Question {
    pub fn new(prompt: &str, options: [&str; 4], correct_answer: &str, explanation: &str) -> Self {
        Question {
            prompt: prompt.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_answer: correct_answer.to_string(),
            explanation: explanation.to_string(),
        }
    }

    /// Structural checks plus the answer-must-be-an-option rule.
    pub fn check(&self) -> AppResult<()> {
        self.validate()
            .map_err(|e| AppError::QuestionBank(format!("'{}': {}", self.prompt, e)))?;

        if !self.has_option(&self.correct_answer) {
            return Err(AppError::QuestionBank(format!(
                "'{}': answer '{}' is not one of the options",
                self.prompt, self.correct_answer
            )));
        }

        Ok(())
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }

    pub fn is_correct(&self, option: &str) -> bool {
        self.correct_answer == option
    }
}

/// Bank documents come either as a bare list or wrapped in a chapter document.
#[derive(Deserialize)]
#[serde(untagged)]
enum BankDocument {
    List(Vec<Question>),
    Chapter { questions: Vec<Question> },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    pub fn new(questions: Vec<Question>) -> AppResult<Self> {
        for question in &questions {
            question.check()?;
        }
        Ok(Self { questions })
    }

    pub fn from_json(raw: &str) -> AppResult<Self> {
        let document: BankDocument = serde_json::from_str(raw)
            .map_err(|e| AppError::QuestionBank(format!("malformed bank document: {}", e)))?;

        let questions = match document {
            BankDocument::List(questions) => questions,
            BankDocument::Chapter { questions } => questions,
        };

        Self::new(questions)
    }

    pub async fn fetch(url: &str) -> AppResult<Self> {
        log::debug!("Fetching question bank from {}", url);

        let response = reqwest::get(url).await?.error_for_status()?;
        let body = response.text().await?;
        let bank = Self::from_json(&body)?;

        log::info!("Loaded {} questions from {}", bank.len(), url);
        Ok(bank)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
