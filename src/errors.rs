use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid answer: {0}")]
    InvalidAnswer(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Index {index} out of range for {len} questions")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Remote sync failure: {0}")]
    RemoteSyncFailure(String),

    #[error("Question bank error: {0}")]
    QuestionBank(String),
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            AppError::InvalidAnswer(_) => "INVALID_ANSWER",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            AppError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            AppError::RemoteSyncFailure(_) => "REMOTE_SYNC_FAILURE",
            AppError::QuestionBank(_) => "QUESTION_BANK",
        }
    }

    /// Errors the learner should see as a blocking message. Everything else is
    /// either a programming error or degrades silently.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            AppError::InvalidConfiguration(_) | AppError::QuestionBank(_)
        )
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::RemoteSyncFailure(err.to_string())
    }
}
impl From<mongodb::bson::ser::Error> for AppError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        AppError::RemoteSyncFailure(format!("BSON serialization error: {}", err))
    }
}
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidConfiguration(err.to_string())
    }
}
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::StorageUnavailable(format!("JSON error: {}", err))
    }
}
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::StorageUnavailable(err.to_string())
    }
}
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::QuestionBank(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
