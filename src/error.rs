use serde::Serialize;
use warp::http::StatusCode;

use crate::lifecycle::SessionState;
use crate::models::{PlayerId, QuizId, SessionId};

/// Failure of any session engine operation.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("session {0} does not exist")]
    InvalidSession(SessionId),

    #[error("player {0} is not in any session")]
    UnknownPlayer(PlayerId),

    #[error("quiz {0} does not exist")]
    UnknownQuiz(QuizId),

    #[error("cannot {operation} while session is in {state}")]
    IllegalTransition {
        operation: String,
        state: SessionState,
    },

    #[error("{0:?} is not a valid action")]
    InvalidAction(String),

    #[error("question position {requested} is not the session's current question")]
    StaleQuestionPosition { requested: i64 },

    #[error("name {0:?} is already taken in this session")]
    DuplicateName(String),

    #[error("{0}")]
    Validation(String),

    #[error("results are not available while session is in {0}")]
    NotResultsEligible(SessionState),

    #[error(transparent)]
    Repository(#[from] anyhow::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidSession,
    UnknownPlayer,
    UnknownQuiz,
    IllegalTransition,
    InvalidAction,
    StaleQuestionPosition,
    DuplicateName,
    ValidationError,
    NotResultsEligible,
    NotFound,
    Internal,
}

impl QuizError {
    pub fn validation(message: impl Into<String>) -> QuizError {
        QuizError::Validation(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            QuizError::InvalidSession(_) => ErrorCode::InvalidSession,
            QuizError::UnknownPlayer(_) => ErrorCode::UnknownPlayer,
            QuizError::UnknownQuiz(_) => ErrorCode::UnknownQuiz,
            QuizError::IllegalTransition { .. } => ErrorCode::IllegalTransition,
            QuizError::InvalidAction(_) => ErrorCode::InvalidAction,
            QuizError::StaleQuestionPosition { .. } => ErrorCode::StaleQuestionPosition,
            QuizError::DuplicateName(_) => ErrorCode::DuplicateName,
            QuizError::Validation(_) => ErrorCode::ValidationError,
            QuizError::NotResultsEligible(_) => ErrorCode::NotResultsEligible,
            QuizError::Repository(_) => ErrorCode::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            QuizError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
