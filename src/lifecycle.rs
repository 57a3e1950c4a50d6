//! Session state machine.
//!
//! Every (state, action) pair is listed in [`SessionState::on`]; pairs that
//! map to `None` are illegal and rejected rather than ignored.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::QuizError;
use crate::models::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Lobby,
    QuestionCountdown,
    QuestionOpen,
    /// Answers are closed and shown.
    QuestionClose,
    FinalResults,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    NextQuestion,
    SkipCountdown,
    GoToAnswer,
    GoToFinalResults,
    End,
}

impl SessionState {
    pub fn on(self, action: Action) -> Option<SessionState> {
        use Action as A;
        use SessionState as S;

        match (self, action) {
            (S::End, _) => None,
            (_, A::End) => Some(S::End),

            (S::Lobby, A::NextQuestion) => Some(S::QuestionCountdown),
            (S::Lobby, A::SkipCountdown | A::GoToAnswer | A::GoToFinalResults) => None,

            (S::QuestionCountdown, A::SkipCountdown) => Some(S::QuestionOpen),
            (S::QuestionCountdown, A::NextQuestion | A::GoToAnswer | A::GoToFinalResults) => None,

            (S::QuestionOpen, A::GoToAnswer) => Some(S::QuestionClose),
            (S::QuestionOpen, A::NextQuestion | A::SkipCountdown | A::GoToFinalResults) => None,

            (S::QuestionClose, A::NextQuestion) => Some(S::QuestionCountdown),
            (S::QuestionClose, A::GoToFinalResults) => Some(S::FinalResults),
            (S::QuestionClose, A::SkipCountdown | A::GoToAnswer) => None,

            (
                S::FinalResults,
                A::NextQuestion | A::SkipCountdown | A::GoToAnswer | A::GoToFinalResults,
            ) => None,
        }
    }

    pub fn is_active(self) -> bool {
        self != SessionState::End
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Lobby => "LOBBY",
            SessionState::QuestionCountdown => "QUESTION_COUNTDOWN",
            SessionState::QuestionOpen => "QUESTION_OPEN",
            SessionState::QuestionClose => "QUESTION_CLOSE",
            SessionState::FinalResults => "FINAL_RESULTS",
            SessionState::End => "END",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::NextQuestion => "NEXT_QUESTION",
            Action::SkipCountdown => "SKIP_COUNTDOWN",
            Action::GoToAnswer => "GO_TO_ANSWER",
            Action::GoToFinalResults => "GO_TO_FINAL_RESULTS",
            Action::End => "END",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEXT_QUESTION" => Ok(Action::NextQuestion),
            "SKIP_COUNTDOWN" => Ok(Action::SkipCountdown),
            "GO_TO_ANSWER" => Ok(Action::GoToAnswer),
            "GO_TO_FINAL_RESULTS" => Ok(Action::GoToFinalResults),
            "END" => Ok(Action::End),
            other => Err(QuizError::InvalidAction(other.into())),
        }
    }
}

impl Session {
    /// Moves the session along the transition table and returns the new state.
    ///
    /// `NEXT_QUESTION` also advances `at_question`, and is refused when the
    /// snapshot has no further question. Timers and scoring are left to the
    /// caller.
    pub fn apply(&mut self, action: Action) -> Result<SessionState, QuizError> {
        let state = self.state;
        let illegal = || QuizError::IllegalTransition {
            operation: action.as_str().into(),
            state,
        };

        let next = self.state.on(action).ok_or_else(illegal)?;

        if action == Action::NextQuestion {
            let position = self.at_question.map_or(0, |position| position + 1);
            if position >= self.num_questions() {
                return Err(illegal());
            }
            self.at_question = Some(position);
        }

        self.state = next;
        Ok(next)
    }
}
