use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use super::{Result, SessionController};
use crate::error::QuizError;
use crate::lifecycle::SessionState;
use crate::models::{AnswerId, PlayerAnswer, PlayerId, QuestionId, Session};
use crate::results::{self, FinalResults, QuestionResult};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub answer_id: AnswerId,
    pub answer: String,
    pub colour: String,
}

/// The open question as a player sees it, without correctness.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInfo {
    pub question_id: QuestionId,
    pub question: String,
    pub duration: u64,
    pub points: u32,
    pub answers: Vec<AnswerOption>,
}

fn ensure_position(session: &Session, position: usize) -> Result<()> {
    if session.at_question != Some(position) {
        return Err(QuizError::StaleQuestionPosition {
            requested: position as i64,
        });
    }
    Ok(())
}

impl SessionController {
    pub async fn submit_answers(
        &self,
        player_id: PlayerId,
        position: usize,
        answer_ids: &[AnswerId],
    ) -> Result<()> {
        let session_id = self.session_of(player_id)?;
        let slot = self.slot(session_id)?;
        let _slot = slot.write().await;
        let mut session = self.load(session_id)?;

        ensure_position(&session, position)?;
        if session.state != SessionState::QuestionOpen {
            return Err(QuizError::IllegalTransition {
                operation: "submit answers".into(),
                state: session.state,
            });
        }

        let question = session
            .current_question()
            .ok_or_else(|| QuizError::StaleQuestionPosition {
                requested: position as i64,
            })?;

        let valid = question
            .answers
            .iter()
            .map(|answer| answer.id)
            .collect::<BTreeSet<_>>();
        if let Some(unknown) = answer_ids.iter().find(|id| !valid.contains(*id)) {
            return Err(QuizError::validation(format!(
                "answer {} is not an option for this question",
                unknown
            )));
        }

        let submitted = answer_ids.iter().copied().collect::<BTreeSet<_>>();
        if submitted.len() != answer_ids.len() {
            return Err(QuizError::validation("duplicate answer ids submitted"));
        }
        if submitted.is_empty() {
            return Err(QuizError::validation("at least one answer must be submitted"));
        }

        let correct = question.correct_answer_ids().collect::<BTreeSet<_>>();
        let is_correct = submitted == correct;

        session.player_answers.push(PlayerAnswer {
            player_id,
            question_position: position,
            answer_ids: answer_ids.to_vec(),
            time_answered: Utc::now(),
            is_correct,
        });
        debug!(%session_id, %player_id, position, is_correct, "answers submitted");

        self.repository.save_session(&session)?;
        Ok(())
    }

    pub async fn question_info(&self, player_id: PlayerId, position: usize) -> Result<QuestionInfo> {
        let session_id = self.session_of(player_id)?;
        let slot = self.slot(session_id)?;
        let _slot = slot.read().await;
        let session = self.load(session_id)?;

        ensure_position(&session, position)?;
        match session.state {
            SessionState::QuestionOpen | SessionState::QuestionClose => {}
            state => {
                return Err(QuizError::IllegalTransition {
                    operation: "view question".into(),
                    state,
                })
            }
        }

        let question = session
            .current_question()
            .ok_or_else(|| QuizError::StaleQuestionPosition {
                requested: position as i64,
            })?;

        Ok(QuestionInfo {
            question_id: question.id,
            question: question.question.clone(),
            duration: question.duration,
            points: question.points,
            answers: question
                .answers
                .iter()
                .map(|answer| AnswerOption {
                    answer_id: answer.id,
                    answer: answer.answer.clone(),
                    colour: answer.colour.clone(),
                })
                .collect(),
        })
    }

    pub async fn question_results(
        &self,
        player_id: PlayerId,
        position: usize,
    ) -> Result<QuestionResult> {
        let session_id = self.session_of(player_id)?;
        let slot = self.slot(session_id)?;
        let _slot = slot.read().await;
        let session = self.load(session_id)?;

        ensure_position(&session, position)?;
        if !matches!(
            session.state,
            SessionState::QuestionClose | SessionState::FinalResults
        ) {
            return Err(QuizError::NotResultsEligible(session.state));
        }

        results::question_result(&session, position).ok_or(QuizError::StaleQuestionPosition {
            requested: position as i64,
        })
    }

    pub async fn player_final_results(&self, player_id: PlayerId) -> Result<FinalResults> {
        let session_id = self.session_of(player_id)?;
        self.final_results(session_id).await
    }
}
