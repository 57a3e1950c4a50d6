//! Session engine: owns per-session locks, timers and id allocation, and
//! runs every read-modify-write cycle against the repository under the
//! owning session's lock.

use anyhow::anyhow;
use chrono::Utc;
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::{
    sync::{Mutex as AsyncMutex, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::error::QuizError;
use crate::lifecycle::{Action, SessionState};
use crate::models::{
    Player, Question, QuizId, QuizSnapshot, Session, SessionId, SessionSettings,
};
use crate::repository::Repository;
use crate::results;

mod answers;
mod chat;
mod players;

type Result<T, E = QuizError> = std::result::Result<T, E>;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizMetadata {
    pub quiz_id: QuizId,
    pub name: String,
    pub description: String,
    pub num_questions: usize,
    pub duration: u64,
    pub questions: Vec<Question>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: SessionState,
    pub at_question: Option<usize>,
    pub players: Vec<Player>,
    pub metadata: QuizMetadata,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionList {
    pub active_sessions: Vec<SessionId>,
    pub inactive_sessions: Vec<SessionId>,
}

/// Lock-protected runtime companion of a stored session.
#[derive(Debug, Default)]
struct SessionSlot {
    /// Bumped whenever a timer is armed or cancelled; a firing timer whose
    /// generation no longer matches is stale.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl SessionSlot {
    fn cancel_timer(&mut self) {
        self.generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Clone)]
pub struct SessionController {
    repository: Arc<dyn Repository>,
    settings: Arc<SessionSettings>,
    /// Held from the active-session count until the new session is saved.
    starting: Arc<AsyncMutex<()>>,
    /// One slot per session for the life of the process. Ended sessions keep
    /// theirs so readers and chat stay serialized on a single lock; a slot
    /// left behind holds no timer.
    slots: Arc<Mutex<HashMap<SessionId, Arc<RwLock<SessionSlot>>>>>,
    next_session_id: Arc<AtomicU64>,
    next_player_id: Arc<AtomicU64>,
}

impl SessionController {
    pub fn new(repository: Arc<dyn Repository>, settings: SessionSettings) -> SessionController {
        SessionController {
            repository,
            settings: Arc::new(settings),
            starting: Default::default(),
            slots: Default::default(),
            next_session_id: Arc::new(AtomicU64::new(1)),
            next_player_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub async fn start_session(&self, quiz_id: QuizId, auto_start_num: u32) -> Result<SessionId> {
        let quiz = self
            .repository
            .get_quiz(quiz_id)?
            .ok_or(QuizError::UnknownQuiz(quiz_id))?;

        if quiz.in_trash {
            return Err(QuizError::validation("quiz is in trash"));
        }
        if quiz.questions.is_empty() {
            return Err(QuizError::validation("quiz has no questions"));
        }
        if auto_start_num > self.settings.max_auto_start_num {
            return Err(QuizError::validation(format!(
                "autoStartNum cannot exceed {}",
                self.settings.max_auto_start_num
            )));
        }

        let _starting = self.starting.lock().await;
        let active = self
            .repository
            .find_sessions_by_quiz(quiz_id)?
            .iter()
            .filter(|session| session.state.is_active())
            .count();
        if active >= self.settings.max_active_sessions {
            return Err(QuizError::validation(format!(
                "quiz already has {} active sessions",
                active
            )));
        }

        let session_id = SessionId(self.next_session_id.fetch_add(1, Ordering::Relaxed));
        let session = Session::new(session_id, QuizSnapshot::of(&quiz), auto_start_num);

        self.insert_slot(session_id)?;
        self.repository.save_session(&session)?;

        info!(%session_id, %quiz_id, auto_start_num, "started session");
        Ok(session_id)
    }

    pub async fn view_sessions(&self, quiz_id: QuizId) -> Result<SessionList> {
        self.repository
            .get_quiz(quiz_id)?
            .ok_or(QuizError::UnknownQuiz(quiz_id))?;

        let mut list = SessionList::default();
        for session in self.repository.find_sessions_by_quiz(quiz_id)? {
            if session.state.is_active() {
                list.active_sessions.push(session.id);
            } else {
                list.inactive_sessions.push(session.id);
            }
        }
        list.active_sessions.sort();
        list.inactive_sessions.sort();

        Ok(list)
    }

    /// Fails with `InvalidSession` unless the session was started from `quiz_id`.
    pub fn ensure_quiz_session(&self, quiz_id: QuizId, session_id: SessionId) -> Result<()> {
        match self.repository.find_session_by_id(session_id)? {
            Some(session) if session.quiz_id() == quiz_id => Ok(()),
            _ => Err(QuizError::InvalidSession(session_id)),
        }
    }

    pub async fn apply_action(&self, session_id: SessionId, action: Action) -> Result<SessionState> {
        let slot = self.slot(session_id)?;
        let mut slot = slot.write().await;
        let mut session = self.load(session_id)?;

        let state = self.advance(&mut slot, &mut session, action)?;
        self.repository.save_session(&session)?;

        Ok(state)
    }

    pub async fn session_status(&self, session_id: SessionId) -> Result<SessionStatus> {
        let slot = self.slot(session_id)?;
        let _slot = slot.read().await;
        let session = self.load(session_id)?;

        Ok(SessionStatus {
            state: session.state,
            at_question: session.at_question,
            players: session.players.clone(),
            metadata: QuizMetadata {
                quiz_id: session.quiz.quiz_id,
                name: session.quiz.name.clone(),
                description: session.quiz.description.clone(),
                num_questions: session.num_questions(),
                duration: session.quiz.duration(),
                questions: session.quiz.questions.clone(),
            },
        })
    }

    pub async fn final_results(&self, session_id: SessionId) -> Result<results::FinalResults> {
        let slot = self.slot(session_id)?;
        let _slot = slot.read().await;
        let session = self.load(session_id)?;

        if session.state != SessionState::FinalResults {
            return Err(QuizError::NotResultsEligible(session.state));
        }

        Ok(results::final_results(&session))
    }

    pub async fn final_results_csv(&self, session_id: SessionId) -> Result<String> {
        let results = self.final_results(session_id).await?;
        Ok(results::final_results_csv(&results)?)
    }

    /// Applies `action`, then re-arms timers and scores as the new state requires.
    fn advance(
        &self,
        slot: &mut SessionSlot,
        session: &mut Session,
        action: Action,
    ) -> Result<SessionState> {
        let previous = session.state;
        let state = session.apply(action)?;
        slot.cancel_timer();

        match state {
            SessionState::QuestionCountdown => {
                let countdown = Duration::from_secs(self.settings.countdown_secs);
                self.arm_timer(slot, session.id, countdown, state, Action::SkipCountdown);
            }
            SessionState::QuestionOpen => {
                if let Some(position) = session.at_question {
                    session.opened_at.insert(position, Utc::now());
                }
                let duration = session.current_question().map_or(0, |question| question.duration);
                self.arm_timer(
                    slot,
                    session.id,
                    Duration::from_secs(duration),
                    state,
                    Action::GoToAnswer,
                );
            }
            SessionState::QuestionClose => results::award_points(session),
            SessionState::Lobby | SessionState::FinalResults | SessionState::End => {}
        }

        info!(
            session_id = %session.id,
            %action,
            from = %previous,
            to = %state,
            at_question = ?session.at_question,
            "session transition"
        );
        Ok(state)
    }

    fn arm_timer(
        &self,
        slot: &mut SessionSlot,
        session_id: SessionId,
        after: Duration,
        expected: SessionState,
        action: Action,
    ) {
        slot.generation += 1;
        let generation = slot.generation;
        let controller = self.clone();

        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            controller
                .fire_timer(session_id, generation, expected, action)
                .await;
        }));
    }

    async fn fire_timer(
        &self,
        session_id: SessionId,
        generation: u64,
        expected: SessionState,
        action: Action,
    ) {
        let slot = match self.slot(session_id) {
            Ok(slot) => slot,
            Err(err) => {
                warn!(%session_id, %err, "timer fired for missing session");
                return;
            }
        };
        let mut slot = slot.write().await;

        if slot.generation != generation {
            debug!(%session_id, %action, "discarding stale timer");
            return;
        }
        // Detach our own handle so advancing doesn't abort this task.
        slot.timer.take();

        let result = self.load(session_id).and_then(|mut session| {
            if session.state != expected {
                debug!(%session_id, state = %session.state, "timer no longer applies");
                return Ok(());
            }
            self.advance(&mut slot, &mut session, action)?;
            self.repository.save_session(&session)?;
            Ok(())
        });

        if let Err(err) = result {
            warn!(%session_id, %action, %err, "timer failed to advance session");
        }
    }

    fn insert_slot(&self, session_id: SessionId) -> Result<Arc<RwLock<SessionSlot>>> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_err| anyhow!("couldn't lock session slots"))?;
        Ok(slots.entry(session_id).or_default().clone())
    }

    /// Lock for a session, created on first use for sessions already in the repository.
    fn slot(&self, session_id: SessionId) -> Result<Arc<RwLock<SessionSlot>>> {
        {
            let slots = self
                .slots
                .lock()
                .map_err(|_err| anyhow!("couldn't lock session slots"))?;
            if let Some(slot) = slots.get(&session_id) {
                return Ok(slot.clone());
            }
        }

        self.repository
            .find_session_by_id(session_id)?
            .ok_or(QuizError::InvalidSession(session_id))?;
        self.insert_slot(session_id)
    }

    fn load(&self, session_id: SessionId) -> Result<Session> {
        self.repository
            .find_session_by_id(session_id)?
            .ok_or(QuizError::InvalidSession(session_id))
    }
}
