//! Storage gateway used by the session engine.

use anyhow::{anyhow, Result};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use crate::models::{PlayerId, Quiz, QuizId, Session, SessionId};

/// Reads and whole-record writes of quizzes and sessions.
///
/// `save_session` replaces the stored session atomically; callers serialise
/// writers to the same session themselves.
pub trait Repository: Send + Sync {
    fn get_quiz(&self, quiz_id: QuizId) -> Result<Option<Quiz>>;
    fn find_session_by_id(&self, session_id: SessionId) -> Result<Option<Session>>;
    fn find_session_by_player(&self, player_id: PlayerId) -> Result<Option<Session>>;
    fn find_sessions_by_quiz(&self, quiz_id: QuizId) -> Result<Vec<Session>>;
    fn save_session(&self, session: &Session) -> Result<()>;
}

#[derive(Debug, Default)]
struct Store {
    quizzes: BTreeMap<QuizId, Quiz>,
    sessions: BTreeMap<SessionId, Session>,
}

/// Process-local repository.
#[derive(Clone, Debug, Default)]
pub struct MemoryRepository {
    store: Arc<Mutex<Store>>,
}

impl MemoryRepository {
    pub fn new<'a>(quizzes: impl Iterator<Item = &'a Quiz>) -> MemoryRepository {
        let quizzes = quizzes.map(|quiz| (quiz.id, quiz.clone())).collect();

        MemoryRepository {
            store: Arc::new(Mutex::new(Store {
                quizzes,
                sessions: BTreeMap::new(),
            })),
        }
    }

    fn with_store<T>(&self, f: impl FnOnce(&mut Store) -> T) -> Result<T> {
        let mut store = self
            .store
            .lock()
            .map_err(|_err| anyhow!("couldn't lock store"))?;
        Ok(f(&mut store))
    }
}

impl Repository for MemoryRepository {
    fn get_quiz(&self, quiz_id: QuizId) -> Result<Option<Quiz>> {
        self.with_store(|store| store.quizzes.get(&quiz_id).cloned())
    }

    fn find_session_by_id(&self, session_id: SessionId) -> Result<Option<Session>> {
        self.with_store(|store| store.sessions.get(&session_id).cloned())
    }

    fn find_session_by_player(&self, player_id: PlayerId) -> Result<Option<Session>> {
        self.with_store(|store| {
            store
                .sessions
                .values()
                .find(|session| session.has_player(player_id))
                .cloned()
        })
    }

    fn find_sessions_by_quiz(&self, quiz_id: QuizId) -> Result<Vec<Session>> {
        self.with_store(|store| {
            store
                .sessions
                .values()
                .filter(|session| session.quiz_id() == quiz_id)
                .cloned()
                .collect()
        })
    }

    fn save_session(&self, session: &Session) -> Result<()> {
        self.with_store(|store| {
            store.sessions.insert(session.id, session.clone());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{fixtures::*, Player, QuizSnapshot};

    #[test]
    fn finds_sessions_by_player_and_quiz() {
        let quiz = single_question_quiz(1);
        let repository = MemoryRepository::new([quiz.clone()].iter());

        let mut session = Session::new(SessionId(3), QuizSnapshot::of(&quiz), 0);
        session.players.push(Player {
            player_id: PlayerId(9),
            name: "Hayden".into(),
            score: 0,
        });
        repository.save_session(&session).unwrap();

        let found = repository.find_session_by_player(PlayerId(9)).unwrap().unwrap();
        assert_eq!(found.id, SessionId(3));
        assert!(repository.find_session_by_player(PlayerId(10)).unwrap().is_none());
        assert_eq!(repository.find_sessions_by_quiz(QuizId(1)).unwrap().len(), 1);
        assert!(repository.find_sessions_by_quiz(QuizId(2)).unwrap().is_empty());
        assert!(repository.get_quiz(QuizId(1)).unwrap().is_some());
    }

    #[test]
    fn save_replaces_whole_session() {
        let quiz = single_question_quiz(1);
        let repository = MemoryRepository::new(std::iter::empty());

        let mut session = Session::new(SessionId(1), QuizSnapshot::of(&quiz), 0);
        repository.save_session(&session).unwrap();
        session.at_question = Some(0);
        repository.save_session(&session).unwrap();

        let stored = repository.find_session_by_id(SessionId(1)).unwrap().unwrap();
        assert_eq!(stored.at_question, Some(0));
    }
}
