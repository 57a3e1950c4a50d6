use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

use crate::lifecycle::SessionState;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(QuizId);
id_type!(SessionId);
id_type!(PlayerId);
id_type!(QuestionId);
id_type!(AnswerId);

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub quiz: Vec<Quiz>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub countdown_secs: u64,
    pub max_auto_start_num: u32,
    pub max_active_sessions: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            countdown_secs: 3,
            max_auto_start_num: 50,
            max_active_sessions: 10,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Quiz {
    pub id: QuizId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub in_trash: bool,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "questionId", alias = "id")]
    pub id: QuestionId,
    pub question: String,
    /// Seconds the question stays open.
    pub duration: u64,
    pub points: u32,
    pub answers: Vec<Answer>,
}

impl Question {
    pub fn correct_answer_ids(&self) -> impl Iterator<Item = AnswerId> + '_ {
        self.answers
            .iter()
            .filter(|answer| answer.correct)
            .map(|answer| answer.id)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    #[serde(rename = "answerId", alias = "id")]
    pub id: AnswerId,
    pub answer: String,
    pub correct: bool,
    #[serde(default)]
    pub colour: String,
}

const COLOURS: &[&str] = &["red", "blue", "green", "yellow", "purple", "orange"];

/// Frozen copy of a quiz taken when a session starts.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSnapshot {
    pub quiz_id: QuizId,
    pub name: String,
    pub description: String,
    pub questions: Vec<Question>,
}

impl QuizSnapshot {
    pub fn of(quiz: &Quiz) -> QuizSnapshot {
        let mut questions = quiz.questions.clone();
        for question in questions.iter_mut() {
            for (index, answer) in question.answers.iter_mut().enumerate() {
                if answer.colour.is_empty() {
                    answer.colour = COLOURS[index % COLOURS.len()].into();
                }
            }
        }

        QuizSnapshot {
            quiz_id: quiz.id,
            name: quiz.name.clone(),
            description: quiz.description.clone(),
            questions,
        }
    }

    pub fn duration(&self) -> u64 {
        self.questions.iter().map(|question| question.duration).sum()
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub player_id: PlayerId,
    pub name: String,
    pub score: u32,
}

#[derive(Clone, Debug)]
pub struct PlayerAnswer {
    pub player_id: PlayerId,
    pub question_position: usize,
    pub answer_ids: Vec<AnswerId>,
    pub time_answered: DateTime<Utc>,
    pub is_correct: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_body: String,
    pub player_id: PlayerId,
    pub player_name: String,
    pub time_sent: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct Session {
    pub id: SessionId,
    pub quiz: QuizSnapshot,
    pub state: SessionState,
    /// `None` until the first `NEXT_QUESTION`.
    pub at_question: Option<usize>,
    pub auto_start_num: u32,
    pub players: Vec<Player>,
    pub player_answers: Vec<PlayerAnswer>,
    pub messages: Vec<Message>,
    pub opened_at: BTreeMap<usize, DateTime<Utc>>,
}

impl Session {
    pub fn new(id: SessionId, quiz: QuizSnapshot, auto_start_num: u32) -> Session {
        Session {
            id,
            quiz,
            state: SessionState::Lobby,
            at_question: None,
            auto_start_num,
            players: Vec::new(),
            player_answers: Vec::new(),
            messages: Vec::new(),
            opened_at: BTreeMap::new(),
        }
    }

    pub fn quiz_id(&self) -> QuizId {
        self.quiz.quiz_id
    }

    pub fn num_questions(&self) -> usize {
        self.quiz.questions.len()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.at_question
            .and_then(|position| self.quiz.questions.get(position))
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players
            .iter()
            .find(|player| player.player_id == player_id)
    }

    pub fn has_player(&self, player_id: PlayerId) -> bool {
        self.player(player_id).is_some()
    }

    pub fn has_player_named(&self, name: &str) -> bool {
        self.players.iter().any(|player| player.name == name)
    }

    /// The submission that counts for a player at a question: their most recent one.
    pub fn latest_answer(&self, player_id: PlayerId, position: usize) -> Option<&PlayerAnswer> {
        self.player_answers
            .iter()
            .rev()
            .find(|answer| answer.player_id == player_id && answer.question_position == position)
    }
}
