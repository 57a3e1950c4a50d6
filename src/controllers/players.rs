use rand::prelude::*;
use serde::Serialize;
use std::sync::atomic::Ordering;
use tracing::info;

use super::{Result, SessionController};
use crate::error::QuizError;
use crate::lifecycle::{Action, SessionState};
use crate::models::{Player, PlayerId, Session, SessionId};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatus {
    pub state: SessionState,
    pub num_questions: usize,
    pub at_question: Option<usize>,
}

/// Five distinct letters followed by three distinct digits.
fn random_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    const DIGITS: &[u8] = b"0123456789";

    LETTERS
        .choose_multiple(rng, 5)
        .chain(DIGITS.choose_multiple(rng, 3))
        .map(|&byte| byte as char)
        .collect()
}

fn unused_name(session: &Session) -> String {
    let mut rng = thread_rng();
    loop {
        let name = random_name(&mut rng);
        if !session.has_player_named(&name) {
            return name;
        }
    }
}

impl SessionController {
    /// Admits a player to a session still in the lobby. An empty name gets a
    /// generated one. Reaching the session's auto-start count moves it on to
    /// the first question.
    pub async fn join_session(&self, session_id: SessionId, name: &str) -> Result<PlayerId> {
        let slot = self.slot(session_id)?;
        let mut slot = slot.write().await;
        let mut session = self.load(session_id)?;

        if session.state != SessionState::Lobby {
            return Err(QuizError::IllegalTransition {
                operation: "join".into(),
                state: session.state,
            });
        }

        let name = match name {
            "" => unused_name(&session),
            name => name.to_string(),
        };
        if session.has_player_named(&name) {
            return Err(QuizError::DuplicateName(name));
        }

        let player_id = PlayerId(self.next_player_id.fetch_add(1, Ordering::Relaxed));
        session.players.push(Player {
            player_id,
            name: name.clone(),
            score: 0,
        });
        info!(%session_id, %player_id, %name, "player joined");

        let auto_start = session.auto_start_num as usize;
        if auto_start > 0 && session.players.len() >= auto_start {
            info!(%session_id, players = session.players.len(), "auto-starting session");
            self.advance(&mut slot, &mut session, Action::NextQuestion)?;
        }

        self.repository.save_session(&session)?;
        Ok(player_id)
    }

    pub async fn player_status(&self, player_id: PlayerId) -> Result<PlayerStatus> {
        let session_id = self.session_of(player_id)?;
        let slot = self.slot(session_id)?;
        let _slot = slot.read().await;
        let session = self.load(session_id)?;

        Ok(PlayerStatus {
            state: session.state,
            num_questions: session.num_questions(),
            at_question: session.at_question,
        })
    }

    pub(super) fn session_of(&self, player_id: PlayerId) -> Result<SessionId> {
        self.repository
            .find_session_by_player(player_id)?
            .map(|session| session.id)
            .ok_or(QuizError::UnknownPlayer(player_id))
    }
}
