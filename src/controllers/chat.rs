use chrono::Utc;
use tracing::debug;

use super::{Result, SessionController};
use crate::error::QuizError;
use crate::models::{Message, PlayerId};

const MAX_MESSAGE_LEN: usize = 100;

impl SessionController {
    pub async fn send_message(&self, player_id: PlayerId, body: &str) -> Result<()> {
        let length = body.chars().count();
        if length == 0 || length > MAX_MESSAGE_LEN {
            return Err(QuizError::validation(format!(
                "message must be between 1 and {} characters",
                MAX_MESSAGE_LEN
            )));
        }

        let session_id = self.session_of(player_id)?;
        let slot = self.slot(session_id)?;
        let _slot = slot.write().await;
        let mut session = self.load(session_id)?;

        let player_name = session
            .player(player_id)
            .map(|player| player.name.clone())
            .ok_or(QuizError::UnknownPlayer(player_id))?;

        session.messages.push(Message {
            message_body: body.to_string(),
            player_id,
            player_name,
            time_sent: Utc::now(),
        });
        debug!(%session_id, %player_id, "chat message sent");

        self.repository.save_session(&session)?;
        Ok(())
    }

    pub async fn list_messages(&self, player_id: PlayerId) -> Result<Vec<Message>> {
        let session_id = self.session_of(player_id)?;
        let slot = self.slot(session_id)?;
        let _slot = slot.read().await;

        Ok(self.load(session_id)?.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::controller;
    use crate::error::QuizError;
    use crate::models::{fixtures::*, PlayerId, QuizId};

    #[tokio::test]
    async fn messages_are_shared_in_order() {
        let controller = controller(&[single_question_quiz(1)]);
        let session_id = controller.start_session(QuizId(1), 0).await.unwrap();
        let ann = controller.join_session(session_id, "Ann").await.unwrap();
        let bob = controller.join_session(session_id, "Bob").await.unwrap();

        controller.send_message(ann, "hi").await.unwrap();
        controller.send_message(bob, "hello").await.unwrap();

        let seen_by_ann = controller.list_messages(ann).await.unwrap();
        let seen_by_bob = controller.list_messages(bob).await.unwrap();
        let bodies = seen_by_ann
            .iter()
            .map(|message| (message.player_name.as_str(), message.message_body.as_str()))
            .collect::<Vec<_>>();

        assert_eq!(bodies, vec![("Ann", "hi"), ("Bob", "hello")]);
        assert_eq!(seen_by_bob.len(), 2);
        assert_eq!(seen_by_bob[1].player_id, bob);
    }

    #[tokio::test]
    async fn message_length_is_bounded() {
        let controller = controller(&[single_question_quiz(1)]);
        let session_id = controller.start_session(QuizId(1), 0).await.unwrap();
        let ann = controller.join_session(session_id, "Ann").await.unwrap();

        assert!(matches!(
            controller.send_message(ann, "").await,
            Err(QuizError::Validation(_))
        ));
        assert!(matches!(
            controller.send_message(ann, &"a".repeat(101)).await,
            Err(QuizError::Validation(_))
        ));
        assert!(controller.send_message(ann, &"a".repeat(100)).await.is_ok());
        assert!(matches!(
            controller.send_message(PlayerId(404), "hey").await,
            Err(QuizError::UnknownPlayer(_))
        ));
    }
}
