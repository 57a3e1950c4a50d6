use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use warp::{
    reject::Rejection,
    reply::{self, Reply, Response},
    Filter,
};

use crate::controllers::SessionController;
use crate::error::QuizError;
use crate::filters::{self, empty_reply, error_reply, json_reply, with_controller};
use crate::lifecycle::Action;
use crate::models::{AnswerId, Message, PlayerId, QuizId, SessionId};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionRequest {
    auto_start_num: u32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionReply {
    session_id: SessionId,
}

#[derive(Clone, Debug, Deserialize)]
struct ActionRequest {
    action: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest {
    session_id: SessionId,
    #[serde(default)]
    name: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinReply {
    player_id: PlayerId,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRequest {
    answer_ids: Vec<AnswerId>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageBody {
    message_body: String,
}

#[derive(Clone, Debug, Deserialize)]
struct SendMessageRequest {
    message: MessageBody,
}

#[derive(Clone, Debug, Serialize)]
struct MessagesReply {
    messages: Vec<Message>,
}

fn question_position(requested: i64) -> Result<usize, QuizError> {
    usize::try_from(requested).map_err(|_err| QuizError::StaleQuestionPosition { requested })
}

pub fn routes(
    controller: SessionController,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let start_session = warp::path!("quiz" / u64 / "session" / "start")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_controller(controller.clone()))
        .and_then(
            |quiz_id: u64, body: StartSessionRequest, controller: SessionController| async move {
                let result = controller
                    .start_session(QuizId(quiz_id), body.auto_start_num)
                    .await
                    .map(|session_id| StartSessionReply { session_id });
                Ok::<_, Rejection>(json_reply(result))
            },
        );

    let view_sessions = warp::path!("quiz" / u64 / "sessions")
        .and(warp::get())
        .and(with_controller(controller.clone()))
        .and_then(|quiz_id: u64, controller: SessionController| async move {
            let result = controller.view_sessions(QuizId(quiz_id)).await;
            Ok::<_, Rejection>(json_reply(result))
        });

    let update_session = warp::path!("quiz" / u64 / "session" / u64)
        .and(warp::put())
        .and(warp::body::json())
        .and(with_controller(controller.clone()))
        .and_then(
            |quiz_id: u64, session_id: u64, body: ActionRequest, controller: SessionController| async move {
                let session_id = SessionId(session_id);
                let result = async {
                    controller.ensure_quiz_session(QuizId(quiz_id), session_id)?;
                    let action = body.action.parse::<Action>()?;
                    controller.apply_action(session_id, action).await?;
                    Ok::<_, QuizError>(())
                }
                .await;
                Ok::<_, Rejection>(empty_reply(result))
            },
        );

    let session_status = warp::path!("quiz" / u64 / "session" / u64)
        .and(warp::get())
        .and(with_controller(controller.clone()))
        .and_then(
            |quiz_id: u64, session_id: u64, controller: SessionController| async move {
                let session_id = SessionId(session_id);
                let result = async {
                    controller.ensure_quiz_session(QuizId(quiz_id), session_id)?;
                    controller.session_status(session_id).await
                }
                .await;
                Ok::<_, Rejection>(json_reply(result))
            },
        );

    let final_results = warp::path!("quiz" / u64 / "session" / u64 / "results")
        .and(warp::get())
        .and(with_controller(controller.clone()))
        .and_then(
            |quiz_id: u64, session_id: u64, controller: SessionController| async move {
                let session_id = SessionId(session_id);
                let result = async {
                    controller.ensure_quiz_session(QuizId(quiz_id), session_id)?;
                    controller.final_results(session_id).await
                }
                .await;
                Ok::<_, Rejection>(json_reply(result))
            },
        );

    let final_results_csv = warp::path!("quiz" / u64 / "session" / u64 / "results" / "csv")
        .and(warp::get())
        .and(with_controller(controller.clone()))
        .and_then(
            |quiz_id: u64, session_id: u64, controller: SessionController| async move {
                let session_id = SessionId(session_id);
                let result = async {
                    controller.ensure_quiz_session(QuizId(quiz_id), session_id)?;
                    controller.final_results_csv(session_id).await
                }
                .await;
                let response: Response = match result {
                    Ok(csv) => reply::with_header(csv, "content-type", "text/csv").into_response(),
                    Err(err) => error_reply(&err),
                };
                Ok::<_, Rejection>(response)
            },
        );

    let join = warp::path!("player" / "join")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_controller(controller.clone()))
        .and_then(|body: JoinRequest, controller: SessionController| async move {
            let result = controller
                .join_session(body.session_id, &body.name)
                .await
                .map(|player_id| JoinReply { player_id });
            Ok::<_, Rejection>(json_reply(result))
        });

    let player_status = warp::path!("player" / u64)
        .and(warp::get())
        .and(with_controller(controller.clone()))
        .and_then(|player_id: u64, controller: SessionController| async move {
            let result = controller.player_status(PlayerId(player_id)).await;
            Ok::<_, Rejection>(json_reply(result))
        });

    let question_info = warp::path!("player" / u64 / "question" / i64)
        .and(warp::get())
        .and(with_controller(controller.clone()))
        .and_then(
            |player_id: u64, requested: i64, controller: SessionController| async move {
                let result = async {
                    let position = question_position(requested)?;
                    controller.question_info(PlayerId(player_id), position).await
                }
                .await;
                Ok::<_, Rejection>(json_reply(result))
            },
        );

    let submit_answers = warp::path!("player" / u64 / "question" / i64 / "answer")
        .and(warp::put())
        .and(warp::body::json())
        .and(with_controller(controller.clone()))
        .and_then(
            |player_id: u64, requested: i64, body: AnswerRequest, controller: SessionController| async move {
                let result = async {
                    let position = question_position(requested)?;
                    controller
                        .submit_answers(PlayerId(player_id), position, &body.answer_ids)
                        .await
                }
                .await;
                Ok::<_, Rejection>(empty_reply(result))
            },
        );

    let question_results = warp::path!("player" / u64 / "question" / i64 / "results")
        .and(warp::get())
        .and(with_controller(controller.clone()))
        .and_then(
            |player_id: u64, requested: i64, controller: SessionController| async move {
                let result = async {
                    let position = question_position(requested)?;
                    controller.question_results(PlayerId(player_id), position).await
                }
                .await;
                Ok::<_, Rejection>(json_reply(result))
            },
        );

    let player_results = warp::path!("player" / u64 / "results")
        .and(warp::get())
        .and(with_controller(controller.clone()))
        .and_then(|player_id: u64, controller: SessionController| async move {
            let result = controller.player_final_results(PlayerId(player_id)).await;
            Ok::<_, Rejection>(json_reply(result))
        });

    let list_messages = warp::path!("player" / u64 / "chat")
        .and(warp::get())
        .and(with_controller(controller.clone()))
        .and_then(|player_id: u64, controller: SessionController| async move {
            let result = controller
                .list_messages(PlayerId(player_id))
                .await
                .map(|messages| MessagesReply { messages });
            Ok::<_, Rejection>(json_reply(result))
        });

    let send_message = warp::path!("player" / u64 / "chat")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_controller(controller))
        .and_then(
            |player_id: u64, body: SendMessageRequest, controller: SessionController| async move {
                let result = controller
                    .send_message(PlayerId(player_id), &body.message.message_body)
                    .await;
                Ok::<_, Rejection>(empty_reply(result))
            },
        );

    let host = start_session
        .or(view_sessions)
        .or(update_session)
        .or(session_status)
        .or(final_results)
        .or(final_results_csv)
        .boxed();

    let player = join
        .or(player_status)
        .or(question_info)
        .or(submit_answers)
        .or(question_results)
        .or(player_results)
        .or(list_messages)
        .or(send_message)
        .boxed();

    host.or(player).recover(filters::handle_rejection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{fixtures::*, SessionSettings};
    use crate::repository::MemoryRepository;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use warp::http::StatusCode;

    fn api() -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
        let repository = MemoryRepository::new([single_question_quiz(1)].iter());
        routes(SessionController::new(
            Arc::new(repository),
            SessionSettings::default(),
        ))
    }

    async fn call<F>(api: &F, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value)
    where
        F: Filter + 'static,
        F::Extract: Reply + Send,
    {
        let mut request = warp::test::request().method(method).path(path);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.reply(api).await;
        let status = response.status();
        let body = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn plays_a_session_over_http() {
        let api = api();

        let (status, body) = call(
            &api,
            "POST",
            "/quiz/1/session/start",
            Some(json!({ "autoStartNum": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let session_id = body["sessionId"].as_u64().unwrap();

        let (_, body) = call(
            &api,
            "POST",
            "/player/join",
            Some(json!({ "sessionId": session_id, "name": "Hayden" })),
        )
        .await;
        let player_id = body["playerId"].as_u64().unwrap();

        for action in ["NEXT_QUESTION", "SKIP_COUNTDOWN"] {
            let (status, _) = call(
                &api,
                "PUT",
                &format!("/quiz/1/session/{}", session_id),
                Some(json!({ "action": action })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, _) = call(
            &api,
            "PUT",
            &format!("/player/{}/question/0/answer", player_id),
            Some(json!({ "answerIds": [1] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        call(
            &api,
            "PUT",
            &format!("/quiz/1/session/{}", session_id),
            Some(json!({ "action": "GO_TO_ANSWER" })),
        )
        .await;

        let (status, body) = call(
            &api,
            "GET",
            &format!("/player/{}/question/0/results", player_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answers"][0]["playersCorrect"], json!(["Hayden"]));
        assert_eq!(body["answers"][1]["playersCorrect"], json!([]));

        call(
            &api,
            "PUT",
            &format!("/quiz/1/session/{}", session_id),
            Some(json!({ "action": "GO_TO_FINAL_RESULTS" })),
        )
        .await;

        let response = warp::test::request()
            .method("GET")
            .path(&format!("/quiz/1/session/{}/results/csv", session_id))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/csv");
        assert_eq!(response.body().as_ref(), b"player,question 1\nHayden,5\n");
    }

    #[tokio::test]
    async fn bad_requests_get_structured_errors() {
        let api = api();

        let (status, body) = call(&api, "GET", "/player/12", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "UNKNOWN_PLAYER");

        let (status, body) = call(
            &api,
            "PUT",
            "/player/12/question/-1/answer",
            Some(json!({ "answerIds": [1] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "STALE_QUESTION_POSITION");

        let (_, body) = call(
            &api,
            "POST",
            "/quiz/1/session/start",
            Some(json!({ "autoStartNum": 0 })),
        )
        .await;
        let session_id = body["sessionId"].as_u64().unwrap();

        let (status, body) = call(
            &api,
            "PUT",
            &format!("/quiz/1/session/{}", session_id),
            Some(json!({ "action": "JUMP" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_ACTION");

        let (status, body) = call(
            &api,
            "PUT",
            &format!("/quiz/2/session/{}", session_id),
            Some(json!({ "action": "END" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_SESSION");

        let (status, body) = call(&api, "POST", "/player/join", Some(json!({ "name": 3 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }
}
