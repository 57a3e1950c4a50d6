use serde::Serialize;
use std::convert::Infallible;
use tracing::warn;
use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{self, Reply, Response},
    Filter,
};

use crate::controllers::SessionController;
use crate::error::{ErrorCode, QuizError};

#[derive(Clone, Debug, Serialize)]
pub struct ErrorReply {
    pub error: ErrorCode,
    pub message: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct EmptyReply {}

pub fn with_controller(
    controller: SessionController,
) -> impl Filter<Extract = (SessionController,), Error = Infallible> + Clone {
    warp::any().map(move || controller.clone())
}

pub fn error_reply(err: &QuizError) -> Response {
    if err.status().is_server_error() {
        warn!(%err, "request failed");
    }

    let reply = ErrorReply {
        error: err.code(),
        message: err.to_string(),
    };
    reply::with_status(reply::json(&reply), err.status()).into_response()
}

pub fn json_reply<T: Serialize>(result: Result<T, QuizError>) -> Response {
    match result {
        Ok(value) => reply::json(&value).into_response(),
        Err(err) => error_reply(&err),
    }
}

pub fn empty_reply(result: Result<(), QuizError>) -> Response {
    json_reply(result.map(|()| EmptyReply {}))
}

pub async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, error, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, ErrorCode::NotFound, "not found".to_string())
    } else if let Some(err) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, ErrorCode::ValidationError, err.to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::NotFound,
            "method not allowed".to_string(),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            format!("{:?}", rejection),
        )
    };

    let reply = ErrorReply { error, message };
    Ok(reply::with_status(reply::json(&reply), status).into_response())
}
