use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use chess_anywhere_core::Error as CoreError;

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub title: String,
    pub status: u16,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    InvalidMove(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InvalidMove(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            AppError::Core(e) => match e {
                CoreError::IllegalMove(_) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
                CoreError::GameNotFound(_) | CoreError::MoveNotFound { .. } => {
                    (StatusCode::NOT_FOUND, e.to_string())
                }
                CoreError::InvalidId(_)
                | CoreError::MovePending
                | CoreError::NothingStaged
                | CoreError::NotLoaded => (StatusCode::BAD_REQUEST, e.to_string()),
                e if e.is_decode() => (StatusCode::BAD_REQUEST, e.to_string()),
                e if e.is_corrupt_tree() => {
                    tracing::error!("Corrupt move tree: {e}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "This game's stored history is damaged".to_string(),
                    )
                }
                e => {
                    tracing::error!("Unexpected error: {e}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        let page = ErrorTemplate {
            title: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            status: status.as_u16(),
            message,
        };
        match page.render() {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                tracing::error!("Failed to render error page: {e}");
                (status, page.message).into_response()
            }
        }
    }
}
