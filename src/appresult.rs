use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

use crate::{error::CoreError, session::SignInRequired};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        if let Some(err) = self.0.downcast_ref::<CoreError>() {
            use CoreError::*;
            let status = match err {
                NotFound(_) => StatusCode::NOT_FOUND,
                Unauthorized { .. } | Forbidden(_) => StatusCode::FORBIDDEN,
                AlreadyFollowing | NotFollowing | UsernameTaken(_) | EmailTaken(_) => StatusCode::CONFLICT,
                InvalidTarget(_) => StatusCode::BAD_REQUEST,
                EmptyContent | Invalid { .. } | Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                Corrupt(_) | Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            return (status, err.code());
        }
        if self.0.is::<validator::ValidationErrors>() {
            return (StatusCode::UNPROCESSABLE_ENTITY, "invalid");
        }
        if self.0.is::<SignInRequired>() {
            return (StatusCode::UNAUTHORIZED, "sign_in_required");
        }
        (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = if status.is_server_error() {
            tracing::error!("{:#}\n{}", self.0, self.0.backtrace());
            "internal server error".to_owned()
        } else {
            tracing::debug!(%status, "{:#}", self.0);
            self.0.to_string()
        };
        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
