use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    Core(tuma_core::Error),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            AppError::Core(err) => {
                let status = match err {
                    tuma_core::Error::Validation(_) => StatusCode::BAD_REQUEST,
                    tuma_core::Error::NotFound(_) => StatusCode::NOT_FOUND,
                    tuma_core::Error::Authorization(_) => StatusCode::FORBIDDEN,
                    tuma_core::Error::StateConflict { .. } => StatusCode::CONFLICT,
                    tuma_core::Error::Gateway(_) => StatusCode::BAD_GATEWAY,
                    tuma_core::Error::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                // internal detail stays in the logs
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("internal error: {err}");
                    "Internal Server Error".to_string()
                } else {
                    err.to_string()
                };
                (status, err.kind(), message)
            }
            AppError::Anyhow(err) => {
                tracing::error!("internal error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "kind": kind,
                "message": message,
            }
        }));
        (status, body).into_response()
    }
}

impl From<tuma_core::Error> for AppError {
    fn from(err: tuma_core::Error) -> Self {
        Self::Core(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}
