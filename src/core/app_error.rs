use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::core::aliases::DieselError;

/// Standard response envelope shared by every endpoint.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct StdResponse<T, M> {
    pub data: Option<T>,
    pub message: Option<M>,
}

impl<T: Serialize, M: Serialize> IntoResponse for StdResponse<T, M> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Error taxonomy every handler translates into exactly once. Underlying
/// store errors roll back their transaction before surfacing here.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("resource not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("{0} is unreachable")]
    ServiceUnreachable(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<DieselError> for AppError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => AppError::NotFound,
            err => AppError::Other(err.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnreachable(_) => StatusCode::BAD_GATEWAY,
            AppError::Other(err) => {
                tracing::error!("Internal error: {err:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self {
            AppError::Other(_) => "Internal server error".to_string(),
            err => err.to_string(),
        };

        let body = StdResponse::<(), String> {
            data: None,
            message: Some(message),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_their_status_codes() {
        let cases = [
            (
                AppError::BadRequest("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::NotFound, StatusCode::NOT_FOUND),
            (AppError::Conflict("conflict".into()), StatusCode::CONFLICT),
            (
                AppError::ServiceUnreachable("MenuService".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::Other(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn diesel_not_found_becomes_app_not_found() {
        let err: AppError = DieselError::NotFound.into();
        assert!(matches!(err, AppError::NotFound));
    }
}
