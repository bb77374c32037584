use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde_json::json;
use tracing::{error, warn};

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    UnprocessableEntity(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<cinedb_dal::Error> for ApiError {
    fn from(error: cinedb_dal::Error) -> Self {
        use cinedb_dal::Error as DalError;
        match error {
            DalError::RecordNotFound(msg) => ApiError::NotFound(msg),
            // integrity violations from the store map to the same
            // client-facing validation failure as eager validation
            DalError::InvalidReference(msg) | DalError::InvalidInput(msg) => {
                ApiError::UnprocessableEntity(msg)
            }
            DalError::Conflict(msg) => ApiError::Conflict(msg),
            DalError::DatabaseError(e) => ApiError::Internal(e.into()),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!("Request failed: {self}");
            "Internal server error".to_string()
        } else {
            warn!("Request rejected: {self}");
            self.to_string()
        };
        let body = axum::Json(json!({
            "status": "failure",
            "error": {
                "code": status.as_u16(),
                "message": message,
            },
        }));
        (status, body).into_response()
    }
}
