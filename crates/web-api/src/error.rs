use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code: code.to_owned(),
                message: message.into(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;

        let status = match &error {
            AppErr::Auth(_) | AppErr::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppErr::Invalid(_) => StatusCode::BAD_REQUEST,
            AppErr::NotFound(_) => StatusCode::NOT_FOUND,
            AppErr::Conflict(_) => StatusCode::CONFLICT,
            AppErr::Permission(_) => StatusCode::FORBIDDEN,
            AppErr::Persistence(_) | AppErr::Password(_) | AppErr::Infrastructure(_) => {
                tracing::error!(error = %error, "请求处理失败");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        ApiError::new(status, error.code(), error.client_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
