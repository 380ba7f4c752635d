use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;
use serde_json::json;

use crate::pipeline::verify_pipeline::verify_pipeline::PipelineError;

#[derive(Copy, Clone, Serialize)]
#[repr(u16)]
pub enum ResponseCode {
    CodeOK = 0,
    ErrorCodeAuth = 1,
    ErrorCodeInput = 2,
    ErrorCodeServer = 3,
}

impl ResponseCode {
    pub fn response_code(v: ResponseCode) -> u16 {
        v as u16
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Authenticate(#[from] AuthenticateError),

    #[error("{0}")]
    BadRequest(#[from] BadRequestError),

    #[error("{0}")]
    Timeout(#[from] TimeoutError),

    #[error("{0}")]
    Server(#[from] ServerError),
}

impl Error {
    fn get_codes(&self) -> (StatusCode, u16) {
        match *self {
            // 4XX Errors
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, ResponseCode::response_code(ResponseCode::ErrorCodeInput)),
            Error::Authenticate(AuthenticateError::MissingCredentials) => (StatusCode::UNAUTHORIZED, ResponseCode::response_code(ResponseCode::ErrorCodeAuth)),
            Error::Authenticate(AuthenticateError::WrongCredentials) => (StatusCode::FORBIDDEN, ResponseCode::response_code(ResponseCode::ErrorCodeAuth)),
            Error::Authenticate(AuthenticateError::InvalidToken) => (StatusCode::UNAUTHORIZED, ResponseCode::response_code(ResponseCode::ErrorCodeAuth)),

            // 5XX Errors
            Error::Server(_) => (StatusCode::INTERNAL_SERVER_ERROR, ResponseCode::response_code(ResponseCode::ErrorCodeServer)),
            Error::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, ResponseCode::response_code(ResponseCode::ErrorCodeServer)),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest(BadRequestError { message: message.into() })
    }

    pub fn server() -> Self {
        Error::Server(ServerError {})
    }

    pub fn timeout() -> Self {
        Error::Timeout(TimeoutError {})
    }

    pub fn status_code(&self) -> StatusCode {
        self.get_codes().0
    }
}

impl From<PipelineError> for Error {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::InvalidImage(_) | PipelineError::DatabaseUnavailable(_) => Error::bad_request(e.to_string()),
            PipelineError::UpstreamTimeout(_) => Error::timeout(),
            PipelineError::Embedding(_) | PipelineError::Join(_) => Error::server(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status_code, code) = self.get_codes();
        let message = self.to_string();
        let body = Json(json!({ "code": code, "message": message }));

        (status_code, body).into_response()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AuthenticateError {
    #[error("Wrong authentication credentials")]
    WrongCredentials,
    #[error("Invalid authentication credentials")]
    InvalidToken,
    #[error("Missing authentication credentials")]
    MissingCredentials,
}

#[derive(thiserror::Error, Debug, Serialize)]
#[error("{message}")]
pub struct BadRequestError {
    pub message: String,
}

#[derive(thiserror::Error, Debug, Serialize)]
#[error("server error")]
pub struct ServerError {}

#[derive(thiserror::Error, Debug, Serialize)]
#[error("server timeout")]
pub struct TimeoutError {}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::server().status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(Error::timeout().status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(Error::from(AuthenticateError::MissingCredentials).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::from(AuthenticateError::WrongCredentials).status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_pipeline_error_mapping() {
        let invalid = Error::from(PipelineError::InvalidImage("not an image".to_string()));
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.to_string(), "Image decoding failed: not an image");

        let embedding = Error::from(PipelineError::Embedding(anyhow::anyhow!("triton down")));
        assert_eq!(embedding.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(embedding.to_string(), "server error");

        let timeout = Error::from(PipelineError::UpstreamTimeout(anyhow::anyhow!("deadline")));
        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_into_response_body() {
        let response = Error::bad_request("No filename provided").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["code"], 2);
        assert_eq!(value["message"], "No filename provided");
    }
}
