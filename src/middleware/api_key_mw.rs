use std::sync::Arc;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::IntoResponse;
use log::error;

use crate::error::errors::{AuthenticateError, Error};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Rejects requests whose `x-api-key` does not match the configured key.
/// With no key configured every request passes through.
pub async fn validate_api_key_mw(State(api_key): State<Option<Arc<str>>>, req: Request, next: Next) -> Result<impl IntoResponse, Error> {
    let Some(expected) = api_key else {
        return Ok(next.run(req).await);
    };

    match req.headers().get(API_KEY_HEADER) {
        None => {
            return Err(Error::Authenticate(AuthenticateError::MissingCredentials))
        }
        Some(header) => {
            let api_key_value = match header.to_str() {
                Ok(api_key_value) => api_key_value,
                Err(e) => {
                    error!("failed to parse api key: {e}");
                    return Err(Error::Authenticate(AuthenticateError::InvalidToken))
                }
            };
            if expected.as_ref() != api_key_value {
                return Err(Error::Authenticate(AuthenticateError::WrongCredentials))
            }
        }
    };
    Ok(next.run(req).await)
}
